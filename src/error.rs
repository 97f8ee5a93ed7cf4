use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the training controller, checkpoint store and
/// inference gateway.
#[derive(Debug, Error)]
pub enum Error {
    /// Tensor dimensions disagree. Never retried.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },

    /// Numerical failure inside a model update step.
    #[error("training diverged at epoch {epoch}: {reason}")]
    TrainingDiverged { epoch: usize, reason: String },

    /// A model produced a NaN or infinite loss or parameter during an update.
    #[error("non-finite {0}")]
    NonFinite(String),

    /// A checkpoint could not be written or read back intact.
    #[error("checkpoint persistence failed for {path:?}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    /// `load()` was called on a store that has never been written.
    #[error("no checkpoint available at {path:?}")]
    NoCheckpointAvailable { path: PathBuf },

    /// Serving-side request could not be turned into an image.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Training configuration rejected before a run starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn shape(context: &'static str, expected: impl ToString, actual: impl ToString) -> Self {
        Error::ShapeMismatch {
            context,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

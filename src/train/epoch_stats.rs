use serde::{Serialize, Deserialize};

use crate::train::state::RunState;

/// Per-epoch statistics emitted by `TrainingController::run`.
///
/// When a progress channel is attached, the controller sends one `EpochStats`
/// value at the end of every completed epoch, after the checkpoint and decay
/// policies have been applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochStats {
    /// 0-based epoch index.
    pub epoch: usize,
    /// Largest epoch index the run may reach.
    pub max_epochs: usize,
    /// Mean training loss over all minibatches in this epoch.
    pub train_loss: f64,
    /// Mean cross-entropy on the test set.
    pub test_loss: f64,
    /// Test accuracy as a fraction in [0, 1].
    pub test_accuracy: f64,
    /// Best test accuracy seen so far, this epoch included.
    pub best_accuracy: f64,
    /// Learning rate the epoch was trained with.
    pub learning_rate: f64,
    /// A checkpoint for this epoch is durably stored.
    pub checkpoint_written: bool,
    /// Rate the optimizer continues with, if it decayed after this epoch.
    pub lr_decayed_to: Option<f64>,
    /// Run state after this epoch.
    pub state: RunState,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}

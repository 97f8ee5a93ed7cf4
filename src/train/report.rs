use serde::{Serialize, Deserialize};

use crate::train::epoch_stats::EpochStats;
use crate::train::state::RunState;

/// A checkpoint write that did not reach the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceFailure {
    pub epoch: usize,
    pub reason: String,
}

/// Outcome of a run that reached a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub state: RunState,
    /// Number of epochs evaluated (last epoch index + 1).
    pub epochs_run: usize,
    pub best_accuracy: f64,
    /// Epoch of the most recent checkpoint-worthy result.
    pub best_epoch: Option<usize>,
    pub final_learning_rate: f64,
    pub checkpoints_written: usize,
    pub persistence_failures: Vec<PersistenceFailure>,
    pub history: Vec<EpochStats>,
}

impl TrainingReport {
    /// True when the stored checkpoint reflects `best_epoch`.
    pub fn best_is_persisted(&self) -> bool {
        match self.best_epoch {
            Some(epoch) => !self.persistence_failures.iter().any(|f| f.epoch == epoch),
            None => false,
        }
    }
}

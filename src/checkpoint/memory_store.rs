use std::path::PathBuf;

use crate::checkpoint::{Checkpoint, CheckpointInfo, CheckpointStore};
use crate::error::{Error, Result};

/// In-process store. Keeps the latest checkpoint plus a log of every write,
/// which is handy for inspecting a run's checkpoint policy.
#[derive(Debug, Default, Clone)]
pub struct MemoryCheckpointStore {
    latest: Option<Checkpoint>,
    writes: Vec<CheckpointInfo>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Epoch and accuracy of every successful save, oldest first.
    pub fn writes(&self) -> &[CheckpointInfo] {
        &self.writes
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        self.writes.push(checkpoint.info());
        self.latest = Some(checkpoint.clone());
        Ok(())
    }

    fn load(&self) -> Result<Checkpoint> {
        self.latest.clone().ok_or_else(|| Error::NoCheckpointAvailable {
            path: PathBuf::from("<memory>"),
        })
    }
}

//! Durable storage of the best-so-far model snapshot.
//!
//! The file store replaces its single artifact atomically (temp file in the
//! same directory, fsync, rename), so a reader in another process sees
//! either the previous checkpoint or the new one in full.

pub mod file_store;
pub mod memory_store;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use file_store::FileCheckpointStore;
pub use memory_store::MemoryCheckpointStore;

/// Immutable snapshot: model parameters plus the epoch and test accuracy
/// that triggered the write.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub parameters: Vec<u8>,
    pub epoch: usize,
    pub accuracy: f64,
}

/// Checkpoint metadata without the parameter blob.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub epoch: usize,
    pub accuracy: f64,
}

impl Checkpoint {
    pub fn info(&self) -> CheckpointInfo {
        CheckpointInfo { epoch: self.epoch, accuracy: self.accuracy }
    }
}

/// Latest-only checkpoint storage.
pub trait CheckpointStore {
    /// Persists `checkpoint`, superseding any earlier one.
    fn save(&mut self, checkpoint: &Checkpoint) -> Result<()>;

    /// Returns the most recently saved checkpoint, or
    /// `NoCheckpointAvailable` if nothing was ever saved.
    fn load(&self) -> Result<Checkpoint>;
}

impl<S: CheckpointStore + ?Sized> CheckpointStore for &mut S {
    fn save(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        (**self).save(checkpoint)
    }

    fn load(&self) -> Result<Checkpoint> {
        (**self).load()
    }
}

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::{Error, Result};

const FORMAT: &str = "ferrite-digits/checkpoint-v1";

/// First line of a checkpoint file; the raw parameter bytes follow it.
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    format: String,
    epoch: usize,
    accuracy: f64,
    parameters_len: usize,
}

/// Single-file checkpoint store with atomic replacement.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileCheckpointStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    fn encode(checkpoint: &Checkpoint) -> Result<Vec<u8>> {
        let header = Header {
            format: FORMAT.to_owned(),
            epoch: checkpoint.epoch,
            accuracy: checkpoint.accuracy,
            parameters_len: checkpoint.parameters.len(),
        };
        let mut bytes = serde_json::to_vec(&header)
            .map_err(|e| Error::Persistence { path: PathBuf::new(), reason: e.to_string() })?;
        bytes.push(b'\n');
        bytes.extend_from_slice(&checkpoint.parameters);
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Checkpoint> {
        let split = bytes.iter().position(|&b| b == b'\n')
            .ok_or_else(|| Error::persistence(&self.path, "missing checkpoint header"))?;
        let header: Header = serde_json::from_slice(&bytes[..split])
            .map_err(|e| Error::persistence(&self.path, format!("unreadable header: {e}")))?;
        if header.format != FORMAT {
            return Err(Error::persistence(&self.path, format!("unknown format {:?}", header.format)));
        }
        let parameters = &bytes[split + 1..];
        if parameters.len() != header.parameters_len {
            return Err(Error::persistence(
                &self.path,
                format!("expected {} parameter bytes, found {}", header.parameters_len, parameters.len()),
            ));
        }
        Ok(Checkpoint {
            parameters: parameters.to_vec(),
            epoch: header.epoch,
            accuracy: header.accuracy,
        })
    }

    /// Writes `bytes` to a temp file next to the target and renames it into
    /// place. `before_persist` runs on the synced temp file just before the
    /// rename; an error there abandons the temp file and leaves the target
    /// untouched.
    fn write_atomically<F>(&self, bytes: &[u8], before_persist: F) -> io::Result<()>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        let dir = self.dir();
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        before_persist(tmp.path())?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        // Make the rename itself durable.
        #[cfg(unix)]
        fs::File::open(dir)?.sync_all()?;
        Ok(())
    }

    fn save_with<F>(&mut self, checkpoint: &Checkpoint, before_persist: F) -> Result<()>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        let bytes = Self::encode(checkpoint)?;
        self.write_atomically(&bytes, before_persist)
            .map_err(|e| Error::persistence(&self.path, e))?;

        tracing::debug!(
            path = %self.path.display(),
            epoch = checkpoint.epoch,
            accuracy = checkpoint.accuracy,
            bytes = bytes.len(),
            "Checkpoint written"
        );
        Ok(())
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn save(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        self.save_with(checkpoint, |_| Ok(()))
    }

    fn load(&self) -> Result<Checkpoint> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NoCheckpointAvailable { path: self.path.clone() });
            }
            Err(e) => return Err(Error::persistence(&self.path, e)),
        };
        self.decode(&bytes)
    }
}

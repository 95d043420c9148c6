//! Durable aggregation progress: the next block to inspect for task
//! events. Read at the start of every poll, written after every
//! successful publish.

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("failed to read checkpoint: {0}")]
    Read(String),
    #[error("failed to write checkpoint: {0}")]
    Write(String),
    #[error("checkpoint file is corrupt: {0}")]
    Parse(String),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Checkpoint {
    next_block: u64,
}

/// File-backed singleton checkpoint.
///
/// A missing file means a fresh deployment and reads as block 0. An
/// unreadable or unparsable file is an error: continuing with a guessed
/// position risks duplicate or lost tasks, so callers treat it as fatal.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The next block to inspect.
    pub fn load(&self) -> Result<u64, CheckpointError> {
        if !self.path.exists() {
            return Ok(0);
        }
        let content =
            fs::read_to_string(&self.path).map_err(|e| CheckpointError::Read(e.to_string()))?;
        let checkpoint: Checkpoint =
            serde_json::from_str(&content).map_err(|e| CheckpointError::Parse(e.to_string()))?;
        Ok(checkpoint.next_block)
    }

    /// Persist the next block to inspect. Writes to a sibling temp file
    /// and renames, so a crash mid-write never leaves a torn checkpoint.
    pub fn store(&self, next_block: u64) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| CheckpointError::Write(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(&Checkpoint { next_block })
            .map_err(|e| CheckpointError::Write(e.to_string()))?;

        let mut tmp_name: OsString = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        fs::write(&tmp, content).map_err(|e| CheckpointError::Write(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| CheckpointError::Write(e.to_string()))?;
        debug!(next_block, "checkpoint advanced");
        Ok(())
    }
}

//! Lifecycle of the history log produced by the shell under test.
//!
//! The harness never writes the log. It waits for the shell's flush to land,
//! reads it once, and deletes it on every exit path through
//! [`ArtifactGuard`].

use crate::model::{CleanupStatus, FlushPolicy};
use crate::runner::{HarnessError, HarnessResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How the flush wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushStatus {
    /// The file exists and its size held steady across two polls.
    Stable { polls: u32, bytes: u64 },
    /// The budget ran out while the file was still changing.
    Unstable { polls: u32, bytes: u64 },
    /// The file never appeared.
    Missing { polls: u32 },
}

/// Poll until the log exists and its size stops changing, or the budget runs out.
///
/// `history save` returning to the prompt does not guarantee the write is
/// visible yet. This only narrows that window; callers validate whatever is
/// on disk afterwards.
pub fn wait_for_flush(path: &Path, policy: FlushPolicy) -> FlushStatus {
    let interval = Duration::from_millis(policy.interval_ms);
    let mut last_size: Option<u64> = None;
    let mut polls = 0;
    while polls < policy.attempts.max(1) {
        polls += 1;
        let size = std::fs::metadata(path).ok().map(|meta| meta.len());
        match (last_size, size) {
            (Some(previous), Some(current)) if previous == current && current > 0 => {
                tracing::debug!(polls, bytes = current, "history flush settled");
                return FlushStatus::Stable {
                    polls,
                    bytes: current,
                };
            }
            _ => last_size = size,
        }
        if polls < policy.attempts {
            std::thread::sleep(interval);
        }
    }
    let status = match last_size {
        Some(bytes) => FlushStatus::Unstable { polls, bytes },
        None => FlushStatus::Missing { polls },
    };
    tracing::warn!(?status, path = %path.display(), "flush wait budget exhausted");
    status
}

/// Delete `path`. A missing file is not an error.
pub fn remove_artifact(path: &Path) -> HarnessResult<CleanupStatus> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(CleanupStatus::Removed),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(CleanupStatus::AlreadyAbsent),
        Err(err) => Err(HarnessError::new(
            crate::model::ErrorCode::Io,
            "failed to remove history file",
            Some(serde_json::json!({
                "path": path.display().to_string(),
                "source": err.to_string(),
            })),
        )),
    }
}

/// Removes the artifact when finished or dropped.
pub struct ArtifactGuard {
    path: Option<PathBuf>,
}

impl ArtifactGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Remove the artifact now and report what happened.
    pub fn finish(mut self) -> CleanupStatus {
        match self.path.take() {
            Some(path) => match remove_artifact(&path) {
                Ok(status) => status,
                Err(err) => CleanupStatus::Failed {
                    message: err.to_string(),
                },
            },
            None => CleanupStatus::AlreadyAbsent,
        }
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(err) = remove_artifact(&path) {
                tracing::warn!(error = %err, "failed to clean up history file");
            }
        }
    }
}

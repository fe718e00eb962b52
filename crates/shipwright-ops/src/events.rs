//! Transfer events and progress aggregation.
//!
//! The engine only calls the per-file observer; aggregating outcomes is the
//! caller's job. [`ChannelObserver`] forwards every callback as a
//! [`TransferEvent`] and [`TransferProgress`] folds them into counters.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use shipwright_core::{DeployError, DeployResult, FileDescriptor, FileObserver};
use tokio::sync::mpsc;

use crate::operation::{DeployOperation, TransferError};

/// One file callback, as a message.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    /// A target is about to handle the file.
    Started {
        file: String,
        destination: Option<String>,
    },
    /// A target handled the file. Pulls carry the downloaded data.
    Completed {
        file: String,
        local_path: Option<PathBuf>,
        data: Option<Vec<u8>>,
    },
    /// A target failed to handle the file.
    Failed(TransferError),
}

impl TransferEvent {
    /// Write pulled data to the file's local path.
    ///
    /// Returns `false` when the event carries nothing to write.
    pub async fn save(&self) -> DeployResult<bool> {
        let Self::Completed {
            local_path: Some(path),
            data: Some(data),
            ..
        } = self
        else {
            return Ok(false);
        };

        write_local(path, data).await?;
        Ok(true)
    }
}

async fn write_local(path: &Path, data: &[u8]) -> DeployResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DeployError::io(parent, e))?;
    }
    tokio::fs::write(path, data)
        .await
        .map_err(|e| DeployError::io(path, e))
}

/// File observer that sends every callback over an unbounded channel.
///
/// Callbacks are synchronous, so the channel is unbounded; a dropped
/// receiver silently discards events.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<TransferEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<TransferEvent>) -> Self {
        Self { tx }
    }

    /// Create an observer together with its receiving end.
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<TransferEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self::new(tx)), rx)
    }
}

impl FileObserver for ChannelObserver {
    fn before(&self, file: &FileDescriptor, destination: Option<&str>) {
        let _ = self.tx.send(TransferEvent::Started {
            file: file.relative_path(),
            destination: destination.map(str::to_string),
        });
    }

    fn completed(&self, file: &FileDescriptor, result: Result<Option<&[u8]>, &DeployError>) {
        let event = match result {
            Ok(data) => TransferEvent::Completed {
                file: file.relative_path(),
                local_path: file.local_path().map(Path::to_path_buf),
                data: data.map(<[u8]>::to_vec),
            },
            Err(err) => {
                TransferEvent::Failed(TransferError::new(file.relative_path(), err.to_string()))
            }
        };
        let _ = self.tx.send(event);
    }
}

/// Running counters of an operation.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    /// The operation being tracked.
    pub operation: DeployOperation,
    /// Files handled successfully (per target).
    pub files_completed: usize,
    /// Files that failed (per target).
    pub files_failed: usize,
    /// Expected number of file outcomes (0 if unknown).
    pub files_total: usize,
    /// Bytes received by pulls.
    pub bytes_processed: u64,
    /// The file currently being handled.
    pub current_file: Option<String>,
    /// Errors encountered so far.
    pub errors: Vec<TransferError>,
}

impl TransferProgress {
    pub fn new(operation: DeployOperation, files_total: usize) -> Self {
        Self {
            operation,
            files_completed: 0,
            files_failed: 0,
            files_total,
            bytes_processed: 0,
            current_file: None,
            errors: Vec::new(),
        }
    }

    /// Fold one event into the counters.
    pub fn apply(&mut self, event: &TransferEvent) {
        match event {
            TransferEvent::Started { file, .. } => self.current_file = Some(file.clone()),
            TransferEvent::Completed { data, .. } => {
                self.files_completed += 1;
                self.bytes_processed += data.as_ref().map_or(0, |d| d.len() as u64);
                self.current_file = None;
            }
            TransferEvent::Failed(error) => {
                self.files_failed += 1;
                self.errors.push(error.clone());
                self.current_file = None;
            }
        }
    }

    /// Progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.files_total == 0 {
            return 0.0;
        }
        let done = (self.files_completed + self.files_failed) as f64;
        (done / self.files_total as f64 * 100.0).min(100.0)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Final summary.
    pub fn finish(self) -> TransferSummary {
        TransferSummary {
            operation: self.operation,
            succeeded: self.files_completed,
            failed: self.files_failed,
            bytes_processed: self.bytes_processed,
            errors: self.errors,
        }
    }
}

/// Outcome of a finished operation.
#[derive(Debug, Clone)]
pub struct TransferSummary {
    pub operation: DeployOperation,
    pub succeeded: usize,
    pub failed: usize,
    pub bytes_processed: u64,
    pub errors: Vec<TransferError>,
}

impl TransferSummary {
    /// Whether no file failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Human-readable one-line summary.
    pub fn summary(&self) -> String {
        let action = self.operation.past_tense();
        if self.failed == 0 {
            format!("{} {} files", action, self.succeeded)
        } else {
            format!("{} {} files, {} failed", action, self.succeeded, self.failed)
        }
    }
}

//! Error types for vsync
//!
//! Severity follows the run policy: read-side and validation failures abort
//! the run, write-side failures are isolated to the batch or tag that
//! produced them.

use std::collections::BTreeSet;
use thiserror::Error;

use crate::models::TrainingOutcome;
use crate::types::RemoteError;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum SyncError {
    /// Required credentials or identifiers are absent (fatal, run never starts)
    #[error("Missing configuration: {}", .keys.join(", "))]
    ConfigMissing { keys: Vec<String> },

    /// Local label schema and remote tag set differ (fatal, no writes)
    #[error("Label schema mismatch: missing remotely {missing:?}, extra remotely {extra:?}")]
    SchemaMismatch {
        missing: BTreeSet<String>,
        extra: BTreeSet<String>,
    },

    /// Transport or HTTP failure on a read (fatal for the stage)
    #[error("Remote service unavailable during {operation}: {source}")]
    RemoteUnavailable {
        operation: String,
        #[source]
        source: RemoteError,
    },

    /// A batch upload or tag creation failed (logged, run continues)
    #[error("Partial write failure for {item}: {reason}")]
    PartialWriteFailure { item: String, reason: String },

    /// Training timed out or ended without success (publish skipped)
    #[error("Training incomplete for iteration {iteration}: {outcome}")]
    TrainingIncomplete {
        iteration: String,
        outcome: TrainingOutcome,
    },

    /// Annotation document violates its structural invariants
    #[error("Invalid annotation document: {0}")]
    Document(String),

    /// A single source image could not be processed
    #[error("Image {file_name} skipped: {reason}")]
    ImageSkipped { file_name: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// vsync-common error
    #[error("Common error: {0}")]
    Common(#[from] vsync_common::Error),
}

impl SyncError {
    /// Wrap a remote read failure with the operation it interrupted
    pub fn remote(operation: impl Into<String>, source: RemoteError) -> Self {
        SyncError::RemoteUnavailable {
            operation: operation.into(),
            source,
        }
    }

    /// Whether this error must abort the current run
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SyncError::PartialWriteFailure { .. }
                | SyncError::TrainingIncomplete { .. }
                | SyncError::ImageSkipped { .. }
        )
    }
}

/// Result type for pipeline operations
pub type SyncResult<T> = Result<T, SyncError>;

// error.rs — Error types for the audit subsystem.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while persisting audit records.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The audit log file could not be opened or created.
    #[error("failed to open audit log at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Appending a record to the audit log failed.
    #[error("failed to write audit record to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Reading records back from the audit log failed.
    #[error("failed to read audit log at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An audit record could not be serialized or deserialized.
    #[error("audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// error.rs — Error types for entity record capture and decoding.

use thiserror::Error;

/// Errors raised while converting between typed entities and records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The entity's state could not be serialized into a snapshot.
    #[error("failed to capture entity state: {0}")]
    Capture(#[source] serde_json::Error),

    /// The record's snapshot could not be decoded back into the entity type.
    #[error("failed to decode entity state for '{type_name}': {source}")]
    Decode {
        type_name: String,
        source: serde_json::Error,
    },

    /// A record was decoded as a different entity type than it holds.
    #[error("record holds '{actual}' but '{expected}' was requested")]
    TypeMismatch { expected: String, actual: String },
}

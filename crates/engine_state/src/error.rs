//! State-layer error types.

/// Errors that can occur when moving typed values in and out of the store.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Failed to encode a value to JSON.
    #[error("failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),

    /// Failed to decode a value from JSON.
    #[error("failed to decode value: {0}")]
    Decode(#[source] serde_json::Error),
}

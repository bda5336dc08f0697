use std::time::Duration;
use thiserror::Error;

/// Unified error type for the memory cache, the remote adapter and the
/// hybrid coordinator.
///
/// Per-value problems (a validator rejecting a value, an empty primary key,
/// an empty index key) are deliberately *not* errors — those values are
/// skipped during `set` and never surface here. Likewise, reading a remote
/// key that was never written is not an error: it reads as an empty dataset
/// and version 0.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Remote key configuration rejected at construction time
    /// (empty key, data/version key collision, key too long).
    #[error("Invalid key configuration: {0}")]
    KeyConfig(String),

    /// A non-empty dataset was submitted with no primary-key function
    /// configured. This is a programming error, not a data error.
    #[error("No primary key function configured for non-empty dataset")]
    MissingKeyExtractor,

    /// A remote operation was invoked on an adapter with no backend attached.
    #[error("Remote backend not configured")]
    BackendMissing,

    /// Remote operation exceeded its configured deadline.
    #[error("Operation '{op}' timed out after {limit:?}")]
    Timeout { op: &'static str, limit: Duration },

    /// Remote store failure (connection, protocol, command error).
    #[error("Remote store error: {0}")]
    Backend(String),

    /// Dataset could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored blob exceeds the configured read guard; refused before decoding.
    #[error("Stored payload is {size} bytes, exceeds configured limit of {limit}")]
    PayloadTooLarge { size: usize, limit: usize },
}

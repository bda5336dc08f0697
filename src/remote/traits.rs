use async_trait::async_trait;
use std::time::Duration;

use crate::error::CacheError;

/// A single write primitive, batched through [`RemoteBackend::apply`].
#[derive(Debug, Clone)]
pub enum RemoteCommand {
    /// Store bytes under a key with an expiry.
    SetEx {
        key: String,
        value: Vec<u8>,
        ttl: Duration,
    },
    /// Increment the integer counter at a key (missing counts as 0).
    /// Preserves any existing expiry on the key.
    Incr { key: String },
    /// Re-apply an expiry without touching the stored value.
    Expire { key: String, ttl: Duration },
    /// Delete a key.
    Del { key: String },
}

/// Key-value backend consumed by the remote adapter.
///
/// Keys are plain strings, values opaque byte strings. Absence of a key is a
/// distinguished non-error outcome on every read path.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Read the bytes at a key. `Ok(None)` when the key does not exist.
    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Whether a key currently exists.
    async fn key_exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Remaining time-to-live of a key.
    /// `None` when the key is missing or carries no expiry.
    async fn remaining_ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;

    /// Execute all commands as one atomic, all-or-nothing batch.
    /// Other readers never observe a partially applied batch.
    async fn apply(&self, commands: Vec<RemoteCommand>) -> Result<(), CacheError>;
}

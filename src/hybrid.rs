// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Hybrid coordinator pairing the in-memory cache with a remote mirror.
//!
//! Writes land in memory first, then fan out to the remote store. A remote
//! failure is returned to the caller but the memory write is NOT rolled
//! back: local reads keep serving the newest accepted dataset while the two
//! stores are divergent, and the caller decides whether to retry or
//! reconcile with [`HybridCache::sync_to_redis`] /
//! [`HybridCache::load_from_redis`]. Reads never touch the remote store.
//!
//! Note the asymmetry on the write path: [`HybridCache::set`] forwards the
//! caller's slice to the remote store as-is, so values the memory pipeline
//! rejected or normalized still reach the mirror in their original form.
//! [`HybridCache::sync_to_redis`] is the way to push the post-pipeline
//! snapshot instead.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{CacheConfig, RedisCacheConfig};
use crate::error::CacheError;
use crate::memory::MemoryCache;
use crate::remote::{RedisCache, RemoteBackend};

/// Two-tier cache: authoritative [`MemoryCache`] plus a best-effort
/// [`RedisCache`] mirror.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use mirror_cache::{CacheConfig, HybridCache, InMemoryBackend, RedisCacheConfig, RemoteBackend};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct User {
///     id: String,
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), mirror_cache::CacheError> {
/// let backend: Arc<dyn RemoteBackend> = Arc::new(InMemoryBackend::new());
/// let cache = HybridCache::new(
///     CacheConfig::new().with_primary_key(|u: &User| u.id.clone()),
///     Some(backend),
///     RedisCacheConfig::default(),
/// )?;
///
/// cache.set(&[User { id: "1".into() }]).await?;
/// assert_eq!(cache.get_all().len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct HybridCache<V> {
    memory: MemoryCache<V>,
    redis: RedisCache<V>,
}

impl<V> HybridCache<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// Build both tiers. Passing `None` for the backend yields a cache whose
    /// remote operations fail with [`CacheError::BackendMissing`] while the
    /// memory tier works normally.
    ///
    /// # Errors
    ///
    /// [`CacheError::KeyConfig`] when the remote key configuration is
    /// rejected, see [`RedisCache::new`].
    pub fn new(
        cache_config: CacheConfig<V>,
        backend: Option<Arc<dyn RemoteBackend>>,
        redis_config: RedisCacheConfig,
    ) -> Result<Self, CacheError> {
        Ok(Self {
            memory: MemoryCache::new(cache_config),
            redis: RedisCache::new(backend, redis_config)?,
        })
    }

    /// Register a secondary index on the memory tier.
    pub fn add_index(
        &self,
        name: impl Into<String>,
        key_fn: impl Fn(&V) -> String + Send + Sync + 'static,
    ) {
        self.memory.add_index(name, key_fn);
    }

    /// Replace the dataset in memory, then mirror the caller's slice to the
    /// remote store.
    ///
    /// # Errors
    ///
    /// A memory error (for example [`CacheError::MissingKeyExtractor`])
    /// aborts before the remote store is contacted. A remote error is
    /// returned after the memory write succeeded: memory holds the new
    /// dataset, the mirror does not.
    #[tracing::instrument(skip(self, values), fields(count = values.len()))]
    pub async fn set(&self, values: &[V]) -> Result<(), CacheError> {
        self.memory.set(values)?;

        if let Err(err) = self.redis.set(values).await {
            warn!(error = %err, "Remote mirror write failed; memory is ahead of the remote store");
            crate::metrics::record_operation("hybrid", "set", "diverged");
            return Err(err);
        }

        crate::metrics::record_operation("hybrid", "set", "success");
        Ok(())
    }

    /// Look up one value through a secondary index. Memory only.
    #[must_use]
    pub fn get_by_index(&self, index_name: &str, key: &str) -> Option<V> {
        self.memory.get_by_index(index_name, key)
    }

    /// All cached values in insertion order. Memory only.
    #[must_use]
    pub fn get_all(&self) -> Vec<V> {
        self.memory.get_all()
    }

    /// Pull the remote dataset and replace the memory tier with it.
    ///
    /// An absent remote dataset reads as empty and clears memory. A remote
    /// read error propagates without touching memory.
    #[tracing::instrument(skip(self))]
    pub async fn load_from_redis(&self) -> Result<(), CacheError> {
        let values = self.redis.get().await?;
        self.memory.set(&values)?;

        debug!(count = values.len(), "Replaced memory tier from remote store");
        crate::metrics::record_operation("hybrid", "load_from_redis", "success");
        Ok(())
    }

    /// Push the current memory snapshot (post-pipeline, so validated and
    /// normalized) to the remote store.
    #[tracing::instrument(skip(self))]
    pub async fn sync_to_redis(&self) -> Result<(), CacheError> {
        let values = self.memory.get_all();
        self.redis.set(&values).await?;

        debug!(count = values.len(), "Pushed memory snapshot to remote store");
        crate::metrics::record_operation("hybrid", "sync_to_redis", "success");
        Ok(())
    }

    /// Direct handle to the memory tier for operations the coordinator does
    /// not wrap (`get`, `len`, `hash`, `iterate`, ...).
    #[must_use]
    pub fn memory(&self) -> &MemoryCache<V> {
        &self.memory
    }

    /// Direct handle to the remote adapter (`version`, `ttl`, `clear`, ...).
    #[must_use]
    pub fn redis(&self) -> &RedisCache<V> {
        &self.redis
    }
}

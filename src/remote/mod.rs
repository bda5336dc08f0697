//! Versioned remote store adapter.
//!
//! Persists the whole dataset as one blob under a **data key**
//! (`key_prefix + "data"`), alongside a **version key** (data key +
//! `version_key_suffix`) holding a counter that increments on every write.
//! Callers poll the counter to detect changes made by other processes
//! without fetching the blob.
//!
//! The store + increment + expiry-refresh triple is submitted as one atomic
//! batch, so no reader ever observes a new blob with a stale counter (or
//! vice versa). The batch is *not* transactional with any in-memory state —
//! see [`crate::HybridCache`] for the divergence contract. Every dataset is
//! stored with an expiry; there is no way to persist one forever.

pub mod memory;
pub mod redis;
pub mod traits;

pub use memory::InMemoryBackend;
pub use redis::RedisBackend;
pub use traits::{RemoteBackend, RemoteCommand};

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::RedisCacheConfig;
use crate::error::CacheError;

/// Remote keys longer than this indicate misconfiguration (a runaway prefix),
/// not a legitimate layout.
const MAX_KEY_BYTES: usize = 512;

/// Applied when neither the call nor the config provides a TTL.
const FALLBACK_TTL: Duration = Duration::from_secs(60 * 60);

/// Versioned, TTL-bounded remote mirror of one dataset.
///
/// # Example
///
/// ```rust,no_run
/// use mirror_cache::{RedisBackend, RedisCache, RedisCacheConfig, RemoteBackend};
/// use std::sync::Arc;
///
/// #[derive(Clone, serde::Serialize, serde::Deserialize)]
/// struct User {
///     id: String,
/// }
///
/// # async fn example() -> Result<(), mirror_cache::CacheError> {
/// let backend: Arc<dyn RemoteBackend> =
///     Arc::new(RedisBackend::connect("redis://localhost:6379").await?);
/// let cache: RedisCache<User> =
///     RedisCache::new(Some(backend), RedisCacheConfig::default().with_key_prefix("users:"))?;
///
/// cache.set(&[User { id: "1".into() }]).await?;
/// assert_eq!(cache.version().await?, 1);
/// # Ok(())
/// # }
/// ```
pub struct RedisCache<V> {
    backend: Option<Arc<dyn RemoteBackend>>,
    config: RedisCacheConfig,
    data_key: String,
    version_key: String,
    _marker: PhantomData<fn() -> V>,
}

impl<V> RedisCache<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Create an adapter with the data key derived from the configured
    /// prefix (`key_prefix + "data"`).
    ///
    /// # Errors
    ///
    /// [`CacheError::KeyConfig`] when the resulting keys are empty, collide,
    /// or exceed 512 bytes. Misconfigured keys would silently corrupt shared
    /// key space, so construction refuses them outright.
    pub fn new(
        backend: Option<Arc<dyn RemoteBackend>>,
        config: RedisCacheConfig,
    ) -> Result<Self, CacheError> {
        let data_key = format!("{}data", config.key_prefix);
        Self::with_key(backend, data_key, config)
    }

    /// Create an adapter with a caller-supplied literal data key; the
    /// configured prefix is ignored, the version-key suffix still applies.
    pub fn with_key(
        backend: Option<Arc<dyn RemoteBackend>>,
        data_key: impl Into<String>,
        config: RedisCacheConfig,
    ) -> Result<Self, CacheError> {
        let data_key = data_key.into();
        let version_key = format!("{}{}", data_key, config.version_key_suffix);

        if data_key.is_empty() {
            return Err(CacheError::KeyConfig("data key must not be empty".to_string()));
        }
        if version_key == data_key {
            return Err(CacheError::KeyConfig(
                "version key must differ from data key (empty version-key suffix?)".to_string(),
            ));
        }
        if data_key.len() > MAX_KEY_BYTES || version_key.len() > MAX_KEY_BYTES {
            return Err(CacheError::KeyConfig(format!(
                "keys must not exceed {} bytes (data key is {}, version key {})",
                MAX_KEY_BYTES,
                data_key.len(),
                version_key.len()
            )));
        }

        Ok(Self {
            backend,
            config,
            data_key,
            version_key,
            _marker: PhantomData,
        })
    }

    /// The key the dataset blob is stored under.
    #[must_use]
    pub fn data_key(&self) -> &str {
        &self.data_key
    }

    /// The key the version counter is stored under.
    #[must_use]
    pub fn version_key(&self) -> &str {
        &self.version_key
    }

    /// Store the dataset with the configured default TTL.
    ///
    /// Equivalent to [`set_with_ttl`](Self::set_with_ttl) with a zero TTL.
    #[tracing::instrument(skip(self, values), fields(count = values.len()))]
    pub async fn set(&self, values: &[V]) -> Result<(), CacheError> {
        self.set_with_ttl(values, Duration::ZERO).await
    }

    /// Store the dataset and bump the version counter atomically.
    ///
    /// One all-or-nothing batch stores the blob with expiry, increments the
    /// counter and refreshes the counter's expiry to match — readers never
    /// see the blob and the counter disagree. A zero `ttl` falls back to the
    /// configured TTL, and failing that to one hour: data is never persisted
    /// without an expiry.
    #[tracing::instrument(skip(self, values, ttl), fields(count = values.len(), ttl = ?ttl))]
    pub async fn set_with_ttl(&self, values: &[V], ttl: Duration) -> Result<(), CacheError> {
        let start = Instant::now();
        let result = self.set_with_ttl_inner(values, ttl).await;
        record_outcome("set", start, &result);
        result
    }

    async fn set_with_ttl_inner(&self, values: &[V], ttl: Duration) -> Result<(), CacheError> {
        let backend = self.backend()?;
        let blob = serde_json::to_vec(values)?;
        let ttl = self.effective_ttl(ttl);

        crate::metrics::record_payload_bytes("set", blob.len());
        debug!(bytes = blob.len(), ttl = ?ttl, "Storing dataset");

        let commands = vec![
            RemoteCommand::SetEx {
                key: self.data_key.clone(),
                value: blob,
                ttl,
            },
            RemoteCommand::Incr {
                key: self.version_key.clone(),
            },
            RemoteCommand::Expire {
                key: self.version_key.clone(),
                ttl,
            },
        ];
        self.bounded("set", backend.apply(commands)).await
    }

    /// Read the dataset.
    ///
    /// An absent data key is a normal state and reads as an empty dataset.
    /// When a maximum payload size is configured, oversized blobs are
    /// refused before any decoding.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self) -> Result<Vec<V>, CacheError> {
        let start = Instant::now();
        let result = self.get_inner().await;
        record_outcome("get", start, &result);
        result
    }

    async fn get_inner(&self) -> Result<Vec<V>, CacheError> {
        let backend = self.backend()?;
        let Some(blob) = self.bounded("get", backend.fetch(&self.data_key)).await? else {
            debug!("Data key absent, returning empty dataset");
            return Ok(Vec::new());
        };

        if let Some(limit) = self.config.max_payload_bytes {
            if blob.len() > limit {
                return Err(CacheError::PayloadTooLarge {
                    size: blob.len(),
                    limit,
                });
            }
        }
        crate::metrics::record_payload_bytes("get", blob.len());

        let values = serde_json::from_slice(&blob)?;
        Ok(values)
    }

    /// Whether the data key currently exists.
    pub async fn exists(&self) -> Result<bool, CacheError> {
        let backend = self.backend()?;
        self.bounded("exists", backend.key_exists(&self.data_key)).await
    }

    /// Current version counter; 0 when the dataset has never been stored or
    /// was cleared.
    pub async fn version(&self) -> Result<i64, CacheError> {
        let backend = self.backend()?;
        let raw = self.bounded("version", backend.fetch(&self.version_key)).await?;
        match raw {
            None => Ok(0),
            Some(bytes) => {
                let text = std::str::from_utf8(&bytes).map_err(|_| {
                    CacheError::Backend("version counter is not valid UTF-8".to_string())
                })?;
                text.trim().parse::<i64>().map_err(|_| {
                    CacheError::Backend(format!("version counter is not an integer: {:?}", text))
                })
            }
        }
    }

    /// Delete the data and version keys together, atomically.
    /// Afterwards [`version`](Self::version) reads 0.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), CacheError> {
        let start = Instant::now();
        let result = self.clear_inner().await;
        record_outcome("clear", start, &result);
        result
    }

    async fn clear_inner(&self) -> Result<(), CacheError> {
        let backend = self.backend()?;
        let commands = vec![
            RemoteCommand::Del {
                key: self.data_key.clone(),
            },
            RemoteCommand::Del {
                key: self.version_key.clone(),
            },
        ];
        self.bounded("clear", backend.apply(commands)).await
    }

    /// Remaining time-to-live of the data key; `None` when it is absent.
    pub async fn ttl(&self) -> Result<Option<Duration>, CacheError> {
        let backend = self.backend()?;
        self.bounded("ttl", backend.remaining_ttl(&self.data_key)).await
    }

    /// Re-apply the configured TTL to both keys without touching the stored
    /// value or the version counter.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&self) -> Result<(), CacheError> {
        let backend = self.backend()?;
        let ttl = self.effective_ttl(Duration::ZERO);
        let commands = vec![
            RemoteCommand::Expire {
                key: self.data_key.clone(),
                ttl,
            },
            RemoteCommand::Expire {
                key: self.version_key.clone(),
                ttl,
            },
        ];
        self.bounded("refresh", backend.apply(commands)).await
    }

    fn backend(&self) -> Result<&Arc<dyn RemoteBackend>, CacheError> {
        self.backend.as_ref().ok_or(CacheError::BackendMissing)
    }

    /// TTL fallback chain: requested → configured → one hour.
    fn effective_ttl(&self, requested: Duration) -> Duration {
        if !requested.is_zero() {
            requested
        } else if !self.config.ttl.is_zero() {
            self.config.ttl
        } else {
            FALLBACK_TTL
        }
    }

    /// Run a backend call under the per-operation deadline.
    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        let limit = self.config.op_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                crate::metrics::record_timeout("redis", op);
                Err(CacheError::Timeout { op, limit })
            }
        }
    }
}

fn record_outcome<T>(op: &'static str, start: Instant, result: &Result<T, CacheError>) {
    let status = if result.is_ok() { "success" } else { "error" };
    crate::metrics::record_operation("redis", op, status);
    crate::metrics::record_latency("redis", op, start.elapsed());
}

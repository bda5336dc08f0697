//! Configuration for the cache layers.
//!
//! [`CacheConfig`] carries the per-value hooks (primary key, validation,
//! normalization, hashing, sorting) used by the in-memory cache.
//! [`RedisCacheConfig`] carries key naming, TTL and timeout settings for the
//! remote adapter. Both are immutable after construction and built with
//! consuming setters.
//!
//! # Example
//!
//! ```
//! use mirror_cache::{CacheConfig, RedisCacheConfig};
//! use std::time::Duration;
//!
//! #[derive(Clone, serde::Serialize)]
//! struct User {
//!     id: String,
//!     email: String,
//! }
//!
//! let config = CacheConfig::new()
//!     .with_primary_key(|u: &User| u.id.clone())
//!     .with_normalize(|mut u: User| {
//!         u.email = u.email.trim().to_lowercase();
//!         u
//!     });
//!
//! // Minimal remote config (uses defaults)
//! let remote = RedisCacheConfig::default();
//! assert_eq!(remote.key_prefix, "cache:");
//! assert_eq!(remote.ttl, Duration::from_secs(3600));
//!
//! // Full remote config
//! let remote = RedisCacheConfig::default()
//!     .with_key_prefix("users:")
//!     .with_ttl(Duration::from_secs(300))
//!     .with_max_payload_bytes(8 * 1024 * 1024); // 8 MB
//! # let _ = (config, remote);
//! ```

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Extracts a string key from a value (primary key or index key).
pub type KeyFn<V> = Arc<dyn Fn(&V) -> String + Send + Sync>;

/// Computes the dataset digest from the ordered values.
pub type HashFn<V> = Arc<dyn Fn(&[V]) -> String + Send + Sync>;

/// Accepts or rejects a value; rejected values are skipped, not errors.
pub type ValidateFn<V> = Arc<dyn Fn(&V) -> Result<(), String> + Send + Sync>;

/// Canonicalizes a value before validation and key extraction.
pub type NormalizeFn<V> = Arc<dyn Fn(V) -> V + Send + Sync>;

/// Returns a reordered copy of the values; feeds hashing only, never `get_all`.
pub type SortFn<V> = Arc<dyn Fn(&[V]) -> Vec<V> + Send + Sync>;

/// Per-cache value hooks.
///
/// A primary-key function is required before the first non-empty `set`; all
/// other hooks are optional. Without a hash function the built-in
/// order-sensitive JSON digest is used (see [`crate::digest::json_digest`]).
pub struct CacheConfig<V> {
    pub(crate) primary_key: Option<KeyFn<V>>,
    pub(crate) hash: Option<HashFn<V>>,
    pub(crate) validate: Option<ValidateFn<V>>,
    pub(crate) normalize: Option<NormalizeFn<V>>,
    pub(crate) sort: Option<SortFn<V>>,
}

impl<V> CacheConfig<V> {
    /// Create a config with no hooks set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            primary_key: None,
            hash: None,
            validate: None,
            normalize: None,
            sort: None,
        }
    }

    /// Set the primary-key function. Required before the first non-empty `set`.
    #[must_use]
    pub fn with_primary_key(mut self, f: impl Fn(&V) -> String + Send + Sync + 'static) -> Self {
        self.primary_key = Some(Arc::new(f));
        self
    }

    /// Replace the built-in digest with a custom dataset hash.
    ///
    /// Recommended for value types with volatile fields (timestamps,
    /// counters): hash only the stable fields, in a fixed order.
    #[must_use]
    pub fn with_hash(mut self, f: impl Fn(&[V]) -> String + Send + Sync + 'static) -> Self {
        self.hash = Some(Arc::new(f));
        self
    }

    /// Set a validator. Values it rejects are silently dropped during `set`.
    #[must_use]
    pub fn with_validate(
        mut self,
        f: impl Fn(&V) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validate = Some(Arc::new(f));
        self
    }

    /// Set a normalizer, applied before validation and key extraction.
    #[must_use]
    pub fn with_normalize(mut self, f: impl Fn(V) -> V + Send + Sync + 'static) -> Self {
        self.normalize = Some(Arc::new(f));
        self
    }

    /// Set a sort function used to canonicalize ordering before hashing.
    ///
    /// Makes the digest insertion-order-independent. Enumeration order
    /// (`get_all`, `iterate`) is unaffected.
    #[must_use]
    pub fn with_sort(mut self, f: impl Fn(&[V]) -> Vec<V> + Send + Sync + 'static) -> Self {
        self.sort = Some(Arc::new(f));
        self
    }
}

impl<V> Default for CacheConfig<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for CacheConfig<V> {
    fn clone(&self) -> Self {
        Self {
            primary_key: self.primary_key.clone(),
            hash: self.hash.clone(),
            validate: self.validate.clone(),
            normalize: self.normalize.clone(),
            sort: self.sort.clone(),
        }
    }
}

impl<V> fmt::Debug for CacheConfig<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("primary_key", &self.primary_key.is_some())
            .field("hash", &self.hash.is_some())
            .field("validate", &self.validate.is_some())
            .field("normalize", &self.normalize.is_some())
            .field("sort", &self.sort.is_some())
            .finish()
    }
}

/// Sort helper for order-independent digests: returns a copy of the values
/// ordered by an extracted string key.
///
/// ```
/// # #[derive(Clone, serde::Serialize)]
/// # struct User { id: String }
/// use mirror_cache::{config::string_sorter, CacheConfig};
///
/// let config = CacheConfig::new()
///     .with_primary_key(|u: &User| u.id.clone())
///     .with_sort(string_sorter(|u: &User| u.id.clone()));
/// # let _ = config;
/// ```
pub fn string_sorter<V: Clone>(
    key: impl Fn(&V) -> String + Send + Sync + 'static,
) -> impl Fn(&[V]) -> Vec<V> + Send + Sync + 'static {
    move |values: &[V]| {
        let mut sorted = values.to_vec();
        sorted.sort_by_key(|v| key(v));
        sorted
    }
}

/// Configuration for the versioned remote store adapter.
///
/// The data key is `key_prefix + "data"` and the version key is the data key
/// plus `version_key_suffix` (e.g. `cache:data` / `cache:data:version`).
/// Every stored dataset carries an expiry: `ttl` applies when a call does not
/// supply its own.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisCacheConfig {
    /// Key prefix, unique per logical cache (e.g. "users:")
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Suffix appended to the data key to form the version key
    #[serde(default = "default_version_key_suffix")]
    pub version_key_suffix: String,

    /// Default time-to-live for the data and version keys (default: 1 hour)
    #[serde(default = "default_ttl")]
    pub ttl: Duration,

    /// Per-operation deadline (default: 5 seconds)
    #[serde(default = "default_op_timeout")]
    pub op_timeout: Duration,

    /// Refuse to decode stored payloads larger than this (default: unbounded)
    #[serde(default)]
    pub max_payload_bytes: Option<usize>,
}

fn default_key_prefix() -> String {
    "cache:".to_string()
}
fn default_version_key_suffix() -> String {
    ":version".to_string()
}
fn default_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}
fn default_op_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            version_key_suffix: default_version_key_suffix(),
            ttl: default_ttl(),
            op_timeout: default_op_timeout(),
            max_payload_bytes: None,
        }
    }
}

impl RedisCacheConfig {
    /// Set the key prefix.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the version-key suffix.
    #[must_use]
    pub fn with_version_key_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.version_key_suffix = suffix.into();
        self
    }

    /// Set the default TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the per-operation deadline.
    #[must_use]
    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    /// Bound the size of payloads accepted on read.
    #[must_use]
    pub fn with_max_payload_bytes(mut self, limit: usize) -> Self {
        self.max_payload_bytes = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Clone, Serialize, Debug, PartialEq)]
    struct Item {
        id: String,
    }

    fn item(id: &str) -> Item {
        Item { id: id.to_string() }
    }

    #[test]
    fn test_cache_config_defaults_have_no_hooks() {
        let config: CacheConfig<Item> = CacheConfig::new();
        assert!(config.primary_key.is_none());
        assert!(config.hash.is_none());
        assert!(config.validate.is_none());
        assert!(config.normalize.is_none());
        assert!(config.sort.is_none());
    }

    #[test]
    fn test_cache_config_setters_install_hooks() {
        let config = CacheConfig::new()
            .with_primary_key(|i: &Item| i.id.clone())
            .with_validate(|i: &Item| {
                if i.id.is_empty() {
                    Err("empty id".to_string())
                } else {
                    Ok(())
                }
            })
            .with_normalize(|mut i: Item| {
                i.id = i.id.to_lowercase();
                i
            });

        assert!(config.primary_key.is_some());
        assert!(config.validate.is_some());
        assert!(config.normalize.is_some());
        assert!(config.hash.is_none());
    }

    #[test]
    fn test_string_sorter_returns_sorted_copy() {
        let sorter = string_sorter(|i: &Item| i.id.clone());
        let original = vec![item("c"), item("a"), item("b")];

        let sorted = sorter(&original);

        assert_eq!(sorted, vec![item("a"), item("b"), item("c")]);
        // Input untouched
        assert_eq!(original, vec![item("c"), item("a"), item("b")]);
    }

    #[test]
    fn test_redis_config_defaults() {
        let config = RedisCacheConfig::default();
        assert_eq!(config.key_prefix, "cache:");
        assert_eq!(config.version_key_suffix, ":version");
        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert_eq!(config.op_timeout, Duration::from_secs(5));
        assert!(config.max_payload_bytes.is_none());
    }

    #[test]
    fn test_redis_config_setters() {
        let config = RedisCacheConfig::default()
            .with_key_prefix("users:")
            .with_version_key_suffix(":ver")
            .with_ttl(Duration::from_secs(120))
            .with_op_timeout(Duration::from_millis(750))
            .with_max_payload_bytes(1024);

        assert_eq!(config.key_prefix, "users:");
        assert_eq!(config.version_key_suffix, ":ver");
        assert_eq!(config.ttl, Duration::from_secs(120));
        assert_eq!(config.op_timeout, Duration::from_millis(750));
        assert_eq!(config.max_payload_bytes, Some(1024));
    }

    #[test]
    fn test_redis_config_deserializes_with_defaults() {
        let config: RedisCacheConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.key_prefix, "cache:");
        assert_eq!(config.ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_debug_reports_configured_hooks() {
        let config = CacheConfig::new().with_primary_key(|i: &Item| i.id.clone());
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("primary_key: true"));
        assert!(rendered.contains("hash: false"));
    }
}

//! # Mirror Cache
//!
//! A concurrent, multi-index in-memory cache with an optional versioned
//! Redis mirror.
//!
//! ## Architecture
//!
//! Datasets are replaced wholesale: every write hands over the complete
//! collection, and reads are served from memory only.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       HybridCache<V>                        │
//! │  • Writes land in memory first, then mirror to Redis        │
//! │  • Reads are memory-only                                    │
//! │  • Explicit load_from_redis / sync_to_redis reconciliation  │
//! └─────────────────────────────────────────────────────────────┘
//!                │                              │
//!                ▼                              ▼
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │        MemoryCache<V>        │   │        RedisCache<V>         │
//! │  • One RwLock'd snapshot     │   │  • One JSON blob per dataset │
//! │  • normalize → validate →    │   │  • INCR'd version counter    │
//! │    extract-key pipeline      │   │  • Atomic SET+INCR+EXPIRE    │
//! │  • Secondary indexes         │   │  • TTL on every write        │
//! │  • SHA-256 dataset digest    │   │  • Per-operation timeouts    │
//! └──────────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mirror_cache::{CacheConfig, HybridCache, RedisBackend, RedisCacheConfig, RemoteBackend};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct User {
//!     id: String,
//!     email: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mirror_cache::CacheError> {
//!     let backend = RedisBackend::connect("redis://localhost:6379").await?;
//!     let cache = HybridCache::new(
//!         CacheConfig::new().with_primary_key(|u: &User| u.id.clone()),
//!         Some(Arc::new(backend) as Arc<dyn RemoteBackend>),
//!         RedisCacheConfig::default(),
//!     )?;
//!
//!     // Secondary indexes answer lookups by any derived key.
//!     cache.add_index("email", |u: &User| u.email.clone());
//!
//!     cache
//!         .set(&[
//!             User { id: "1".into(), email: "ada@example.com".into() },
//!             User { id: "2".into(), email: "grace@example.com".into() },
//!         ])
//!         .await?;
//!
//!     if let Some(user) = cache.get_by_index("email", "ada@example.com") {
//!         println!("Found user {}", user.id);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Multi-Index Lookups**: O(1) reads by primary key or any registered secondary index
//! - **Ingest Pipeline**: per-value normalize → validate → key extraction; bad values are
//!   dropped and logged, never fatal
//! - **Change Detection**: SHA-256 digest of the dataset, order-independent when a sorter
//!   is configured
//! - **Versioned Mirror**: dataset blob and version counter written in one atomic batch
//! - **TTL Bounds**: every remote write carries an expiry with a configurable fallback
//! - **Surfaced Divergence**: a failed mirror write returns the error while memory keeps
//!   serving the accepted dataset
//!
//! ## Configuration
//!
//! See [`CacheConfig`] for the memory tier and [`RedisCacheConfig`] for the
//! remote adapter.
//!
//! ## Modules
//!
//! - [`hybrid`]: [`HybridCache`] pairing the two tiers
//! - [`memory`]: the concurrent multi-index [`MemoryCache`]
//! - [`remote`]: the versioned [`RedisCache`] adapter and the [`RemoteBackend`] seam
//! - [`config`]: builder-style configuration for both tiers
//! - [`digest`]: SHA-256 dataset hashing
//! - [`error`]: the crate-wide [`CacheError`]
//! - [`metrics`]: `metrics`-crate instrumentation

pub mod config;
pub mod digest;
pub mod error;
pub mod memory;
pub mod remote;
pub mod hybrid;
pub mod metrics;

pub use config::{string_sorter, CacheConfig, RedisCacheConfig};
pub use error::CacheError;
pub use hybrid::HybridCache;
pub use memory::MemoryCache;
pub use remote::{InMemoryBackend, RedisBackend, RedisCache, RemoteBackend, RemoteCommand};

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic mirror-cache usage example.
//!
//! Demonstrates:
//! 1. Connecting to Redis and building a hybrid cache
//! 2. Loading a dataset through the validation pipeline
//! 3. Indexed lookups
//! 4. Change detection via the dataset digest
//! 5. Reconciling memory and mirror (sync_to_redis / load_from_redis)
//! 6. Displaying metrics (OTEL-compatible)
//!
//! # Prerequisites
//!
//! A local Redis:
//! ```bash
//! docker run --rm -p 6379:6379 redis:7-alpine
//! ```
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;
use std::time::Instant;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde::{Deserialize, Serialize};

use mirror_cache::{
    string_sorter, CacheConfig, HybridCache, RedisBackend, RedisCacheConfig, RemoteBackend,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: String,
    username: String,
    email: String,
}

fn user(id: &str, username: &str, email: &str) -> User {
    User {
        id: id.to_string(),
        username: username.to_string(),
        email: email.to_string(),
    }
}

fn demo_config() -> CacheConfig<User> {
    CacheConfig::new()
        .with_primary_key(|u: &User| u.id.clone())
        .with_validate(|u: &User| {
            if u.email.contains('@') {
                Ok(())
            } else {
                Err(format!("invalid email: {}", u.email))
            }
        })
        .with_sort(string_sorter(|u: &User| u.id.clone()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install metrics recorder (captures all metrics for OTEL export)
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mirror_cache=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           mirror-cache: Basic Usage Example                   ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Connect and build the hybrid cache
    // ─────────────────────────────────────────────────────────────────────────
    println!("📦 Connecting to Redis...");
    let backend = RedisBackend::connect("redis://localhost:6379").await?;

    let cache = HybridCache::new(
        demo_config(),
        Some(Arc::new(backend) as Arc<dyn RemoteBackend>),
        RedisCacheConfig::default().with_key_prefix("demo:users:"),
    )?;
    cache.add_index("email", |u: &User| u.email.clone());
    cache.add_index("username", |u: &User| u.username.clone());

    println!("   ✅ Cache ready");
    println!("   └─ data key:    {}", cache.redis().data_key());
    println!("   └─ version key: {}", cache.redis().version_key());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Load a dataset through the pipeline
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📝 Loading 5 users (one with a broken email)...");

    let users = vec![
        user("3", "carol", "carol@example.com"),
        user("1", "alice", "alice@example.com"),
        user("2", "bob", "bob@example.com"),
        user("4", "mallory", "not-an-email"), // dropped by the validator
        user("1", "alice2", "alice2@example.com"), // overwrites id "1"
    ];

    let start = Instant::now();
    cache.set(&users).await?;
    println!("   ⚡ Replaced dataset in {:?}", start.elapsed());
    println!("   └─ memory holds {} users (validator dropped 1, duplicate id folded)", cache.memory().len());
    println!("   └─ remote mirror got the raw slice: {} users", cache.redis().get().await?.len());
    println!("   └─ remote version: {}", cache.redis().version().await?);

    // The mirror carries the caller's slice verbatim; push the post-pipeline
    // snapshot when the two should agree.
    println!("\n🔄 Reconciling: sync_to_redis pushes the filtered snapshot...");
    cache.sync_to_redis().await?;
    println!("   └─ remote now holds {} users", cache.redis().get().await?.len());
    println!("   └─ remote version: {}", cache.redis().version().await?);

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Indexed lookups
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔍 Lookups...");

    let start = Instant::now();
    let by_pk = cache.memory().get("2");
    println!(
        "   └─ by primary key '2' → {:?} ({:?})",
        by_pk.map(|u| u.username),
        start.elapsed()
    );

    let start = Instant::now();
    let by_email = cache.get_by_index("email", "  CAROL@example.com  ");
    println!(
        "   └─ by email (messy casing + whitespace) → {:?} ({:?})",
        by_email.map(|u| u.username),
        start.elapsed()
    );

    let by_username = cache.get_by_index("username", "alice2");
    println!("   └─ by username 'alice2' → {:?}", by_username.map(|u| u.id));

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Change detection via the digest
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔐 Change detection...");

    let digest_before = cache.memory().hash();
    println!("   └─ digest: {}...", &digest_before[..16]);

    // Same users, shuffled input order: the configured sorter makes the
    // digest order-independent.
    let mut shuffled = cache.get_all();
    shuffled.reverse();
    cache.set(&shuffled).await?;
    println!(
        "   └─ same dataset, reversed input → digest unchanged: {}",
        cache.memory().hash() == digest_before
    );

    let mut changed = cache.get_all();
    changed[0].email = "renamed@example.com".to_string();
    cache.set(&changed).await?;
    println!(
        "   └─ one email edited → digest changed: {}",
        cache.memory().hash() != digest_before
    );

    // ─────────────────────────────────────────────────────────────────────────
    // 5. A "second process" reloads from the mirror
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📖 Second cache instance reloads from Redis...");

    let reader = HybridCache::new(
        demo_config(),
        Some(Arc::new(RedisBackend::connect("redis://localhost:6379").await?) as Arc<dyn RemoteBackend>),
        RedisCacheConfig::default().with_key_prefix("demo:users:"),
    )?;
    reader.add_index("email", |u: &User| u.email.clone());
    reader.load_from_redis().await?;

    println!("   └─ reloaded {} users", reader.get_all().len());
    println!(
        "   └─ digests agree: {}",
        reader.memory().hash() == cache.memory().hash()
    );
    println!(
        "   └─ indexed lookup works: {:?}",
        reader.get_by_index("email", "renamed@example.com").map(|u| u.id)
    );

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Remote state and metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📊 Remote state:");
    println!("   └─ version: {}", cache.redis().version().await?);
    println!("   └─ ttl:     {:?}", cache.redis().ttl().await?);

    println!("\n📈 Raw Metrics (OTEL export format):");
    dump_metrics(&snapshotter);

    // ─────────────────────────────────────────────────────────────────────────
    // 7. Cleanup
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🧹 Clearing the remote mirror...");
    cache.redis().clear().await?;
    println!("   └─ version after clear: {}", cache.redis().version().await?);

    println!("\n💡 Inspect leftovers with:");
    println!("   └─ redis-cli GET demo:users:data");
    println!("   └─ redis-cli GET demo:users:data:version");

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

/// Dump all captured metrics, grouped and sorted by name
fn dump_metrics(snapshotter: &Snapshotter) {
    let snapshot = snapshotter.snapshot();

    let mut counters = Vec::new();
    let mut gauges = Vec::new();
    let mut histograms = Vec::new();

    for (composite_key, _, _, value) in snapshot.into_vec() {
        let (_kind, key) = composite_key.into_parts();
        let labels: Vec<String> = key
            .labels()
            .map(|l| format!("{}={}", l.key(), l.value()))
            .collect();
        let rendered = if labels.is_empty() {
            key.name().to_string()
        } else {
            format!("{}{{{}}}", key.name(), labels.join(","))
        };

        match value {
            DebugValue::Counter(v) => counters.push(format!("{} = {}", rendered, v)),
            DebugValue::Gauge(v) => gauges.push(format!("{} = {:.2}", rendered, v.into_inner())),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                let avg = if count > 0 { sum / count as f64 } else { 0.0 };
                histograms.push(format!(
                    "{} count={} sum={:.4} avg={:.4}",
                    rendered, count, sum, avg
                ));
            }
        }
    }

    counters.sort();
    gauges.sort();
    histograms.sort();

    if !counters.is_empty() {
        println!("   ┌─ Counters (cumulative)");
        for line in &counters {
            println!("   │  └─ {}", line);
        }
    }
    if !gauges.is_empty() {
        println!("   ├─ Gauges (current value)");
        for line in &gauges {
            println!("   │  └─ {}", line);
        }
    }
    if !histograms.is_empty() {
        println!("   └─ Histograms (distributions)");
        for line in &histograms {
            println!("      └─ {}", line);
        }
    }
    if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
}

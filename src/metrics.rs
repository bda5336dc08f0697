// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for mirror-cache.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding application is responsible for choosing the exporter
//! (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `mirror_cache_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//! - `_bytes` suffix for size histograms
//!
//! # Labels
//! - `store`: memory, redis, hybrid
//! - `operation`: set, get, get_by_index, clear, refresh, load_from_redis, sync_to_redis
//! - `status`: success, error, rejected, hit, miss, diverged

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a cache operation outcome
pub fn record_operation(store: &str, operation: &str, status: &str) {
    counter!(
        "mirror_cache_operations_total",
        "store" => store.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(store: &str, operation: &str, duration: Duration) {
    histogram!(
        "mirror_cache_operation_seconds",
        "store" => store.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record the serialized dataset size moved to or from the remote store
pub fn record_payload_bytes(operation: &str, bytes: usize) {
    histogram!(
        "mirror_cache_payload_bytes",
        "operation" => operation.to_string()
    )
    .record(bytes as f64);
}

/// Set the current number of cached values in the memory tier
pub fn set_cached_items(count: usize) {
    gauge!("mirror_cache_cached_items").set(count as f64);
}

/// Set the number of registered secondary indexes
pub fn set_index_count(count: usize) {
    gauge!("mirror_cache_indexes").set(count as f64);
}

/// Record values dropped by the validation pipeline during a replacement
pub fn record_rejected_values(count: usize) {
    counter!("mirror_cache_rejected_values_total").increment(count as u64);
}

/// Record a remote operation that hit its deadline
pub fn record_timeout(store: &str, operation: &str) {
    counter!(
        "mirror_cache_timeouts_total",
        "store" => store.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

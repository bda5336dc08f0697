// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Dataset digests for cheap change detection.
//!
//! A cache snapshot carries one SHA-256 fingerprint of its contents; callers
//! compare fingerprints instead of diffing datasets. The built-in digest
//! renders each value as JSON and is **order-sensitive** — configure a sort
//! function (see [`crate::config::string_sorter`]) when insertion order must
//! not affect the fingerprint, and a custom hash function when values carry
//! volatile fields (timestamps, counters) that should not perturb it.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Marker hashed for a dataset with no values.
const EMPTY_MARKER: &str = "empty";

/// Lowercase hex SHA-256 of a string.
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Digest of the empty dataset.
///
/// Distinct from the digest of any non-empty dataset, and distinct from the
/// empty string — a fresh or cleared cache reports this value from `hash()`.
#[must_use]
pub fn empty_dataset() -> String {
    sha256_hex(EMPTY_MARKER)
}

/// Default dataset digest: each value's JSON rendering followed by `\n`,
/// hashed as one buffer.
///
/// A value that cannot be rendered contributes an empty line rather than
/// failing the whole digest. Empty input yields [`empty_dataset`].
#[must_use]
pub fn json_digest<V: Serialize>(values: &[V]) -> String {
    if values.is_empty() {
        return empty_dataset();
    }

    let mut hasher = Sha256::new();
    for value in values {
        let rendered = serde_json::to_string(value).unwrap_or_default();
        hasher.update(rendered.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

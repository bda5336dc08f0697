// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Concurrent multi-index in-memory cache.
//!
//! Holds the full dataset keyed by primary key, plus any number of named
//! secondary indexes, plus a cached digest for change detection. One
//! reader/writer lock guards all of it as a single unit, so readers never
//! observe a mapping, an index and a digest that disagree.
//!
//! `set` is a full replacement, not a merge: each call rebuilds the mapping,
//! every index and the digest from the submitted values. Per-value problems
//! (failed validation, empty primary key) skip the value silently — only the
//! missing primary-key function is an error.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::config::{CacheConfig, KeyFn};
use crate::digest;
use crate::error::CacheError;

/// The state guarded as one atomic unit.
struct Snapshot<V> {
    /// Primary key -> value
    data: HashMap<String, V>,
    /// Primary keys in first-seen order; drives `get_all`, `iterate` and hashing
    order: Vec<String>,
    /// Index name -> (normalized index key -> primary key)
    indexes: HashMap<String, HashMap<String, String>>,
    /// Index name -> extractor, kept for rebuilds
    index_fns: HashMap<String, KeyFn<V>>,
    /// Digest of the current dataset, recomputed on every `set`/`clear`
    hash: String,
}

/// In-memory cache with O(1) primary and secondary lookups.
///
/// # Example
///
/// ```
/// use mirror_cache::{CacheConfig, MemoryCache};
///
/// #[derive(Clone, serde::Serialize)]
/// struct User {
///     id: String,
///     email: String,
/// }
///
/// let cache = MemoryCache::new(CacheConfig::new().with_primary_key(|u: &User| u.id.clone()));
/// cache.add_index("email", |u: &User| u.email.clone());
///
/// cache
///     .set(&[User { id: "1".into(), email: "A@example.com".into() }])
///     .unwrap();
///
/// assert!(cache.get("1").is_some());
/// assert!(cache.get_by_index("email", "  a@example.com ").is_some());
/// ```
///
/// # Thread Safety
///
/// `Send + Sync` for `V: Send + Sync`; share via `Arc`. Writers (`set`,
/// `clear`, `add_index`, `remove_index`) serialize; reads run concurrently.
pub struct MemoryCache<V> {
    config: CacheConfig<V>,
    inner: RwLock<Snapshot<V>>,
}

impl<V> MemoryCache<V>
where
    V: Clone + Serialize,
{
    /// Create an empty cache. The config is immutable from here on.
    #[must_use]
    pub fn new(config: CacheConfig<V>) -> Self {
        Self {
            config,
            inner: RwLock::new(Snapshot {
                data: HashMap::new(),
                order: Vec::new(),
                indexes: HashMap::new(),
                index_fns: HashMap::new(),
                hash: digest::empty_dataset(),
            }),
        }
    }

    /// Register (or replace) a named index and build it from the current
    /// dataset immediately.
    ///
    /// The result is identical to the index having existed since the dataset
    /// was loaded. Values whose extracted key is empty are not indexed.
    pub fn add_index(
        &self,
        name: impl Into<String>,
        key_fn: impl Fn(&V) -> String + Send + Sync + 'static,
    ) {
        let name = name.into();
        let key_fn: KeyFn<V> = std::sync::Arc::new(key_fn);

        let mut inner = self.inner.write();
        let index = build_index(&inner.data, &inner.order, &key_fn);
        inner.indexes.insert(name.clone(), index);
        inner.index_fns.insert(name, key_fn);
        crate::metrics::set_index_count(inner.indexes.len());
    }

    /// Drop an index and its extractor. Unknown names are a no-op.
    pub fn remove_index(&self, name: &str) {
        let mut inner = self.inner.write();
        inner.indexes.remove(name);
        inner.index_fns.remove(name);
        crate::metrics::set_index_count(inner.indexes.len());
    }

    /// Whether an index with this name is registered.
    #[must_use]
    pub fn has_index(&self, name: &str) -> bool {
        self.inner.read().indexes.contains_key(name)
    }

    /// Number of registered indexes.
    #[must_use]
    pub fn index_count(&self) -> usize {
        self.inner.read().indexes.len()
    }

    /// Names of the registered indexes, sorted alphabetically.
    #[must_use]
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().indexes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Replace the entire dataset.
    ///
    /// Per value, in input order: normalize → validate (a rejection skips the
    /// value) → extract the primary key (empty key skips the value). A later
    /// duplicate primary key overwrites the earlier value but keeps the first
    /// occurrence's position in the enumeration order. All indexes are
    /// rebuilt from the final mapping and the digest is recomputed before
    /// this returns.
    ///
    /// # Errors
    ///
    /// [`CacheError::MissingKeyExtractor`] when `values` is non-empty and no
    /// primary-key function was configured. Empty input is always accepted
    /// and resets the cache to its empty state.
    pub fn set(&self, values: &[V]) -> Result<(), CacheError> {
        let start = Instant::now();

        if values.is_empty() {
            let mut inner = self.inner.write();
            apply_replacement(&mut inner, HashMap::new(), Vec::new(), &self.config);
            crate::metrics::set_cached_items(0);
            crate::metrics::record_operation("memory", "set", "success");
            crate::metrics::record_latency("memory", "set", start.elapsed());
            debug!("Empty dataset applied");
            return Ok(());
        }

        let Some(key_of) = self.config.primary_key.clone() else {
            crate::metrics::record_operation("memory", "set", "rejected");
            return Err(CacheError::MissingKeyExtractor);
        };

        // Pipeline runs outside the lock; only the swap below serializes.
        let mut data: HashMap<String, V> = HashMap::with_capacity(values.len());
        let mut order: Vec<String> = Vec::with_capacity(values.len());
        let mut rejected = 0usize;

        for value in values {
            let mut value = value.clone();
            if let Some(ref normalize) = self.config.normalize {
                value = normalize(value);
            }
            if let Some(ref validate) = self.config.validate {
                if let Err(reason) = validate(&value) {
                    debug!(reason = %reason, "Value rejected by validator, skipping");
                    rejected += 1;
                    continue;
                }
            }
            let pk = key_of(&value);
            if pk.is_empty() {
                debug!("Value produced an empty primary key, skipping");
                rejected += 1;
                continue;
            }
            // Last write wins; first occurrence claims the position.
            if data.insert(pk.clone(), value).is_none() {
                order.push(pk);
            }
        }

        let accepted = order.len();
        {
            let mut inner = self.inner.write();
            apply_replacement(&mut inner, data, order, &self.config);
        }

        crate::metrics::set_cached_items(accepted);
        if rejected > 0 {
            crate::metrics::record_rejected_values(rejected);
        }
        crate::metrics::record_operation("memory", "set", "success");
        crate::metrics::record_latency("memory", "set", start.elapsed());
        debug!(accepted, rejected, "Dataset replaced");
        Ok(())
    }

    /// Look up a value by primary key.
    #[must_use]
    pub fn get(&self, primary_key: &str) -> Option<V> {
        let found = self.inner.read().data.get(primary_key).cloned();
        let status = if found.is_some() { "hit" } else { "miss" };
        crate::metrics::record_operation("memory", "get", status);
        found
    }

    /// Look up a value through a named index.
    ///
    /// The lookup key is normalized (trimmed, lowercased) first, so
    /// `get_by_index("email", "  A@B.com ")` and
    /// `get_by_index("email", "a@b.com")` are equivalent. An unknown index
    /// name is a miss, not an error.
    #[must_use]
    pub fn get_by_index(&self, index_name: &str, key: &str) -> Option<V> {
        let needle = normalize_key(key);
        let inner = self.inner.read();
        let found = inner
            .indexes
            .get(index_name)
            .and_then(|index| index.get(&needle))
            .and_then(|pk| inner.data.get(pk))
            .cloned();
        let status = if found.is_some() { "hit" } else { "miss" };
        crate::metrics::record_operation("memory", "get_by_index", status);
        found
    }

    /// All values, in first-seen insertion order.
    #[must_use]
    pub fn get_all(&self) -> Vec<V> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|pk| inner.data.get(pk).cloned())
            .collect()
    }

    /// Number of cached values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().data.len()
    }

    /// Whether the cache holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().data.is_empty()
    }

    /// Empty the dataset. Registered indexes stay registered (emptied, not
    /// removed) and the digest resets to the empty-dataset digest.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.data.clear();
        inner.order.clear();
        for index in inner.indexes.values_mut() {
            index.clear();
        }
        inner.hash = digest::empty_dataset();
        crate::metrics::set_cached_items(0);
        crate::metrics::record_operation("memory", "clear", "success");
    }

    /// Visit values in insertion order until the callback returns `false`.
    ///
    /// The callback runs while the shared lock is held: it must not call any
    /// mutating cache operation (`set`, `clear`, `add_index`, `remove_index`)
    /// and should avoid blocking.
    pub fn iterate(&self, mut visit: impl FnMut(&V) -> bool) {
        let inner = self.inner.read();
        for pk in &inner.order {
            if let Some(value) = inner.data.get(pk) {
                if !visit(value) {
                    break;
                }
            }
        }
    }

    /// The cached dataset digest. Pure accessor — never recomputes.
    #[must_use]
    pub fn hash(&self) -> String {
        self.inner.read().hash.clone()
    }
}

/// Normalize an index key: trim surrounding whitespace, then lowercase.
fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Build one index over the mapping, walking primary keys in insertion order
/// so colliding index keys resolve the same way on every rebuild.
fn build_index<V>(
    data: &HashMap<String, V>,
    order: &[String],
    key_fn: &KeyFn<V>,
) -> HashMap<String, String> {
    let mut index = HashMap::new();
    for pk in order {
        if let Some(value) = data.get(pk) {
            let key = key_fn(value);
            if !key.is_empty() {
                index.insert(normalize_key(&key), pk.clone());
            }
        }
    }
    index
}

/// Swap in a new mapping, rebuild every index from it, recompute the digest.
/// Caller holds the write lock.
fn apply_replacement<V: Clone + Serialize>(
    inner: &mut Snapshot<V>,
    data: HashMap<String, V>,
    order: Vec<String>,
    config: &CacheConfig<V>,
) {
    inner.data = data;
    inner.order = order;

    let mut rebuilt = HashMap::with_capacity(inner.index_fns.len());
    for (name, key_fn) in &inner.index_fns {
        rebuilt.insert(name.clone(), build_index(&inner.data, &inner.order, key_fn));
    }
    inner.indexes = rebuilt;
    inner.hash = compute_digest(&inner.data, &inner.order, config);
}

/// Digest of the mapping: empty-dataset digest when empty, otherwise the
/// ordered values run through the sort hook (if any) and the hash hook
/// (default: JSON digest).
fn compute_digest<V: Clone + Serialize>(
    data: &HashMap<String, V>,
    order: &[String],
    config: &CacheConfig<V>,
) -> String {
    if data.is_empty() {
        return digest::empty_dataset();
    }

    let mut values: Vec<V> = order.iter().filter_map(|pk| data.get(pk).cloned()).collect();
    if let Some(ref sort) = config.sort {
        values = sort(&values);
    }
    match config.hash {
        Some(ref hash) => hash(&values),
        None => digest::json_digest(&values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::string_sorter;
    use std::sync::Arc;

    #[derive(Clone, Serialize, Debug, PartialEq)]
    struct User {
        id: String,
        email: String,
        name: String,
    }

    fn user(id: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            email: email.to_string(),
            name: format!("user-{}", id),
        }
    }

    fn keyed_cache() -> MemoryCache<User> {
        MemoryCache::new(CacheConfig::new().with_primary_key(|u: &User| u.id.clone()))
    }

    #[test]
    fn test_new_cache_is_empty() {
        let cache = keyed_cache();
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.hash(), digest::empty_dataset());
    }

    #[test]
    fn test_set_and_get() {
        let cache = keyed_cache();
        cache.set(&[user("1", "a@example.com")]).unwrap();

        let found = cache.get("1").unwrap();
        assert_eq!(found.email, "a@example.com");
        assert!(cache.get("2").is_none());
    }

    #[test]
    fn test_set_replaces_entire_dataset() {
        let cache = keyed_cache();
        cache.set(&[user("1", "a@x.com"), user("2", "b@x.com")]).unwrap();
        cache.set(&[user("3", "c@x.com")]).unwrap();

        assert_eq!(cache.len(), 1);
        assert!(cache.get("1").is_none());
        assert!(cache.get("2").is_none());
        assert!(cache.get("3").is_some());
    }

    #[test]
    fn test_set_without_key_function_fails() {
        let cache: MemoryCache<User> = MemoryCache::new(CacheConfig::new());
        let err = cache.set(&[user("1", "a@x.com")]).unwrap_err();
        assert!(matches!(err, CacheError::MissingKeyExtractor));
    }

    #[test]
    fn test_empty_set_is_accepted_without_key_function() {
        let cache: MemoryCache<User> = MemoryCache::new(CacheConfig::new());
        cache.set(&[]).unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.hash(), digest::empty_dataset());
    }

    #[test]
    fn test_empty_set_resets_populated_cache() {
        let cache = keyed_cache();
        cache.set(&[user("1", "a@x.com")]).unwrap();
        cache.set(&[]).unwrap();

        assert!(cache.is_empty());
        assert!(cache.get("1").is_none());
        assert_eq!(cache.hash(), digest::empty_dataset());
    }

    #[test]
    fn test_duplicate_keys_last_write_wins_first_position_kept() {
        let cache = keyed_cache();
        cache
            .set(&[user("1", "first@x.com"), user("2", "two@x.com"), user("1", "second@x.com")])
            .unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("1").unwrap().email, "second@x.com");

        // "1" keeps its first-seen slot ahead of "2"
        let ids: Vec<String> = cache.get_all().into_iter().map(|u| u.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_get_all_preserves_insertion_order() {
        let cache = keyed_cache();
        cache.set(&[user("3", "c@x.com"), user("1", "a@x.com"), user("2", "b@x.com")]).unwrap();

        let ids: Vec<String> = cache.get_all().into_iter().map(|u| u.id).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
    }

    #[test]
    fn test_validator_skips_rejected_values() {
        let config = CacheConfig::new()
            .with_primary_key(|u: &User| u.id.clone())
            .with_validate(|u: &User| {
                if u.email.contains('@') {
                    Ok(())
                } else {
                    Err(format!("invalid email: {}", u.email))
                }
            });
        let cache = MemoryCache::new(config);

        cache.set(&[user("1", "good@x.com"), user("2", "not-an-email")]).unwrap();

        assert_eq!(cache.len(), 1);
        assert!(cache.get("1").is_some());
        assert!(cache.get("2").is_none());
    }

    #[test]
    fn test_all_values_rejected_yields_empty_cache() {
        let config = CacheConfig::new()
            .with_primary_key(|u: &User| u.id.clone())
            .with_validate(|_: &User| Err("nope".to_string()));
        let cache = MemoryCache::new(config);

        cache.set(&[user("1", "a@x.com"), user("2", "b@x.com")]).unwrap();

        assert!(cache.is_empty());
        assert_eq!(cache.hash(), digest::empty_dataset());
    }

    #[test]
    fn test_normalize_runs_before_validation_and_key_extraction() {
        let config = CacheConfig::new()
            // Key is derived from the normalized email
            .with_primary_key(|u: &User| u.email.clone())
            .with_normalize(|mut u: User| {
                u.email = u.email.trim().to_lowercase();
                u
            })
            .with_validate(|u: &User| {
                // Sees the normalized form: no surrounding whitespace allowed through
                if u.email.trim() == u.email {
                    Ok(())
                } else {
                    Err("not normalized".to_string())
                }
            });
        let cache = MemoryCache::new(config);

        cache.set(&[user("1", "  A@X.COM  ")]).unwrap();

        assert_eq!(cache.len(), 1);
        let found = cache.get("a@x.com").unwrap();
        assert_eq!(found.email, "a@x.com");
    }

    #[test]
    fn test_empty_primary_key_skips_value() {
        let cache = keyed_cache();
        let anonymous = user("", "anon@x.com");

        cache.set(&[user("1", "a@x.com"), anonymous]).unwrap();

        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_add_index_and_lookup() {
        let cache = keyed_cache();
        cache.add_index("email", |u: &User| u.email.clone());
        cache.set(&[user("1", "alice@x.com"), user("2", "bob@x.com")]).unwrap();

        assert_eq!(cache.get_by_index("email", "alice@x.com").unwrap().id, "1");
        assert_eq!(cache.get_by_index("email", "bob@x.com").unwrap().id, "2");
        assert!(cache.get_by_index("email", "carol@x.com").is_none());
    }

    #[test]
    fn test_index_lookup_is_case_insensitive_and_trimmed() {
        let cache = keyed_cache();
        cache.add_index("email", |u: &User| u.email.clone());
        cache.set(&[user("1", "Alice@X.com")]).unwrap();

        assert!(cache.get_by_index("email", "alice@x.com").is_some());
        assert!(cache.get_by_index("email", "  ALICE@X.COM  ").is_some());
    }

    #[test]
    fn test_add_index_after_load_matches_index_before_load() {
        let values = [user("1", "a@x.com"), user("2", "b@x.com")];

        let before = keyed_cache();
        before.add_index("email", |u: &User| u.email.clone());
        before.set(&values).unwrap();

        let after = keyed_cache();
        after.set(&values).unwrap();
        after.add_index("email", |u: &User| u.email.clone());

        for email in ["a@x.com", "b@x.com"] {
            assert_eq!(
                before.get_by_index("email", email).unwrap().id,
                after.get_by_index("email", email).unwrap().id
            );
        }
    }

    #[test]
    fn test_add_index_replaces_existing_index() {
        let cache = keyed_cache();
        cache.set(&[user("1", "a@x.com")]).unwrap();

        cache.add_index("lookup", |u: &User| u.email.clone());
        assert!(cache.get_by_index("lookup", "a@x.com").is_some());

        // Re-register under the same name with a different extractor
        cache.add_index("lookup", |u: &User| u.name.clone());
        assert!(cache.get_by_index("lookup", "a@x.com").is_none());
        assert!(cache.get_by_index("lookup", "user-1").is_some());
        assert_eq!(cache.index_count(), 1);
    }

    #[test]
    fn test_unknown_index_is_a_miss_not_an_error() {
        let cache = keyed_cache();
        cache.set(&[user("1", "a@x.com")]).unwrap();
        assert!(cache.get_by_index("no-such-index", "a@x.com").is_none());
    }

    #[test]
    fn test_empty_index_key_is_not_indexed() {
        let cache = keyed_cache();
        cache.add_index("name", |u: &User| {
            if u.id == "1" {
                String::new()
            } else {
                u.name.clone()
            }
        });
        cache.set(&[user("1", "a@x.com"), user("2", "b@x.com")]).unwrap();

        assert!(cache.get_by_index("name", "user-1").is_none());
        assert!(cache.get_by_index("name", "user-2").is_some());
        // The unindexed value is still reachable by primary key
        assert!(cache.get("1").is_some());
    }

    #[test]
    fn test_index_entries_of_overwritten_duplicates_are_dropped() {
        let cache = keyed_cache();
        cache.add_index("email", |u: &User| u.email.clone());

        // Same primary key twice with different emails: only the winning
        // value's email may resolve.
        cache.set(&[user("1", "old@x.com"), user("1", "new@x.com")]).unwrap();

        assert!(cache.get_by_index("email", "old@x.com").is_none());
        assert_eq!(cache.get_by_index("email", "new@x.com").unwrap().email, "new@x.com");
    }

    #[test]
    fn test_remove_index() {
        let cache = keyed_cache();
        cache.add_index("email", |u: &User| u.email.clone());
        cache.set(&[user("1", "a@x.com")]).unwrap();

        cache.remove_index("email");

        assert!(!cache.has_index("email"));
        assert_eq!(cache.index_count(), 0);
        assert!(cache.get_by_index("email", "a@x.com").is_none());
    }

    #[test]
    fn test_index_names_sorted() {
        let cache = keyed_cache();
        cache.add_index("zeta", |u: &User| u.name.clone());
        cache.add_index("alpha", |u: &User| u.email.clone());

        assert_eq!(cache.index_names(), vec!["alpha", "zeta"]);
        assert!(cache.has_index("zeta"));
        assert_eq!(cache.index_count(), 2);
    }

    #[test]
    fn test_clear_keeps_indexes_registered_but_empty() {
        let cache = keyed_cache();
        cache.add_index("email", |u: &User| u.email.clone());
        cache.set(&[user("1", "a@x.com")]).unwrap();

        cache.clear();

        assert_eq!(cache.len(), 0);
        assert!(cache.has_index("email"));
        assert!(cache.get_by_index("email", "a@x.com").is_none());
        assert_eq!(cache.hash(), digest::empty_dataset());
    }

    #[test]
    fn test_indexes_survive_clear_and_reload() {
        let cache = keyed_cache();
        cache.add_index("email", |u: &User| u.email.clone());
        cache.set(&[user("1", "a@x.com")]).unwrap();

        cache.clear();
        cache.set(&[user("2", "b@x.com")]).unwrap();

        assert_eq!(cache.get_by_index("email", "b@x.com").unwrap().id, "2");
    }

    #[test]
    fn test_hash_is_deterministic_for_identical_input() {
        let a = keyed_cache();
        let b = keyed_cache();
        let values = [user("1", "a@x.com"), user("2", "b@x.com")];

        a.set(&values).unwrap();
        b.set(&values).unwrap();

        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_hash_changes_when_dataset_changes() {
        let cache = keyed_cache();
        cache.set(&[user("1", "a@x.com")]).unwrap();
        let first = cache.hash();

        cache.set(&[user("1", "changed@x.com")]).unwrap();
        assert_ne!(cache.hash(), first);
    }

    #[test]
    fn test_default_hash_is_order_sensitive() {
        let a = keyed_cache();
        let b = keyed_cache();

        a.set(&[user("1", "a@x.com"), user("2", "b@x.com")]).unwrap();
        b.set(&[user("2", "b@x.com"), user("1", "a@x.com")]).unwrap();

        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_sorted_hash_is_order_independent() {
        let sorted_config = || {
            CacheConfig::new()
                .with_primary_key(|u: &User| u.id.clone())
                .with_sort(string_sorter(|u: &User| u.id.clone()))
        };
        let a = MemoryCache::new(sorted_config());
        let b = MemoryCache::new(sorted_config());

        a.set(&[user("1", "a@x.com"), user("2", "b@x.com")]).unwrap();
        b.set(&[user("2", "b@x.com"), user("1", "a@x.com")]).unwrap();

        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_sort_function_does_not_affect_enumeration_order() {
        let config = CacheConfig::new()
            .with_primary_key(|u: &User| u.id.clone())
            .with_sort(string_sorter(|u: &User| u.id.clone()));
        let cache = MemoryCache::new(config);

        cache.set(&[user("3", "c@x.com"), user("1", "a@x.com")]).unwrap();

        let ids: Vec<String> = cache.get_all().into_iter().map(|u| u.id).collect();
        assert_eq!(ids, vec!["3", "1"]);
    }

    #[test]
    fn test_custom_hash_function_is_used() {
        let config = CacheConfig::new()
            .with_primary_key(|u: &User| u.id.clone())
            .with_hash(|values: &[User]| format!("custom-{}", values.len()));
        let cache = MemoryCache::new(config);

        cache.set(&[user("1", "a@x.com"), user("2", "b@x.com")]).unwrap();

        assert_eq!(cache.hash(), "custom-2");
    }

    #[test]
    fn test_hash_accessor_does_not_recompute() {
        let cache = keyed_cache();
        cache.set(&[user("1", "a@x.com")]).unwrap();

        let first = cache.hash();
        assert_eq!(cache.hash(), first);
        assert_eq!(cache.hash(), first);
    }

    #[test]
    fn test_iterate_visits_in_order() {
        let cache = keyed_cache();
        cache.set(&[user("3", "c@x.com"), user("1", "a@x.com"), user("2", "b@x.com")]).unwrap();

        let mut seen = Vec::new();
        cache.iterate(|u| {
            seen.push(u.id.clone());
            true
        });

        assert_eq!(seen, vec!["3", "1", "2"]);
    }

    #[test]
    fn test_iterate_stops_early() {
        let cache = keyed_cache();
        cache.set(&[user("1", "a@x.com"), user("2", "b@x.com"), user("3", "c@x.com")]).unwrap();

        let mut visited = 0;
        cache.iterate(|_| {
            visited += 1;
            visited < 2
        });

        assert_eq!(visited, 2);
    }

    #[test]
    fn test_get_returns_a_clone() {
        let cache = keyed_cache();
        cache.set(&[user("1", "a@x.com")]).unwrap();

        let mut copy = cache.get("1").unwrap();
        copy.email = "mutated@x.com".to_string();

        assert_eq!(cache.get("1").unwrap().email, "a@x.com");
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let cache = Arc::new(keyed_cache());
        cache.add_index("email", |u: &User| u.email.clone());

        let mut handles = Vec::new();
        for round in 0..4 {
            let writer = Arc::clone(&cache);
            handles.push(std::thread::spawn(move || {
                for i in 0..25 {
                    let id = format!("{}", round * 25 + i);
                    let email = format!("{}@x.com", id);
                    writer.set(&[user(&id, &email)]).unwrap();
                }
            }));
        }
        for _ in 0..4 {
            let reader = Arc::clone(&cache);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    let _ = reader.get_all();
                    let _ = reader.hash();
                    let _ = reader.get_by_index("email", "0@x.com");
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        // Every set is a full replacement, so exactly one value remains.
        assert_eq!(cache.len(), 1);
        assert_ne!(cache.hash(), digest::empty_dataset());
    }
}

//! In-process implementation of the remote backend.
//!
//! Behaves like a single-node Redis for the five primitives the adapter
//! uses, with one difference: time is a virtual clock advanced manually via
//! [`InMemoryBackend::advance`]. Expiry tests become deterministic — no
//! sleeping, no Docker.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use super::traits::{RemoteBackend, RemoteCommand};
use crate::error::CacheError;

#[derive(Clone)]
struct Entry {
    value: Vec<u8>,
    /// Absolute deadline on the virtual clock; `None` = no expiry
    expires_at: Option<Duration>,
}

struct State {
    entries: HashMap<String, Entry>,
    /// Virtual clock; starts at zero, moves only via `advance`
    now: Duration,
}

/// Deterministic [`RemoteBackend`] for tests and local development.
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                entries: HashMap::new(),
                now: Duration::ZERO,
            }),
        }
    }

    /// Move the virtual clock forward, dropping entries whose deadline passed.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock();
        state.now += by;
        let now = state.now;
        state
            .entries
            .retain(|_, entry| entry.expires_at.map_or(true, |at| at > now));
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        let now = state.now;
        state
            .entries
            .values()
            .filter(|entry| entry.expires_at.map_or(true, |at| at > now))
            .count()
    }

    /// Whether no live keys exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn live_entry<'a>(state: &'a State, key: &str) -> Option<&'a Entry> {
    state
        .entries
        .get(key)
        .filter(|entry| entry.expires_at.map_or(true, |at| at > state.now))
}

#[async_trait]
impl RemoteBackend for InMemoryBackend {
    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let state = self.state.lock();
        Ok(live_entry(&state, key).map(|entry| entry.value.clone()))
    }

    async fn key_exists(&self, key: &str) -> Result<bool, CacheError> {
        let state = self.state.lock();
        Ok(live_entry(&state, key).is_some())
    }

    async fn remaining_ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let state = self.state.lock();
        Ok(live_entry(&state, key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_sub(state.now)))
    }

    async fn apply(&self, commands: Vec<RemoteCommand>) -> Result<(), CacheError> {
        let mut state = self.state.lock();
        let now = state.now;

        // Stage on a copy; commit only if every command succeeds.
        let mut staged = state.entries.clone();
        for command in commands {
            match command {
                RemoteCommand::SetEx { key, value, ttl } => {
                    staged.insert(
                        key,
                        Entry {
                            value,
                            expires_at: Some(now + ttl),
                        },
                    );
                }
                RemoteCommand::Incr { key } => {
                    let (current, expires_at) = match staged.get(&key) {
                        Some(entry) if entry.expires_at.map_or(true, |at| at > now) => {
                            let text = std::str::from_utf8(&entry.value).map_err(|_| {
                                CacheError::Backend(
                                    "value is not an integer or out of range".to_string(),
                                )
                            })?;
                            let parsed = text.trim().parse::<i64>().map_err(|_| {
                                CacheError::Backend(
                                    "value is not an integer or out of range".to_string(),
                                )
                            })?;
                            (parsed, entry.expires_at)
                        }
                        _ => (0, None),
                    };
                    staged.insert(
                        key,
                        Entry {
                            value: (current + 1).to_string().into_bytes(),
                            expires_at,
                        },
                    );
                }
                RemoteCommand::Expire { key, ttl } => {
                    let live = staged
                        .get(&key)
                        .map_or(false, |entry| entry.expires_at.map_or(true, |at| at > now));
                    if live {
                        if let Some(entry) = staged.get_mut(&key) {
                            entry.expires_at = Some(now + ttl);
                        }
                    }
                }
                RemoteCommand::Del { key } => {
                    staged.remove(&key);
                }
            }
        }

        state.entries = staged;
        Ok(())
    }
}

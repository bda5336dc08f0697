//! Live Redis implementation of the remote backend.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

use super::traits::{RemoteBackend, RemoteCommand};
use crate::error::CacheError;

/// [`RemoteBackend`] over a Redis connection.
///
/// Batches submitted through [`apply`](RemoteBackend::apply) run as a
/// `MULTI`/`EXEC` pipeline, so the data blob and its version counter change
/// together or not at all. Connection failures surface immediately — no
/// built-in retries; callers retry at their discretion.
pub struct RedisBackend {
    connection: ConnectionManager,
}

impl RedisBackend {
    /// Connect to a Redis server (e.g. `redis://localhost:6379`).
    ///
    /// # Errors
    ///
    /// [`CacheError::Backend`] when the URL is malformed or the server is
    /// unreachable.
    pub async fn connect(connection_string: &str) -> Result<Self, CacheError> {
        let client =
            Client::open(connection_string).map_err(|e| CacheError::Backend(e.to_string()))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(Self { connection })
    }

    /// Wrap an existing connection manager (for sharing one connection pool
    /// across several caches).
    #[must_use]
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    /// Get a clone of the underlying connection manager.
    #[must_use]
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

#[async_trait]
impl RemoteBackend for RedisBackend {
    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection.clone();
        let data: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(data)
    }

    async fn key_exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection.clone();
        let exists: bool = conn
            .exists(key)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(exists)
    }

    async fn remaining_ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let mut conn = self.connection.clone();
        let millis: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        // PTTL: -2 = key missing, -1 = key has no expiry
        if millis < 0 {
            Ok(None)
        } else {
            Ok(Some(Duration::from_millis(millis as u64)))
        }
    }

    async fn apply(&self, commands: Vec<RemoteCommand>) -> Result<(), CacheError> {
        if commands.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();

        for command in &commands {
            match command {
                RemoteCommand::SetEx { key, value, ttl } => {
                    pipe.cmd("SET")
                        .arg(key)
                        .arg(value.as_slice())
                        .arg("PX")
                        .arg(ttl.as_millis() as u64);
                }
                RemoteCommand::Incr { key } => {
                    pipe.cmd("INCR").arg(key);
                }
                RemoteCommand::Expire { key, ttl } => {
                    pipe.cmd("PEXPIRE").arg(key).arg(ttl.as_millis() as u64);
                }
                RemoteCommand::Del { key } => {
                    pipe.cmd("DEL").arg(key);
                }
            }
        }

        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(())
    }
}

//! Pooled Redis client
//!
//! Exposes only the commands the collection reader and the export writer
//! need: a raw hash read and an atomic multi-key SET.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use bb8::{Pool, PooledConnection};
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;

type Conn<'a> = PooledConnection<'a, RedisConnectionManager>;

/// Pool settings
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_idle: Option<u32>,
    /// How long to wait for a pooled connection
    pub connection_timeout: Duration,
    pub idle_timeout: Option<Duration>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 16,
            min_idle: None,
            connection_timeout: Duration::from_secs(5),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }
}

impl RedisConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Async Redis client backed by a bb8 pool
#[derive(Clone)]
pub struct RedisClient {
    pool: Pool<RedisConnectionManager>,
    url: String,
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient")
            .field("url", &self.url)
            .field("connections", &self.pool.state().connections)
            .finish()
    }
}

impl RedisClient {
    /// Build the pool.
    ///
    /// No connection is opened unless `min_idle` is set; call
    /// [`RedisClient::ping`] to check reachability.
    pub async fn with_config(config: RedisConfig) -> Result<Self> {
        let manager = RedisConnectionManager::new(config.url.as_str())
            .with_context(|| format!("Invalid Redis URL: {}", config.url))?;

        let pool = Pool::builder()
            .max_size(config.max_connections)
            .min_idle(config.min_idle)
            .connection_timeout(config.connection_timeout)
            .idle_timeout(config.idle_timeout)
            .build(manager)
            .await
            .context("Failed to build Redis connection pool")?;

        Ok(Self {
            pool,
            url: config.url,
        })
    }

    async fn conn(&self) -> Result<Conn<'_>> {
        self.pool
            .get()
            .await
            .with_context(|| format!("No Redis connection available for {}", self.url))
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .context("Redis PING failed")?;
        Ok(())
    }

    /// Every field of a hash as raw bytes; a missing key yields an empty map
    ///
    /// Values are not decoded here so that one bad entry cannot fail the
    /// whole reply.
    pub async fn hgetall_raw(&self, key: &str) -> Result<HashMap<Vec<u8>, Vec<u8>>> {
        let mut conn = self.conn().await?;
        conn.hgetall(key)
            .await
            .with_context(|| format!("HGETALL {} failed", key))
    }

    /// SET all pairs inside one MULTI/EXEC block
    pub async fn set_many_atomic(&self, entries: &[(String, String)]) -> Result<()> {
        let mut conn = self.conn().await?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            pipe.set(key, value).ignore();
        }
        let _: () = pipe
            .query_async(&mut *conn)
            .await
            .with_context(|| format!("Atomic SET of {} keys failed", entries.len()))?;
        Ok(())
    }
}

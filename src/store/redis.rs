//! Redis-backed shared store adapter.
//!
//! Owns the connection pool and the live/dead health flag the rest of the
//! core consults. The adapter never aborts the host process: a store that
//! cannot be reached at startup (or that drops mid-flight) leaves the
//! system serving with enforcement and caching disabled, and a background
//! watchdog re-establishes health when the store comes back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use deadpool_redis::{
    Config, Connection, Pool, PoolConfig, Runtime,
    redis::{AsyncCommands, Script, cmd},
};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::store::Store;

/// Atomic increment-or-create: the expiry is set only on the increment
/// that creates the key, so the window length is fixed from first use.
const INCR_WITH_EXPIRE: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// Redis store configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Connection pool size
    pub pool_size: usize,
    /// Key prefix applied to every key, for sharing a store between apps
    pub key_prefix: String,
    /// Connection timeout
    pub connection_timeout: Duration,
    /// How often the watchdog re-pings a store that is marked down
    pub health_check_interval: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            key_prefix: String::new(),
            connection_timeout: Duration::from_secs(5),
            health_check_interval: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Create a new Redis configuration.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Build the URL from `REDIS_HOST` / `REDIS_PORT`, defaulting to
    /// localhost:6379.
    pub fn from_env() -> Self {
        let host = std::env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port = std::env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
        Self::new(format!("redis://{host}:{port}"))
    }

    /// Set the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the pool size.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the watchdog ping interval.
    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }
}

/// Redis-backed shared store.
///
/// # Example
///
/// ```ignore
/// use quotagate::store::{RedisConfig, RedisStore};
///
/// let config = RedisConfig::from_env().with_prefix("gw:");
/// let store = RedisStore::connect(config).await;
/// // The store may be unavailable; the enforcer and cache degrade, the
/// // process keeps serving.
/// ```
pub struct RedisStore {
    pool: Option<Pool>,
    key_prefix: String,
    available: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    incr_script: Script,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("key_prefix", &self.key_prefix)
            .field("available", &self.available.load(Ordering::Relaxed))
            .finish()
    }
}

impl RedisStore {
    /// Establish the shared store connection.
    ///
    /// Never fails the host process. If the pool cannot be created at all
    /// (malformed URL), the adapter comes up permanently unavailable. If
    /// the pool exists but the store is unreachable, the adapter comes up
    /// unavailable and the watchdog flips it back once a ping succeeds.
    pub async fn connect(config: RedisConfig) -> Self {
        let available = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(Notify::new());
        let incr_script = Script::new(INCR_WITH_EXPIRE);

        let mut cfg = Config::from_url(&config.url);
        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts.create = Some(config.connection_timeout);
        pool_config.timeouts.wait = Some(config.connection_timeout);
        cfg.pool = Some(pool_config);

        let pool = match cfg.create_pool(Some(Runtime::Tokio1)) {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, url = %config.url, "store pool creation failed, serving degraded");
                return Self {
                    pool: None,
                    key_prefix: config.key_prefix,
                    available,
                    shutdown,
                    incr_script,
                };
            }
        };

        match ping(&pool).await {
            Ok(()) => {
                available.store(true, Ordering::Relaxed);
                info!("store connected");
            }
            Err(e) => {
                warn!(error = %e, "store unreachable at startup, serving degraded");
            }
        }

        let store = Self {
            pool: Some(pool.clone()),
            key_prefix: config.key_prefix,
            available,
            shutdown,
            incr_script,
        };
        store.spawn_watchdog(pool, config.health_check_interval);
        store
    }

    /// Tear down the connection. Idempotent; the store reports unavailable
    /// afterwards and the watchdog stops.
    pub fn disconnect(&self) {
        self.shutdown.notify_waiters();
        self.available.store(false, Ordering::Relaxed);
        if let Some(pool) = &self.pool {
            pool.close();
        }
        info!("store disconnected");
    }

    /// Re-ping a down store until it answers or the adapter shuts down.
    /// Health transitions come from here and from connection failures at
    /// call sites, never from per-call probing.
    fn spawn_watchdog(&self, pool: Pool, interval: Duration) {
        let available = self.available.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        if available.load(Ordering::Relaxed) {
                            continue;
                        }
                        match ping(&pool).await {
                            Ok(()) => {
                                available.store(true, Ordering::Relaxed);
                                info!("store connection restored");
                            }
                            Err(e) => {
                                debug!(error = %e, "store still unreachable");
                            }
                        }
                    }
                    _ = shutdown.notified() => {
                        break;
                    }
                }
            }
        });
    }

    /// Get the full key with prefix.
    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Get a connection from the pool. Failure to obtain one is a
    /// connection-state transition: the store is marked down.
    async fn conn(&self) -> Result<Connection, StoreError> {
        let Some(pool) = &self.pool else {
            return Err(StoreError::Unavailable);
        };
        pool.get().await.map_err(|e| {
            self.available.store(false, Ordering::Relaxed);
            warn!(error = %e, "store connection lost");
            StoreError::Connection(e.to_string())
        })
    }
}

impl Store for RedisStore {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn().await?;
        let full_key = self.full_key(key);

        let result: Option<String> = conn
            .get(&full_key)
            .await
            .map_err(|e| StoreError::Operation(e.to_string()))?;

        Ok(result)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let full_key = self.full_key(key);

        conn.set_ex::<_, _, ()>(&full_key, value, ttl.as_secs())
            .await
            .map_err(|e| StoreError::Operation(e.to_string()))?;

        Ok(())
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let mut conn = self.conn().await?;
        let full_key = self.full_key(key);

        let count: u64 = self
            .incr_script
            .key(&full_key)
            .arg(ttl.as_secs())
            .invoke_async(&mut *conn)
            .await
            .map_err(|e| StoreError::Operation(e.to_string()))?;

        Ok(count)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let full_key = self.full_key(key);

        conn.del::<_, ()>(&full_key)
            .await
            .map_err(|e| StoreError::Operation(e.to_string()))?;

        Ok(())
    }
}

/// One round-trip health probe.
async fn ping(pool: &Pool) -> Result<(), StoreError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;
    let _: () = cmd("PING")
        .query_async(&mut *conn)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;
    Ok(())
}

//! Deterministic cache keys and best-effort response caching.
//!
//! The cache avoids redundant calls to a slow or rate-limited upstream data
//! source. Entries are whole-value JSON with a TTL; presence implies
//! freshness, absence always triggers a re-fetch. Caching is never required
//! for correctness: an unreachable store or a failed write degrades to
//! fetching upstream every time.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::decision::CacheStatus;
use crate::store::Store;

/// Default time-to-live for cached responses.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Derive a deterministic cache key from a namespace and parameter set.
///
/// Parameters are sorted by name and joined as `name=value` pairs with `&`,
/// so differently-ordered equivalent query parameters always hit the same
/// cache slot. An empty parameter set produces the bare namespace key.
///
/// # Example
///
/// ```ignore
/// assert_eq!(cache_key("news", [("country", "us")]), "api:news:country=us");
/// assert_eq!(cache_key::<&str, &str, _>("news", []), "api:news");
/// ```
pub fn cache_key<K, V, I>(namespace: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<(String, String)> = params
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect();
    pairs.sort();

    if pairs.is_empty() {
        return format!("api:{namespace}");
    }

    let query = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("api:{namespace}:{query}")
}

/// Best-effort response cache over the shared store.
///
/// Get and set never error toward the caller: missing, expired,
/// unavailable, and undecodable all collapse to a miss, and failed writes
/// are logged and swallowed.
pub struct ResponseCache<S> {
    store: S,
    default_ttl: Duration,
}

impl<S: Store> ResponseCache<S> {
    /// Create a cache with the default 300-second TTL.
    pub fn new(store: S) -> Self {
        Self {
            store,
            default_ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Set the TTL used by [`fetch_with`](Self::fetch_with).
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// The TTL applied to entries stored on cache miss.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a cached value.
    ///
    /// Returns `None` on miss, expiry, store unavailability, store error,
    /// or an undecodable entry — all are misses, never errors.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.store.is_available() {
            debug!(key, "cache store unavailable, treating as miss");
            return None;
        }

        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!(key, "cache hit");
                    Some(value)
                }
                Err(e) => {
                    warn!(key, error = %e, "cache entry undecodable, treating as miss");
                    None
                }
            },
            Ok(None) => {
                debug!(key, "cache miss");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store a value with the given TTL, replacing any existing entry
    /// whole. Best-effort: returns whether the write landed.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        if !self.store.is_available() {
            debug!(key, "cache store unavailable, skipping write");
            return false;
        }

        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "cache value unserializable");
                return false;
            }
        };

        match self.store.set_ex(key, &raw, ttl).await {
            Ok(()) => {
                debug!(key, ttl_secs = ttl.as_secs(), "response cached");
                true
            }
            Err(e) => {
                warn!(key, error = %e, "cache write failed");
                false
            }
        }
    }

    /// Serve from cache, or fetch upstream on miss and populate.
    ///
    /// On fetch success the result is stored (best-effort, default TTL)
    /// before being returned with [`CacheStatus::Miss`]. On fetch failure
    /// the caller's error propagates unmodified and nothing is cached.
    ///
    /// Concurrent misses for the same key are not deduplicated: both fetch
    /// upstream and both write, last write wins.
    pub async fn fetch_with<T, E, F, Fut>(
        &self,
        key: &str,
        fetch: F,
    ) -> Result<(T, CacheStatus), E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok((value, CacheStatus::Hit));
        }

        let value = fetch().await?;
        self.set(key, &value, self.default_ttl).await;
        Ok((value, CacheStatus::Miss))
    }
}

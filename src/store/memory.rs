//! In-memory store backend.
//!
//! Uses `DashMap` for thread-safe concurrent access with lazy TTL expiry on
//! read. Counters and cache values share one namespace, exactly like the
//! remote store. Intended for tests and single-process deployments; the
//! [`set_available`](MemoryStore::set_available) hook lets tests force the
//! degraded path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;

use crate::error::StoreError;
use crate::store::Store;

/// Internal entry with expiration tracking.
#[derive(Debug, Clone)]
struct InternalEntry {
    value: String,
    expires_at: u64,
}

/// In-memory store with per-key TTL.
///
/// # Example
///
/// ```ignore
/// use quotagate::store::{MemoryStore, Store};
///
/// let store = MemoryStore::new();
/// let count = store.incr_with_ttl("rl:free:/news:u1", Duration::from_secs(60)).await?;
/// assert_eq!(count, 1);
/// ```
pub struct MemoryStore {
    data: DashMap<String, InternalEntry>,
    available: AtomicBool,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.data.len())
            .field("available", &self.available.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new, empty, available store.
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Flip the health flag. Tests use this to simulate an outage of the
    /// remote store.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    /// Get the number of entries currently stored, expired or not.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.data.clear();
    }

    /// Drop entries whose TTL has elapsed.
    pub fn purge_expired(&self) {
        let now = current_timestamp_ms();
        self.data.retain(|_, entry| entry.expires_at > now);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }
}

impl Store for MemoryStore {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_available()?;
        let now = current_timestamp_ms();

        if let Some(entry) = self.data.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
            drop(entry);
            self.data.remove(key);
        }
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.check_available()?;
        let entry = InternalEntry {
            value: value.to_string(),
            expires_at: current_timestamp_ms() + ttl.as_millis() as u64,
        };
        self.data.insert(key.to_string(), entry);
        Ok(())
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        self.check_available()?;
        let now = current_timestamp_ms();

        // The entry guard holds the shard lock, making the whole
        // read-modify-write step atomic with respect to other callers.
        let mut entry = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| InternalEntry {
                value: "0".to_string(),
                expires_at: now + ttl.as_millis() as u64,
            });

        if entry.expires_at <= now {
            entry.value = "0".to_string();
            entry.expires_at = now + ttl.as_millis() as u64;
        }

        let count = entry.value.parse::<u64>().unwrap_or(0) + 1;
        entry.value = count.to_string();
        Ok(count)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check_available()?;
        self.data.remove(key);
        Ok(())
    }
}

/// Get the current timestamp in milliseconds since Unix epoch.
fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        store
            .set_ex("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_incr_starts_at_one() {
        let store = MemoryStore::new();
        assert_eq!(
            store.incr_with_ttl("c", Duration::from_secs(60)).await.unwrap(),
            1
        );
        assert_eq!(
            store.incr_with_ttl("c", Duration::from_secs(60)).await.unwrap(),
            2
        );
        assert_eq!(store.get("c").await.unwrap(), Some("2".to_string()));
    }

    #[tokio::test]
    async fn test_incr_restarts_after_expiry() {
        let store = MemoryStore::new();
        store
            .incr_with_ttl("c", Duration::from_millis(50))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(
            store.incr_with_ttl("c", Duration::from_secs(60)).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent() {
        let store = MemoryStore::new();
        store
            .set_ex("k", "v", Duration::from_millis(50))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(!store.is_available());
        assert!(matches!(
            store.get("k").await,
            Err(StoreError::Unavailable)
        ));
        assert!(matches!(
            store.incr_with_ttl("k", Duration::from_secs(1)).await,
            Err(StoreError::Unavailable)
        ));

        store.set_available(true);
        assert!(store.get("k").await.is_ok());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        store
            .set_ex("old", "v", Duration::from_millis(10))
            .await
            .unwrap();
        store
            .set_ex("new", "v", Duration::from_secs(60))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        store.purge_expired();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_exact() {
        use std::sync::Arc;

        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.incr_with_ttl("c", Duration::from_secs(60)).await.unwrap()
            }));
        }

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort_unstable();
        let expected: Vec<u64> = (1..=20).collect();
        assert_eq!(counts, expected);
    }
}

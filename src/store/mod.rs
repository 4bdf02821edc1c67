//! Shared store trait and backends.
//!
//! The shared store is the only shared mutable resource in the core: a
//! remote key-value store with per-key expiry and an atomic
//! increment-or-create operation. This module defines the [`Store`] trait
//! that the enforcer and cache are written against, along with the built-in
//! in-memory and Redis backends.
//!
//! Store errors never cross into the request pipeline: the enforcer and
//! cache catch every [`StoreError`](crate::error::StoreError) at the call
//! site and degrade (fail-open for quota, fail-miss for cache).

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;

#[cfg(feature = "redis")]
pub use redis::{RedisConfig, RedisStore};

use std::future::Future;
use std::time::Duration;

use crate::error::StoreError;

/// Shared store backend trait.
///
/// All operations are async to support remote backends. Implementations
/// must be thread-safe (`Send + Sync`): concurrent `incr_with_ttl` calls
/// for the same key must be linearizable at the store, with no
/// read-modify-write races across the network boundary.
///
/// # Required Operations
///
/// - `is_available`: current health, updated by connection-state
///   transitions, never by per-call probing
/// - `get` / `set_ex`: string values with expiry
/// - `incr_with_ttl`: atomic increment-or-create; the TTL is applied only
///   when the increment creates the key
/// - `delete`: remove an entry
pub trait Store: Send + Sync + 'static {
    /// Current health of the backing connection.
    ///
    /// Callers consult this before issuing operations and skip the store
    /// entirely when it reports unavailable.
    fn is_available(&self) -> bool;

    /// Get a value by key.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Set a value with a TTL, replacing any existing value whole.
    fn set_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Atomically increment a counter.
    ///
    /// If the key doesn't exist it is created at 1 with the given TTL; an
    /// existing key keeps its original expiry. Returns the count AFTER
    /// incrementing. The whole operation is a single atomic step so two
    /// concurrent calls can never both observe the pre-increment value.
    fn incr_with_ttl(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Delete an entry.
    ///
    /// Returns success even if the key didn't exist.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        (**self).set_ex(key, value, ttl).await
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        (**self).incr_with_ttl(key, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }
}

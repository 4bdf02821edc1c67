//! Error types for gateway core operations.
//!
//! The taxonomy separates three very different failure classes: store-layer
//! errors (non-fatal, absorbed at the adapter boundary and converted into
//! degraded behavior), quota rejections (expected, user-visible), and
//! configuration errors. Upstream fetch failures are deliberately absent:
//! [`ResponseCache::fetch_with`](crate::cache::ResponseCache::fetch_with) is
//! generic over the caller's error type and propagates it unmodified.

use thiserror::Error;

use crate::plan::Plan;

/// Result type for gateway core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for gateway core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Shared store error. Never surfaced to callers by the core itself;
    /// the enforcer and cache absorb these into fail-open / fail-miss.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Quota exhausted for the current window. Expected, user-visible;
    /// carries everything a 429 response needs.
    #[error("Rate limit exceeded: {plan} plan allows {limit} requests per minute")]
    QuotaExceeded {
        /// Plan the limit was resolved from.
        plan: Plan,
        /// Endpoint the request was attributed to.
        endpoint: String,
        /// The effective limit that was exceeded.
        limit: u64,
    },
}

/// Store-related errors, produced only at the store adapter boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The adapter has no live connection.
    #[error("Store unavailable")]
    Unavailable,

    /// Failed to establish or obtain a connection.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A store command failed.
    #[error("{0}")]
    Operation(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

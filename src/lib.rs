//! Quota enforcement and response caching core for API gateways.
//!
//! `quotagate` is the enforcement-and-caching heart of an API gateway: it
//! decides whether each authenticated request may proceed under its plan's
//! per-minute quota, and it avoids redundant upstream calls by caching
//! responses in the same shared store. Everything around it — routing,
//! authentication, user CRUD — is plumbing that feeds it inputs (subject,
//! plan, endpoint, override) and consumes its outputs (decision, cache
//! status, quota snapshot).
//!
//! - **Fixed-window quotas**: atomic increment-or-create counters with a
//!   60-second window, namespaced per plan label
//! - **Per-endpoint overrides**: a per-subject limit that supersedes the
//!   plan default for one endpoint
//! - **Fail-open degradation**: an unreachable store disables enforcement
//!   and caching without ever failing a request
//! - **Pluggable storage**: in-memory for tests and single-process use,
//!   Redis with connection pooling for production
//!
//! # Quick Start
//!
//! ```ignore
//! use quotagate::{Gateway, Plan, PlanLimits, RequestContext};
//! use quotagate::store::{RedisConfig, RedisStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = RedisStore::connect(RedisConfig::from_env()).await;
//!     let gateway = Gateway::new(store, PlanLimits::default());
//!
//!     let ctx = RequestContext::new("user:42", "/news", Plan::Free);
//!
//!     // Before business logic: charge the request against its quota.
//!     match gateway.admit(&ctx).await {
//!         Ok(info) => println!("allowed, {} remaining", info.remaining),
//!         Err(e) => println!("429: {e}"),
//!     }
//!
//!     // Inside business logic: serve from cache or fetch upstream.
//!     let (news, status) = gateway
//!         .fetch_cached("news", [("country", "us")], || fetch_news("us"))
//!         .await
//!         .unwrap();
//!     println!("cache {status}");
//! }
//! ```
//!
//! # Feature Flags
//!
//! - `memory` (default): in-memory store backend
//! - `redis` (default): Redis store backend with connection pooling

pub mod cache;
pub mod decision;
pub mod enforcer;
pub mod error;
pub mod gateway;
pub mod plan;
pub mod store;

// Re-export main types
pub use cache::{DEFAULT_CACHE_TTL, ResponseCache, cache_key};
pub use decision::{CacheStatus, Decision, QuotaInfo, QuotaStatus};
pub use enforcer::{QUOTA_WINDOW, QuotaEnforcer};
pub use error::{Error, Result, StoreError};
pub use gateway::{Gateway, RequestContext};
pub use plan::{Plan, PlanLimits, RateLimitOverride};
pub use store::Store;

// Re-export storage backends
#[cfg(feature = "memory")]
pub use store::MemoryStore;

#[cfg(feature = "redis")]
pub use store::{RedisConfig, RedisStore};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::cache::{ResponseCache, cache_key};
    pub use crate::decision::{CacheStatus, Decision, QuotaStatus};
    pub use crate::enforcer::QuotaEnforcer;
    pub use crate::error::{Error, Result, StoreError};
    pub use crate::gateway::{Gateway, RequestContext};
    pub use crate::plan::{Plan, PlanLimits, RateLimitOverride};
    pub use crate::store::Store;

    #[cfg(feature = "memory")]
    pub use crate::store::MemoryStore;

    #[cfg(feature = "redis")]
    pub use crate::store::{RedisConfig, RedisStore};
}

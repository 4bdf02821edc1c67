//! Request pipeline glue: the composition root.
//!
//! The [`Gateway`] owns one shared store handle and builds the quota
//! enforcer and response cache over it — no process-wide singletons. The
//! HTTP layer resolves the authenticated subject, plan, and overrides into
//! a [`RequestContext`], calls [`admit`](Gateway::admit) before business
//! logic, and [`fetch_cached`](Gateway::fetch_cached) inside it.
//!
//! Data flows one way per request: pipeline → enforcer (allow/deny) →
//! business logic → cache (hit, or miss + fetch + store) → pipeline
//! (result plus cache status for logging).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cache::{ResponseCache, cache_key};
use crate::decision::{CacheStatus, QuotaInfo, QuotaStatus};
use crate::enforcer::QuotaEnforcer;
use crate::error::{Error, Result};
use crate::plan::{Plan, PlanLimits, RateLimitOverride};
use crate::store::Store;

/// What the authentication middleware resolved for one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Opaque identifier of the quota-consuming entity.
    pub subject: String,
    /// Normalized route path being invoked.
    pub endpoint: String,
    /// The subject's active plan tier.
    pub plan: Plan,
    /// The subject's per-endpoint overrides, from the user-profile store.
    pub overrides: Vec<RateLimitOverride>,
}

impl RequestContext {
    /// Create a context with no overrides.
    pub fn new(subject: impl Into<String>, endpoint: impl Into<String>, plan: Plan) -> Self {
        Self {
            subject: subject.into(),
            endpoint: endpoint.into(),
            plan,
            overrides: Vec::new(),
        }
    }

    /// Attach the subject's overrides.
    pub fn with_overrides(mut self, overrides: Vec<RateLimitOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    /// The at-most-one override matching this request's endpoint.
    pub fn override_for_endpoint(&self) -> Option<&RateLimitOverride> {
        self.overrides.iter().find(|o| o.endpoint == self.endpoint)
    }
}

/// Composition root wiring the enforcer and cache over one shared store.
pub struct Gateway<S> {
    store: Arc<S>,
    enforcer: QuotaEnforcer<Arc<S>>,
    cache: ResponseCache<Arc<S>>,
}

impl<S: Store> Gateway<S> {
    /// Build a gateway over the given store with the given limit table.
    pub fn new(store: S, limits: PlanLimits) -> Self {
        let store = Arc::new(store);
        Self {
            enforcer: QuotaEnforcer::new(store.clone(), limits),
            cache: ResponseCache::new(store.clone()),
            store,
        }
    }

    /// Set the TTL for cached upstream responses.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = self.cache.with_ttl(ttl);
        self
    }

    /// The shared store handle.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The quota enforcer.
    pub fn enforcer(&self) -> &QuotaEnforcer<Arc<S>> {
        &self.enforcer
    }

    /// The response cache.
    pub fn cache(&self) -> &ResponseCache<Arc<S>> {
        &self.cache
    }

    /// Run the quota check for a request, before business logic.
    ///
    /// A deny maps to [`Error::QuotaExceeded`] carrying the plan, endpoint,
    /// and the effective limit — everything a 429 response needs.
    pub async fn admit(&self, ctx: &RequestContext) -> Result<QuotaInfo> {
        let decision = self
            .enforcer
            .check(
                &ctx.subject,
                &ctx.endpoint,
                ctx.plan,
                ctx.override_for_endpoint(),
            )
            .await;

        if decision.is_denied() {
            let info = decision.into_info();
            return Err(Error::QuotaExceeded {
                plan: ctx.plan,
                endpoint: ctx.endpoint.clone(),
                limit: info.limit,
            });
        }

        Ok(decision.into_info())
    }

    /// Resolve an upstream response through the cache.
    ///
    /// Derives the cache key from the namespace and query parameters, then
    /// serves from cache or fetches and populates. The cache status is
    /// returned for the request log; upstream errors propagate unmodified.
    pub async fn fetch_cached<T, E, F, Fut, K, V, I>(
        &self,
        namespace: &str,
        params: I,
        fetch: F,
    ) -> std::result::Result<(T, CacheStatus), E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let key = cache_key(namespace, params);
        let (value, status) = self.cache.fetch_with(&key, fetch).await?;
        debug!(key = %key, cache = %status, "upstream response resolved");
        Ok((value, status))
    }

    /// Non-consuming quota snapshot for the read-only status endpoint.
    pub async fn quota_status(&self, ctx: &RequestContext) -> QuotaStatus {
        self.enforcer
            .status(
                &ctx.subject,
                &ctx.endpoint,
                ctx.plan,
                ctx.override_for_endpoint(),
            )
            .await
    }

    /// Administrative quota clear, invoked when a subject's plan changes so
    /// the old plan's partially consumed window does not linger.
    pub async fn reset_quota(&self, subject: &str, endpoint: &str) -> bool {
        self.enforcer.reset(subject, endpoint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_for_endpoint() {
        let ctx = RequestContext::new("u1", "/news", Plan::Free).with_overrides(vec![
            RateLimitOverride::new("/weather", 20),
            RateLimitOverride::new("/news", 5),
        ]);

        assert_eq!(ctx.override_for_endpoint().unwrap().limit_per_minute, 5);
    }

    #[test]
    fn test_override_for_endpoint_absent() {
        let ctx = RequestContext::new("u1", "/news", Plan::Free);
        assert!(ctx.override_for_endpoint().is_none());
    }
}

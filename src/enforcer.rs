//! Fixed-window quota enforcement.
//!
//! The enforcer owns the allow/deny decision for each incoming request. It
//! resolves the effective limit for a (subject, endpoint, plan) triple,
//! atomically advances the window counter in the shared store, and compares.
//! Quota is a soft constraint: when the store is unreachable every check
//! allows (fail-open) and a warning is recorded.
//!
//! Counters are namespaced per plan label (`rl:<plan>:<endpoint>:<subject>`),
//! so a plan change implicitly starts the subject in a fresh window for the
//! new plan's counter space.
//!
//! # Example
//!
//! ```ignore
//! use quotagate::{PlanLimits, QuotaEnforcer, Plan};
//! use quotagate::store::MemoryStore;
//!
//! let enforcer = QuotaEnforcer::new(MemoryStore::new(), PlanLimits::default());
//! let decision = enforcer.check("u1", "/news", Plan::Free, None).await;
//! if decision.is_denied() {
//!     println!("429, limit {}", decision.info().limit);
//! }
//! ```

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::decision::{Decision, QuotaInfo, QuotaStatus};
use crate::plan::{Plan, PlanLimits, RateLimitOverride};
use crate::store::Store;

/// Fixed accounting window for quota counters.
pub const QUOTA_WINDOW: Duration = Duration::from_secs(60);

/// Allow/deny decisions against per-plan fixed-window counters.
///
/// Constructor-injected with a store handle and the plan-limit table; one
/// instance serves every plan. Cheap to share behind an `Arc`.
pub struct QuotaEnforcer<S> {
    store: S,
    limits: PlanLimits,
    window: Duration,
}

impl<S: Store> QuotaEnforcer<S> {
    /// Create an enforcer over the given store with the given limit table.
    pub fn new(store: S, limits: PlanLimits) -> Self {
        Self {
            store,
            limits,
            window: QUOTA_WINDOW,
        }
    }

    /// Shorten or lengthen the accounting window. The 60-second default is
    /// the production value; tests use shorter windows to exercise expiry.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// The plan-limit table this enforcer was built with.
    pub fn limits(&self) -> &PlanLimits {
        &self.limits
    }

    /// Check whether a request is allowed AND charge it to the window.
    ///
    /// The increment happens before the comparison and is not rolled back
    /// on deny: a rejected request still counts toward the window. Store
    /// unavailability or store errors degrade to an allow.
    pub async fn check(
        &self,
        subject: &str,
        endpoint: &str,
        plan: Plan,
        limit_override: Option<&RateLimitOverride>,
    ) -> Decision {
        let limit = self.effective_limit(plan, limit_override);

        if !self.store.is_available() {
            warn!(subject, endpoint, "quota store unavailable, allowing request");
            return Decision::fail_open(limit);
        }

        let key = counter_key(plan, endpoint, subject);
        match self.store.incr_with_ttl(&key, self.window).await {
            Ok(consumed) if consumed > limit => {
                warn!(subject, endpoint, plan = %plan, limit, "rate limit exceeded");
                Decision::denied(QuotaInfo::new(limit, 0, consumed))
            }
            Ok(consumed) => {
                debug!(subject, endpoint, plan = %plan, limit, consumed, "request allowed");
                Decision::allowed(QuotaInfo::new(limit, limit - consumed, consumed))
            }
            Err(e) => {
                warn!(subject, endpoint, error = %e, "quota check failed, allowing request");
                Decision::fail_open(limit)
            }
        }
    }

    /// Read the current window without consuming from it.
    ///
    /// An unavailable store, an unopened window, and a read error all
    /// report the full limit as remaining.
    pub async fn status(
        &self,
        subject: &str,
        endpoint: &str,
        plan: Plan,
        limit_override: Option<&RateLimitOverride>,
    ) -> QuotaStatus {
        let limit = self.effective_limit(plan, limit_override);

        if !self.store.is_available() {
            return QuotaStatus::fresh(limit);
        }

        let key = counter_key(plan, endpoint, subject);
        match self.store.get(&key).await {
            Ok(Some(raw)) => {
                let consumed = raw.parse::<u64>().unwrap_or(0);
                QuotaStatus {
                    limit,
                    remaining: limit.saturating_sub(consumed),
                    consumed,
                }
            }
            Ok(None) => QuotaStatus::fresh(limit),
            Err(e) => {
                warn!(subject, endpoint, error = %e, "quota status read failed");
                QuotaStatus::fresh(limit)
            }
        }
    }

    /// Administrative clear of the counter in every plan namespace for the
    /// (subject, endpoint) pair, so a plan change starts the subject clean.
    ///
    /// Returns `false` without touching anything if the store is
    /// unavailable, and `false` if any delete fails.
    pub async fn reset(&self, subject: &str, endpoint: &str) -> bool {
        if !self.store.is_available() {
            warn!(subject, endpoint, "quota store unavailable, reset skipped");
            return false;
        }

        let mut ok = true;
        for plan in Plan::ALL {
            let key = counter_key(plan, endpoint, subject);
            if let Err(e) = self.store.delete(&key).await {
                warn!(subject, endpoint, plan = %plan, error = %e, "rate limit reset failed");
                ok = false;
            }
        }

        if ok {
            info!(subject, endpoint, "rate limit reset");
        }
        ok
    }

    /// The override's limit when one exists for the endpoint, else the
    /// plan default. The override alters only the limit; the counter stays
    /// in the plan's namespace.
    fn effective_limit(&self, plan: Plan, limit_override: Option<&RateLimitOverride>) -> u64 {
        limit_override
            .map(|o| o.limit_per_minute)
            .unwrap_or_else(|| self.limits.limit_for(plan))
    }
}

/// Counter key for a (plan, endpoint, subject) triple.
fn counter_key(plan: Plan, endpoint: &str, subject: &str) -> String {
    format!("rl:{}:{}:{}", plan.label(), endpoint, subject)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_key_is_plan_namespaced() {
        assert_eq!(counter_key(Plan::Free, "/news", "u1"), "rl:free:/news:u1");
        assert_eq!(counter_key(Plan::Pro, "/news", "u1"), "rl:pro:/news:u1");
    }

    #[cfg(feature = "memory")]
    mod with_store {
        use super::*;
        use crate::store::MemoryStore;

        fn enforcer() -> QuotaEnforcer<MemoryStore> {
            QuotaEnforcer::new(MemoryStore::new(), PlanLimits::default())
        }

        #[tokio::test]
        async fn test_override_supersedes_plan_limit() {
            let enforcer = enforcer();
            let limit_override = RateLimitOverride::new("/news", 5);

            let decision = enforcer
                .check("u1", "/news", Plan::Pro, Some(&limit_override))
                .await;
            assert!(decision.is_allowed());
            assert_eq!(decision.info().limit, 5);
            assert_eq!(decision.info().remaining, 4);
        }

        #[tokio::test]
        async fn test_allow_reports_window_state() {
            let enforcer = enforcer();

            let decision = enforcer.check("u1", "/news", Plan::Free, None).await;
            assert!(decision.is_allowed());
            assert_eq!(decision.info().limit, 10);
            assert_eq!(decision.info().remaining, 9);
            assert_eq!(decision.info().consumed, 1);
            assert!(!decision.info().degraded);
        }
    }
}

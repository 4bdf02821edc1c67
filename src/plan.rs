//! Plan tiers, the per-plan limit table, and per-endpoint overrides.
//!
//! A subject has exactly one active plan at a time. The plan determines the
//! default per-minute quota; a [`RateLimitOverride`] supersedes that default
//! for one endpoint only. Both are owned and persisted by the user-management
//! collaborator — the core only reads them.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Subscription plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    /// Free tier, 10 requests per minute by default.
    Free,
    /// Pro tier, 100 requests per minute by default.
    Pro,
}

impl Plan {
    /// All known plan tiers, in counter-namespace order.
    pub const ALL: [Plan; 2] = [Plan::Free, Plan::Pro];

    /// The lowercase label used in counter keys and log fields.
    pub fn label(self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
        }
    }

    /// Parse a plan label leniently.
    ///
    /// Unknown, empty, or differently-cased labels fall back to [`Plan::Free`],
    /// so a missing or malformed tier on a user record can never grant more
    /// quota than the free default.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "pro" => Plan::Pro,
            _ => Plan::Free,
        }
    }
}

impl Default for Plan {
    fn default() -> Self {
        Plan::Free
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-plan request limit table, injected into the enforcer at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanLimits {
    limits: HashMap<Plan, u64>,
}

impl PlanLimits {
    /// Default per-minute limit for the free tier.
    pub const DEFAULT_FREE: u64 = 10;
    /// Default per-minute limit for the pro tier.
    pub const DEFAULT_PRO: u64 = 100;

    /// Create the default limit table (free: 10, pro: 100).
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the limit for one plan.
    pub fn with_limit(mut self, plan: Plan, limit: u64) -> Self {
        self.limits.insert(plan, limit);
        self
    }

    /// Resolve the per-minute limit for a plan.
    ///
    /// A plan missing from the table resolves to the free default.
    pub fn limit_for(&self, plan: Plan) -> u64 {
        self.limits.get(&plan).copied().unwrap_or(Self::DEFAULT_FREE)
    }
}

impl Default for PlanLimits {
    fn default() -> Self {
        let mut limits = HashMap::new();
        limits.insert(Plan::Free, Self::DEFAULT_FREE);
        limits.insert(Plan::Pro, Self::DEFAULT_PRO);
        Self { limits }
    }
}

/// A per-subject, per-endpoint limit that supersedes the plan default.
///
/// At most one override exists per (subject, endpoint) pair. The field names
/// match the user-profile store's document shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitOverride {
    /// Normalized route path the override applies to.
    pub endpoint: String,
    /// Requests per minute allowed on that endpoint, regardless of plan.
    pub limit_per_minute: u64,
}

impl RateLimitOverride {
    /// Create a new override.
    pub fn new(endpoint: impl Into<String>, limit_per_minute: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            limit_per_minute,
        }
    }
}

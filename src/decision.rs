//! Decision and status types for quota checks and cache lookups.
//!
//! A quota check produces a [`Decision`]: allowed or denied, plus a
//! [`QuotaInfo`] snapshot of the window it was charged against. The
//! non-consuming status query produces a [`QuotaStatus`], and cache lookups
//! report a [`CacheStatus`] for request logging.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The result of a quota check.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Whether the request is allowed.
    allowed: bool,
    /// Quota window information.
    info: QuotaInfo,
}

impl Decision {
    /// Create a new "allowed" decision.
    pub fn allowed(info: QuotaInfo) -> Self {
        Self {
            allowed: true,
            info,
        }
    }

    /// Create a new "denied" decision.
    pub fn denied(info: QuotaInfo) -> Self {
        Self {
            allowed: false,
            info,
        }
    }

    /// Create the degraded-mode decision used when the shared store is
    /// unreachable: always allowed, nothing consumed.
    pub fn fail_open(limit: u64) -> Self {
        Self::allowed(QuotaInfo::degraded(limit))
    }

    /// Check if the request is allowed.
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Check if the request is denied.
    pub fn is_denied(&self) -> bool {
        !self.allowed
    }

    /// Get the quota info.
    pub fn info(&self) -> &QuotaInfo {
        &self.info
    }

    /// Consume the decision and return the info.
    pub fn into_info(self) -> QuotaInfo {
        self.info
    }
}

/// Information about the quota window a decision was made against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaInfo {
    /// Effective limit that was applied.
    pub limit: u64,
    /// Requests left in the current window.
    pub remaining: u64,
    /// Requests consumed in the current window, including this one.
    /// May exceed `limit`: denied attempts stay counted.
    pub consumed: u64,
    /// True when the decision was made without the store (fail-open).
    pub degraded: bool,
}

impl QuotaInfo {
    /// Create a new quota info.
    pub fn new(limit: u64, remaining: u64, consumed: u64) -> Self {
        Self {
            limit,
            remaining,
            consumed,
            degraded: false,
        }
    }

    /// Create the degraded-mode info: full window, nothing consumed.
    pub fn degraded(limit: u64) -> Self {
        Self {
            limit,
            remaining: limit,
            consumed: 0,
            degraded: true,
        }
    }

    /// Convert to HTTP headers.
    ///
    /// Returns a vector of (header_name, header_value) pairs suitable for
    /// both 2xx and 429-class responses.
    pub fn to_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
        ]
    }
}

/// Non-consuming snapshot of a quota window, for the read-only status
/// endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    /// Effective limit for the (subject, endpoint, plan) triple.
    pub limit: u64,
    /// Requests left in the current window.
    pub remaining: u64,
    /// Requests consumed in the current window.
    pub consumed: u64,
}

impl QuotaStatus {
    /// Status of a window that has not been opened yet (or cannot be read):
    /// the full limit is available.
    pub fn fresh(limit: u64) -> Self {
        Self {
            limit,
            remaining: limit,
            consumed: 0,
        }
    }
}

/// Whether a response was served from cache, attached to the request
/// context for downstream logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    /// Served from the cache.
    Hit,
    /// Fetched from upstream.
    Miss,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStatus::Hit => f.write_str("HIT"),
            CacheStatus::Miss => f.write_str("MISS"),
        }
    }
}

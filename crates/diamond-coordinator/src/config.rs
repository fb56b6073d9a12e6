//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do when a target already has an upgrade in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockPolicy {
    /// Return `UpgradeInFlight` immediately
    #[default]
    FailFast,
    /// Queue behind the current holder in FIFO order
    Wait,
}

/// Upgrade coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Percentage added on top of the estimated or fallback cost
    pub safety_margin_percent: u32,
    /// Cost used when estimation fails
    pub fallback_budget: u64,
    /// Finality wait when the caller gives no deadline, in milliseconds
    pub finality_timeout_ms: u64,
    /// Facets requested per loupe page
    pub page_size: usize,
    /// Re-read the live registry before submitting and refuse stale plans
    pub preflight_check: bool,
    /// Behaviour on a busy target
    pub lock_policy: LockPolicy,
    /// Cross-check live reads against replayed history while planning
    pub replay_cross_check: bool,
}

impl CoordinatorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With safety margin
    #[inline]
    #[must_use]
    pub fn with_safety_margin(mut self, percent: u32) -> Self {
        self.safety_margin_percent = percent;
        self
    }

    /// With fallback budget
    #[inline]
    #[must_use]
    pub fn with_fallback_budget(mut self, units: u64) -> Self {
        self.fallback_budget = units;
        self
    }

    /// With default finality timeout
    #[inline]
    #[must_use]
    pub fn with_finality_timeout(mut self, timeout: Duration) -> Self {
        self.finality_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With loupe page size
    #[inline]
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// With or without the preflight staleness check
    #[inline]
    #[must_use]
    pub fn with_preflight_check(mut self, enabled: bool) -> Self {
        self.preflight_check = enabled;
        self
    }

    /// With lock policy
    #[inline]
    #[must_use]
    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    /// With or without the replay cross-check
    #[inline]
    #[must_use]
    pub fn with_replay_cross_check(mut self, enabled: bool) -> Self {
        self.replay_cross_check = enabled;
        self
    }

    /// Default finality timeout
    #[inline]
    #[must_use]
    pub fn finality_timeout(&self) -> Duration {
        Duration::from_millis(self.finality_timeout_ms)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            safety_margin_percent: 20,
            fallback_budget: 8_000_000,
            finality_timeout_ms: 300_000,
            page_size: 100,
            preflight_check: true,
            lock_policy: LockPolicy::FailFast,
            replay_cross_check: false,
        }
    }
}

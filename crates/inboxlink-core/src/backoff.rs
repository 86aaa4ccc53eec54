//! Reconnect policy: backoff delays and the status each failure streak maps to.

use std::time::Duration;

use crate::status::BridgeStatus;

/// Delay before the first retry.
pub const DEFAULT_INITIAL_RETRY_DELAY: Duration = Duration::from_millis(2_000);

/// Upper bound on any retry delay.
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_millis(30_000);

/// Consecutive failures after which the bridge is reported offline.
pub const DEFAULT_OFFLINE_AFTER_FAILURES: u32 = 3;

/// Capped exponential backoff plus the `reconnecting → offline` threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    offline_after_failures: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_INITIAL_RETRY_DELAY,
            DEFAULT_MAX_RETRY_DELAY,
            DEFAULT_OFFLINE_AFTER_FAILURES,
        )
    }
}

impl ReconnectPolicy {
    pub const fn new(
        initial_delay: Duration,
        max_delay: Duration,
        offline_after_failures: u32,
    ) -> Self {
        Self {
            initial_delay,
            max_delay,
            offline_after_failures,
        }
    }

    /// `min(initial · 2^(failures-1), max)`. Zero failures means no wait.
    pub fn delay_for(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return Duration::ZERO;
        }
        let shift = (consecutive_failures - 1).min(20);
        let initial_ms = u64::try_from(self.initial_delay.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        let delay_ms = initial_ms.saturating_mul(1_u64 << shift).min(max_ms);
        Duration::from_millis(delay_ms)
    }

    /// Status announced after a failure.
    pub const fn status_after_failure(&self, consecutive_failures: u32) -> BridgeStatus {
        if consecutive_failures >= self.offline_after_failures {
            BridgeStatus::Offline
        } else {
            BridgeStatus::Reconnecting
        }
    }

    /// Status announced when an attempt begins.
    pub const fn status_for_attempt(is_first_attempt: bool) -> BridgeStatus {
        if is_first_attempt {
            BridgeStatus::Connecting
        } else {
            BridgeStatus::Reconnecting
        }
    }

    pub const fn offline_after_failures(&self) -> u32 {
        self.offline_after_failures
    }
}

//! Bridge configuration.
//!
//! Use the builder methods to override defaults; unset fields keep the values
//! the dashboard expects (2s initial retry, 30s cap, offline after 3 failures,
//! 20s keepalive).

use std::time::Duration;

use crate::backoff::{
    DEFAULT_INITIAL_RETRY_DELAY, DEFAULT_MAX_RETRY_DELAY, DEFAULT_OFFLINE_AFTER_FAILURES,
    ReconnectPolicy,
};

/// Path of the upstream event stream, relative to the base URL.
pub const DEFAULT_EVENTS_PATH: &str = "/assistants/events";

/// Idle interval after which a downstream stream sends a ping.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(20_000);

/// Shortest accepted keepalive interval.
pub const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for the bridge.
///
/// # Example
///
/// ```
/// use inboxlink_core::BridgeConfig;
/// use std::time::Duration;
///
/// let config = BridgeConfig::new()
///     .with_keepalive_interval(Duration::from_secs(15))
///     .with_offline_after_failures(5);
/// assert_eq!(config.keepalive_interval(), Duration::from_secs(15));
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    events_path: String,
    initial_retry_delay: Duration,
    max_retry_delay: Duration,
    offline_after_failures: u32,
    keepalive_interval: Duration,
    connect_timeout: Duration,
    user_agent: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            events_path: DEFAULT_EVENTS_PATH.to_string(),
            initial_retry_delay: DEFAULT_INITIAL_RETRY_DELAY,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
            offline_after_failures: DEFAULT_OFFLINE_AFTER_FAILURES,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("inboxlink/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl BridgeConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the upstream event stream path.
    #[must_use]
    pub fn with_events_path(mut self, path: impl Into<String>) -> Self {
        self.events_path = path.into();
        self
    }

    /// Set the delay before the first reconnect.
    #[must_use]
    pub const fn with_initial_retry_delay(mut self, delay: Duration) -> Self {
        self.initial_retry_delay = delay;
        self
    }

    /// Set the upper bound on reconnect delays.
    #[must_use]
    pub const fn with_max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    /// Set how many consecutive failures mark the bridge offline.
    #[must_use]
    pub const fn with_offline_after_failures(mut self, failures: u32) -> Self {
        self.offline_after_failures = failures;
        self
    }

    /// Set the downstream keepalive interval. Values below
    /// [`MIN_KEEPALIVE_INTERVAL`] are raised to it.
    #[must_use]
    pub const fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = if interval.as_millis() < MIN_KEEPALIVE_INTERVAL.as_millis() {
            MIN_KEEPALIVE_INTERVAL
        } else {
            interval
        };
        self
    }

    /// Set the upstream connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the user agent sent upstream.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn events_path(&self) -> &str {
        &self.events_path
    }

    pub const fn keepalive_interval(&self) -> Duration {
        self.keepalive_interval
    }

    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Backoff policy derived from the retry settings.
    pub const fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            self.initial_retry_delay,
            self.max_retry_delay,
            self.offline_after_failures,
        )
    }

    /// Full upstream URL for a (normalized) base URL.
    pub fn events_url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        if self.events_path.starts_with('/') {
            format!("{base}{}", self.events_path)
        } else {
            format!("{base}/{}", self.events_path)
        }
    }
}

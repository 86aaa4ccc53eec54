//! Bridge health and the registry holding its last known value.
//!
//! The registry has exactly one writer (the bridge service) and many readers
//! (downstream streams at handshake time). It is a lock-guarded single value.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health of the upstream bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeStatus {
    Connecting,
    Connected,
    Reconnecting,
    Offline,
}

impl fmt::Display for BridgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// A status value plus the context of the transition that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStatusSnapshot {
    pub status: BridgeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consecutive_failures: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl BridgeStatusSnapshot {
    /// Snapshot with no transition context.
    pub fn new(status: BridgeStatus) -> Self {
        Self {
            status,
            attempt: None,
            consecutive_failures: None,
            retry_delay_ms: None,
            reason: None,
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn with_attempt(mut self, attempt: u32, consecutive_failures: u32) -> Self {
        self.attempt = Some(attempt);
        self.consecutive_failures = Some(consecutive_failures);
        self
    }

    #[must_use]
    pub const fn with_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_delay_ms = Some(delay_ms);
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Process-wide holder of the last known bridge status.
#[derive(Debug)]
pub struct BridgeStatusRegistry {
    current: RwLock<BridgeStatusSnapshot>,
}

impl Default for BridgeStatusRegistry {
    fn default() -> Self {
        Self::new(BridgeStatusSnapshot::new(BridgeStatus::Offline))
    }
}

impl BridgeStatusRegistry {
    pub const fn new(initial: BridgeStatusSnapshot) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> BridgeStatusSnapshot {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current status label.
    pub fn status(&self) -> BridgeStatus {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .status
    }

    /// Store a new snapshot, returning the one it replaced.
    pub fn replace(&self, next: BridgeStatusSnapshot) -> BridgeStatusSnapshot {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_defaults_to_offline() {
        let registry = BridgeStatusRegistry::default();
        assert_eq!(registry.status(), BridgeStatus::Offline);
    }

    #[test]
    fn test_replace_returns_previous() {
        let registry = BridgeStatusRegistry::default();
        let previous = registry.replace(
            BridgeStatusSnapshot::new(BridgeStatus::Connecting).with_attempt(1, 0),
        );

        assert_eq!(previous.status, BridgeStatus::Offline);
        let current = registry.snapshot();
        assert_eq!(current.status, BridgeStatus::Connecting);
        assert_eq!(current.attempt, Some(1));
        assert_eq!(current.consecutive_failures, Some(0));
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let snapshot = BridgeStatusSnapshot::new(BridgeStatus::Reconnecting)
            .with_attempt(2, 1)
            .with_retry_delay_ms(2000)
            .with_reason("stream closed");
        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(value["status"], "reconnecting");
        assert_eq!(value["consecutiveFailures"], 1);
        assert_eq!(value["retryDelayMs"], 2000);
        assert_eq!(value["reason"], "stream closed");
        assert!(value.get("updatedAt").is_some());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(BridgeStatus::Offline.to_string(), "offline");
        assert_eq!(BridgeStatus::Reconnecting.to_string(), "reconnecting");
    }
}

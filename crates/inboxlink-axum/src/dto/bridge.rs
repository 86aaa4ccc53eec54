//! Bridge control DTOs.

use std::collections::BTreeSet;

use inboxlink_core::{BridgeStatusSnapshot, Capability, ProviderInfo};
use inboxlink_runtime::StartOutcome;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/bridge/start`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBridgeRequest {
    pub base_url: String,
}

/// Body of `POST /api/bridge/stop`. An empty body is accepted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopBridgeRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Result of a start request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBridgeResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_base_url: Option<String>,
    pub bridge_status: BridgeStatusSnapshot,
}

impl StartBridgeResponse {
    /// Build from a start outcome.
    pub fn new(outcome: StartOutcome, bridge_status: BridgeStatusSnapshot) -> Self {
        let (outcome, previous_base_url) = match outcome {
            StartOutcome::Started => ("started", None),
            StartOutcome::Unavailable => ("unavailable", None),
            StartOutcome::AlreadyRunning => ("already_running", None),
            StartOutcome::Restarted { previous_base_url } => {
                ("restarted", Some(previous_base_url))
            }
        };
        Self {
            outcome,
            previous_base_url,
            bridge_status,
        }
    }
}

/// Body of `GET /api/bridge/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStatusResponse {
    pub bridge_status: BridgeStatusSnapshot,
    pub provider: ProviderInfo,
    pub capabilities: BTreeSet<Capability>,
    pub active_base_url: Option<String>,
    pub subscribers: usize,
}

/// Body of `POST /api/inbox/events`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PublishResponse {
    pub published: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use inboxlink_core::BridgeStatus;
    use serde_json::json;

    #[test]
    fn test_stop_request_reason_optional() {
        let req: StopBridgeRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.reason.is_none());
    }

    #[test]
    fn test_restart_response_shape() {
        let response = StartBridgeResponse::new(
            StartOutcome::Restarted {
                previous_base_url: "http://old.test".to_string(),
            },
            BridgeStatusSnapshot::new(BridgeStatus::Connecting),
        );
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["outcome"], "restarted");
        assert_eq!(value["previousBaseUrl"], "http://old.test");
        assert_eq!(value["bridgeStatus"]["status"], "connecting");
    }
}

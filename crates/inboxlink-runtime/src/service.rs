//! Bridge service: owns the connector, the bus and the status registry.
//!
//! The service is the single object adapters hold. It serializes lifecycle
//! calls with an async mutex and keeps at most one connector alive.
//!
//! ```ignore
//! let bridge = BridgeService::new(BridgeConfig::default(), client, ProviderDescriptor::assistants());
//! bridge.start("http://localhost:4000").await?;
//! println!("Status: {}", bridge.status().status);
//! bridge.stop(Some("shutdown")).await;
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use inboxlink_core::{
    ActionResponse, BridgeConfig, BridgeStatus, BridgeStatusRegistry, BridgeStatusSnapshot,
    EnvelopePublisher, EventBus, EventSourceClient, ProviderDescriptor, StreamEnvelope,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::connector::{ConnectorHandle, spawn_connector};
use crate::status_publisher::{Announce, StatusPublisher};

/// Reason recorded when no HTTP client could be created.
const CLIENT_UNAVAILABLE_REASON: &str = "HTTP client unavailable";

/// Error from bridge lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The base URL is not an absolute http(s) URL.
    #[error("Invalid upstream base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// What [`BridgeService::start`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A connector was started.
    Started,
    /// A connector for the same URL is already running; nothing changed.
    AlreadyRunning,
    /// The previous connector targeted another URL and was replaced.
    Restarted { previous_base_url: String },
    /// No HTTP client is available; the bridge stays offline.
    Unavailable,
}

/// Owner of the upstream bridge lifecycle.
pub struct BridgeService {
    config: BridgeConfig,
    client: Option<Arc<dyn EventSourceClient>>,
    bus: EventBus,
    registry: Arc<BridgeStatusRegistry>,
    provider: RwLock<ProviderDescriptor>,
    connector: Mutex<Option<ConnectorHandle>>,
}

impl BridgeService {
    /// Create a service that reaches upstream through `client`.
    pub fn new(
        config: BridgeConfig,
        client: Arc<dyn EventSourceClient>,
        provider: ProviderDescriptor,
    ) -> Self {
        Self::build(config, Some(client), provider)
    }

    /// Create a service with no HTTP client. `start` only records `offline`.
    pub fn without_client(config: BridgeConfig, provider: ProviderDescriptor) -> Self {
        Self::build(config, None, provider)
    }

    fn build(
        config: BridgeConfig,
        client: Option<Arc<dyn EventSourceClient>>,
        provider: ProviderDescriptor,
    ) -> Self {
        Self {
            config,
            client,
            bus: EventBus::new(),
            registry: Arc::new(BridgeStatusRegistry::default()),
            provider: RwLock::new(provider),
            connector: Mutex::new(None),
        }
    }

    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The bus every envelope flows through.
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub const fn registry(&self) -> &Arc<BridgeStatusRegistry> {
        &self.registry
    }

    /// Provider currently backing the bridge.
    pub fn provider(&self) -> ProviderDescriptor {
        self.provider
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Last known bridge status.
    pub fn status(&self) -> BridgeStatusSnapshot {
        self.registry.snapshot()
    }

    /// Handshake for a new downstream client, reflecting the status right now.
    ///
    /// Mock providers have no upstream, so their handshake carries no status.
    pub fn handshake(&self) -> StreamEnvelope {
        let provider = self.provider();
        let status = (!provider.is_mock()).then(|| self.registry.snapshot());
        StreamEnvelope::handshake(&provider, status)
    }

    /// Base URL of the running connector, if any.
    pub async fn active_base_url(&self) -> Option<String> {
        self.connector
            .lock()
            .await
            .as_ref()
            .filter(|h| h.is_active())
            .map(|h| h.base_url().to_string())
    }

    /// Start bridging from `base_url`.
    ///
    /// Same URL as the running connector: no-op. Different URL: the old
    /// connector is torn down first. Publishes `connecting` before the first
    /// network call.
    pub async fn start(&self, base_url: &str) -> Result<StartOutcome, BridgeError> {
        let base_url = normalize_base_url(base_url)?;

        let Some(client) = self.client.clone() else {
            warn!(
                target: "inboxlink.bridge",
                base_url = %base_url,
                "No HTTP client available, bridge not started"
            );
            self.status_publisher().set_silently(
                BridgeStatusSnapshot::new(BridgeStatus::Offline)
                    .with_reason(CLIENT_UNAVAILABLE_REASON),
            );
            return Ok(StartOutcome::Unavailable);
        };

        let mut guard = self.connector.lock().await;

        let mut previous_base_url = None;
        if let Some(handle) = guard.take() {
            if handle.base_url() == base_url && handle.is_active() {
                debug!(
                    target: "inboxlink.bridge",
                    base_url = %base_url,
                    "Bridge already running"
                );
                *guard = Some(handle);
                return Ok(StartOutcome::AlreadyRunning);
            }
            previous_base_url = Some(handle.base_url().to_string());
            handle.shutdown().await;
        }

        self.set_provider(ProviderDescriptor::assistants());
        let status = self.status_publisher();
        status.announce(
            BridgeStatusSnapshot::new(BridgeStatus::Connecting).with_attempt(1, 0),
            Announce::Forced,
        );

        *guard = Some(spawn_connector(
            base_url.clone(),
            client,
            &self.config,
            status,
            self.events(),
        ));

        info!(
            target: "inboxlink.bridge",
            base_url = %base_url,
            previous_base_url = previous_base_url.as_deref().unwrap_or(""),
            "Bridge started"
        );

        Ok(match previous_base_url {
            Some(previous_base_url) => StartOutcome::Restarted { previous_base_url },
            None => StartOutcome::Started,
        })
    }

    /// Stop the connector and publish `offline`.
    pub async fn stop(&self, reason: Option<&str>) {
        self.shutdown(reason, true).await;
    }

    /// Stop the connector without publishing anything.
    pub async fn stop_silently(&self) {
        self.shutdown(None, false).await;
    }

    async fn shutdown(&self, reason: Option<&str>, announce: bool) {
        let mut guard = self.connector.lock().await;
        if let Some(handle) = guard.take() {
            info!(
                target: "inboxlink.bridge",
                base_url = %handle.base_url(),
                reason = reason.unwrap_or(""),
                "Stopping bridge"
            );
            handle.shutdown().await;
        }

        if announce {
            let mut snapshot = BridgeStatusSnapshot::new(BridgeStatus::Offline);
            if let Some(reason) = reason {
                snapshot = snapshot.with_reason(reason);
            }
            self.status_publisher().announce(snapshot, Announce::Forced);
        }
    }

    /// Local publish API for same-process producers.
    ///
    /// Forwards only responses that report success and carry an event.
    pub fn publish_action_response(&self, response: &ActionResponse) -> bool {
        match response.to_envelope() {
            Some(envelope) => {
                self.bus.publish(&envelope);
                true
            }
            None => {
                debug!(
                    target: "inboxlink.bridge",
                    success = response.success,
                    has_event = response.event.is_some(),
                    "Action response not published"
                );
                false
            }
        }
    }

    fn events(&self) -> Arc<dyn EnvelopePublisher> {
        Arc::new(self.bus.clone())
    }

    fn status_publisher(&self) -> StatusPublisher {
        StatusPublisher::new(Arc::clone(&self.registry), self.events(), self.provider())
    }

    fn set_provider(&self, provider: ProviderDescriptor) {
        *self
            .provider
            .write()
            .unwrap_or_else(PoisonError::into_inner) = provider;
    }
}

/// Validate an upstream base URL and strip trailing slashes.
pub fn normalize_base_url(base_url: &str) -> Result<String, BridgeError> {
    let trimmed = base_url.trim();
    let parsed = Url::parse(trimmed).map_err(|e| BridgeError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(BridgeError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Script, ScriptedSource};
    use inboxlink_core::{ActionEvent, UpstreamError};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::Instant;

    fn refused() -> Script {
        Script::Fail(UpstreamError::Request("connection refused".to_string()))
    }

    fn service(scripts: Vec<Script>) -> (BridgeService, Arc<ScriptedSource>) {
        let source = Arc::new(ScriptedSource::new(scripts));
        let service = BridgeService::new(
            BridgeConfig::default(),
            source.clone(),
            ProviderDescriptor::mock(),
        );
        (service, source)
    }

    async fn next_status(rx: &mut UnboundedReceiver<StreamEnvelope>) -> BridgeStatusSnapshot {
        loop {
            let envelope = rx.recv().await.expect("bus closed");
            if let Some(status) = envelope.as_handshake().and_then(|h| h.bridge_status.clone()) {
                return status;
            }
        }
    }

    fn summary(s: &BridgeStatusSnapshot) -> (BridgeStatus, Option<u32>, Option<u32>, Option<u64>) {
        (s.status, s.attempt, s.consecutive_failures, s.retry_delay_ms)
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_escalates_to_offline() {
        let (service, _source) = service(vec![refused(), refused(), refused(), Script::Pending]);
        let (_subscription, mut rx) = service.bus().subscribe_channel();

        assert_eq!(
            service.start("http://upstream.test").await.unwrap(),
            StartOutcome::Started
        );

        use BridgeStatus::{Connecting, Offline, Reconnecting};
        let expected = [
            (Connecting, Some(1), Some(0), None),
            (Reconnecting, Some(1), Some(1), Some(2_000)),
            (Reconnecting, Some(2), Some(1), None),
            (Reconnecting, Some(2), Some(2), Some(4_000)),
            (Reconnecting, Some(3), Some(2), None),
            (Offline, Some(3), Some(3), Some(8_000)),
            (Reconnecting, Some(4), Some(3), None),
        ];
        for want in expected {
            assert_eq!(summary(&next_status(&mut rx).await), want);
        }

        // offline is a label; the bridge keeps retrying
        assert_eq!(service.status().status, Reconnecting);
        service.stop_silently().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_backoff_delay_between_attempts() {
        let (service, _source) = service(vec![refused(), refused(), Script::Pending]);
        let (_subscription, mut rx) = service.bus().subscribe_channel();
        service.start("http://upstream.test").await.unwrap();

        next_status(&mut rx).await; // connecting
        next_status(&mut rx).await; // failure 1
        let failed_at = Instant::now();
        next_status(&mut rx).await; // attempt 2
        assert!(failed_at.elapsed() >= Duration::from_millis(2_000));

        next_status(&mut rx).await; // failure 2
        let failed_at = Instant::now();
        next_status(&mut rx).await; // attempt 3
        assert!(failed_at.elapsed() >= Duration::from_millis(4_000));

        service.stop_silently().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        let (service, _source) = service(vec![
            refused(),
            refused(),
            Script::Stream(vec![
                "data: {\"type\":\"event\",\"event\":{\"type\":\"draft_updated\"}}\n\n",
            ]),
            Script::Pending,
        ]);
        let (_subscription, mut rx) = service.bus().subscribe_channel();
        service.start("http://upstream.test").await.unwrap();

        for _ in 0..5 {
            next_status(&mut rx).await; // connecting, f1, a2, f2, a3
        }
        let connected = next_status(&mut rx).await;
        assert_eq!(connected.status, BridgeStatus::Connected);
        assert_eq!(connected.attempt, Some(3));
        assert_eq!(connected.consecutive_failures, Some(0));

        let action = rx.recv().await.unwrap();
        assert_eq!(action.as_action().unwrap().event.kind, "draft_updated");

        // Unexpected close after success starts the backoff over but keeps
        // the number of the attempt that just ended.
        let closed = next_status(&mut rx).await;
        assert_eq!(
            summary(&closed),
            (BridgeStatus::Reconnecting, Some(3), Some(1), Some(2_000))
        );
        assert_eq!(closed.reason.as_deref(), Some("stream closed by upstream"));

        service.stop_silently().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent_per_url() {
        let (service, source) = service(vec![Script::Pending, Script::Pending]);
        let (_subscription, mut rx) = service.bus().subscribe_channel();

        assert_eq!(
            service.start("http://a.test/").await.unwrap(),
            StartOutcome::Started
        );
        assert_eq!(
            service.start("http://a.test").await.unwrap(),
            StartOutcome::AlreadyRunning
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.opened(), vec!["http://a.test/assistants/events"]);

        let first = next_status(&mut rx).await;
        assert_eq!(first.status, BridgeStatus::Connecting);
        assert!(rx.try_recv().is_err());

        assert_eq!(
            service.start("http://b.test").await.unwrap(),
            StartOutcome::Restarted {
                previous_base_url: "http://a.test".to_string()
            }
        );
        let second = next_status(&mut rx).await;
        assert_eq!(summary(&second), (BridgeStatus::Connecting, Some(1), Some(0), None));
        assert_eq!(service.active_base_url().await.as_deref(), Some("http://b.test"));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.opened().len(), 2);
        assert_eq!(source.opened()[1], "http://b.test/assistants/events");

        service.stop_silently().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_publishes_offline_and_halts_retries() {
        let (service, source) = service(vec![refused()]);
        let (_subscription, mut rx) = service.bus().subscribe_channel();
        service.start("http://upstream.test").await.unwrap();

        next_status(&mut rx).await; // connecting
        next_status(&mut rx).await; // failure 1

        service.stop(Some("shutdown")).await;
        let stopped = next_status(&mut rx).await;
        assert_eq!(stopped.status, BridgeStatus::Offline);
        assert_eq!(stopped.reason.as_deref(), Some("shutdown"));
        assert!(service.active_base_url().await.is_none());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(source.opened().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_silently_publishes_nothing() {
        let (service, _source) = service(vec![Script::Pending]);
        service.start("http://upstream.test").await.unwrap();
        let (_subscription, mut rx) = service.bus().subscribe_channel();

        service.stop_silently().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_start_without_client_stays_offline() {
        let service =
            BridgeService::without_client(BridgeConfig::default(), ProviderDescriptor::mock());
        let (_subscription, mut rx) = service.bus().subscribe_channel();

        assert_eq!(
            service.start("http://upstream.test").await.unwrap(),
            StartOutcome::Unavailable
        );
        let status = service.status();
        assert_eq!(status.status, BridgeStatus::Offline);
        assert_eq!(status.reason.as_deref(), Some(CLIENT_UNAVAILABLE_REASON));
        assert!(rx.try_recv().is_err());
        assert!(service.provider().is_mock());
    }

    #[tokio::test]
    async fn test_rejects_invalid_base_url() {
        let (service, _source) = service(vec![]);
        let err = service.start("not a url").await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidBaseUrl { .. }));

        let err = service.start("ftp://files.test").await.unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_reflects_current_status() {
        let (service, _source) = service(vec![Script::Pending]);

        let mock = service.handshake();
        assert!(mock.as_handshake().unwrap().bridge_status.is_none());

        service.start("http://upstream.test").await.unwrap();
        let handshake = service.handshake();
        let handshake = handshake.as_handshake().unwrap();
        assert_eq!(handshake.provider.id, "assistants");
        assert_eq!(
            handshake.bridge_status.as_ref().map(|s| s.status),
            Some(BridgeStatus::Connecting)
        );

        service.stop(None).await;
        let handshake = service.handshake();
        assert_eq!(
            handshake.as_handshake().unwrap().bridge_status.as_ref().map(|s| s.status),
            Some(BridgeStatus::Offline)
        );
    }

    #[test]
    fn test_publish_action_response() {
        let (service, _source) = service(vec![]);
        let (_subscription, mut rx) = service.bus().subscribe_channel();

        let mut response = ActionResponse {
            success: true,
            message: Some("Feedback saved".to_string()),
            feedback: Some(json!({ "rating": 5 })),
            event: None,
            ..Default::default()
        };
        assert!(!service.publish_action_response(&response));

        response.event = Some(ActionEvent {
            kind: "feedback_added".to_string(),
            timestamp: None,
            payload: json!({}),
        });
        assert!(service.publish_action_response(&response));

        let envelope = rx.try_recv().unwrap();
        let action = envelope.as_action().unwrap();
        assert_eq!(action.message.as_deref(), Some("Feedback saved"));
        assert_eq!(action.feedback, Some(json!({ "rating": 5 })));
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url(" https://assist.test/api/ ").unwrap(),
            "https://assist.test/api"
        );
        assert!(normalize_base_url("").is_err());
    }
}

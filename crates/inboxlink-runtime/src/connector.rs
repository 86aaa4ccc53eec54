//! Upstream connector: one SSE connection at a time, reconnecting forever.
//!
//! The connector runs as a background task owned by [`ConnectorHandle`].
//! Each attempt opens `{base_url}{events_path}`, republishes decoded frames in
//! arrival order, and on any failure backs off before the next attempt.
//! Cancellation is checked at every suspension point (open, body read,
//! backoff sleep), so a stopped connector never publishes again.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use inboxlink_core::{
    BridgeConfig, BridgeStatus, BridgeStatusSnapshot, EnvelopePublisher, EventSourceClient,
    FrameBuffer, ReconnectPolicy, SseFrame, UpstreamError, decode_action_event,
};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace, warn};

use crate::status_publisher::{Announce, StatusPublisher};

/// Handle to a running connector task.
///
/// Dropping the handle cancels the task; [`ConnectorHandle::shutdown`] also
/// waits for it to exit.
pub struct ConnectorHandle {
    base_url: String,
    cancel: CancellationToken,
    join_handle: JoinHandle<()>,
    _cancel_on_drop: DropGuard,
}

impl ConnectorHandle {
    /// Base URL this connector targets.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the task is still running and has not been cancelled.
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.join_handle.is_finished()
    }

    /// Cancel the task and wait for it to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        match self.join_handle.await {
            Ok(()) => debug!(
                target: "inboxlink.bridge",
                base_url = %self.base_url,
                "Connector task finished"
            ),
            Err(e) if e.is_panic() => warn!(
                target: "inboxlink.bridge",
                base_url = %self.base_url,
                "Connector task panicked: {e}"
            ),
            Err(_) => {}
        }
    }
}

/// Spawn a connector for `base_url`.
///
/// The caller announces the initial `connecting` status before spawning; the
/// task's own first-attempt announcement collapses into it.
pub fn spawn_connector(
    base_url: String,
    client: Arc<dyn EventSourceClient>,
    config: &BridgeConfig,
    status: StatusPublisher,
    events: Arc<dyn EnvelopePublisher>,
) -> ConnectorHandle {
    let cancel = CancellationToken::new();
    let connector = UpstreamConnector {
        events_url: config.events_url(&base_url),
        base_url: base_url.clone(),
        client,
        policy: config.reconnect_policy(),
        status,
        events,
        cancel: cancel.clone(),
        state: ConnectorState::default(),
    };

    let join_handle = tokio::spawn(connector.run());

    ConnectorHandle {
        base_url,
        _cancel_on_drop: cancel.clone().drop_guard(),
        cancel,
        join_handle,
    }
}

/// Mutable state owned exclusively by the connector task.
#[derive(Debug, Default)]
struct ConnectorState {
    consecutive_failures: u32,
    has_attempted: bool,
    frames: FrameBuffer,
}

struct UpstreamConnector {
    base_url: String,
    events_url: String,
    client: Arc<dyn EventSourceClient>,
    policy: ReconnectPolicy,
    status: StatusPublisher,
    events: Arc<dyn EnvelopePublisher>,
    cancel: CancellationToken,
    state: ConnectorState,
}

impl UpstreamConnector {
    async fn run(mut self) {
        debug!(
            target: "inboxlink.bridge",
            base_url = %self.base_url,
            "Connector task starting"
        );

        while !self.cancel.is_cancelled() {
            let Some((attempt, failure)) = self.attempt_connection().await else {
                break;
            };
            if self.cancel.is_cancelled() {
                break;
            }

            let delay = self.record_failure(attempt, &failure);
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        debug!(
            target: "inboxlink.bridge",
            base_url = %self.base_url,
            "Connector task stopped"
        );
    }

    /// Run one attempt. Returns its attempt number and the error that ended
    /// it, or `None` if the connector was cancelled.
    async fn attempt_connection(&mut self) -> Option<(u32, UpstreamError)> {
        let attempt = self.state.consecutive_failures + 1;
        let is_first_attempt = !self.state.has_attempted;
        self.state.has_attempted = true;

        let snapshot = BridgeStatusSnapshot::new(ReconnectPolicy::status_for_attempt(
            is_first_attempt,
        ))
        .with_attempt(attempt, self.state.consecutive_failures);
        let mode = if is_first_attempt {
            Announce::IfChanged
        } else {
            Announce::Forced
        };
        self.status.announce(snapshot, mode);

        let cancel = self.cancel.clone();
        tokio::select! {
            () = cancel.cancelled() => None,
            failure = self.run_session(attempt) => Some((attempt, failure)),
        }
    }

    /// Open the upstream and pump frames until the session ends.
    async fn run_session(&mut self, attempt: u32) -> UpstreamError {
        let mut body = match self.client.open(&self.events_url).await {
            Ok(body) => body,
            Err(e) => return e,
        };

        self.state.consecutive_failures = 0;
        self.state.frames.clear();
        self.status.announce(
            BridgeStatusSnapshot::new(BridgeStatus::Connected).with_attempt(attempt, 0),
            Announce::Forced,
        );
        info!(
            target: "inboxlink.bridge",
            url = %self.events_url,
            attempt,
            "Upstream event stream connected"
        );

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for frame in self.state.frames.push_bytes(&bytes) {
                        self.handle_frame(&frame);
                    }
                }
                Err(e) => return e,
            }
        }

        UpstreamError::StreamClosed
    }

    fn handle_frame(&self, frame: &SseFrame) {
        if frame.is_ping() {
            trace!(target: "inboxlink.bridge", "Upstream ping");
            return;
        }

        match decode_action_event(&frame.data) {
            Ok(envelope) => self.events.publish(envelope),
            Err(e) => warn!(
                target: "inboxlink.bridge",
                event_type = %frame.event_type,
                "Dropping upstream frame: {e}"
            ),
        }
    }

    /// Count a failure of `attempt`, announce it, and return how long to wait.
    fn record_failure(&mut self, attempt: u32, failure: &UpstreamError) -> Duration {
        self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);
        let failures = self.state.consecutive_failures;
        let delay = self.policy.delay_for(failures);
        let retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);

        self.status.announce(
            BridgeStatusSnapshot::new(self.policy.status_after_failure(failures))
                .with_attempt(attempt, failures)
                .with_retry_delay_ms(retry_delay_ms)
                .with_reason(failure.to_string()),
            Announce::Forced,
        );

        warn!(
            target: "inboxlink.bridge",
            base_url = %self.base_url,
            attempt,
            consecutive_failures = failures,
            retry_delay_ms,
            "Upstream event stream failed: {failure}"
        );

        delay
    }
}

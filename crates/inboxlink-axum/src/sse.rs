//! Downstream SSE responder.
//!
//! Every client connection gets a [`DownstreamStream`]: the handshake first,
//! then every envelope published on the bridge bus in publish order. Clients
//! of a real upstream also receive an `event: ping` frame whenever the
//! connection has been idle for the keepalive interval.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::future;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use inboxlink_core::frame::PING_EVENT_TYPE;
use inboxlink_core::{StreamEnvelope, Subscription};
use inboxlink_runtime::BridgeService;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Data carried by every keepalive frame.
const PING_DATA: &str = "{}";

/// Lifecycle of one downstream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderPhase {
    /// Subscribed, handshake not yet written.
    Idle,
    /// Handshake written; relaying envelopes.
    Streaming,
    /// Ended by server shutdown or a closed bus.
    Closed,
}

/// Opens downstream streams against a bridge.
#[derive(Clone)]
pub struct StreamResponder {
    bridge: Arc<BridgeService>,
    shutdown: CancellationToken,
}

impl StreamResponder {
    pub const fn new(bridge: Arc<BridgeService>, shutdown: CancellationToken) -> Self {
        Self { bridge, shutdown }
    }

    /// Subscribe a new client.
    ///
    /// The subscription is taken before the handshake is built, so nothing
    /// published after the status read can be missed.
    pub fn open(&self) -> DownstreamStream {
        let (subscription, receiver) = self.bridge.bus().subscribe_channel();
        let handshake = self.bridge.handshake();

        let inner = stream::once(future::ready(handshake))
            .chain(UnboundedReceiverStream::new(receiver))
            .take_until(self.shutdown.clone().cancelled_owned())
            .boxed();

        let stream = DownstreamStream {
            connection_id: Uuid::new_v4(),
            phase: ResponderPhase::Idle,
            inner,
            shutdown: self.shutdown.clone(),
            _subscription: subscription,
        };

        debug!(
            target: "inboxlink.stream",
            connection_id = %stream.connection_id,
            subscribers = self.bridge.bus().subscriber_count(),
            "Downstream client connected"
        );

        stream
    }

    /// Open a stream and wrap it as an axum SSE response body.
    ///
    /// Pings are sent only when the bridge has a real upstream.
    pub fn sse(
        &self,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static + use<>> {
        let events = self
            .open()
            .filter_map(|envelope| future::ready(envelope_event(&envelope).map(Ok)));
        let sse = Sse::new(events);

        if self.bridge.provider().is_mock() {
            return sse;
        }
        sse.keep_alive(
            KeepAlive::new()
                .interval(self.bridge.config().keepalive_interval())
                .event(ping_event()),
        )
    }
}

/// Serialize an envelope as an unnamed `data:` frame. Envelopes that fail to
/// serialize are dropped.
fn envelope_event(envelope: &StreamEnvelope) -> Option<Event> {
    match serde_json::to_string(envelope) {
        Ok(json) => Some(Event::default().data(json)),
        Err(e) => {
            warn!(
                target: "inboxlink.stream",
                envelope_id = %envelope.id(),
                "Failed to serialize envelope: {e}"
            );
            None
        }
    }
}

fn ping_event() -> Event {
    Event::default().event(PING_EVENT_TYPE).data(PING_DATA)
}

/// Envelopes for one downstream client.
///
/// Dropping the stream unsubscribes it from the bus.
pub struct DownstreamStream {
    connection_id: Uuid,
    phase: ResponderPhase,
    inner: BoxStream<'static, StreamEnvelope>,
    shutdown: CancellationToken,
    _subscription: Subscription,
}

impl DownstreamStream {
    pub const fn phase(&self) -> ResponderPhase {
        self.phase
    }
}

impl Stream for DownstreamStream {
    type Item = StreamEnvelope;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.phase == ResponderPhase::Closed {
            return Poll::Ready(None);
        }

        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(envelope)) => {
                this.phase = ResponderPhase::Streaming;
                Poll::Ready(Some(envelope))
            }
            Poll::Ready(None) => {
                this.phase = ResponderPhase::Closed;
                let reason = if this.shutdown.is_cancelled() {
                    "server shutting down"
                } else {
                    "event bus closed"
                };
                debug!(
                    target: "inboxlink.stream",
                    connection_id = %this.connection_id,
                    reason,
                    "Downstream stream closed"
                );
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for DownstreamStream {
    fn drop(&mut self) {
        if self.phase != ResponderPhase::Closed {
            debug!(
                target: "inboxlink.stream",
                connection_id = %self.connection_id,
                "Downstream client disconnected"
            );
        }
    }
}

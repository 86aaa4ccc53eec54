//! Status announcements: registry write plus bus broadcast.
//!
//! Every transition is written to the [`BridgeStatusRegistry`] and published
//! as a handshake carrying the new `bridgeStatus`, so connected clients see it
//! live and new clients read it at connect time.

use std::sync::Arc;

use inboxlink_core::{
    BridgeStatusRegistry, BridgeStatusSnapshot, EnvelopePublisher, ProviderDescriptor,
    StreamEnvelope,
};
use tracing::debug;

/// Whether an announcement may be collapsed into the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Announce {
    /// Always publish, even if the label is unchanged.
    Forced,
    /// Skip when the registry already holds the same label.
    IfChanged,
}

/// Writes bridge status to the registry and the bus.
#[derive(Clone)]
pub struct StatusPublisher {
    registry: Arc<BridgeStatusRegistry>,
    events: Arc<dyn EnvelopePublisher>,
    provider: ProviderDescriptor,
}

impl StatusPublisher {
    pub fn new(
        registry: Arc<BridgeStatusRegistry>,
        events: Arc<dyn EnvelopePublisher>,
        provider: ProviderDescriptor,
    ) -> Self {
        Self {
            registry,
            events,
            provider,
        }
    }

    /// Record and broadcast `snapshot`. Returns whether it was published.
    pub fn announce(&self, snapshot: BridgeStatusSnapshot, mode: Announce) -> bool {
        if mode == Announce::IfChanged && self.registry.status() == snapshot.status {
            debug!(
                target: "inboxlink.bridge",
                status = %snapshot.status,
                "Collapsed repeated status"
            );
            return false;
        }

        self.registry.replace(snapshot.clone());
        self.events
            .publish(StreamEnvelope::handshake(&self.provider, Some(snapshot)));
        true
    }

    /// Record `snapshot` without telling anyone.
    pub fn set_silently(&self, snapshot: BridgeStatusSnapshot) {
        self.registry.replace(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inboxlink_core::{BridgeStatus, EventBus};

    fn publisher(bus: &EventBus) -> (StatusPublisher, Arc<BridgeStatusRegistry>) {
        let registry = Arc::new(BridgeStatusRegistry::default());
        let publisher = StatusPublisher::new(
            Arc::clone(&registry),
            Arc::new(bus.clone()),
            ProviderDescriptor::assistants(),
        );
        (publisher, registry)
    }

    #[test]
    fn test_announce_updates_registry_and_bus() {
        let bus = EventBus::new();
        let (_subscription, mut rx) = bus.subscribe_channel();
        let (status, registry) = publisher(&bus);

        assert!(status.announce(
            BridgeStatusSnapshot::new(BridgeStatus::Connecting).with_attempt(1, 0),
            Announce::Forced,
        ));

        assert_eq!(registry.status(), BridgeStatus::Connecting);
        let envelope = rx.try_recv().unwrap();
        let handshake = envelope.as_handshake().unwrap();
        assert_eq!(handshake.provider.id, "assistants");
        assert_eq!(
            handshake.bridge_status.as_ref().map(|s| s.status),
            Some(BridgeStatus::Connecting)
        );
    }

    #[test]
    fn test_if_changed_collapses_repeats() {
        let bus = EventBus::new();
        let (_subscription, mut rx) = bus.subscribe_channel();
        let (status, _registry) = publisher(&bus);

        status.announce(
            BridgeStatusSnapshot::new(BridgeStatus::Connecting),
            Announce::Forced,
        );
        assert!(!status.announce(
            BridgeStatusSnapshot::new(BridgeStatus::Connecting),
            Announce::IfChanged,
        ));
        assert!(status.announce(
            BridgeStatusSnapshot::new(BridgeStatus::Reconnecting),
            Announce::IfChanged,
        ));

        assert!(rx.try_recv().is_ok());
        let second = rx.try_recv().unwrap();
        assert_eq!(
            second.as_handshake().unwrap().bridge_status.as_ref().unwrap().status,
            BridgeStatus::Reconnecting
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_forced_republishes_same_status() {
        let bus = EventBus::new();
        let (_subscription, mut rx) = bus.subscribe_channel();
        let (status, _registry) = publisher(&bus);

        for attempt in 1..=2 {
            status.announce(
                BridgeStatusSnapshot::new(BridgeStatus::Reconnecting).with_attempt(attempt, 1),
                Announce::Forced,
            );
        }

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_set_silently_skips_bus() {
        let bus = EventBus::new();
        let (_subscription, mut rx) = bus.subscribe_channel();
        let (status, registry) = publisher(&bus);

        status.set_silently(BridgeStatusSnapshot::new(BridgeStatus::Offline).with_reason("x"));

        assert_eq!(registry.snapshot().reason.as_deref(), Some("x"));
        assert!(rx.try_recv().is_err());
    }
}

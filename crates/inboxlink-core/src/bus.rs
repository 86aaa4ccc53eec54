//! In-process publish/subscribe bus for stream envelopes.
//!
//! Delivery is synchronous, in registration order, with no buffering: a
//! subscriber only sees envelopes published while it is registered.
//!
//! Subscriber callbacks must not panic. The bus does not isolate subscribers
//! from each other; a panicking callback unwinds through `publish`. Async
//! consumers should use [`EventBus::subscribe_channel`], whose callback only
//! forwards into an unbounded queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;

use crate::envelope::StreamEnvelope;
use crate::ports::EnvelopePublisher;

type Callback = Arc<dyn Fn(&StreamEnvelope) + Send + Sync>;

struct Subscriber {
    id: u64,
    callback: Callback,
}

#[derive(Default)]
struct BusInner {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn remove(&self, id: u64) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|s| s.id != id);
    }
}

/// Fan-out channel of envelopes. Cloning shares the same subscriber set.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `envelope` to every current subscriber.
    ///
    /// The subscriber list is snapshotted first, so callbacks may subscribe or
    /// unsubscribe without deadlocking.
    pub fn publish(&self, envelope: &StreamEnvelope) {
        let callbacks: Vec<Callback> = {
            let subscribers = self
                .inner
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            subscribers.iter().map(|s| Arc::clone(&s.callback)).collect()
        };

        for callback in callbacks {
            callback(envelope);
        }
    }

    /// Register a callback. Dropping the returned handle unsubscribes it.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StreamEnvelope) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                id,
                callback: Arc::new(callback),
            });

        tracing::trace!(subscriber_id = id, "Bus subscriber registered");

        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Register a subscriber that forwards envelopes into an unbounded queue.
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<StreamEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |envelope| {
            // Receiver gone means the consumer is shutting down; its
            // subscription is about to be dropped.
            let _ = tx.send(envelope.clone());
        });
        (subscription, rx)
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl EnvelopePublisher for EventBus {
    fn publish(&self, envelope: StreamEnvelope) {
        Self::publish(self, &envelope);
    }
}

/// Disposer returned by [`EventBus::subscribe`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Remove the callback from the bus.
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.remove(self.id);
            tracing::trace!(subscriber_id = self.id, "Bus subscriber removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{ActionDetails, ActionEvent};
    use serde_json::Value;
    use std::sync::Mutex;

    fn action(kind: &str) -> StreamEnvelope {
        StreamEnvelope::action(
            ActionEvent {
                kind: kind.to_string(),
                timestamp: None,
                payload: Value::Null,
            },
            ActionDetails::default(),
        )
    }

    fn kind_of(envelope: &StreamEnvelope) -> String {
        envelope.as_action().map(|a| a.event.kind.clone()).unwrap()
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        // Should not panic even with no subscribers
        bus.publish(&action("noop"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_delivers_in_registration_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first_log = Arc::clone(&log);
        let _first = bus.subscribe(move |e| first_log.lock().unwrap().push(("first", kind_of(e))));
        let second_log = Arc::clone(&log);
        let _second =
            bus.subscribe(move |e| second_log.lock().unwrap().push(("second", kind_of(e))));

        bus.publish(&action("a"));
        bus.publish(&action("b"));

        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                ("first", "a".to_string()),
                ("second", "a".to_string()),
                ("first", "b".to_string()),
                ("second", "b".to_string()),
            ]
        );
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        bus.publish(&action("before"));

        let (_subscription, mut rx) = bus.subscribe_channel();
        assert!(rx.try_recv().is_err());

        bus.publish(&action("after"));
        assert_eq!(kind_of(&rx.try_recv().unwrap()), "after");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_and_drop_remove_subscriber() {
        let bus = EventBus::new();
        let a = bus.subscribe(|_| {});
        let b = bus.subscribe(|_| {});
        assert_eq!(bus.subscriber_count(), 2);

        a.unsubscribe();
        assert_eq!(bus.subscriber_count(), 1);

        drop(b);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscription_outliving_bus() {
        let bus = EventBus::new();
        let subscription = bus.subscribe(|_| {});
        drop(bus);
        // Should not panic when the bus is already gone
        drop(subscription);
    }

    #[test]
    fn test_callback_may_unsubscribe_during_publish() {
        let bus = EventBus::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let slot_in_callback = Arc::clone(&slot);
        let subscription = bus.subscribe(move |_| {
            slot_in_callback.lock().unwrap().take();
        });
        *slot.lock().unwrap() = Some(subscription);

        bus.publish(&action("a"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_channel_subscriber_receives_events() {
        let bus = EventBus::new();
        let (_subscription, mut rx) = bus.subscribe_channel();

        EnvelopePublisher::publish(&bus, action("draft_updated"));

        let envelope = rx.recv().await.unwrap();
        assert_eq!(kind_of(&envelope), "draft_updated");
    }
}

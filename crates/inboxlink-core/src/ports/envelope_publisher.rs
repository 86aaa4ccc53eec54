//! Envelope publisher trait for same-process producers.
//!
//! Producers (the upstream connector, webhook handlers) publish through this
//! trait so they do not depend on the bus type itself.

use crate::envelope::StreamEnvelope;

/// Trait for publishing envelopes to connected dashboards.
///
/// # Implementations
///
/// - `EventBus` - Fans out to every current subscriber
/// - `NoopPublisher` - For tests and contexts without listeners
pub trait EnvelopePublisher: Send + Sync {
    /// Publish an envelope.
    ///
    /// This method must not block.
    fn publish(&self, envelope: StreamEnvelope);
}

/// A publisher that discards every envelope.
#[derive(Debug, Clone, Default)]
pub struct NoopPublisher;

impl NoopPublisher {
    /// Create a new no-op publisher.
    pub const fn new() -> Self {
        Self
    }
}

impl EnvelopePublisher for NoopPublisher {
    fn publish(&self, _envelope: StreamEnvelope) {
        // Intentionally do nothing
    }
}

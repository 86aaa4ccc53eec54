//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the core domain expects from infrastructure.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No HTTP client types in any signature
//! - Upstream bodies are exposed as plain byte streams

pub mod envelope_publisher;
pub mod event_source;

pub use envelope_publisher::{EnvelopePublisher, NoopPublisher};
pub use event_source::{ByteStream, EventSourceClient};

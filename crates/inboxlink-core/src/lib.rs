#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod backoff;
pub mod bus;
pub mod config;
pub mod decoder;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod ports;
pub mod provider;
pub mod status;

// Re-export commonly used types for convenience
pub use backoff::ReconnectPolicy;
pub use bus::{EventBus, Subscription};
pub use config::BridgeConfig;
pub use decoder::decode_action_event;
pub use envelope::{
    ActionDetails, ActionEnvelope, ActionEvent, ActionResponse, HandshakeEnvelope, StreamEnvelope,
};
pub use error::{DecodeError, UpstreamError};
pub use frame::{FrameBuffer, SseFrame, parse_frames};
pub use ports::{ByteStream, EnvelopePublisher, EventSourceClient, NoopPublisher};
pub use provider::{Capability, ProviderDescriptor, ProviderInfo, ProviderKind};
pub use status::{BridgeStatus, BridgeStatusRegistry, BridgeStatusSnapshot};

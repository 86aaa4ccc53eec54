//! Data Transfer Objects (DTOs) for the HTTP API contract.
//!
//! Request and response bodies for the bridge control and publish routes.
//! Stream envelopes are domain types and are serialized as-is.

pub mod bridge;

pub use bridge::{
    BridgeStatusResponse, PublishResponse, StartBridgeRequest, StartBridgeResponse,
    StopBridgeRequest,
};

//! HTTP request handlers for the Axum web server.
//!
//! Handlers are thin wrappers that delegate to `BridgeService` and the
//! stream responder.

pub mod bridge;
pub mod events;

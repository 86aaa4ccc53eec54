#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod connector;
pub mod reqwest_source;
pub mod service;
pub mod status_publisher;

#[cfg(test)]
mod testing;

pub use connector::ConnectorHandle;
pub use reqwest_source::ReqwestEventSource;
pub use service::{BridgeError, BridgeService, StartOutcome, normalize_base_url};
pub use status_publisher::{Announce, StatusPublisher};

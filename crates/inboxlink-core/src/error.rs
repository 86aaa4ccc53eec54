//! Error types shared across the bridge crates.

use thiserror::Error;

/// Why an upstream connection attempt or session ended.
///
/// Every variant is transient from the bridge's point of view: the connector
/// logs it and schedules another attempt.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// The request could not be sent (DNS, refused, TLS, timeout).
    #[error("request failed: {0}")]
    Request(String),

    /// The upstream answered with a non-2xx status.
    #[error("upstream returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// The response had no body to stream.
    #[error("upstream response has no body")]
    MissingBody,

    /// Reading the body failed mid-stream.
    #[error("stream read failed: {0}")]
    Body(String),

    /// The upstream closed the stream without being asked to.
    #[error("stream closed by upstream")]
    StreamClosed,
}

/// Why a frame payload could not become an action envelope.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload is not an event message (type: {kind:?})")]
    NotAnEvent { kind: Option<String> },

    #[error("event record is malformed: {0}")]
    MalformedEvent(String),
}

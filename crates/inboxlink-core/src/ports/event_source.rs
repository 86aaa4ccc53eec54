//! Upstream event source port.
//!
//! The bridge opens its upstream through this trait so tests can inject
//! scripted byte streams in place of a real HTTP client.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::error::UpstreamError;

/// Body of an open upstream stream, chunk by chunk.
pub type ByteStream = BoxStream<'static, Result<Bytes, UpstreamError>>;

/// Opens streaming SSE requests.
#[async_trait]
pub trait EventSourceClient: Send + Sync {
    /// Issue `GET url` with `Accept: text/event-stream`.
    ///
    /// Resolves once response headers arrive. Non-2xx statuses and responses
    /// without a body are errors.
    async fn open(&self, url: &str) -> Result<ByteStream, UpstreamError>;
}

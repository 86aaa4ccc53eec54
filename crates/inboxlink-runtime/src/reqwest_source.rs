//! reqwest-backed upstream event source.
//!
//! Production implementation of [`EventSourceClient`]. Only the connect phase
//! is bounded by a timeout; the body is an open-ended stream.

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use inboxlink_core::{BridgeConfig, ByteStream, EventSourceClient, UpstreamError};
use reqwest::header::{ACCEPT, CACHE_CONTROL};

/// Opens upstream SSE streams with reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestEventSource {
    client: reqwest::Client,
}

impl ReqwestEventSource {
    /// Build a client from the bridge configuration.
    pub fn new(config: &BridgeConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent())
            .build()
            .map_err(|e| UpstreamError::Request(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventSourceClient for ReqwestEventSource {
    async fn open(&self, url: &str) -> Result<ByteStream, UpstreamError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| UpstreamError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        // reqwest always exposes a body; a declared empty one has nothing to stream.
        if response.content_length() == Some(0) {
            return Err(UpstreamError::MissingBody);
        }

        Ok(response
            .bytes_stream()
            .map_err(|e| UpstreamError::Body(e.to_string()))
            .boxed())
    }
}

//! Composition root for the Axum adapter.
//!
//! Builds the bridge service, the stream responder and the server itself.

use std::sync::Arc;

use anyhow::{Context, Result};
use inboxlink_core::{BridgeConfig, ProviderDescriptor};
use inboxlink_runtime::{BridgeService, ReqwestEventSource};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::sse::StreamResponder;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 9887;

/// Default bind address.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// CORS configuration for the server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port for the HTTP server.
    pub port: u16,
    /// Assistants service base URL. Unset means the mock provider.
    pub assistants_url: Option<String>,
    /// CORS configuration.
    pub cors: CorsConfig,
    /// Upstream bridge settings.
    pub bridge: BridgeConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            assistants_url: None,
            cors: CorsConfig::default(),
            bridge: BridgeConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Bridge events from an Assistants service at `url`.
    #[must_use]
    pub fn with_assistants_url(mut self, url: impl Into<String>) -> Self {
        self.assistants_url = Some(url.into());
        self
    }

    /// Set CORS to allow specific origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }

    #[must_use]
    pub fn with_bridge_config(mut self, bridge: BridgeConfig) -> Self {
        self.bridge = bridge;
        self
    }
}

/// Application context for the Axum adapter.
pub struct AxumContext {
    /// Upstream bridge, bus and status registry.
    pub bridge: Arc<BridgeService>,
    /// Opens downstream SSE streams.
    pub responder: StreamResponder,
}

/// Build the context. Starts the upstream bridge when an Assistants URL is
/// configured.
///
/// A failure to build the HTTP client is not fatal: the bridge stays offline
/// and downstream clients still get handshakes and local publishes.
pub async fn bootstrap(config: &ServerConfig, shutdown: CancellationToken) -> Result<AxumContext> {
    let provider = ProviderDescriptor::for_upstream(config.assistants_url.as_deref());

    let bridge = match ReqwestEventSource::new(&config.bridge) {
        Ok(client) => BridgeService::new(config.bridge.clone(), Arc::new(client), provider),
        Err(e) => {
            warn!("Upstream bridge disabled: {e}");
            BridgeService::without_client(config.bridge.clone(), provider)
        }
    };
    let bridge = Arc::new(bridge);

    match config.assistants_url.as_deref() {
        Some(url) => {
            let outcome = bridge
                .start(url)
                .await
                .context("Failed to start upstream bridge")?;
            info!(upstream = %url, ?outcome, "Upstream bridge configured");
        }
        None => info!("No Assistants URL configured, serving the mock provider"),
    }

    Ok(AxumContext {
        responder: StreamResponder::new(Arc::clone(&bridge), shutdown),
        bridge,
    })
}

/// Start the HTTP server and run until Ctrl-C.
///
/// Shutdown ends every open downstream stream, then stops the bridge.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let shutdown = CancellationToken::new();
    let ctx = bootstrap(&config, shutdown.clone()).await?;
    let bridge = Arc::clone(&ctx.bridge);
    let app = crate::routes::create_router(ctx, &config.cors);

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    info!("inboxlink listening on http://{}", listener.local_addr()?);

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                signal.cancel();
            }
            Err(e) => warn!("Failed to listen for shutdown signal: {e}"),
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    bridge.stop(Some("server shutting down")).await;
    info!("inboxlink shut down");
    Ok(())
}

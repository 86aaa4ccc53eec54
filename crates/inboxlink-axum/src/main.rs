//! `inboxlink` server binary.
//!
//! Flags fall back to `INBOXLINK_*` environment variables, which may also come
//! from a `.env` file in the working directory.

use std::time::Duration;

use clap::Parser;
use inboxlink_axum::{ServerConfig, start_server};
use inboxlink_core::BridgeConfig;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info,inboxlink=debug";

#[derive(Debug, Parser)]
#[command(name = "inboxlink", version, about = "Realtime inbox event bridge")]
struct Cli {
    /// Address to bind
    #[arg(long, env = "INBOXLINK_HOST", default_value = inboxlink_axum::bootstrap::DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "INBOXLINK_PORT", default_value_t = inboxlink_axum::bootstrap::DEFAULT_PORT)]
    port: u16,

    /// Assistants service base URL; without it the mock provider is served
    #[arg(long, env = "INBOXLINK_ASSISTANTS_URL")]
    assistants_url: Option<String>,

    /// Allowed CORS origins (comma separated); all origins when omitted
    #[arg(long = "cors-origin", env = "INBOXLINK_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,

    /// Idle seconds before a keepalive ping is sent downstream (at least 1)
    #[arg(
        long,
        env = "INBOXLINK_KEEPALIVE_SECS",
        default_value_t = 20,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    keepalive_secs: u64,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        let bridge =
            BridgeConfig::new().with_keepalive_interval(Duration::from_secs(self.keepalive_secs));
        let mut config = ServerConfig {
            host: self.host,
            port: self.port,
            ..ServerConfig::default()
        }
        .with_bridge_config(bridge);

        if let Some(url) = self.assistants_url {
            config = config.with_assistants_url(url);
        }
        if !self.cors_origins.is_empty() {
            config = config.with_allowed_origins(self.cors_origins);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = Cli::parse().into_config();
    start_server(config).await
}

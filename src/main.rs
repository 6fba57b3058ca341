//! Coral Club State Proxy
//!
//! Exposes the upstream key-value REST service to browser and CLI clients
//! through four JSON endpoints, and runs the state merge server-side.
//!
//! # Configuration
//!
//! Environment variables:
//! - `CORALCLUB_BIND`: Address to listen on (default: 0.0.0.0:8080)
//! - `CORALCLUB_KV_URL` / `KV_REST_API_URL`: Upstream REST base URL
//! - `CORALCLUB_KV_TOKEN` / `KV_REST_API_TOKEN`: Upstream bearer token
//! - `CORALCLUB_CONFIG`: Path to config file (default: ~/.config/coralclub/config.yaml)
//!
//! # Config File Format
//!
//! ```yaml
//! bind: 0.0.0.0:8080
//! kv_url: https://example-kv.upstash.io
//! kv_token: "your-token-here"
//! request_timeout_secs: 10
//! ```

use clap::Parser;
use coral_club_core::RestKvClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod server;

use config::Config;
use server::{create_router, AppState};

#[derive(Parser)]
#[command(name = "coralclub-server")]
#[command(version)]
#[command(about = "State proxy for the Coral Club booking widget", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Address to listen on, overrides config and environment
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "coralclub_server=info,coral_club_core=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config)?;
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }

    let (url, token) = config.upstream()?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;
    let kv = RestKvClient::new(url, token).with_http_client(http);
    tracing::info!("Upstream KV: {}", kv.base_url());

    let app = create_router(AppState::new(Arc::new(kv)));

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!("Starting server on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

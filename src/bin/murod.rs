//! murod: Muro daemon.
//!
//! Serves cached upstream resources over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use muro::server::config::{Config, Secrets};
use muro::server::{build_proxy, router};

/// Muro daemon: caching proxy for social-media read APIs.
#[derive(Parser)]
#[command(name = "murod")]
#[command(version = muro::PKG_VERSION)]
#[command(about = "Muro caching proxy daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: info for the daemon; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!(error = %e, "murod failed");
        return Err(e);
    }
    Ok(())
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let mut config = Config::load(args.config.as_deref())?;
    config.apply_env()?;
    config.validate()?;

    let mut secrets = Secrets::load()?;
    secrets.apply_env();

    let proxy = Arc::new(build_proxy(&config, &secrets)?);

    // Report what the store already holds before accepting requests
    proxy.warm();

    // Parse address
    let addr: SocketAddr = config
        .server
        .address
        .parse()
        .map_err(|e| muro::MuroError::Configuration(format!("Invalid address: {e}")))?;

    info!(version = muro::version_string(), %addr, "murod starting");

    let app = router(proxy, &config.server.cors_origin);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("murod stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

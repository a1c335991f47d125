//! Prefetch relay binary.

use clap::Parser;
use prefetch::prelude::*;
use prefetch::runtime::{DEFAULT_HOST, DEFAULT_PORT};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Local listen address
    #[arg(long, default_value = DEFAULT_HOST)]
    address: String,

    /// Local listen port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Give up on an outbound fetch after this many seconds
    #[arg(long)]
    fetch_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = RelayConfig::new().host(args.address).port(args.port);
    if let Some(secs) = args.fetch_timeout {
        config = config.fetch_timeout(Duration::from_secs(secs));
    }

    tracing::info!("Hello");

    let relay = RelayServer::new(config)?.bind().await?;
    relay
        .serve_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", err);
                std::future::pending::<()>().await;
            }
        })
        .await;

    tracing::info!("Bye");
    Ok(())
}

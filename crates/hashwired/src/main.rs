//! hashwired - Hashwire service daemon
//!
//! Serves run control (`/generate/*`) and data pulls (`/data/*`) over HTTP.

mod api;
mod http;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use hashwire_core::{init_tracing, level_for_verbosity, HashwireConfig, METRICS};
use tokio::net::TcpListener;
use tracing::info;

use crate::api::Api;

#[derive(Parser)]
#[command(name = "hashwired")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Hashwire service daemon", long_about = None)]
struct Cli {
    /// TOML configuration file (falls back to HASHWIRE_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration
    #[arg(long)]
    bind: Option<String>,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json, level_for_verbosity(cli.verbose));

    let mut config =
        HashwireConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    let api = Arc::new(Api::from_config(&config)?);
    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    info!(addr = %config.server.bind, "hashwired listening");

    tokio::select! {
        served = http::serve(listener, api) => served.context("listener failed")?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
    METRICS.flush();
    Ok(())
}

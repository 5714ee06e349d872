//! xo_server - tic-tac-toe match server
//!
//! Pairs two WebSocket connections per match and referees their moves.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use std::path::PathBuf;
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;
use xo_server::{GameServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, host, port } => run_server(config, host, port).await,
        Command::Config { config } => print_config(config),
    }
}

/// Run the match server until Ctrl-C
#[instrument(skip_all)]
async fn run_server(path: Option<PathBuf>, host: Option<String>, port: Option<u16>) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = ServerConfig::load(path.as_deref())?;
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }
    config.validate()?;

    info!(
        address = %config.bind_address(),
        waiting_timeout = ?config.waiting_timeout(),
        "Starting xo_server"
    );
    GameServer::new(config).serve().await
}

/// Print the effective configuration
fn print_config(path: Option<PathBuf>) -> Result<()> {
    let config = ServerConfig::load(path.as_deref())?;
    print!("{}", config.to_toml()?);
    Ok(())
}

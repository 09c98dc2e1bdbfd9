//! Quay CLI
//!
//! Command-line interface for the Quay task service.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "quay")]
#[command(about = "Quay task claim service CLI", long_about = None)]
struct Cli {
    /// Server URL
    #[arg(long, env = "QUAY_SERVER_URL", default_value = "http://localhost:8080")]
    server_url: String,

    /// Identity sent with every request (random when unset)
    #[arg(long, env = "QUAY_AGENT_ID")]
    agent_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::new(cli.server_url, cli.agent_id);

    handle_command(cli.command, &config).await
}

//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod pipeline;
mod task;

pub use pipeline::PipelineCommands;
pub use task::TaskCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Pipeline registry
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    /// Task submission, claiming and status updates
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
}

pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Pipeline { command } => pipeline::handle_pipeline_command(command, config).await,
        Commands::Task { command } => task::handle_task_command(command, config).await,
    }
}

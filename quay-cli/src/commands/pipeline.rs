//! Pipeline command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use quay_client::QuayClient;
use quay_core::domain::pipeline::Pipeline;
use quay_core::dto::pipeline::{PipelineFilter, RegisterPipeline};

use crate::config::Config;

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Register a pipeline version
    Register {
        name: String,
        version: String,

        /// Source location of the pipeline
        #[arg(long)]
        uri: Option<String>,

        /// Do not make this version the one "latest" resolves to
        #[arg(long)]
        no_current: bool,
    },
    /// List registered pipeline versions
    List {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        version: Option<String>,
        #[arg(long)]
        uri: Option<String>,
    },
    /// Show all versions of a pipeline
    Get { name: String },
    /// Make a registered version the current one
    Promote { name: String, version: String },
}

pub async fn handle_pipeline_command(command: PipelineCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        PipelineCommands::Register {
            name,
            version,
            uri,
            no_current,
        } => {
            let req = RegisterPipeline {
                name,
                version,
                uri,
                make_current: !no_current,
            };
            register_pipeline(&client, req).await
        }
        PipelineCommands::List { name, version, uri } => {
            list_pipelines(&client, PipelineFilter { name, version, uri }).await
        }
        PipelineCommands::Get { name } => get_pipeline(&client, &name).await,
        PipelineCommands::Promote { name, version } => {
            promote_pipeline(&client, &name, &version).await
        }
    }
}

async fn register_pipeline(client: &QuayClient, req: RegisterPipeline) -> Result<()> {
    let make_current = req.make_current;
    let pipeline = client.register_pipeline(&req).await?;

    println!(
        "{} Registered {}",
        "✓".green(),
        format!("{}@{}", pipeline.name, pipeline.version).cyan()
    );
    if make_current {
        println!("  latest now resolves to {}", pipeline.version.bold());
    }

    Ok(())
}

async fn list_pipelines(client: &QuayClient, filter: PipelineFilter) -> Result<()> {
    let pipelines = client.list_pipelines(&filter).await?;

    if pipelines.is_empty() {
        println!("{}", "No pipelines found.".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("Found {} pipeline version(s):", pipelines.len()).bold()
    );
    println!();
    for pipeline in &pipelines {
        print_pipeline_summary(pipeline, false);
    }

    Ok(())
}

async fn get_pipeline(client: &QuayClient, name: &str) -> Result<()> {
    let versions = client.get_pipeline(name).await?;

    println!("{}", format!("Pipeline {}", versions.name).bold());
    match &versions.current {
        Some(current) => println!("  Current: {}", current.green()),
        None => println!("  Current: {}", "none".yellow()),
    }
    println!();

    for pipeline in &versions.versions {
        let is_current = versions.current.as_deref() == Some(pipeline.version.as_str());
        print_pipeline_summary(pipeline, is_current);
    }

    Ok(())
}

async fn promote_pipeline(client: &QuayClient, name: &str, version: &str) -> Result<()> {
    let pipeline = client.set_current_version(name, version).await?;

    println!(
        "{} {} latest -> {}",
        "✓".green(),
        pipeline.name.cyan(),
        pipeline.version.bold()
    );

    Ok(())
}

fn print_pipeline_summary(pipeline: &Pipeline, is_current: bool) {
    let marker = if is_current { "*".green() } else { "▸".cyan() };

    println!("  {} {}@{}", marker, pipeline.name, pipeline.version.bold());
    if let Some(uri) = &pipeline.uri {
        println!("    URI:     {}", uri.dimmed());
    }
    println!(
        "    Created: {}",
        pipeline
            .created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}

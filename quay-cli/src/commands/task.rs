//! Task command handlers
//!
//! Submitting, claiming and updating tasks, plus read-only listings.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use quay_client::QuayClient;
use quay_core::domain::event::TaskEvent;
use quay_core::domain::pipeline::{PipelineRef, VersionSpec};
use quay_core::domain::task::{self, Task, TaskStatus};
use quay_core::dto::task::{CreateTask, TaskFilter, UpdateTask};

use crate::config::Config;

/// Task subcommands
#[derive(Subcommand)]
pub enum TaskCommands {
    /// Submit a new pending task
    Create {
        /// Pipeline name
        pipeline: String,
        job_descriptor: String,

        /// Pipeline version, or "latest"
        #[arg(long, default_value = "latest")]
        version: String,

        /// Task definition as JSON
        #[arg(long)]
        definition: Option<String>,

        #[arg(long)]
        prefix: Option<String>,
    },
    /// Set the status of a task
    Update {
        pipeline: String,
        job_descriptor: String,
        status: TaskStatus,

        #[arg(long, default_value = "latest")]
        version: String,
    },
    /// Claim pending tasks for this agent
    Claim {
        pipeline: String,

        #[arg(long, default_value = "latest")]
        version: String,

        /// Maximum number of tasks to claim
        #[arg(short, long, default_value_t = 1)]
        num_tasks: i64,
    },
    /// List tasks
    List {
        #[arg(long)]
        pipeline: Option<String>,
        #[arg(long)]
        version: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    /// Show the audit trail of a task
    Events { id: i64 },
}

pub async fn handle_task_command(command: TaskCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        TaskCommands::Create {
            pipeline,
            job_descriptor,
            version,
            definition,
            prefix,
        } => {
            let definition = parse_definition(definition.as_deref())?;
            let req = CreateTask {
                pipeline: pipeline_ref(pipeline, version),
                job_descriptor,
                definition,
                status: None,
                prefix,
            };
            create_task(&client, req).await
        }
        TaskCommands::Update {
            pipeline,
            job_descriptor,
            status,
            version,
        } => {
            let req = UpdateTask {
                pipeline: pipeline_ref(pipeline, version),
                job_descriptor,
                status,
            };
            update_task(&client, req).await
        }
        TaskCommands::Claim {
            pipeline,
            version,
            num_tasks,
        } => claim_tasks(&client, pipeline_ref(pipeline, version), num_tasks).await,
        TaskCommands::List {
            pipeline,
            version,
            status,
        } => {
            let filter = TaskFilter {
                pipeline_name: pipeline,
                pipeline_version: version,
                status,
            };
            list_tasks(&client, filter).await
        }
        TaskCommands::Events { id } => show_events(&client, id).await,
    }
}

fn pipeline_ref(name: String, version: String) -> PipelineRef {
    PipelineRef {
        name,
        version: VersionSpec::from(version),
        uri: None,
    }
}

fn parse_definition(raw: Option<&str>) -> Result<serde_json::Value> {
    match raw {
        Some(raw) => serde_json::from_str(raw).context("--definition is not valid JSON"),
        None => Ok(serde_json::Value::Null),
    }
}

async fn create_task(client: &QuayClient, req: CreateTask) -> Result<()> {
    let task = client.create_task(&req).await?;

    println!(
        "{} Created task {} ({})",
        "✓".green(),
        task.job_descriptor.cyan(),
        task.id.to_string().dimmed()
    );

    Ok(())
}

async fn update_task(client: &QuayClient, req: UpdateTask) -> Result<()> {
    let task = client.update_task(&req).await?;

    println!(
        "{} Task {} is now {}",
        "✓".green(),
        task.job_descriptor.cyan(),
        colorize_status(&task.status)
    );

    Ok(())
}

async fn claim_tasks(client: &QuayClient, pipeline: PipelineRef, num_tasks: i64) -> Result<()> {
    let tasks = client.claim_tasks(&pipeline, num_tasks).await?;

    if tasks.is_empty() {
        println!("{}", format!("No pending tasks for {}.", pipeline).yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "Claimed {} task(s) as {}:",
            tasks.len(),
            client.agent_id()
        )
        .bold()
    );
    println!();
    for task in &tasks {
        print_task_details(task);
    }

    Ok(())
}

async fn list_tasks(client: &QuayClient, filter: TaskFilter) -> Result<()> {
    let tasks = client.list_tasks(&filter).await?;

    if tasks.is_empty() {
        println!("{}", "No tasks found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} task(s):", tasks.len()).bold());
    println!();
    for task in &tasks {
        print_task_summary(task);
    }

    Ok(())
}

async fn show_events(client: &QuayClient, task_id: i64) -> Result<()> {
    let events = client.task_events(task_id).await?;

    println!("{}", format!("Events for task {}:", task_id).bold());
    for event in &events {
        print_event(event);
    }

    Ok(())
}

fn print_task_summary(task: &Task) {
    println!(
        "  {} {} {}",
        "▸".cyan(),
        task.job_descriptor,
        task.id.to_string().dimmed()
    );
    println!("    Pipeline: {}", task.pipeline.to_string().dimmed());
    println!("    Status:   {}", colorize_status(&task.status));
    if let Some(agent) = &task.claimed_by {
        println!("    Agent:    {}", agent.as_str().dimmed());
    }
    println!();
}

/// Full task including its definition, as an agent needs it to run the job
fn print_task_details(task: &Task) {
    print_task_summary(task);

    if let Some(prefix) = &task.prefix {
        println!("    Prefix:   {}", prefix);
    }
    if !task.definition.is_null() {
        match serde_json::to_string_pretty(&task.definition) {
            Ok(pretty) => println!("{}", pretty),
            Err(_) => println!("{:?}", task.definition),
        }
        println!();
    }
}

fn print_event(event: &TaskEvent) {
    println!(
        "  {} {} {}",
        event
            .recorded_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed(),
        event.agent_id.as_str().cyan(),
        event.change
    );
}

fn colorize_status(status: &TaskStatus) -> colored::ColoredString {
    let status_str = status.as_str();
    match status_str {
        task::PENDING => status_str.yellow(),
        task::CLAIMED | task::RUNNING => status_str.cyan(),
        task::DONE => status_str.green(),
        task::FAILED => status_str.red(),
        task::CANCELLED => status_str.dimmed(),
        _ => status_str.normal(),
    }
}

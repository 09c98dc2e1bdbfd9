//! Task Service
//!
//! Task creation, status updates and read-only queries.
//!
//! Status updates are deliberately permissive: any well-formed status may be
//! written to an existing task. Only `PENDING` (on creation) and the claim
//! path give states a special meaning.

use quay_core::domain::agent::AgentId;
use quay_core::domain::event::TaskEvent;
use quay_core::domain::task::Task;
use quay_core::dto::task::{CreateTask, TaskFilter, UpdateTask};
use thiserror::Error;

use crate::repository::{NewTask, Store, StoreError};
use crate::service::registry::{self, RegistryError};

const MAX_DESCRIPTOR_LENGTH: usize = 255;
const MAX_PREFIX_LENGTH: usize = 255;

/// Service error type
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0}")]
    UnknownPipeline(String),

    #[error("{0}")]
    PipelineConflict(String),

    #[error("task {job_descriptor} already exists for pipeline {pipeline}")]
    DuplicateTask {
        pipeline: String,
        job_descriptor: String,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    InvalidState(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RegistryError> for TaskError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_)
            | RegistryError::VersionNotFound { .. }
            | RegistryError::NoCurrentVersion(_) => TaskError::UnknownPipeline(err.to_string()),
            RegistryError::Conflict(_) | RegistryError::Duplicate { .. } => {
                TaskError::PipelineConflict(err.to_string())
            }
            RegistryError::ValidationError(msg) => TaskError::InvalidInput(msg),
            RegistryError::Store(err) => TaskError::Store(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, TaskError>;

/// Submit a new task in the pending state
pub async fn create_task(store: &Store, agent: &AgentId, req: CreateTask) -> Result<Task> {
    validate_create_request(&req)?;

    let pipeline = registry::resolve(store, &req.pipeline).await?;

    let new_task = NewTask {
        job_descriptor: req.job_descriptor,
        definition: req.definition,
        prefix: req.prefix,
    };
    let job_descriptor = new_task.job_descriptor.clone();

    let task = store
        .tasks
        .insert(&pipeline, new_task, agent)
        .await
        .map_err(|e| match e {
            StoreError::Duplicate(_) => TaskError::DuplicateTask {
                pipeline: format!("{}@{}", pipeline.name, pipeline.version),
                job_descriptor,
            },
            other => TaskError::Store(other),
        })?;

    tracing::info!(
        "Task created: {} ({}) for pipeline {}@{} by {}",
        task.job_descriptor,
        task.id,
        pipeline.name,
        pipeline.version,
        agent
    );

    Ok(task)
}

/// Overwrite the status of an existing task
pub async fn update_task(store: &Store, agent: &AgentId, req: UpdateTask) -> Result<Task> {
    validate_descriptor(&req.job_descriptor)?;

    let pipeline = registry::resolve(store, &req.pipeline).await?;

    let existing = store
        .tasks
        .find(&pipeline, &req.job_descriptor)
        .await?
        .ok_or_else(|| {
            TaskError::NotFound(format!(
                "Task {} not found for pipeline {}@{}",
                req.job_descriptor, pipeline.name, pipeline.version
            ))
        })?;

    if let Some(owner) = &existing.claimed_by {
        if owner != agent {
            tracing::warn!(
                "Task {} claimed by {} is being updated by {}",
                existing.id,
                owner,
                agent
            );
        }
    }

    let task = store
        .tasks
        .update_status(existing.id, &req.status, agent)
        .await?
        .ok_or_else(|| TaskError::NotFound(format!("Task {} not found", existing.id)))?;

    tracing::info!(
        "Task {} moved from {} to {} by {}",
        task.id,
        existing.status,
        task.status,
        agent
    );

    Ok(task)
}

/// List tasks, optionally filtered by pipeline and status
pub async fn list_tasks(store: &Store, filter: &TaskFilter) -> Result<Vec<Task>> {
    let tasks = store.tasks.list(filter).await?;
    Ok(tasks)
}

/// Audit trail of a task
pub async fn task_events(store: &Store, task_id: i64) -> Result<Vec<TaskEvent>> {
    store
        .tasks
        .find_by_id(task_id)
        .await?
        .ok_or_else(|| TaskError::NotFound(format!("Task {} not found", task_id)))?;

    let events = store.tasks.events(task_id).await?;
    Ok(events)
}

// =============================================================================
// Validation
// =============================================================================

fn validate_descriptor(job_descriptor: &str) -> Result<()> {
    if job_descriptor.trim().is_empty() {
        return Err(TaskError::InvalidInput(
            "Job descriptor cannot be empty".to_string(),
        ));
    }

    if job_descriptor.len() > MAX_DESCRIPTOR_LENGTH {
        return Err(TaskError::InvalidInput(format!(
            "Job descriptor is too long (max {} characters)",
            MAX_DESCRIPTOR_LENGTH
        )));
    }

    Ok(())
}

fn validate_create_request(req: &CreateTask) -> Result<()> {
    validate_descriptor(&req.job_descriptor)?;

    if let Some(status) = &req.status {
        if !status.is_pending() {
            return Err(TaskError::InvalidState(format!(
                "Tasks must be created in the PENDING state, not {}",
                status
            )));
        }
    }

    if let Some(prefix) = &req.prefix {
        if prefix.len() > MAX_PREFIX_LENGTH {
            return Err(TaskError::InvalidInput(format!(
                "Prefix is too long (max {} characters)",
                MAX_PREFIX_LENGTH
            )));
        }
    }

    Ok(())
}

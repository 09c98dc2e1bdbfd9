//! Task API Handlers
//!
//! HTTP endpoints for task submission, claiming and status updates.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use quay_core::domain::event::TaskEvent;
use quay_core::domain::pipeline::PipelineRef;
use quay_core::domain::task::Task;
use quay_core::dto::task::{ClaimQuery, CreateTask, TaskFilter, UpdateTask};

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::identity::Caller;
use crate::service::{claim_service, task_service};

const DEFAULT_CLAIM_COUNT: i64 = 1;

// =============================================================================
// Task Lifecycle Endpoints
// =============================================================================

/// POST /tasks
/// Submit a new pending task
pub async fn create_task(
    State(state): State<AppState>,
    Caller(agent): Caller,
    ApiJson(req): ApiJson<CreateTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    tracing::debug!(
        "Creating task {} for pipeline {}",
        req.job_descriptor,
        req.pipeline
    );

    let task = task_service::create_task(&state.store, &agent, req).await?;

    Ok((StatusCode::CREATED, Json(task)))
}

/// PUT /tasks
/// Overwrite the status of a task
pub async fn update_task(
    State(state): State<AppState>,
    Caller(agent): Caller,
    ApiJson(req): ApiJson<UpdateTask>,
) -> ApiResult<Json<Task>> {
    tracing::debug!(
        "Updating task {} of {} to {}",
        req.job_descriptor,
        req.pipeline,
        req.status
    );

    let task = task_service::update_task(&state.store, &agent, req).await?;
    Ok(Json(task))
}

/// POST /tasks/claim?num_tasks=N
/// Claim up to N pending tasks of the given pipeline
pub async fn claim_tasks(
    State(state): State<AppState>,
    Caller(agent): Caller,
    ApiQuery(query): ApiQuery<ClaimQuery>,
    ApiJson(reference): ApiJson<PipelineRef>,
) -> ApiResult<Json<Vec<Task>>> {
    let num_tasks = query.num_tasks.unwrap_or(DEFAULT_CLAIM_COUNT);

    let outcome = claim_service::claim_tasks(
        &state.store,
        &agent,
        &reference,
        num_tasks,
        state.max_claim,
    )
    .await?;

    Ok(Json(outcome.tasks))
}

// =============================================================================
// Query Endpoints
// =============================================================================

/// GET /tasks
/// List tasks, optionally filtered by pipeline and status
pub async fn list_tasks(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<TaskFilter>,
) -> ApiResult<Json<Vec<Task>>> {
    tracing::debug!("Listing tasks: {:?}", filter);

    let tasks = task_service::list_tasks(&state.store, &filter).await?;
    Ok(Json(tasks))
}

/// GET /tasks/{id}/events
pub async fn task_events(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vec<TaskEvent>>> {
    tracing::debug!("Getting events for task {}", id);

    let events = task_service::task_events(&state.store, id).await?;
    Ok(Json(events))
}

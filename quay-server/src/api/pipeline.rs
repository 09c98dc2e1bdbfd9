//! Pipeline API Handlers
//!
//! HTTP endpoints for the pipeline registry.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use quay_core::domain::pipeline::Pipeline;
use quay_core::dto::pipeline::{
    PipelineFilter, PipelineVersions, RegisterPipeline, SetCurrentVersion,
};

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::identity::Caller;
use crate::service::registry_service;

/// POST /pipelines
/// Register a new pipeline version
pub async fn register_pipeline(
    State(state): State<AppState>,
    Caller(agent): Caller,
    ApiJson(req): ApiJson<RegisterPipeline>,
) -> ApiResult<(StatusCode, Json<Pipeline>)> {
    tracing::info!(
        "Registering pipeline {}@{} (requested by {})",
        req.name,
        req.version,
        agent
    );

    let pipeline = registry_service::register_pipeline(&state.store, req).await?;

    Ok((StatusCode::CREATED, Json(pipeline)))
}

/// GET /pipelines
/// List registry entries, optionally filtered
pub async fn list_pipelines(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<PipelineFilter>,
) -> ApiResult<Json<Vec<Pipeline>>> {
    tracing::debug!("Listing pipelines: {:?}", filter);

    let pipelines = registry_service::list_pipelines(&state.store, &filter).await?;
    Ok(Json(pipelines))
}

/// GET /pipelines/{name}
pub async fn get_pipeline(
    State(state): State<AppState>,
    ApiPath(name): ApiPath<String>,
) -> ApiResult<Json<PipelineVersions>> {
    tracing::debug!("Getting pipeline: {}", name);

    let versions = registry_service::get_versions(&state.store, &name).await?;
    Ok(Json(versions))
}

/// PUT /pipelines/{name}/current
/// Point "latest" at a registered version
pub async fn set_current(
    State(state): State<AppState>,
    Caller(agent): Caller,
    ApiPath(name): ApiPath<String>,
    ApiJson(req): ApiJson<SetCurrentVersion>,
) -> ApiResult<Json<Pipeline>> {
    tracing::info!(
        "Promoting {}@{} to current (requested by {})",
        name,
        req.version,
        agent
    );

    let pipeline = registry_service::set_current(&state.store, &name, &req.version).await?;
    Ok(Json(pipeline))
}

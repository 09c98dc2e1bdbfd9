//! API Module
//!
//! HTTP API layer of the task service.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod extract;
pub mod health;
pub mod identity;
pub mod pipeline;
pub mod task;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::repository::Store;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    /// Upper bound applied to `num_tasks` on claims
    pub max_claim: usize,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Pipeline registry
        .route(
            "/pipelines",
            post(pipeline::register_pipeline).get(pipeline::list_pipelines),
        )
        .route("/pipelines/{name}", get(pipeline::get_pipeline))
        .route("/pipelines/{name}/current", put(pipeline::set_current))
        // Tasks
        .route(
            "/tasks",
            get(task::list_tasks)
                .post(task::create_task)
                .put(task::update_task),
        )
        .route("/tasks/claim", post(task::claim_tasks))
        .route("/tasks/{id}/events", get(task::task_events))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

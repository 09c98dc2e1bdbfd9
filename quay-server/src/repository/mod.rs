//! Repository Module
//!
//! Data access layer for the server. Each repository trait covers one domain
//! entity and has a Postgres implementation plus an in-memory one used for
//! development and tests. Services only ever see the traits, bundled in a
//! [`Store`].

pub mod memory;
pub mod pipeline;
pub mod task;

use std::sync::Arc;

use async_trait::async_trait;
use quay_core::domain::agent::AgentId;
use quay_core::domain::event::TaskEvent;
use quay_core::domain::pipeline::Pipeline;
use quay_core::domain::task::{Task, TaskStatus};
use quay_core::dto::pipeline::{PipelineFilter, RegisterPipeline};
use quay_core::dto::task::TaskFilter;
use sqlx::PgPool;
use thiserror::Error;

pub use memory::MemoryStore;
pub use pipeline::PgPipelineRepository;
pub use task::PgTaskRepository;

/// Storage error type
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// A stored row could not be mapped back to a domain value
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::Duplicate(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Fields of a task chosen by its creator
#[derive(Debug, Clone)]
pub struct NewTask {
    pub job_descriptor: String,
    pub definition: serde_json::Value,
    pub prefix: Option<String>,
}

/// Result of one reservation attempt
///
/// Candidates that another claimant committed first are counted in `lost`
/// rather than failing the batch.
#[derive(Debug, Clone, Default)]
pub struct Reservation {
    pub claimed: Vec<Task>,
    pub lost: usize,
}

/// Pipeline registry storage
#[async_trait]
pub trait PipelineRepository: Send + Sync {
    /// Register a concrete version, optionally making it current in the same write
    async fn register(&self, req: &RegisterPipeline) -> StoreResult<Pipeline>;

    /// Entry with the exact `(name, version)`
    async fn find(&self, name: &str, version: &str) -> StoreResult<Option<Pipeline>>;

    /// Entry the "latest" pointer of `name` designates
    async fn find_current(&self, name: &str) -> StoreResult<Option<Pipeline>>;

    /// All versions registered under `name`, oldest first
    async fn versions(&self, name: &str) -> StoreResult<Vec<Pipeline>>;

    async fn list(&self, filter: &PipelineFilter) -> StoreResult<Vec<Pipeline>>;

    /// Point "latest" of `name` at `version`. Returns false if no such entry exists.
    async fn set_current(&self, name: &str, version: &str) -> StoreResult<bool>;
}

/// Task storage
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Store a pending, unclaimed task. Fails with `Duplicate` when the
    /// pipeline already has a task with the same descriptor.
    async fn insert(&self, pipeline: &Pipeline, task: NewTask, agent: &AgentId)
    -> StoreResult<Task>;

    /// Up to `limit` pending, unclaimed tasks of `pipeline`, oldest first. Read-only.
    async fn select_eligible(&self, pipeline: &Pipeline, limit: usize) -> StoreResult<Vec<Task>>;

    /// Atomically claim those of `task_ids` that are still pending and
    /// unclaimed at commit time.
    async fn reserve(&self, task_ids: &[i64], agent: &AgentId) -> StoreResult<Reservation>;

    async fn find(&self, pipeline: &Pipeline, job_descriptor: &str) -> StoreResult<Option<Task>>;

    async fn find_by_id(&self, task_id: i64) -> StoreResult<Option<Task>>;

    /// Overwrite the status. An unclaimed task moved out of `PENDING` is
    /// attributed to `agent`. Returns `None` if the task does not exist.
    async fn update_status(
        &self,
        task_id: i64,
        status: &TaskStatus,
        agent: &AgentId,
    ) -> StoreResult<Option<Task>>;

    /// Tasks matching `filter`, ordered by creation time then id
    async fn list(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>>;

    async fn events(&self, task_id: i64) -> StoreResult<Vec<TaskEvent>>;
}

/// Handle to both repositories, shared by every request
#[derive(Clone)]
pub struct Store {
    pub pipelines: Arc<dyn PipelineRepository>,
    pub tasks: Arc<dyn TaskRepository>,
}

impl Store {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            pipelines: Arc::new(PgPipelineRepository::new(pool.clone())),
            tasks: Arc::new(PgTaskRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        let store = MemoryStore::new();
        Self {
            pipelines: Arc::new(store.clone()),
            tasks: Arc::new(store),
        }
    }
}

//! Task Repository
//!
//! Postgres storage for tasks and their audit events.

use async_trait::async_trait;
use quay_core::domain::agent::AgentId;
use quay_core::domain::event::{self, TaskEvent};
use quay_core::domain::pipeline::{Pipeline, PipelineRef, VersionSpec};
use quay_core::domain::task::{self, Task, TaskStatus};
use quay_core::dto::task::TaskFilter;
use sqlx::PgPool;

use super::{NewTask, Reservation, StoreError, StoreResult, TaskRepository};

/// Task columns joined with the owning pipeline
const TASK_SELECT: &str = r#"
    SELECT t.task_id, t.job_descriptor, t.definition, t.status, t.claimed_by, t.prefix,
           t.created_at, t.updated_at,
           p.name AS pipeline_name, p.version AS pipeline_version, p.uri AS pipeline_uri
    FROM tasks t
    JOIN pipelines p ON p.pipeline_id = t.pipeline_id
"#;

pub struct PgTaskRepository {
    pool: PgPool,
}

impl PgTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn insert(
        &self,
        pipeline: &Pipeline,
        new_task: NewTask,
        agent: &AgentId,
    ) -> StoreResult<Task> {
        let now = chrono::Utc::now();
        let mut tx = self.pool.begin().await?;

        let task_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tasks (pipeline_id, job_descriptor, definition, status, prefix,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING task_id
            "#,
        )
        .bind(pipeline.id)
        .bind(&new_task.job_descriptor)
        .bind(&new_task.definition)
        .bind(task::PENDING)
        .bind(&new_task.prefix)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        record_events(&mut tx, &[task_id], agent, event::CREATED, now).await?;
        tx.commit().await?;

        Ok(Task {
            id: task_id,
            pipeline: pipeline.to_ref(),
            job_descriptor: new_task.job_descriptor,
            definition: new_task.definition,
            status: TaskStatus::pending(),
            claimed_by: None,
            prefix: new_task.prefix,
            created: now,
            updated: now,
        })
    }

    async fn select_eligible(&self, pipeline: &Pipeline, limit: usize) -> StoreResult<Vec<Task>> {
        let query = format!(
            r#"{TASK_SELECT}
            WHERE t.pipeline_id = $1 AND t.status = $2 AND t.claimed_by IS NULL
            ORDER BY t.created_at ASC, t.task_id ASC
            LIMIT $3
            "#
        );

        let rows = sqlx::query_as::<_, TaskRow>(&query)
            .bind(pipeline.id)
            .bind(task::PENDING)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Task::try_from).collect()
    }

    async fn reserve(&self, task_ids: &[i64], agent: &AgentId) -> StoreResult<Reservation> {
        if task_ids.is_empty() {
            return Ok(Reservation::default());
        }

        let now = chrono::Utc::now();
        let mut tx = self.pool.begin().await?;

        // Candidates are locked in id order; rows another claimant holds are
        // skipped and count as lost, as do rows that fail the re-check.
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            WITH candidates AS (
                SELECT task_id FROM tasks
                WHERE task_id = ANY($4) AND status = $5 AND claimed_by IS NULL
                ORDER BY task_id
                FOR UPDATE SKIP LOCKED
            ),
            claimed AS (
                UPDATE tasks u
                SET status = $1, claimed_by = $2, updated_at = $3
                FROM candidates c
                WHERE u.task_id = c.task_id
                RETURNING u.*
            )
            SELECT t.task_id, t.job_descriptor, t.definition, t.status, t.claimed_by, t.prefix,
                   t.created_at, t.updated_at,
                   p.name AS pipeline_name, p.version AS pipeline_version,
                   p.uri AS pipeline_uri
            FROM claimed t
            JOIN pipelines p ON p.pipeline_id = t.pipeline_id
            ORDER BY t.created_at ASC, t.task_id ASC
            "#,
        )
        .bind(task::CLAIMED)
        .bind(agent.as_str())
        .bind(now)
        .bind(task_ids)
        .bind(task::PENDING)
        .fetch_all(&mut *tx)
        .await?;

        let claimed_ids: Vec<i64> = rows.iter().map(|r| r.task_id).collect();
        record_events(&mut tx, &claimed_ids, agent, event::CLAIMED, now).await?;
        tx.commit().await?;

        let claimed = rows
            .into_iter()
            .map(Task::try_from)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Reservation {
            lost: task_ids.len() - claimed.len(),
            claimed,
        })
    }

    async fn find(&self, pipeline: &Pipeline, job_descriptor: &str) -> StoreResult<Option<Task>> {
        let query = format!("{TASK_SELECT} WHERE t.pipeline_id = $1 AND t.job_descriptor = $2");

        let row = sqlx::query_as::<_, TaskRow>(&query)
            .bind(pipeline.id)
            .bind(job_descriptor)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Task::try_from).transpose()
    }

    async fn find_by_id(&self, task_id: i64) -> StoreResult<Option<Task>> {
        let query = format!("{TASK_SELECT} WHERE t.task_id = $1");

        let row = sqlx::query_as::<_, TaskRow>(&query)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Task::try_from).transpose()
    }

    async fn update_status(
        &self,
        task_id: i64,
        status: &TaskStatus,
        agent: &AgentId,
    ) -> StoreResult<Option<Task>> {
        let now = chrono::Utc::now();
        let mut tx = self.pool.begin().await?;

        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE tasks
            SET status = $1,
                claimed_by = COALESCE(claimed_by, CASE WHEN $1 <> $2::VARCHAR THEN $3::VARCHAR END),
                updated_at = $4
            WHERE task_id = $5
            RETURNING task_id
            "#,
        )
        .bind(status.as_str())
        .bind(task::PENDING)
        .bind(agent.as_str())
        .bind(now)
        .bind(task_id)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let change = event::status_change(status);
        record_events(&mut tx, &[task_id], agent, &change, now).await?;

        let query = format!("{TASK_SELECT} WHERE t.task_id = $1");
        let row = sqlx::query_as::<_, TaskRow>(&query)
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;

        row.map(Task::try_from).transpose()
    }

    async fn list(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        let query = format!(
            r#"{TASK_SELECT}
            WHERE ($1::TEXT IS NULL OR p.name = $1)
              AND ($2::TEXT IS NULL OR p.version = $2)
              AND ($3::TEXT IS NULL OR t.status = $3)
            ORDER BY t.created_at ASC, t.task_id ASC
            "#
        );

        let rows = sqlx::query_as::<_, TaskRow>(&query)
            .bind(&filter.pipeline_name)
            .bind(&filter.pipeline_version)
            .bind(filter.status.as_ref().map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Task::try_from).collect()
    }

    async fn events(&self, task_id: i64) -> StoreResult<Vec<TaskEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT event_id, task_id, agent_id, change, recorded_at
            FROM task_events
            WHERE task_id = $1
            ORDER BY recorded_at ASC, event_id ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}

async fn record_events(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    task_ids: &[i64],
    agent: &AgentId,
    change: &str,
    at: chrono::DateTime<chrono::Utc>,
) -> Result<(), sqlx::Error> {
    if task_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO task_events (task_id, agent_id, change, recorded_at)
        SELECT id, $2, $3, $4 FROM UNNEST($1::BIGINT[]) AS id
        "#,
    )
    .bind(task_ids)
    .bind(agent.as_str())
    .bind(change)
    .bind(at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct TaskRow {
    task_id: i64,
    job_descriptor: String,
    definition: serde_json::Value,
    status: String,
    claimed_by: Option<String>,
    prefix: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    pipeline_name: String,
    pipeline_version: String,
    pipeline_uri: Option<String>,
}

impl TryFrom<TaskRow> for Task {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::parse(&row.status)
            .map_err(|e| StoreError::Corrupt(format!("task {}: {}", row.task_id, e)))?;

        Ok(Task {
            id: row.task_id,
            pipeline: PipelineRef {
                name: row.pipeline_name,
                version: VersionSpec::Exact(row.pipeline_version),
                uri: row.pipeline_uri,
            },
            job_descriptor: row.job_descriptor,
            definition: row.definition,
            status,
            claimed_by: row.claimed_by.map(AgentId::from),
            prefix: row.prefix,
            created: row.created_at,
            updated: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    event_id: i64,
    task_id: i64,
    agent_id: String,
    change: String,
    recorded_at: chrono::DateTime<chrono::Utc>,
}

impl From<EventRow> for TaskEvent {
    fn from(row: EventRow) -> Self {
        TaskEvent {
            id: row.event_id,
            task_id: row.task_id,
            agent_id: AgentId::from(row.agent_id),
            change: row.change,
            recorded_at: row.recorded_at,
        }
    }
}

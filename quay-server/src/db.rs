use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Pipeline registry
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipelines (
            pipeline_id BIGSERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            version VARCHAR(255) NOT NULL,
            uri TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            UNIQUE (name, version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // "latest" indirection
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_current (
            name VARCHAR(255) PRIMARY KEY,
            version VARCHAR(255) NOT NULL,
            FOREIGN KEY (name, version) REFERENCES pipelines(name, version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            task_id BIGSERIAL PRIMARY KEY,
            pipeline_id BIGINT NOT NULL REFERENCES pipelines(pipeline_id),
            job_descriptor VARCHAR(255) NOT NULL,
            definition JSONB NOT NULL DEFAULT 'null',
            status VARCHAR(50) NOT NULL,
            claimed_by VARCHAR(255),
            prefix VARCHAR(255),
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            UNIQUE (pipeline_id, job_descriptor)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS task_events (
            event_id BIGSERIAL PRIMARY KEY,
            task_id BIGINT NOT NULL REFERENCES tasks(task_id) ON DELETE CASCADE,
            agent_id VARCHAR(255) NOT NULL,
            change TEXT NOT NULL,
            recorded_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Claim candidate scan
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_tasks_claimable ON tasks(pipeline_id, status, created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_task_events_task_id ON task_events(task_id, recorded_at)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}

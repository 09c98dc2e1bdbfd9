//! Pipeline Repository
//!
//! Postgres storage for the pipeline registry. The "latest" pointer lives in
//! its own `pipeline_current` table, one row per pipeline name.

use async_trait::async_trait;
use quay_core::domain::pipeline::Pipeline;
use quay_core::dto::pipeline::{PipelineFilter, RegisterPipeline};
use sqlx::PgPool;

use super::{PipelineRepository, StoreResult};

pub struct PgPipelineRepository {
    pool: PgPool,
}

impl PgPipelineRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PipelineRepository for PgPipelineRepository {
    async fn register(&self, req: &RegisterPipeline) -> StoreResult<Pipeline> {
        let now = chrono::Utc::now();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PipelineRow>(
            r#"
            INSERT INTO pipelines (name, version, uri, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING pipeline_id, name, version, uri, created_at
            "#,
        )
        .bind(&req.name)
        .bind(&req.version)
        .bind(&req.uri)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        if req.make_current {
            upsert_current(&mut tx, &req.name, &req.version).await?;
        }

        tx.commit().await?;

        Ok(row.into())
    }

    async fn find(&self, name: &str, version: &str) -> StoreResult<Option<Pipeline>> {
        let row = sqlx::query_as::<_, PipelineRow>(
            r#"
            SELECT pipeline_id, name, version, uri, created_at
            FROM pipelines
            WHERE name = $1 AND version = $2
            "#,
        )
        .bind(name)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn find_current(&self, name: &str) -> StoreResult<Option<Pipeline>> {
        let row = sqlx::query_as::<_, PipelineRow>(
            r#"
            SELECT p.pipeline_id, p.name, p.version, p.uri, p.created_at
            FROM pipeline_current c
            JOIN pipelines p ON p.name = c.name AND p.version = c.version
            WHERE c.name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn versions(&self, name: &str) -> StoreResult<Vec<Pipeline>> {
        let rows = sqlx::query_as::<_, PipelineRow>(
            r#"
            SELECT pipeline_id, name, version, uri, created_at
            FROM pipelines
            WHERE name = $1
            ORDER BY created_at ASC, pipeline_id ASC
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn list(&self, filter: &PipelineFilter) -> StoreResult<Vec<Pipeline>> {
        let rows = sqlx::query_as::<_, PipelineRow>(
            r#"
            SELECT pipeline_id, name, version, uri, created_at
            FROM pipelines
            WHERE ($1::TEXT IS NULL OR name = $1)
              AND ($2::TEXT IS NULL OR version = $2)
              AND ($3::TEXT IS NULL OR uri = $3)
            ORDER BY name ASC, created_at ASC, pipeline_id ASC
            "#,
        )
        .bind(&filter.name)
        .bind(&filter.version)
        .bind(&filter.uri)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn set_current(&self, name: &str, version: &str) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar(
            "SELECT pipeline_id FROM pipelines WHERE name = $1 AND version = $2",
        )
        .bind(name)
        .bind(version)
        .fetch_optional(&mut *tx)
        .await?;

        if exists.is_none() {
            tx.rollback().await?;
            return Ok(false);
        }

        upsert_current(&mut tx, name, version).await?;
        tx.commit().await?;

        Ok(true)
    }
}

async fn upsert_current(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    name: &str,
    version: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO pipeline_current (name, version)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET version = EXCLUDED.version
        "#,
    )
    .bind(name)
    .bind(version)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PipelineRow {
    pipeline_id: i64,
    name: String,
    version: String,
    uri: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<PipelineRow> for Pipeline {
    fn from(row: PipelineRow) -> Self {
        Pipeline {
            id: row.pipeline_id,
            name: row.name,
            version: row.version,
            uri: row.uri,
            created_at: row.created_at,
        }
    }
}

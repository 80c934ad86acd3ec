//! PostgreSQL implementation of the clipqueue Job Repository.
//!
//! This crate provides the production Queue Store + Job Repository
//! (spec §4.1, §4.2) against a `sqlx::PgPool`.
//!
//! # Features
//!
//! - Atomic claim via `FOR UPDATE SKIP LOCKED`, oldest-queued-first.
//! - Stale-transition detection on `mark_succeeded`/`mark_failed` rather
//!   than an error — a job already out of `running` is a no-op.
//! - `mark_failed` runs in its own transaction so a rollback of the
//!   handler's business writes never loses the failure record.
//!
//! # Schema
//!
//! See `migrations/0001_init.sql` for the full DDL. In outline:
//!
//! ```sql
//! CREATE TABLE processing_jobs (
//!     id UUID PRIMARY KEY,
//!     project_id UUID,
//!     short_id UUID,
//!     type TEXT NOT NULL,
//!     status TEXT NOT NULL DEFAULT 'queued',
//!     payload JSONB,
//!     result JSONB,
//!     error_message TEXT,
//!     started_at TIMESTAMPTZ,
//!     completed_at TIMESTAMPTZ,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
//! );
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use clipqueue_postgres::PgRepository;
//! use sqlx::PgPool;
//!
//! let pool = PgPool::connect("postgres://localhost/clipqueue").await?;
//! let repo = PgRepository::new(pool);
//! ```

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use clipqueue_core::{
    Job, JobStatus, JobType, NewShort, Project, ProjectStatus, Repository, RunnerError, Short,
    ShortStatus, Transcription, TranscriptSegment, TransitionOutcome,
};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// PostgreSQL-backed Job Repository.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Requeue `running` jobs whose `started_at` is older than `max_age`.
    ///
    /// Not called by the Worker or Supervisor — spec §5/§9 externalize
    /// crash recovery to an operator-run reaper process. Grounded in the
    /// teacher's `PgJobStore::reclaim_expired`.
    pub async fn reclaim_stale(&self, max_age: Duration) -> Result<u64, RunnerError> {
        let cutoff = Utc::now() - max_age;
        let result = sqlx::query(
            r#"
            UPDATE processing_jobs
            SET status = 'queued', started_at = NULL, updated_at = now()
            WHERE status = 'running' AND started_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected())
    }

    /// Fail a row already transitioned to `running` whose type never parsed
    /// as `JobType` (see `claim_ready`). Not part of the `Repository` trait
    /// since it is only ever reachable from that one call site.
    async fn fail_unknown_type(&self, job_id: Uuid) -> Result<(), RunnerError> {
        sqlx::query(
            r#"
            UPDATE processing_jobs
            SET status = 'failed',
                completed_at = now(),
                updated_at = now(),
                error_message = 'unknown job type'
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }
}

fn store_err(e: sqlx::Error) -> RunnerError {
    RunnerError::store(e.to_string())
}

fn row_to_job(row: sqlx::postgres::PgRow) -> Result<Job, RunnerError> {
    let job_type: String = row.get("type");
    let status: String = row.get("status");
    Ok(Job {
        id: row.get("id"),
        project_id: row.get("project_id"),
        short_id: row.get("short_id"),
        job_type: JobType::from_str(&job_type)
            .map_err(|t| RunnerError::store(format!("unrecognized job type in store: {t}")))?,
        status: JobStatus::from_str(&status)
            .map_err(|s| RunnerError::store(format!("unrecognized job status in store: {s}")))?,
        payload: row.get("payload"),
        result: row.get("result"),
        error_message: row.get("error_message"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_project(row: sqlx::postgres::PgRow) -> Result<Project, RunnerError> {
    let status: String = row.get("status");
    Ok(Project {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        source_object_key: row.get("source_object_key"),
        source_bucket: row.get("source_bucket"),
        thumbnail_url: row.get("thumbnail_url"),
        duration_seconds: row.get("duration_seconds"),
        file_size_bytes: row.get("file_size_bytes"),
        status: ProjectStatus::from_str(&status)
            .map_err(|s| RunnerError::store(format!("unrecognized project status in store: {s}")))?,
        priority: row.get("priority"),
        error_message: row.get("error_message"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        completed_at: row.get("completed_at"),
    })
}

fn row_to_transcription(row: sqlx::postgres::PgRow) -> Result<Transcription, RunnerError> {
    let segments: serde_json::Value = row.get("segments");
    let segments: Vec<TranscriptSegment> = serde_json::from_value(segments)
        .map_err(|e| RunnerError::store(format!("malformed segments JSON in store: {e}")))?;
    Ok(Transcription {
        id: row.get("id"),
        project_id: row.get("project_id"),
        text: row.get("text"),
        segments,
        language: row.get("language"),
        duration_seconds: row.get("duration_seconds"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_short(row: sqlx::postgres::PgRow) -> Result<Short, RunnerError> {
    let status: String = row.get("status");
    Ok(Short {
        id: row.get("id"),
        project_id: row.get("project_id"),
        transcription_slice: row.get("transcription_slice"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        output_object_key: row.get("output_object_key"),
        thumbnail_url: row.get("thumbnail_url"),
        status: match status.as_str() {
            "pending" => ShortStatus::Pending,
            "processing" => ShortStatus::Processing,
            "completed" => ShortStatus::Completed,
            "error" => ShortStatus::Error,
            other => {
                return Err(RunnerError::store(format!(
                    "unrecognized short status in store: {other}"
                )))
            }
        },
        error_message: row.get("error_message"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl Repository for PgRepository {
    async fn claim_ready(&self, limit: i64) -> Result<Vec<Job>, RunnerError> {
        let rows = sqlx::query(
            r#"
            WITH claimable AS (
                SELECT id
                FROM processing_jobs
                WHERE status = 'queued'
                ORDER BY created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE processing_jobs
            SET status = 'running',
                started_at = now(),
                updated_at = now()
            WHERE id IN (SELECT id FROM claimable)
            RETURNING id, project_id, short_id, type, status, payload, result,
                      error_message, started_at, completed_at, created_at, updated_at
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        // A row whose `type` doesn't parse as `JobType` (e.g. inserted
        // directly, bypassing validation — spec §8 scenario S6) can never
        // be materialized as a `Job`, since the field is a closed enum.
        // It's already been transitioned to `running` by the query above;
        // fail it immediately here, at the one place the raw string is
        // still available, and exclude it from the returned batch so the
        // rest of the claimed jobs are unaffected.
        let mut claimed = Vec::with_capacity(rows.len());
        for row in rows {
            let raw_type: String = row.get("type");
            if JobType::from_str(&raw_type).is_err() {
                let id: Uuid = row.get("id");
                tracing::warn!(job_id = %id, job_type = %raw_type, "unrecognized job type, failing immediately");
                self.fail_unknown_type(id).await?;
                continue;
            }
            claimed.push(row_to_job(row)?);
        }
        Ok(claimed)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, RunnerError> {
        let row = sqlx::query(
            r#"
            SELECT id, project_id, short_id, type, status, payload, result,
                   error_message, started_at, completed_at, created_at, updated_at
            FROM processing_jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(row_to_job).transpose()
    }

    async fn mark_succeeded(
        &self,
        job_id: Uuid,
        result: serde_json::Value,
    ) -> Result<TransitionOutcome, RunnerError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE processing_jobs
            SET status = 'succeeded',
                completed_at = now(),
                updated_at = now(),
                result = $2
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .bind(result)
        .execute(&self.pool)
        .await
        .map_err(store_err)?
        .rows_affected();

        Ok(if rows_affected == 0 {
            TransitionOutcome::Stale
        } else {
            TransitionOutcome::Applied
        })
    }

    async fn mark_failed(
        &self,
        job_id: Uuid,
        error_message: &str,
    ) -> Result<TransitionOutcome, RunnerError> {
        // Own transaction, deliberately not composed with any transaction the
        // failing handler may have been using — a rollback of the handler's
        // business writes must never take the failure record with it.
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let rows_affected = sqlx::query(
            r#"
            UPDATE processing_jobs
            SET status = 'failed',
                completed_at = now(),
                updated_at = now(),
                error_message = $2
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .bind(error_message)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?
        .rows_affected();

        tx.commit().await.map_err(store_err)?;

        Ok(if rows_affected == 0 {
            TransitionOutcome::Stale
        } else {
            TransitionOutcome::Applied
        })
    }

    async fn enqueue_successor(
        &self,
        project_id: Option<Uuid>,
        short_id: Option<Uuid>,
        job_type: JobType,
        payload: serde_json::Value,
    ) -> Result<Uuid, RunnerError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO processing_jobs (id, project_id, short_id, type, status, payload, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'queued', $5, now(), now())
            "#,
        )
        .bind(id)
        .bind(project_id)
        .bind(short_id)
        .bind(job_type.as_str())
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(id)
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>, RunnerError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, title, source_object_key, source_bucket, thumbnail_url,
                   duration_seconds, file_size_bytes, status, priority, error_message,
                   metadata, created_at, updated_at, completed_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(row_to_project).transpose()
    }

    async fn set_project_status(
        &self,
        project_id: Uuid,
        status: ProjectStatus,
    ) -> Result<(), RunnerError> {
        sqlx::query("UPDATE projects SET status = $2, updated_at = now() WHERE id = $1")
            .bind(project_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn finish_thumbnail(
        &self,
        project_id: Uuid,
        thumbnail_url: &str,
        duration_seconds: f64,
    ) -> Result<(), RunnerError> {
        sqlx::query(
            r#"
            UPDATE projects
            SET thumbnail_url = $2,
                duration_seconds = $3,
                status = 'ready',
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(project_id)
        .bind(thumbnail_url)
        .bind(duration_seconds)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn get_transcription(&self, project_id: Uuid) -> Result<Option<Transcription>, RunnerError> {
        let row = sqlx::query(
            r#"
            SELECT id, project_id, text, segments, language, duration_seconds, created_at, updated_at
            FROM transcriptions
            WHERE project_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(row_to_transcription).transpose()
    }

    async fn insert_transcription(
        &self,
        project_id: Uuid,
        text: &str,
        segments: Vec<TranscriptSegment>,
        language: &str,
    ) -> Result<Transcription, RunnerError> {
        let id = Uuid::new_v4();
        let segments_json = serde_json::to_value(&segments)
            .map_err(|e| RunnerError::store(format!("failed to serialize segments: {e}")))?;

        let row = sqlx::query(
            r#"
            INSERT INTO transcriptions (id, project_id, text, segments, language, duration_seconds, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NULL, now(), now())
            RETURNING id, project_id, text, segments, language, duration_seconds, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(project_id)
        .bind(text)
        .bind(segments_json)
        .bind(language)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        row_to_transcription(row)
    }

    async fn insert_short(&self, short: NewShort) -> Result<Short, RunnerError> {
        let id = short.id.unwrap_or_else(Uuid::new_v4);
        let row = sqlx::query(
            r#"
            INSERT INTO shorts (id, project_id, transcription_slice, start_time, end_time,
                                 output_object_key, thumbnail_url, status, error_message,
                                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), now())
            RETURNING id, project_id, transcription_slice, start_time, end_time,
                      output_object_key, thumbnail_url, status, error_message, metadata,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(short.project_id)
        .bind(&short.transcription_slice)
        .bind(short.start_time)
        .bind(short.end_time)
        .bind(&short.output_object_key)
        .bind(&short.thumbnail_url)
        .bind(short.status.as_str())
        .bind(&short.error_message)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        row_to_short(row)
    }
}

/// Snapshot of queue depth by status, for operator dashboards. Not part of
/// the `Repository` trait — analogous to the teacher's `PgJobStore::stats`.
#[derive(Debug, Clone, Copy)]
pub struct QueueStats {
    pub queued: i64,
    pub running: i64,
    pub succeeded: i64,
    pub failed: i64,
    pub canceled: i64,
}

impl PgRepository {
    pub async fn queue_stats(&self) -> Result<QueueStats, RunnerError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'queued') AS queued,
                COUNT(*) FILTER (WHERE status = 'running') AS running,
                COUNT(*) FILTER (WHERE status = 'succeeded') AS succeeded,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                COUNT(*) FILTER (WHERE status = 'canceled') AS canceled
            FROM processing_jobs
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(QueueStats {
            queued: row.get("queued"),
            running: row.get("running"),
            succeeded: row.get("succeeded"),
            failed: row.get("failed"),
            canceled: row.get("canceled"),
        })
    }
}

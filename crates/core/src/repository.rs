//! The Job Repository contract: claim, terminal transitions, successor
//! enqueue, and the project/transcript/short operations this domain's
//! handlers need. Terminal writes return a stale-transition indicator
//! rather than erroring, so a write racing an external transition is a
//! logged no-op instead of a propagated failure.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Job, JobType, NewShort, Project, ProjectStatus, Short, Transcription, TranscriptSegment};
use crate::error::RunnerError;

/// Outcome of a terminal-write attempt. `Stale` means the row was already
/// out of `running` when the write was attempted — not an error, just a
/// no-op the caller logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    Stale,
}

/// Durable storage of jobs and the derived rows their handlers produce.
/// Every write that needs to be atomic with another is a single method on
/// this trait — one command, one effect, one transaction — rather than
/// assembled by the caller from smaller pieces.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Claim up to `limit` queued jobs, oldest first, skipping rows already
    /// locked by a concurrent claimer. Implementations must guarantee two
    /// concurrent callers never return the same row.
    async fn claim_ready(&self, limit: i64) -> Result<Vec<Job>, RunnerError>;

    /// Re-read a single job by id, for the Processor's re-validation step.
    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, RunnerError>;

    /// Transition a `running` job to `succeeded`. A no-op (returning
    /// `Stale`) if the job is no longer `running`.
    async fn mark_succeeded(
        &self,
        job_id: Uuid,
        result: serde_json::Value,
    ) -> Result<TransitionOutcome, RunnerError>;

    /// Transition a `running` job to `failed`, in a fresh transaction
    /// independent of any rolled-back handler work.
    async fn mark_failed(
        &self,
        job_id: Uuid,
        error_message: &str,
    ) -> Result<TransitionOutcome, RunnerError>;

    /// Insert a new `queued` job. Composable into a caller-supplied
    /// transaction by implementations that need "write derived rows AND
    /// enqueue successor" atomicity; the trait signature here is the
    /// standalone form used once a predecessor's own writes are committed.
    async fn enqueue_successor(
        &self,
        project_id: Option<Uuid>,
        short_id: Option<Uuid>,
        job_type: JobType,
        payload: serde_json::Value,
    ) -> Result<Uuid, RunnerError>;

    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>, RunnerError>;

    async fn set_project_status(
        &self,
        project_id: Uuid,
        status: ProjectStatus,
    ) -> Result<(), RunnerError>;

    /// Atomically set `thumbnail_url`, `duration_seconds`, and status
    /// `ready` on the project.
    async fn finish_thumbnail(
        &self,
        project_id: Uuid,
        thumbnail_url: &str,
        duration_seconds: f64,
    ) -> Result<(), RunnerError>;

    async fn get_transcription(&self, project_id: Uuid) -> Result<Option<Transcription>, RunnerError>;

    async fn insert_transcription(
        &self,
        project_id: Uuid,
        text: &str,
        segments: Vec<TranscriptSegment>,
        language: &str,
    ) -> Result<Transcription, RunnerError>;

    async fn insert_short(&self, short: NewShort) -> Result<Short, RunnerError>;
}

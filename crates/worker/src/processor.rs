//! The Processor (spec §4.3). Rust rendition of
//! `original_source/apps/jobs/processor.py`'s `process_job`: re-validate the
//! claimed row, guard against same-process re-entry, dispatch by job type,
//! and record the outcome.

use clipqueue_core::{JobPayload, JobType, RunnerError};
use dashmap::DashSet;
use uuid::Uuid;

use crate::handlers;
use crate::handlers::Handlers;

/// Dispatches claimed jobs to their type-specific handler and records the
/// terminal outcome. Holds its own in-flight guard (spec §4.3 step 2),
/// distinct from the Worker's — this one only protects against the same
/// job being processed twice within this process; the Worker's in-flight
/// set governs the concurrency bound instead.
pub struct Processor {
    handlers: Handlers,
    in_progress: DashSet<Uuid>,
}

impl Processor {
    pub fn new(handlers: Handlers) -> Self {
        Self {
            handlers,
            in_progress: DashSet::new(),
        }
    }

    /// Process a single claimed job to completion. Never returns an error
    /// or panics out to the caller (spec §4.3 step 5, §5 "no exception
    /// crosses the task boundary back to the poll loop") — every outcome is
    /// recorded via the repository and logged.
    pub async fn process(&self, job_id: Uuid) {
        if !self.in_progress.insert(job_id) {
            tracing::warn!(%job_id, "job already in progress on this process, dropping re-entrant dispatch");
            return;
        }

        self.process_inner(job_id).await;
        self.in_progress.remove(&job_id);
    }

    async fn process_inner(&self, job_id: Uuid) {
        let job = match self.handlers.repository.get_job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::warn!(%job_id, "claimed job vanished before processing");
                return;
            }
            Err(error) => {
                tracing::error!(%job_id, %error, "failed to re-read claimed job");
                return;
            }
        };

        if job.status != clipqueue_core::JobStatus::Running {
            tracing::info!(%job_id, status = job.status.as_str(), "job no longer running, skipping");
            return;
        }

        let payload = match JobPayload::parse(job.job_type, job.payload.as_ref()) {
            Ok(payload) => payload,
            Err(error) => {
                self.fail(job_id, &error.to_string()).await;
                return;
            }
        };

        let outcome = match (job.job_type, payload) {
            (JobType::Thumbnail, JobPayload::Thumbnail(payload)) => match job.project_id {
                Some(project_id) => handlers::thumbnail::handle(&self.handlers, job_id, project_id, payload)
                    .await
                    .map(|r| serde_json::to_value(r).expect("ThumbnailResult always serializes")),
                None => Err(RunnerError::validation(
                    "thumbnail job requires a projectId on the job row",
                )),
            },
            (JobType::Transcription, JobPayload::Transcription(payload)) => {
                handlers::transcription::handle(&self.handlers, job_id, payload)
                    .await
                    .map(|r| serde_json::to_value(r).expect("TranscriptionResult always serializes"))
            }
            (JobType::Analysis, JobPayload::Analysis(payload)) => {
                handlers::analysis::handle(&self.handlers, job_id, payload)
                    .await
                    .map(|r| serde_json::to_value(r).expect("AnalysisResult always serializes"))
            }
            (JobType::Cutting, JobPayload::Cutting(payload)) => {
                handlers::reserved::handle_cutting(payload)
                    .map(|r| serde_json::to_value(r).expect("StubResult always serializes"))
            }
            (JobType::Delivery, JobPayload::Delivery(payload)) => {
                handlers::reserved::handle_delivery(payload)
                    .map(|r| serde_json::to_value(r).expect("StubResult always serializes"))
            }
            _ => unreachable!("JobPayload::parse is keyed by job.job_type"),
        };

        match outcome {
            Ok(result) => self.succeed(job_id, result).await,
            Err(error) => self.fail(job_id, &error.to_string()).await,
        }
    }

    async fn succeed(&self, job_id: Uuid, result: serde_json::Value) {
        match self.handlers.repository.mark_succeeded(job_id, result).await {
            Ok(clipqueue_core::TransitionOutcome::Applied) => {
                tracing::info!(%job_id, "job succeeded");
            }
            Ok(clipqueue_core::TransitionOutcome::Stale) => {
                tracing::warn!(%job_id, "job succeeded but was no longer running, discarding result");
            }
            Err(error) => {
                tracing::error!(%job_id, %error, "failed to record job success");
            }
        }
    }

    async fn fail(&self, job_id: Uuid, message: &str) {
        tracing::warn!(%job_id, error = message, "job failed");
        match self.handlers.repository.mark_failed(job_id, message).await {
            Ok(clipqueue_core::TransitionOutcome::Applied) => {}
            Ok(clipqueue_core::TransitionOutcome::Stale) => {
                tracing::warn!(%job_id, "job failure recorded on an already-terminal row, discarding");
            }
            Err(error) => {
                tracing::error!(%job_id, %error, "failed to record job failure");
            }
        }
    }
}

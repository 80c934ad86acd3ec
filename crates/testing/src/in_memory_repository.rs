//! In-memory [`Repository`] for integration tests: a plain `Mutex`-guarded
//! store rather than a real database, with the same claim semantics as
//! `clipqueue_postgres::PgRepository` so scenario tests read identically
//! against either backend.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use clipqueue_core::{
    Job, JobStatus, JobType, NewShort, Project, ProjectStatus, Repository, RunnerError, Short,
    Transcription, TranscriptSegment, TransitionOutcome,
};
use uuid::Uuid;

/// A row whose `type` column does not parse as [`JobType`] — the in-memory
/// analogue of a directly-inserted `type='unknown'` row bypassing
/// validation. `Job.job_type` is a closed enum, so such a row can never be
/// materialized as a `Job`; it is tracked separately and resolved (failed,
/// then forgotten) entirely within `claim_ready`, mirroring `PgRepository`'s
/// handling of the same case.
struct UnknownTypeJob {
    id: Uuid,
    job_type_raw: String,
    status: JobStatus,
    error_message: Option<String>,
    created_at: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct Store {
    jobs: Vec<Job>,
    unknown_type_jobs: Vec<UnknownTypeJob>,
    projects: std::collections::HashMap<Uuid, Project>,
    transcriptions: std::collections::HashMap<Uuid, Transcription>,
    shorts: Vec<Short>,
}

/// Single-process `Repository` implementation. The whole store is guarded
/// by one `Mutex`; every operation locks, mutates, and returns without
/// holding the lock across an `.await`, which is enough to reproduce the
/// skip-locked claim's single-claim guarantee for concurrent in-process
/// callers.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a job directly, bypassing `enqueue_successor`, for scenario
    /// setup (e.g. S1's ten pre-staggered jobs).
    pub fn seed_job(&self, job: Job) {
        self.store.lock().unwrap().jobs.push(job);
    }

    pub fn seed_project(&self, project: Project) {
        self.store.lock().unwrap().projects.insert(project.id, project);
    }

    pub fn seed_transcription(&self, transcription: Transcription) {
        self.store
            .lock()
            .unwrap()
            .transcriptions
            .insert(transcription.project_id, transcription);
    }

    /// Seed a row whose stored type does not parse as [`JobType`] — a row
    /// inserted directly with an unrecognized type, bypassing any
    /// validation. Returns the row's id so the test can assert on its
    /// final status.
    pub fn seed_unknown_type_job(&self, job_type_raw: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.store.lock().unwrap().unknown_type_jobs.push(UnknownTypeJob {
            id,
            job_type_raw: job_type_raw.to_string(),
            status: JobStatus::Queued,
            error_message: None,
            created_at: Utc::now(),
        });
        id
    }

    /// Final `(status, error_message)` of a row seeded via
    /// [`Self::seed_unknown_type_job`], for scenario S6's assertion.
    pub fn unknown_type_job_outcome(&self, id: Uuid) -> Option<(JobStatus, Option<String>)> {
        self.store
            .lock()
            .unwrap()
            .unknown_type_jobs
            .iter()
            .find(|j| j.id == id)
            .map(|j| (j.status, j.error_message.clone()))
    }

    /// Snapshot every job, for assertions against the full table.
    pub fn all_jobs(&self) -> Vec<Job> {
        self.store.lock().unwrap().jobs.clone()
    }

    pub fn all_shorts(&self) -> Vec<Short> {
        self.store.lock().unwrap().shorts.clone()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn claim_ready(&self, limit: i64) -> Result<Vec<Job>, RunnerError> {
        let mut store = self.store.lock().unwrap();
        let now = Utc::now();

        // Unknown-type rows are never claimable in the ordinary sense —
        // their type can't be materialized as a `Job` at all, so they're
        // detected and failed right here, before they could ever reach a
        // Worker. This doesn't consume `limit`.
        for row in store.unknown_type_jobs.iter_mut() {
            if row.status == JobStatus::Queued {
                tracing::warn!(job_id = %row.id, job_type = %row.job_type_raw, "unrecognized job type, failing immediately");
                row.status = JobStatus::Failed;
                row.error_message = Some("unknown job type".to_string());
            }
        }

        let mut candidate_idx: Vec<usize> = store
            .jobs
            .iter()
            .enumerate()
            .filter(|(_, j)| j.status == JobStatus::Queued)
            .map(|(i, _)| i)
            .collect();
        candidate_idx.sort_by_key(|&i| store.jobs[i].created_at);
        candidate_idx.truncate(limit.max(0) as usize);

        let mut claimed = Vec::with_capacity(candidate_idx.len());
        for idx in candidate_idx {
            let job = &mut store.jobs[idx];
            job.status = JobStatus::Running;
            job.started_at = Some(now);
            job.updated_at = now;
            claimed.push(job.clone());
        }
        Ok(claimed)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, RunnerError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .jobs
            .iter()
            .find(|j| j.id == job_id)
            .cloned())
    }

    async fn mark_succeeded(
        &self,
        job_id: Uuid,
        result: serde_json::Value,
    ) -> Result<TransitionOutcome, RunnerError> {
        let mut store = self.store.lock().unwrap();
        let Some(job) = store.jobs.iter_mut().find(|j| j.id == job_id) else {
            return Ok(TransitionOutcome::Stale);
        };
        if job.status != JobStatus::Running {
            return Ok(TransitionOutcome::Stale);
        }
        let now = Utc::now();
        job.status = JobStatus::Succeeded;
        job.completed_at = Some(now);
        job.updated_at = now;
        job.result = Some(result);
        Ok(TransitionOutcome::Applied)
    }

    async fn mark_failed(
        &self,
        job_id: Uuid,
        error_message: &str,
    ) -> Result<TransitionOutcome, RunnerError> {
        let mut store = self.store.lock().unwrap();
        let Some(job) = store.jobs.iter_mut().find(|j| j.id == job_id) else {
            return Ok(TransitionOutcome::Stale);
        };
        if job.status != JobStatus::Running {
            return Ok(TransitionOutcome::Stale);
        }
        let now = Utc::now();
        job.status = JobStatus::Failed;
        job.completed_at = Some(now);
        job.updated_at = now;
        job.error_message = Some(error_message.to_string());
        Ok(TransitionOutcome::Applied)
    }

    async fn enqueue_successor(
        &self,
        project_id: Option<Uuid>,
        short_id: Option<Uuid>,
        job_type: JobType,
        payload: serde_json::Value,
    ) -> Result<Uuid, RunnerError> {
        let mut store = self.store.lock().unwrap();
        let id = Uuid::new_v4();
        let now = Utc::now();
        store.jobs.push(Job {
            id,
            project_id,
            short_id,
            job_type,
            status: JobStatus::Queued,
            payload: Some(payload),
            result: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>, RunnerError> {
        Ok(self.store.lock().unwrap().projects.get(&project_id).cloned())
    }

    async fn set_project_status(
        &self,
        project_id: Uuid,
        status: ProjectStatus,
    ) -> Result<(), RunnerError> {
        let mut store = self.store.lock().unwrap();
        if let Some(project) = store.projects.get_mut(&project_id) {
            project.status = status;
            project.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn finish_thumbnail(
        &self,
        project_id: Uuid,
        thumbnail_url: &str,
        duration_seconds: f64,
    ) -> Result<(), RunnerError> {
        let mut store = self.store.lock().unwrap();
        if let Some(project) = store.projects.get_mut(&project_id) {
            project.thumbnail_url = Some(thumbnail_url.to_string());
            project.duration_seconds = Some(duration_seconds);
            project.status = ProjectStatus::Ready;
            project.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn get_transcription(&self, project_id: Uuid) -> Result<Option<Transcription>, RunnerError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .transcriptions
            .get(&project_id)
            .cloned())
    }

    async fn insert_transcription(
        &self,
        project_id: Uuid,
        text: &str,
        segments: Vec<TranscriptSegment>,
        language: &str,
    ) -> Result<Transcription, RunnerError> {
        let mut store = self.store.lock().unwrap();
        let now = Utc::now();
        let transcription = Transcription {
            id: Uuid::new_v4(),
            project_id,
            text: text.to_string(),
            segments,
            language: Some(language.to_string()),
            duration_seconds: None,
            created_at: now,
            updated_at: now,
        };
        store.transcriptions.insert(project_id, transcription.clone());
        Ok(transcription)
    }

    async fn insert_short(&self, short: NewShort) -> Result<Short, RunnerError> {
        let mut store = self.store.lock().unwrap();
        let now = Utc::now();
        let row = Short {
            id: short.id.unwrap_or_else(Uuid::new_v4),
            project_id: short.project_id,
            transcription_slice: short.transcription_slice,
            start_time: short.start_time,
            end_time: short.end_time,
            output_object_key: short.output_object_key,
            thumbnail_url: short.thumbnail_url,
            status: short.status,
            error_message: short.error_message,
            metadata: None,
            created_at: now,
            updated_at: now,
        };
        store.shorts.push(row.clone());
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Arc;

    fn queued_job(job_type: JobType, created_at: chrono::DateTime<Utc>) -> Job {
        let now = Utc::now();
        Job {
            id: Uuid::new_v4(),
            project_id: None,
            short_id: None,
            job_type,
            status: JobStatus::Queued,
            payload: None,
            result: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn claim_ready_returns_oldest_first_and_marks_running() {
        let repo = InMemoryRepository::new();
        let base = Utc::now() - Duration::seconds(10);
        let older = queued_job(JobType::Delivery, base);
        let newer = queued_job(JobType::Delivery, base + Duration::seconds(1));
        repo.seed_job(newer.clone());
        repo.seed_job(older.clone());

        let claimed = repo.claim_ready(1).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, older.id);
        assert_eq!(claimed[0].status, JobStatus::Running);
        assert!(claimed[0].started_at.is_some());
    }

    #[tokio::test]
    async fn claim_ready_never_returns_the_same_row_twice_across_concurrent_callers() {
        let repo = Arc::new(InMemoryRepository::new());
        let base = Utc::now() - Duration::seconds(100);
        for i in 0..10 {
            repo.seed_job(queued_job(JobType::Delivery, base + Duration::milliseconds(i)));
        }

        let mut handles = Vec::new();
        for _ in 0..3 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move { repo.claim_ready(4).await.unwrap() }));
        }

        let mut seen = std::collections::HashSet::new();
        for handle in handles {
            for job in handle.await.unwrap() {
                assert!(seen.insert(job.id), "job {} claimed twice", job.id);
            }
        }
        assert_eq!(seen.len(), 10);
    }

    #[tokio::test]
    async fn mark_succeeded_on_a_terminal_job_is_a_stale_no_op() {
        let repo = InMemoryRepository::new();
        let job = queued_job(JobType::Delivery, Utc::now());
        repo.seed_job(job.clone());
        repo.claim_ready(1).await.unwrap();

        let first = repo.mark_succeeded(job.id, json!({"ok": true})).await.unwrap();
        assert_eq!(first, TransitionOutcome::Applied);

        let second = repo
            .mark_succeeded(job.id, json!({"ok": "overwritten?"}))
            .await
            .unwrap();
        assert_eq!(second, TransitionOutcome::Stale);

        let stored = repo.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.result, Some(json!({"ok": true})));
    }

    #[tokio::test]
    async fn mark_failed_requires_running_status() {
        let repo = InMemoryRepository::new();
        let job = queued_job(JobType::Delivery, Utc::now());
        repo.seed_job(job.clone());

        let outcome = repo.mark_failed(job.id, "boom").await.unwrap();
        assert_eq!(outcome, TransitionOutcome::Stale);
    }

    #[tokio::test]
    async fn enqueue_successor_inserts_a_queued_row() {
        let repo = InMemoryRepository::new();
        let project_id = Uuid::new_v4();
        let id = repo
            .enqueue_successor(Some(project_id), None, JobType::Transcription, json!({"projectId": project_id}))
            .await
            .unwrap();

        let job = repo.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.job_type, JobType::Transcription);
        assert_eq!(job.project_id, Some(project_id));
    }
}

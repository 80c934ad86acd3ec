//! End-to-end scenario tests against [`InMemoryRepository`] and the fake
//! collaborators. Each test drives the real `Processor`/`Worker` code in
//! this crate; only the repository and the external collaborators are
//! faked.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use clipqueue_core::{
    AnalysisResult, Job, JobStatus, JobType, Project, ProjectStatus, Repository, Short,
    ShortStatus, Transcription, TranscriptSegment,
};
use clipqueue_testing::{
    FakeMediaToolchain, FakeObjectStore, FakeSpeechToText, FakeTextGenClient, InMemoryRepository,
    ShortSuggestionSeed,
};
use clipqueue_worker::handlers::Handlers;
use clipqueue_worker::processor::Processor;
use clipqueue_worker::worker::Worker;
use serde_json::json;
use uuid::Uuid;

fn queued_job(job_type: JobType, created_at: chrono::DateTime<Utc>) -> Job {
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
        updated_at: created_at,
    }
}

fn sample_project(id: Uuid) -> Project {
    let now = Utc::now();
    Project {
        id,
        user_id: "user-1".to_string(),
        title: "a project".to_string(),
        source_object_key: "uploads/source.mp4".to_string(),
        source_bucket: "clips".to_string(),
        thumbnail_url: None,
        duration_seconds: None,
        file_size_bytes: Some(1_000_000),
        status: ProjectStatus::Uploading,
        priority: None,
        error_message: None,
        metadata: None,
        created_at: now,
        updated_at: now,
        completed_at: None,
    }
}

/// Handlers bundle backed entirely by fakes, for tests that don't care
/// about the specific collaborator behavior (only the dispatch/transition
/// machinery).
fn default_handlers(repository: Arc<dyn Repository>) -> Handlers {
    Handlers::new(
        repository,
        Arc::new(FakeObjectStore::new()),
        Arc::new(FakeMediaToolchain::new(60.0)),
        Arc::new(FakeSpeechToText::new("", Vec::new(), "en")),
        Arc::new(FakeTextGenClient::new(Vec::new())),
        "clips".to_string(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn s1_concurrent_workers_never_double_claim_and_every_job_succeeds() {
    let repository = Arc::new(InMemoryRepository::new());
    let base = Utc::now() - ChronoDuration::seconds(100);
    let mut ids = Vec::new();
    for i in 0..10 {
        let job = queued_job(JobType::Delivery, base + ChronoDuration::milliseconds(i));
        ids.push(job.id);
        repository.seed_job(job);
    }

    let processor = Arc::new(Processor::new(default_handlers(repository.clone())));
    let workers: Vec<Worker> = (0..3)
        .map(|_| Worker::new(repository.clone(), processor.clone(), 4, 25))
        .collect();
    let handles: Vec<_> = workers.iter().map(|w| w.start()).collect();

    tokio::time::sleep(Duration::from_millis(400)).await;

    for worker in &workers {
        worker.stop().await;
    }
    for handle in handles {
        handle.abort();
    }

    let jobs = repository.all_jobs();
    assert_eq!(jobs.len(), 10);
    for id in ids {
        let job = jobs.iter().find(|j| j.id == id).expect("seeded job missing");
        assert_eq!(job.status, JobStatus::Succeeded, "job {id} did not succeed");
    }
}

#[tokio::test]
async fn s2_thumbnail_job_chains_into_a_queued_transcription_job() {
    let repository = Arc::new(InMemoryRepository::new());
    let project_id = Uuid::new_v4();
    repository.seed_project(sample_project(project_id));

    let job = Job {
        project_id: Some(project_id),
        payload: Some(json!({
            "sourceObjectKey": "uploads/source.mp4",
            "sourceBucket": "clips",
            "userId": "user-1",
        })),
        ..queued_job(JobType::Thumbnail, Utc::now())
    };
    repository.seed_job(job.clone());

    let handlers = Handlers::new(
        repository.clone(),
        Arc::new(FakeObjectStore::new()),
        Arc::new(FakeMediaToolchain::new(100.0)),
        Arc::new(FakeSpeechToText::new("", Vec::new(), "en")),
        Arc::new(FakeTextGenClient::new(Vec::new())),
        "clips".to_string(),
    );
    let processor = Processor::new(handlers);

    let claimed = repository.claim_ready(1).await.unwrap();
    assert_eq!(claimed.len(), 1);
    processor.process(claimed[0].id).await;

    let finished = repository.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(finished.status, JobStatus::Succeeded);

    let project = repository.get_project(project_id).await.unwrap().unwrap();
    assert_eq!(project.status, ProjectStatus::Ready);
    assert_eq!(project.duration_seconds, Some(100.0));
    assert!(project.thumbnail_url.is_some());

    let jobs = repository.all_jobs();
    let successor = jobs
        .iter()
        .find(|j| j.job_type == JobType::Transcription)
        .expect("thumbnail handler did not enqueue a transcription job");
    assert_eq!(successor.status, JobStatus::Queued);
    assert_eq!(successor.project_id, Some(project_id));
}

#[tokio::test]
async fn s3_one_failing_clip_does_not_fail_the_analysis_job_or_the_other_shorts() {
    let repository = Arc::new(InMemoryRepository::new());
    let project_id = Uuid::new_v4();
    repository.seed_project(sample_project(project_id));

    let segments: Vec<TranscriptSegment> = (0..5)
        .map(|i| TranscriptSegment {
            start: i as f64 * 10.0,
            end: i as f64 * 10.0 + 10.0,
            text: format!("segment {i}"),
        })
        .collect();
    repository.seed_transcription(Transcription {
        id: Uuid::new_v4(),
        project_id,
        text: "a five-segment transcript".to_string(),
        segments,
        language: Some("en".to_string()),
        duration_seconds: Some(50.0),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    });

    let job = Job {
        project_id: Some(project_id),
        payload: Some(json!({ "projectId": project_id })),
        ..queued_job(JobType::Analysis, Utc::now())
    };
    repository.seed_job(job.clone());

    let media = FakeMediaToolchain::new(50.0).failing_clip_at(2);
    let textgen = FakeTextGenClient::new(vec![
        ShortSuggestionSeed {
            segment_id: "1".to_string(),
            start_time: 0.0,
            end_time: 10.0,
            transcription: "first moment".to_string(),
        },
        ShortSuggestionSeed {
            segment_id: "2".to_string(),
            start_time: 10.0,
            end_time: 20.0,
            transcription: "second moment".to_string(),
        },
        ShortSuggestionSeed {
            segment_id: "3".to_string(),
            start_time: 20.0,
            end_time: 30.0,
            transcription: "third moment".to_string(),
        },
    ]);

    let handlers = Handlers::new(
        repository.clone(),
        Arc::new(FakeObjectStore::new()),
        Arc::new(media),
        Arc::new(FakeSpeechToText::new("", Vec::new(), "en")),
        Arc::new(textgen),
        "clips".to_string(),
    );
    let processor = Processor::new(handlers);

    let claimed = repository.claim_ready(1).await.unwrap();
    assert_eq!(claimed.len(), 1);
    processor.process(claimed[0].id).await;

    let finished = repository.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(finished.status, JobStatus::Succeeded);

    let result: AnalysisResult = serde_json::from_value(finished.result.unwrap()).unwrap();
    assert_eq!(result.shorts_created, 3);
    assert_eq!(result.shorts.len(), 3);

    let shorts: Vec<Short> = repository.all_shorts();
    assert_eq!(shorts.len(), 3);
    assert_eq!(shorts.iter().filter(|s| s.status == ShortStatus::Completed).count(), 2);
    assert_eq!(shorts.iter().filter(|s| s.status == ShortStatus::Error).count(), 1);
    assert!(shorts
        .iter()
        .find(|s| s.status == ShortStatus::Error)
        .unwrap()
        .error_message
        .is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn s4_shutdown_drains_in_flight_jobs_before_the_worker_stops() {
    let repository = Arc::new(InMemoryRepository::new());
    let project_id = Uuid::new_v4();
    repository.seed_project(sample_project(project_id));

    for _ in 0..2 {
        let job = Job {
            project_id: Some(project_id),
            payload: Some(json!({
                "sourceObjectKey": "uploads/source.mp4",
                "sourceBucket": "clips",
                "userId": "user-1",
            })),
            ..queued_job(JobType::Thumbnail, Utc::now())
        };
        repository.seed_job(job);
    }

    let media = FakeMediaToolchain::new(10.0).with_probe_delay(Duration::from_millis(1500));
    let handlers = Handlers::new(
        repository.clone(),
        Arc::new(FakeObjectStore::new()),
        Arc::new(media),
        Arc::new(FakeSpeechToText::new("", Vec::new(), "en")),
        Arc::new(FakeTextGenClient::new(Vec::new())),
        "clips".to_string(),
    );
    let processor = Arc::new(Processor::new(handlers));
    let worker = Worker::new(repository.clone(), processor, 2, 25);

    let handle = worker.start();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(worker.active_count(), 2, "both jobs should have been claimed and be in flight");

    worker.stop().await;
    handle.abort();

    assert_eq!(worker.active_count(), 0);
    let jobs = repository.all_jobs();
    assert_eq!(jobs.len(), 4, "two thumbnail jobs plus their two transcription successors");
    assert!(
        jobs.iter()
            .filter(|j| j.job_type == JobType::Thumbnail)
            .all(|j| j.status == JobStatus::Succeeded),
        "every thumbnail job should have drained to completion before stop() returned"
    );
}

#[tokio::test]
async fn s5_malformed_payload_fails_the_job_without_enqueuing_a_successor() {
    let repository = Arc::new(InMemoryRepository::new());
    let project_id = Uuid::new_v4();
    repository.seed_project(sample_project(project_id));

    let job = Job {
        project_id: Some(project_id),
        payload: Some(json!({})),
        ..queued_job(JobType::Thumbnail, Utc::now())
    };
    repository.seed_job(job.clone());

    let processor = Processor::new(default_handlers(repository.clone()));

    let claimed = repository.claim_ready(1).await.unwrap();
    assert_eq!(claimed.len(), 1);
    processor.process(claimed[0].id).await;

    let finished = repository.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(finished.status, JobStatus::Failed);
    let message = finished.error_message.expect("expected a descriptive error message");
    assert!(message.contains("sourceObjectKey"), "error message was: {message}");

    assert_eq!(repository.all_jobs().len(), 1, "no successor should have been enqueued");
}

#[tokio::test]
async fn s6_unknown_job_type_fails_immediately_without_blocking_other_jobs() {
    let repository = Arc::new(InMemoryRepository::new());
    let unknown_id = repository.seed_unknown_type_job("unknown");
    let delivery_job = queued_job(JobType::Delivery, Utc::now());
    repository.seed_job(delivery_job.clone());

    let processor = Processor::new(default_handlers(repository.clone()));

    let claimed = repository.claim_ready(10).await.unwrap();
    assert_eq!(claimed.len(), 1, "the unknown-type row must not be materialized as a claimable job");
    assert_eq!(claimed[0].id, delivery_job.id);

    for job in &claimed {
        processor.process(job.id).await;
    }

    let (status, message) = repository
        .unknown_type_job_outcome(unknown_id)
        .expect("seeded unknown-type row vanished");
    assert_eq!(status, JobStatus::Failed);
    assert_eq!(message.as_deref(), Some("unknown job type"));

    let delivery_outcome = repository.get_job(delivery_job.id).await.unwrap().unwrap();
    assert_eq!(delivery_outcome.status, JobStatus::Succeeded);
}

//! The `transcription` handler (spec §4.4.2). Grounded in
//! `original_source/apps/jobs/processor.py`'s `_handle_transcription`. The
//! early `completed` Project status before `analysis` is enqueued is
//! intentional (SPEC_FULL §9 resolved Open Question).

use clipqueue_core::{JobType, ProjectStatus, RunnerError, TranscriptSegment, TranscriptionPayload, TranscriptionResult};
use uuid::Uuid;

use super::{cleanup, Handlers};

pub async fn handle(
    handlers: &Handlers,
    job_id: Uuid,
    payload: TranscriptionPayload,
) -> Result<TranscriptionResult, RunnerError> {
    let source_path = handlers.scoped_temp_path(job_id, "source");

    let result = run(handlers, &payload, &source_path).await;

    cleanup(&source_path).await;

    result
}

async fn run(
    handlers: &Handlers,
    payload: &TranscriptionPayload,
    source_path: &std::path::Path,
) -> Result<TranscriptionResult, RunnerError> {
    handlers
        .repository
        .set_project_status(payload.project_id, ProjectStatus::Transcribing)
        .await?;

    handlers
        .object_store
        .download(&payload.source_bucket, &payload.source_object_key, source_path)
        .await
        .map_err(|e| RunnerError::collaborator(e.to_string()))?;

    let outcome = handlers
        .speech
        .transcribe(source_path)
        .await
        .map_err(|e| RunnerError::collaborator(e.to_string()))?;

    let segments: Vec<TranscriptSegment> = outcome
        .segments
        .iter()
        .map(|s| TranscriptSegment {
            start: s.start,
            end: s.end,
            text: s.text.clone(),
        })
        .collect();
    let segment_count = segments.len();
    let text_length = outcome.text.chars().count();

    let transcription = handlers
        .repository
        .insert_transcription(payload.project_id, &outcome.text, segments, &outcome.language)
        .await?;

    handlers
        .repository
        .set_project_status(payload.project_id, ProjectStatus::Completed)
        .await?;

    handlers
        .repository
        .enqueue_successor(
            Some(payload.project_id),
            None,
            JobType::Analysis,
            serde_json::json!({ "projectId": payload.project_id }),
        )
        .await?;

    Ok(TranscriptionResult {
        message: "transcription complete".to_string(),
        text_length,
        segment_count,
        language: outcome.language,
        transcription_id: transcription.id,
    })
}

//! The `analysis` handler (spec §4.4.3). The richer target behavior spec.md
//! specifies, superseding `original_source/apps/jobs/processor.py`'s
//! `_handle_analysis` stub (SPEC_FULL §4.4 analysis handler note): call the
//! text-generation model, parse suggestions, cut clips, insert `Short` rows.

use clipqueue_core::{AnalysisPayload, AnalysisResult, NewShort, ProjectStatus, RunnerError, ShortStatus, ShortSummary};
use clipqueue_collaborators::{ShortSuggestion, TranscriptLine};
use uuid::Uuid;

use super::{cleanup, Handlers};

const SHORT_THUMBNAIL_WIDTH: u32 = 640;
const SHORT_THUMBNAIL_HEIGHT: u32 = 360;
const SHORT_THUMBNAIL_QUALITY: u8 = 5;

pub async fn handle(handlers: &Handlers, job_id: Uuid, payload: AnalysisPayload) -> Result<AnalysisResult, RunnerError> {
    let project_id = payload.project_id;

    handlers
        .repository
        .set_project_status(project_id, ProjectStatus::Analyzing)
        .await?;

    let project = handlers
        .repository
        .get_project(project_id)
        .await?
        .ok_or_else(|| RunnerError::validation(format!("project {project_id} does not exist")))?;

    let transcription = handlers
        .repository
        .get_transcription(project_id)
        .await?
        .ok_or_else(|| RunnerError::validation(format!("project {project_id} has no transcription")))?;

    if transcription.segments.is_empty() {
        return Err(RunnerError::validation(format!(
            "project {project_id}'s transcription has no segments"
        )));
    }

    let transcript_lines: Vec<TranscriptLine> = transcription
        .segments
        .iter()
        .map(|s| TranscriptLine {
            start: s.start,
            end: s.end,
            text: s.text.clone(),
        })
        .collect();

    let suggestions = handlers
        .textgen
        .suggest_shorts(&transcript_lines, payload.shorts_count(), payload.custom_prompt.as_deref())
        .await
        .map_err(|e| RunnerError::collaborator(e.to_string()))?;

    let source_path = handlers.scoped_temp_path(job_id, "source");
    handlers
        .object_store
        .download(&project.source_bucket, &project.source_object_key, &source_path)
        .await
        .map_err(|e| RunnerError::collaborator(e.to_string()))?;

    let mut shorts = Vec::with_capacity(suggestions.len());
    for suggestion in &suggestions {
        shorts.push(create_short(handlers, job_id, &project, &source_path, suggestion).await);
    }

    cleanup(&source_path).await;

    handlers
        .repository
        .set_project_status(project_id, ProjectStatus::Completed)
        .await?;

    let shorts_created = shorts.len();
    let summaries = shorts
        .iter()
        .map(|s| ShortSummary {
            id: s.id,
            title: derive_title(&s.transcription_slice),
            duration: s.end_time - s.start_time,
        })
        .collect();

    Ok(AnalysisResult {
        message: format!("created {shorts_created} shorts"),
        shorts_created,
        shorts: summaries,
    })
}

/// Extract, upload, and insert one [`Short`](clipqueue_core::Short) for a
/// single suggestion. Per-clip failures are isolated (spec §4.4.3.d): the
/// row is still inserted, with status `error`, and the enclosing job does
/// not fail.
async fn create_short(
    handlers: &Handlers,
    job_id: Uuid,
    project: &clipqueue_core::Project,
    source_path: &std::path::Path,
    suggestion: &ShortSuggestion,
) -> clipqueue_core::Short {
    let short_id = Uuid::new_v4();
    let clip_path = handlers.scoped_temp_path(job_id, "clip.mp4");
    let thumb_path = handlers.scoped_temp_path(job_id, "clip-thumb.jpg");

    let outcome = cut_and_upload(handlers, project, source_path, &clip_path, &thumb_path, short_id, suggestion).await;

    cleanup(&clip_path).await;
    cleanup(&thumb_path).await;

    let new_short = match outcome {
        Ok((clip_key, thumb_key)) => NewShort {
            id: Some(short_id),
            project_id: project.id,
            transcription_slice: suggestion.transcription.clone(),
            start_time: suggestion.start_time,
            end_time: suggestion.end_time,
            output_object_key: Some(clip_key),
            thumbnail_url: Some(thumb_key),
            status: ShortStatus::Completed,
            error_message: None,
        },
        Err(message) => {
            tracing::warn!(%short_id, segment_id = %suggestion.segment_id, error = %message, "short clip extraction failed");
            NewShort {
                id: Some(short_id),
                project_id: project.id,
                transcription_slice: suggestion.transcription.clone(),
                start_time: suggestion.start_time,
                end_time: suggestion.end_time,
                output_object_key: None,
                thumbnail_url: None,
                status: ShortStatus::Error,
                error_message: Some(message),
            }
        }
    };

    match handlers.repository.insert_short(new_short).await {
        Ok(short) => short,
        Err(error) => {
            // The repository write itself failed (store error, not a
            // per-clip collaborator failure) — this Short can't be
            // represented in the result summary, but the job continues
            // with whatever shorts did get inserted.
            tracing::error!(%short_id, %error, "failed to insert short row");
            clipqueue_core::Short {
                id: short_id,
                project_id: project.id,
                transcription_slice: suggestion.transcription.clone(),
                start_time: suggestion.start_time,
                end_time: suggestion.end_time,
                output_object_key: None,
                thumbnail_url: None,
                status: ShortStatus::Error,
                error_message: Some(error.to_string()),
                metadata: None,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            }
        }
    }
}

async fn cut_and_upload(
    handlers: &Handlers,
    project: &clipqueue_core::Project,
    source_path: &std::path::Path,
    clip_path: &std::path::Path,
    thumb_path: &std::path::Path,
    short_id: Uuid,
    suggestion: &ShortSuggestion,
) -> Result<(String, String), String> {
    handlers
        .media
        .extract_clip(source_path, clip_path, suggestion.start_time, suggestion.end_time)
        .await
        .map_err(|e| e.to_string())?;

    let midpoint = (suggestion.start_time + suggestion.end_time) / 2.0;
    handlers
        .media
        .extract_thumbnail(
            source_path,
            thumb_path,
            Some(midpoint),
            SHORT_THUMBNAIL_WIDTH,
            SHORT_THUMBNAIL_HEIGHT,
            SHORT_THUMBNAIL_QUALITY,
        )
        .await
        .map_err(|e| e.to_string())?;

    let clip_key = format!("{}/projects/{}/shorts/{}.mp4", project.user_id, project.id, short_id);
    let thumb_key = format!("{}/projects/{}/shorts/{}-thumb.jpg", project.user_id, project.id, short_id);

    handlers
        .object_store
        .upload(&handlers.default_bucket, &clip_key, clip_path, "video/mp4")
        .await
        .map_err(|e| e.to_string())?;
    handlers
        .object_store
        .upload(&handlers.default_bucket, &thumb_key, thumb_path, "image/jpeg")
        .await
        .map_err(|e| e.to_string())?;

    Ok((clip_key, thumb_key))
}

/// Shorts have no dedicated title field in the data model (spec §3); derive
/// a short display title from the suggestion's transcript slice.
fn derive_title(transcription_slice: &str) -> String {
    const MAX_LEN: usize = 60;
    let trimmed = transcription_slice.trim();
    if trimmed.chars().count() <= MAX_LEN {
        return trimmed.to_string();
    }
    let truncated: String = trimmed.chars().take(MAX_LEN).collect();
    format!("{}...", truncated.trim_end())
}

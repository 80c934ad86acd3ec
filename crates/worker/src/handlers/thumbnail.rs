//! The `thumbnail` handler (spec §4.4.1). Grounded in
//! `original_source/apps/jobs/processor.py`'s `_handle_thumbnail` and
//! `utils/ffmpeg.py`'s frame-extraction defaults.

use chrono::Utc;
use clipqueue_core::{JobType, ProjectStatus, RunnerError, ThumbnailPayload, ThumbnailResult};
use uuid::Uuid;

use super::{cleanup, Handlers};

const THUMBNAIL_WIDTH: u32 = 640;
const THUMBNAIL_HEIGHT: u32 = 360;
const THUMBNAIL_QUALITY: u8 = 5;

pub async fn handle(
    handlers: &Handlers,
    job_id: Uuid,
    project_id: Uuid,
    payload: ThumbnailPayload,
) -> Result<ThumbnailResult, RunnerError> {
    let source_path = handlers.scoped_temp_path(job_id, "source");
    let thumbnail_path = handlers.scoped_temp_path(job_id, "thumbnail.jpg");

    let result = run(handlers, project_id, &payload, &source_path, &thumbnail_path).await;

    cleanup(&source_path).await;
    cleanup(&thumbnail_path).await;

    result
}

async fn run(
    handlers: &Handlers,
    project_id: Uuid,
    payload: &ThumbnailPayload,
    source_path: &std::path::Path,
    thumbnail_path: &std::path::Path,
) -> Result<ThumbnailResult, RunnerError> {
    handlers
        .repository
        .set_project_status(project_id, ProjectStatus::Processing)
        .await?;

    handlers
        .object_store
        .download(&payload.source_bucket, &payload.source_object_key, source_path)
        .await
        .map_err(|e| RunnerError::collaborator(e.to_string()))?;

    let duration_seconds = handlers
        .media
        .probe_duration_seconds(source_path)
        .await
        .map_err(|e| RunnerError::collaborator(e.to_string()))?;

    handlers
        .media
        .extract_thumbnail(source_path, thumbnail_path, None, THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT, THUMBNAIL_QUALITY)
        .await
        .map_err(|e| RunnerError::collaborator(e.to_string()))?;

    let thumbnail_object_key = format!(
        "{}/projects/{}/{}-thumbnail.jpg",
        payload.user_id,
        project_id,
        Utc::now().timestamp_millis()
    );

    handlers
        .object_store
        .upload(&payload.source_bucket, &thumbnail_object_key, thumbnail_path, "image/jpeg")
        .await
        .map_err(|e| RunnerError::collaborator(e.to_string()))?;

    handlers
        .repository
        .finish_thumbnail(project_id, &thumbnail_object_key, duration_seconds)
        .await?;

    handlers
        .repository
        .enqueue_successor(
            Some(project_id),
            None,
            JobType::Transcription,
            serde_json::json!({
                "projectId": project_id,
                "sourceObjectKey": payload.source_object_key,
                "sourceBucket": payload.source_bucket,
            }),
        )
        .await?;

    Ok(ThumbnailResult {
        message: "thumbnail generated".to_string(),
        thumbnail_object_key,
    })
}

//! Tagged payload and result variants, one per job type (Design Notes §9:
//! "Dynamic JSON payloads"). Parsed from the job's raw `serde_json::Value`
//! column at the Processor's dispatch point; the raw column itself is left
//! untouched in the store for forward compatibility.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::JobType;
use crate::error::RunnerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailPayload {
    #[serde(rename = "sourceObjectKey")]
    pub source_object_key: String,
    #[serde(rename = "sourceBucket")]
    pub source_bucket: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionPayload {
    #[serde(rename = "projectId")]
    pub project_id: Uuid,
    #[serde(rename = "sourceObjectKey")]
    pub source_object_key: String,
    #[serde(rename = "sourceBucket")]
    pub source_bucket: String,
}

fn default_shorts_count() -> Option<u32> {
    Some(3)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisPayload {
    #[serde(rename = "projectId")]
    pub project_id: Uuid,
    #[serde(rename = "shortsCount", default = "default_shorts_count")]
    pub shorts_count: Option<u32>,
    #[serde(rename = "customPrompt", default)]
    pub custom_prompt: Option<String>,
}

impl AnalysisPayload {
    pub fn shorts_count(&self) -> u32 {
        self.shorts_count.unwrap_or(3)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuttingPayload {
    #[serde(rename = "projectId")]
    pub project_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPayload {
    #[serde(rename = "projectId", default)]
    pub project_id: Option<Uuid>,
}

/// The parsed form of a job's payload column, keyed by job type.
#[derive(Debug, Clone)]
pub enum JobPayload {
    Thumbnail(ThumbnailPayload),
    Transcription(TranscriptionPayload),
    Analysis(AnalysisPayload),
    Cutting(CuttingPayload),
    Delivery(DeliveryPayload),
}

impl JobPayload {
    /// Parse the raw payload column according to `job_type`. Missing
    /// required fields surface as [`RunnerError::Validation`], never as a
    /// panic.
    pub fn parse(job_type: JobType, raw: Option<&serde_json::Value>) -> Result<Self, RunnerError> {
        let raw = raw.cloned().unwrap_or(serde_json::Value::Null);
        match job_type {
            JobType::Thumbnail => serde_json::from_value(raw)
                .map(JobPayload::Thumbnail)
                .map_err(|e| {
                    RunnerError::validation(format!(
                        "thumbnail job requires sourceObjectKey, sourceBucket, and userId in payload: {e}"
                    ))
                }),
            JobType::Transcription => serde_json::from_value(raw)
                .map(JobPayload::Transcription)
                .map_err(|e| {
                    RunnerError::validation(format!(
                        "transcription job requires projectId, sourceObjectKey, and sourceBucket in payload: {e}"
                    ))
                }),
            JobType::Analysis => serde_json::from_value(raw)
                .map(JobPayload::Analysis)
                .map_err(|e| {
                    RunnerError::validation(format!("analysis job requires projectId in payload: {e}"))
                }),
            JobType::Cutting => serde_json::from_value(raw)
                .map(JobPayload::Cutting)
                .map_err(|e| RunnerError::validation(format!("cutting job requires projectId in payload: {e}"))),
            JobType::Delivery => serde_json::from_value(raw)
                .map(JobPayload::Delivery)
                .map_err(|e| RunnerError::validation(format!("malformed delivery payload: {e}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailResult {
    pub message: String,
    #[serde(rename = "thumbnailObjectKey")]
    pub thumbnail_object_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub message: String,
    #[serde(rename = "textLength")]
    pub text_length: usize,
    #[serde(rename = "segmentCount")]
    pub segment_count: usize,
    pub language: String,
    #[serde(rename = "transcriptionId")]
    pub transcription_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortSummary {
    pub id: Uuid,
    pub title: String,
    pub duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub message: String,
    #[serde(rename = "shortsCreated")]
    pub shorts_created: usize,
    pub shorts: Vec<ShortSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StubResult {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn thumbnail_payload_requires_all_three_fields() {
        let err = JobPayload::parse(JobType::Thumbnail, None).unwrap_err();
        assert!(matches!(err, RunnerError::Validation(_)));

        let partial = json!({"sourceObjectKey": "a/v.mp4"});
        assert!(JobPayload::parse(JobType::Thumbnail, Some(&partial)).is_err());

        let complete = json!({
            "sourceObjectKey": "a/v.mp4",
            "sourceBucket": "b",
            "userId": "u1",
        });
        let parsed = JobPayload::parse(JobType::Thumbnail, Some(&complete)).unwrap();
        assert!(matches!(parsed, JobPayload::Thumbnail(_)));
    }

    #[test]
    fn analysis_payload_defaults_shorts_count_to_three() {
        let raw = json!({"projectId": Uuid::nil()});
        let JobPayload::Analysis(payload) = JobPayload::parse(JobType::Analysis, Some(&raw)).unwrap() else {
            panic!("expected analysis payload");
        };
        assert_eq!(payload.shorts_count(), 3);
        assert!(payload.custom_prompt.is_none());
    }

    #[test]
    fn delivery_payload_does_not_require_project_id() {
        let parsed = JobPayload::parse(JobType::Delivery, None).unwrap();
        assert!(matches!(parsed, JobPayload::Delivery(DeliveryPayload { project_id: None })));
    }

    #[test]
    fn cutting_payload_requires_project_id() {
        let err = JobPayload::parse(JobType::Cutting, None).unwrap_err();
        assert!(matches!(err, RunnerError::Validation(_)));

        let project_id = Uuid::new_v4();
        let complete = json!({"projectId": project_id});
        let JobPayload::Cutting(payload) = JobPayload::parse(JobType::Cutting, Some(&complete)).unwrap() else {
            panic!("expected cutting payload");
        };
        assert_eq!(payload.project_id, project_id);
    }
}

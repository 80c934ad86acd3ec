//! Domain types shared by every crate in the workspace: the queue entry
//! itself (`Job`) and the rows it indirectly produces (`Project`,
//! `Transcription`, `Short`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed enumeration of job types. Unknown strings are rejected at parse
/// time rather than represented — the Processor fails jobs with an
/// unrecognized `type` column instead of constructing this type for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Thumbnail,
    Transcription,
    Analysis,
    Cutting,
    Delivery,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Thumbnail => "thumbnail",
            JobType::Transcription => "transcription",
            JobType::Analysis => "analysis",
            JobType::Cutting => "cutting",
            JobType::Delivery => "delivery",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thumbnail" => Ok(JobType::Thumbnail),
            "transcription" => Ok(JobType::Transcription),
            "analysis" => Ok(JobType::Analysis),
            "cutting" => Ok(JobType::Cutting),
            "delivery" => Ok(JobType::Delivery),
            other => Err(other.to_string()),
        }
    }
}

/// Job lifecycle status. Terminal states (`Succeeded`, `Failed`, `Canceled`)
/// never transition further — see [`crate::repository::Repository`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Canceled
        )
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            "canceled" => Ok(JobStatus::Canceled),
            other => Err(other.to_string()),
        }
    }
}

/// The queue entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub short_id: Option<Uuid>,
    pub job_type: JobType,
    pub status: JobStatus,
    pub payload: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Independent enumeration driving `projects.status`. Not every variant is
/// reachable by the job types this core implements (`rendering`,
/// `delivering` belong to the `cutting`/`delivery` reserved nodes) but all
/// ten are represented since other parts of the product write this column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Uploading,
    Ready,
    Queued,
    Processing,
    Transcribing,
    Analyzing,
    Rendering,
    Delivering,
    Completed,
    Error,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Uploading => "uploading",
            ProjectStatus::Ready => "ready",
            ProjectStatus::Queued => "queued",
            ProjectStatus::Processing => "processing",
            ProjectStatus::Transcribing => "transcribing",
            ProjectStatus::Analyzing => "analyzing",
            ProjectStatus::Rendering => "rendering",
            ProjectStatus::Delivering => "delivering",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Error => "error",
        }
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploading" => Ok(ProjectStatus::Uploading),
            "ready" => Ok(ProjectStatus::Ready),
            "queued" => Ok(ProjectStatus::Queued),
            "processing" => Ok(ProjectStatus::Processing),
            "transcribing" => Ok(ProjectStatus::Transcribing),
            "analyzing" => Ok(ProjectStatus::Analyzing),
            "rendering" => Ok(ProjectStatus::Rendering),
            "delivering" => Ok(ProjectStatus::Delivering),
            "completed" => Ok(ProjectStatus::Completed),
            "error" => Ok(ProjectStatus::Error),
            other => Err(other.to_string()),
        }
    }
}

/// External entity the core mutates but does not own the schema of. Only
/// the columns this core reads or writes are modeled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub source_object_key: String,
    pub source_bucket: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<f64>,
    pub file_size_bytes: Option<i64>,
    pub status: ProjectStatus,
    pub priority: Option<f64>,
    pub error_message: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A single transcript segment. `start <= end`; no gap invariant between
/// consecutive segments is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// One per project, inserted by the transcription handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcription {
    pub id: Uuid,
    pub project_id: Uuid,
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
    pub language: Option<String>,
    pub duration_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Zero or more per project; produced by the analysis handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl ShortStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShortStatus::Pending => "pending",
            ShortStatus::Processing => "processing",
            ShortStatus::Completed => "completed",
            ShortStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Short {
    pub id: Uuid,
    pub project_id: Uuid,
    pub transcription_slice: String,
    pub start_time: f64,
    pub end_time: f64,
    pub output_object_key: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: ShortStatus,
    pub error_message: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a new [`Short`]; timestamps are always assigned
/// by the repository implementation. `id` is normally assigned by the
/// repository too (`None`), but the analysis handler must embed a short's
/// id in its object-store keys *before* the row exists, so callers may
/// pre-generate one and the repository honors it instead of minting a
/// fresh one.
#[derive(Debug, Clone)]
pub struct NewShort {
    pub id: Option<Uuid>,
    pub project_id: Uuid,
    pub transcription_slice: String,
    pub start_time: f64,
    pub end_time: f64,
    pub output_object_key: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: ShortStatus,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn job_type_round_trips_through_its_string_form() {
        for t in [
            JobType::Thumbnail,
            JobType::Transcription,
            JobType::Analysis,
            JobType::Cutting,
            JobType::Delivery,
        ] {
            assert_eq!(JobType::from_str(t.as_str()).unwrap(), t);
        }
        assert!(JobType::from_str("unknown").is_err());
    }

    #[test]
    fn only_terminal_statuses_report_terminal() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
    }
}

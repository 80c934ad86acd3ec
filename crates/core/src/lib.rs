//! Domain types and the Job Repository contract for the clipqueue job
//! runner — the database-backed queue control plane described in
//! `SPEC_FULL.md`. This crate has no IO of its own: it defines what a job
//! is, what a repository implementation must provide, and the error
//! taxonomy every other crate in the workspace reports through.

mod domain;
mod error;
mod payload;
mod repository;

pub use domain::{
    Job, JobStatus, JobType, NewShort, Project, ProjectStatus, Short, ShortStatus, Transcription,
    TranscriptSegment,
};
pub use error::{ErrorCategory, RunnerError, RunnerResult};
pub use payload::{
    AnalysisPayload, AnalysisResult, CuttingPayload, DeliveryPayload, JobPayload, ShortSummary,
    StubResult, ThumbnailPayload, ThumbnailResult, TranscriptionPayload, TranscriptionResult,
};
pub use repository::{Repository, TransitionOutcome};

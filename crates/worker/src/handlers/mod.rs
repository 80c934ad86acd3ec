//! Per-job-type handlers (spec §4.4). Each submodule owns one node of the
//! workflow graph; [`Handlers`] bundles the shared collaborators and
//! repository every handler needs.

pub mod analysis;
pub mod reserved;
pub mod thumbnail;
pub mod transcription;

use std::path::PathBuf;
use std::sync::Arc;

use clipqueue_collaborators::{MediaToolchain, ObjectStore, SpeechToText, TextGenClient};
use clipqueue_core::Repository;

/// Shared handler context: the repository and every external collaborator,
/// plus the default upload bucket used by the `analysis` handler's clip and
/// thumbnail uploads (spec §6, `TIGRIS_BUCKET`) and the directory scoped
/// temporary files are created under.
#[derive(Clone)]
pub struct Handlers {
    pub repository: Arc<dyn Repository>,
    pub object_store: Arc<dyn ObjectStore>,
    pub media: Arc<dyn MediaToolchain>,
    pub speech: Arc<dyn SpeechToText>,
    pub textgen: Arc<dyn TextGenClient>,
    pub default_bucket: String,
    pub temp_dir: PathBuf,
}

impl Handlers {
    pub fn new(
        repository: Arc<dyn Repository>,
        object_store: Arc<dyn ObjectStore>,
        media: Arc<dyn MediaToolchain>,
        speech: Arc<dyn SpeechToText>,
        textgen: Arc<dyn TextGenClient>,
        default_bucket: String,
    ) -> Self {
        Self {
            repository,
            object_store,
            media,
            speech,
            textgen,
            default_bucket,
            temp_dir: std::env::temp_dir(),
        }
    }

    /// A unique scoped path for a job's temporary download/output files
    /// (spec §4.4.5: "each temp path is unique; includes job-id and a
    /// random component").
    pub fn scoped_temp_path(&self, job_id: uuid::Uuid, suffix: &str) -> PathBuf {
        self.temp_dir
            .join(format!("clipqueue-{job_id}-{}-{suffix}", uuid::Uuid::new_v4()))
    }
}

/// Best-effort delete; failures are logged, never propagated (spec §4.4.5).
pub(crate) async fn cleanup(path: &std::path::Path) {
    if let Err(error) = tokio::fs::remove_file(path).await {
        if error.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), %error, "failed to remove temporary file");
        }
    }
}

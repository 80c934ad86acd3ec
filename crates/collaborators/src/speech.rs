//! The speech-to-text collaborator (spec §2, §5 "in-process CPU-bound
//! work... runs on a background thread pool and its completion is
//! awaited"). Grounded in `original_source/apps/jobs/utils/transcription.py`,
//! which runs `faster-whisper` via `loop.run_in_executor`; this rendition
//! uses `whisper-rs` (native `whisper.cpp` bindings, the ecosystem-standard
//! in-process choice — no `faster-whisper` equivalent on crates.io) behind
//! `tokio::task::spawn_blocking`, which is the Rust analogue of the same
//! executor hand-off.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

#[derive(Debug, Error)]
pub enum SpeechToTextError {
    #[error("failed to decode audio track: {0}")]
    Decode(String),

    #[error("failed to load speech model: {0}")]
    ModelLoad(String),

    #[error("transcription failed: {0}")]
    Inference(String),

    #[error("background transcription task panicked: {0}")]
    TaskJoin(String),
}

/// One transcript segment, mirroring the `WhisperSegment` shape in
/// `original_source/apps/jobs/models.py`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
    pub language: String,
}

/// Transcribes a local video/audio file. Implementations decode the audio
/// track themselves; the caller only ever hands over a filesystem path.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, media_path: &Path) -> Result<TranscriptionOutcome, SpeechToTextError>;
}

/// `whisper.cpp`-backed implementation. Decodes audio with `ffmpeg` to
/// mono 16kHz PCM (the sample rate `whisper.cpp` requires) and runs
/// inference on the blocking thread pool, beam size 5 to match the
/// source's `beam_size=5`.
pub struct WhisperSpeechToText {
    model_path: PathBuf,
    ffmpeg_binary: String,
}

impl WhisperSpeechToText {
    pub fn new(model_path: impl Into<PathBuf>, ffmpeg_binary: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            ffmpeg_binary: ffmpeg_binary.into(),
        }
    }

    async fn decode_to_pcm(&self, media_path: &Path) -> Result<Vec<f32>, SpeechToTextError> {
        use tokio::process::Command;
        use std::process::Stdio;

        tracing::debug!(media_path = %media_path.display(), "decoding audio track to 16kHz mono PCM");

        let output = Command::new(&self.ffmpeg_binary)
            .args([
                "-v",
                "error",
                "-i",
            ])
            .arg(media_path)
            .args(["-f", "f32le", "-ac", "1", "-ar", "16000", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                let error = e.to_string();
                tracing::warn!(media_path = %media_path.display(), %error, "failed to spawn ffmpeg for audio decode");
                SpeechToTextError::Decode(error)
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(media_path = %media_path.display(), %stderr, "ffmpeg audio decode exited with a failure");
            return Err(SpeechToTextError::Decode(stderr));
        }

        let samples: Vec<f32> = output
            .stdout
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        tracing::debug!(samples = samples.len(), "audio decode complete");
        Ok(samples)
    }
}

#[async_trait]
impl SpeechToText for WhisperSpeechToText {
    async fn transcribe(&self, media_path: &Path) -> Result<TranscriptionOutcome, SpeechToTextError> {
        let samples = self.decode_to_pcm(media_path).await?;
        let model_path = self.model_path.clone();

        tracing::debug!(media_path = %media_path.display(), "handing transcription off to blocking thread pool");
        let outcome = tokio::task::spawn_blocking(move || transcribe_sync(&model_path, &samples))
            .await
            .map_err(|e| {
                let error = e.to_string();
                tracing::warn!(%error, "transcription task panicked");
                SpeechToTextError::TaskJoin(error)
            })??;

        tracing::debug!(
            language = %outcome.language,
            segments = outcome.segments.len(),
            "transcription complete"
        );
        Ok(outcome)
    }
}

fn transcribe_sync(model_path: &Path, samples: &[f32]) -> Result<TranscriptionOutcome, SpeechToTextError> {
    tracing::debug!(model_path = %model_path.display(), samples = samples.len(), "running whisper inference");

    let ctx = WhisperContext::new_with_params(
        &model_path.to_string_lossy(),
        WhisperContextParameters::default(),
    )
    .map_err(|e| {
        let error = e.to_string();
        tracing::warn!(model_path = %model_path.display(), %error, "failed to load speech model");
        SpeechToTextError::ModelLoad(error)
    })?;

    let mut state = ctx
        .create_state()
        .map_err(|e| SpeechToTextError::ModelLoad(e.to_string()))?;

    let mut params = FullParams::new(SamplingStrategy::BeamSearch { beam_size: 5, patience: 1.0 });
    params.set_token_timestamps(true);
    params.set_language(None);

    state
        .full(params, samples)
        .map_err(|e| SpeechToTextError::Inference(e.to_string()))?;

    let num_segments = state
        .full_n_segments()
        .map_err(|e| SpeechToTextError::Inference(e.to_string()))?;

    let mut segments = Vec::with_capacity(num_segments as usize);
    let mut full_text_parts = Vec::with_capacity(num_segments as usize);

    for i in 0..num_segments {
        let text = state
            .full_get_segment_text(i)
            .map_err(|e| SpeechToTextError::Inference(e.to_string()))?
            .trim()
            .to_string();
        let start = state
            .full_get_segment_t0(i)
            .map_err(|e| SpeechToTextError::Inference(e.to_string()))? as f64
            / 100.0;
        let end = state
            .full_get_segment_t1(i)
            .map_err(|e| SpeechToTextError::Inference(e.to_string()))? as f64
            / 100.0;

        full_text_parts.push(text.clone());
        segments.push(TranscriptSegment { start, end, text });
    }

    let language = state
        .full_lang_id()
        .ok()
        .and_then(|id| whisper_rs::get_lang_str(id))
        .unwrap_or("unknown")
        .to_string();

    Ok(TranscriptionOutcome {
        text: full_text_parts.join(" ").trim().to_string(),
        segments,
        language,
    })
}

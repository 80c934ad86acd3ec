//! The media toolchain collaborator: ffprobe/ffmpeg subprocesses (spec §2,
//! §4.4.5, §5 "subprocess invocations are asynchronous"). Grounded in
//! `original_source/apps/jobs/utils/ffmpeg.py`.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to launch {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{binary} exited with a failure: {stderr}")]
    NonZeroExit { binary: String, stderr: String },

    #[error("could not parse {binary} output: {0}")]
    MalformedOutput(String),
}

/// Video probing and frame/clip extraction. One call per operation;
/// implementations own their own binary resolution (`FFMPEG_BINARY`
/// override, spec §6).
#[async_trait]
pub trait MediaToolchain: Send + Sync {
    async fn probe_duration_seconds(&self, video_path: &Path) -> Result<f64, MediaError>;

    /// Extract a single frame. `timestamp_seconds = None` means 25% into
    /// the video, resolved via `probe_duration_seconds` first (spec
    /// §4.4.1's default).
    async fn extract_thumbnail(
        &self,
        video_path: &Path,
        output_path: &Path,
        timestamp_seconds: Option<f64>,
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<(), MediaError>;

    /// Stream-copy a clip between two absolute timestamps — no re-encode
    /// (spec §4.4.3.a).
    async fn extract_clip(
        &self,
        video_path: &Path,
        output_path: &Path,
        start_seconds: f64,
        end_seconds: f64,
    ) -> Result<(), MediaError>;
}

/// Subprocess-backed implementation. `ffprobe_binary`/`ffmpeg_binary`
/// default to the bare command names on `PATH`; `FFMPEG_BINARY` (spec §6)
/// overrides the ffmpeg binary only, matching the source's single
/// environment override.
pub struct FfmpegMediaToolchain {
    ffprobe_binary: String,
    ffmpeg_binary: String,
}

impl FfmpegMediaToolchain {
    pub fn new(ffmpeg_binary_override: Option<String>) -> Self {
        Self {
            ffprobe_binary: "ffprobe".to_string(),
            ffmpeg_binary: ffmpeg_binary_override.unwrap_or_else(|| "ffmpeg".to_string()),
        }
    }

    async fn run(&self, binary: &str, args: &[&str]) -> Result<Vec<u8>, MediaError> {
        tracing::debug!(binary, args = ?args, "spawning media toolchain subprocess");

        let output = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| {
                tracing::warn!(binary, %source, "failed to spawn media toolchain subprocess");
                MediaError::Spawn {
                    binary: binary.to_string(),
                    source,
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(binary, status = ?output.status, %stderr, "media toolchain subprocess exited with a failure");
            return Err(MediaError::NonZeroExit {
                binary: binary.to_string(),
                stderr,
            });
        }

        tracing::debug!(binary, bytes = output.stdout.len(), "media toolchain subprocess completed");
        Ok(output.stdout)
    }
}

#[derive(Deserialize)]
struct FfprobeFormat {
    format: FfprobeFormatInner,
}

#[derive(Deserialize)]
struct FfprobeFormatInner {
    duration: String,
}

#[async_trait]
impl MediaToolchain for FfmpegMediaToolchain {
    async fn probe_duration_seconds(&self, video_path: &Path) -> Result<f64, MediaError> {
        let path = video_path.to_string_lossy();
        let stdout = self
            .run(
                &self.ffprobe_binary,
                &["-v", "error", "-show_entries", "format=duration", "-of", "json", &path],
            )
            .await?;

        let parsed: FfprobeFormat = serde_json::from_slice(&stdout)
            .map_err(|e| MediaError::MalformedOutput(e.to_string()))?;

        parsed
            .format
            .duration
            .parse::<f64>()
            .map_err(|e| MediaError::MalformedOutput(e.to_string()))
    }

    async fn extract_thumbnail(
        &self,
        video_path: &Path,
        output_path: &Path,
        timestamp_seconds: Option<f64>,
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<(), MediaError> {
        let timestamp = match timestamp_seconds {
            Some(t) => t,
            None => self.probe_duration_seconds(video_path).await? * 0.25,
        };

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| MediaError::Spawn {
                    binary: self.ffmpeg_binary.clone(),
                    source,
                })?;
        }

        let video_path = video_path.to_string_lossy();
        let output_path_str = output_path.to_string_lossy();
        let timestamp = timestamp.to_string();
        let scale = format!(
            "scale={width}:{height}:force_original_aspect_ratio=decrease,pad={width}:{height}:(ow-iw)/2:(oh-ih)/2"
        );
        let quality = quality.to_string();

        self.run(
            &self.ffmpeg_binary,
            &[
                "-ss",
                &timestamp,
                "-i",
                &video_path,
                "-vframes",
                "1",
                "-vf",
                &scale,
                "-q:v",
                &quality,
                "-y",
                &output_path_str,
            ],
        )
        .await?;

        Ok(())
    }

    async fn extract_clip(
        &self,
        video_path: &Path,
        output_path: &Path,
        start_seconds: f64,
        end_seconds: f64,
    ) -> Result<(), MediaError> {
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| MediaError::Spawn {
                    binary: self.ffmpeg_binary.clone(),
                    source,
                })?;
        }

        let video_path = video_path.to_string_lossy();
        let output_path_str = output_path.to_string_lossy();
        let start = start_seconds.to_string();
        let end = end_seconds.to_string();

        self.run(
            &self.ffmpeg_binary,
            &[
                "-ss",
                &start,
                "-to",
                &end,
                "-i",
                &video_path,
                "-c",
                "copy",
                "-avoid_negative_ts",
                "make_zero",
                "-y",
                &output_path_str,
            ],
        )
        .await?;

        Ok(())
    }
}

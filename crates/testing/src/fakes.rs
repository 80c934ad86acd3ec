//! Fake collaborators standing in for the object store, media toolchain,
//! speech-to-text engine, and text-generation client in tests. Each fake
//! is configured up front and records enough call history for scenario
//! assertions (e.g. S3's "fail clip extraction on suggestion #2 only").

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use clipqueue_collaborators::{
    MediaError, MediaToolchain, ObjectStore, ObjectStoreError, ShortSuggestion, SpeechToText,
    SpeechToTextError, TextGenClient, TextGenError, TranscriptLine, TranscriptSegment,
    TranscriptionOutcome,
};

/// Byte-addressable fake object store keyed by `(bucket, object_key)`.
#[derive(Default)]
pub struct FakeObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, bucket: &str, object_key: &str, bytes: Vec<u8>) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), object_key.to_string()), bytes);
    }

    pub fn uploaded(&self, bucket: &str, object_key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), object_key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn download(
        &self,
        bucket: &str,
        object_key: &str,
        destination: &Path,
    ) -> Result<(), ObjectStoreError> {
        let data = self
            .objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), object_key.to_string()))
            .cloned()
            .unwrap_or_else(|| b"fake-video-bytes".to_vec());
        tokio::fs::write(destination, data).await?;
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        object_key: &str,
        source: &Path,
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let data = tokio::fs::read(source).await?;
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), object_key.to_string()), data);
        Ok(())
    }
}

/// Configurable fake media toolchain. `duration_seconds` backs
/// `probe_duration_seconds`; `fail_clip_at_call` (1-indexed) makes the Nth
/// `extract_clip` invocation fail, for isolating one failing clip among
/// several suggestions. `probe_delay` stands in for a slow ffprobe call,
/// for draining scenarios that need a job to still be in flight a few
/// hundred milliseconds after it starts.
pub struct FakeMediaToolchain {
    pub duration_seconds: f64,
    pub fail_clip_at_call: Option<usize>,
    pub probe_delay: Option<std::time::Duration>,
    clip_call_count: AtomicUsize,
}

impl FakeMediaToolchain {
    pub fn new(duration_seconds: f64) -> Self {
        Self {
            duration_seconds,
            fail_clip_at_call: None,
            probe_delay: None,
            clip_call_count: AtomicUsize::new(0),
        }
    }

    pub fn failing_clip_at(mut self, call_index: usize) -> Self {
        self.fail_clip_at_call = Some(call_index);
        self
    }

    pub fn with_probe_delay(mut self, delay: std::time::Duration) -> Self {
        self.probe_delay = Some(delay);
        self
    }
}

#[async_trait]
impl MediaToolchain for FakeMediaToolchain {
    async fn probe_duration_seconds(&self, _video_path: &Path) -> Result<f64, MediaError> {
        if let Some(delay) = self.probe_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.duration_seconds)
    }

    async fn extract_thumbnail(
        &self,
        _video_path: &Path,
        output_path: &Path,
        _timestamp_seconds: Option<f64>,
        _width: u32,
        _height: u32,
        _quality: u8,
    ) -> Result<(), MediaError> {
        if let Some(parent) = output_path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        tokio::fs::write(output_path, [0xFFu8])
            .await
            .map_err(|e| MediaError::NonZeroExit {
                binary: "fake-ffmpeg".to_string(),
                stderr: e.to_string(),
            })?;
        Ok(())
    }

    async fn extract_clip(
        &self,
        _video_path: &Path,
        output_path: &Path,
        _start_seconds: f64,
        _end_seconds: f64,
    ) -> Result<(), MediaError> {
        let call_index = self.clip_call_count.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_clip_at_call == Some(call_index) {
            return Err(MediaError::NonZeroExit {
                binary: "fake-ffmpeg".to_string(),
                stderr: "simulated clip extraction failure".to_string(),
            });
        }
        if let Some(parent) = output_path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        tokio::fs::write(output_path, [0xFFu8])
            .await
            .map_err(|e| MediaError::NonZeroExit {
                binary: "fake-ffmpeg".to_string(),
                stderr: e.to_string(),
            })?;
        Ok(())
    }
}

/// Fake speech-to-text engine returning a canned transcript.
pub struct FakeSpeechToText {
    pub outcome: TranscriptionOutcome,
}

impl FakeSpeechToText {
    pub fn new(text: &str, segments: Vec<TranscriptSegment>, language: &str) -> Self {
        Self {
            outcome: TranscriptionOutcome {
                text: text.to_string(),
                segments,
                language: language.to_string(),
            },
        }
    }
}

#[async_trait]
impl SpeechToText for FakeSpeechToText {
    async fn transcribe(&self, _media_path: &Path) -> Result<TranscriptionOutcome, SpeechToTextError> {
        Ok(TranscriptionOutcome {
            text: self.outcome.text.clone(),
            segments: self.outcome.segments.clone(),
            language: self.outcome.language.clone(),
        })
    }
}

/// Fake text-generation client returning a canned list of suggestions, or
/// a configured error to exercise the "outer JSON unparseable fails the
/// job" path.
pub struct FakeTextGenClient {
    pub suggestions: Vec<ShortSuggestionSeed>,
    pub fail_with: Option<String>,
}

/// Plain seed data for a [`ShortSuggestion`] (that type has no public
/// constructor since its fields are populated from parsed JSON).
pub struct ShortSuggestionSeed {
    pub segment_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub transcription: String,
}

impl FakeTextGenClient {
    pub fn new(suggestions: Vec<ShortSuggestionSeed>) -> Self {
        Self {
            suggestions,
            fail_with: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            suggestions: Vec::new(),
            fail_with: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl TextGenClient for FakeTextGenClient {
    async fn suggest_shorts(
        &self,
        _transcript_lines: &[TranscriptLine],
        _num_shorts: u32,
        _custom_prompt: Option<&str>,
    ) -> Result<Vec<ShortSuggestion>, TextGenError> {
        if let Some(message) = &self.fail_with {
            return Err(TextGenError::InvalidJson(message.clone()));
        }
        Ok(self
            .suggestions
            .iter()
            .map(|s| ShortSuggestion {
                segment_id: s.segment_id.clone(),
                start_time: s.start_time,
                end_time: s.end_time,
                transcription: s.transcription.clone(),
            })
            .collect())
    }
}

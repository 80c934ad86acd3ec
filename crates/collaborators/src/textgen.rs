//! The text-generation collaborator (spec §2, §4.4.3): an OpenRouter-shaped
//! HTTP client over `reqwest` plus the prompt formatting and response
//! parsing helpers. Grounded in
//! `original_source/apps/jobs/utils/ai.py`'s `analyze_transcript_for_shorts`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextGenError {
    #[error("text-generation request failed: {0}")]
    Request(String),

    #[error("text-generation response was missing expected fields: {0}")]
    MalformedResponse(String),

    #[error("could not parse suggestions JSON: {0}")]
    InvalidJson(String),
}

/// One suggested clip, mirroring `ShortSuggestion` in
/// `original_source/apps/jobs/utils/ai.py`. Timestamps are already resolved
/// to seconds by [`parse_timestamp`].
#[derive(Debug, Clone, Deserialize)]
pub struct ShortSuggestion {
    pub segment_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub transcription: String,
}

impl ShortSuggestion {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// A single `{start, end, text}` triple as accepted by
/// [`format_transcript_for_ai`]. Kept decoupled from
/// `clipqueue_core::TranscriptSegment` so this crate has no dependency on
/// `crates/core`.
pub struct TranscriptLine {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Renders "HH:MM:SS - HH:MM:SS: text" per segment (spec §4.4.3), matching
/// `format_transcript_for_ai` byte-for-byte in structure.
pub fn format_transcript_for_ai(segments: &[TranscriptLine]) -> String {
    segments
        .iter()
        .map(|seg| {
            format!(
                "{} - {}: {}",
                format_hms(seg.start),
                format_hms(seg.end),
                seg.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_hms(total_seconds: f64) -> String {
    let total = total_seconds as i64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

/// Parses `HH:MM:SS[,.]mmm` or `MM:SS[,.]mmm` into seconds (spec §8 property
/// 7, `parse_timestamp` in `ai.py`).
pub fn parse_timestamp(raw: &str) -> Result<f64, TextGenError> {
    let normalized = raw.replace(',', ".");
    let (time_part, ms_part) = match normalized.split_once('.') {
        Some((t, ms)) => (t, ms),
        None => (normalized.as_str(), "0"),
    };

    let parts: Vec<&str> = time_part.split(':').collect();
    let whole_seconds: i64 = match parts.as_slice() {
        [h, m, s] => {
            let h: i64 = h
                .parse()
                .map_err(|_| TextGenError::InvalidJson(format!("invalid timestamp: {raw}")))?;
            let m: i64 = m
                .parse()
                .map_err(|_| TextGenError::InvalidJson(format!("invalid timestamp: {raw}")))?;
            let s: i64 = s
                .parse()
                .map_err(|_| TextGenError::InvalidJson(format!("invalid timestamp: {raw}")))?;
            h * 3600 + m * 60 + s
        }
        [m, s] => {
            let m: i64 = m
                .parse()
                .map_err(|_| TextGenError::InvalidJson(format!("invalid timestamp: {raw}")))?;
            let s: i64 = s
                .parse()
                .map_err(|_| TextGenError::InvalidJson(format!("invalid timestamp: {raw}")))?;
            m * 60 + s
        }
        _ => return Err(TextGenError::InvalidJson(format!("invalid timestamp: {raw}"))),
    };

    let ms: f64 = format!("0.{ms_part}")
        .parse()
        .map_err(|_| TextGenError::InvalidJson(format!("invalid timestamp: {raw}")))?;

    Ok(whole_seconds as f64 + ms)
}

/// Strips surrounding ```` ```json ```` / ```` ``` ```` fences (spec §4.4.3).
fn strip_code_fence(content: &str) -> &str {
    let mut s = content.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    s.trim().strip_suffix("```").unwrap_or(s).trim()
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    segment_id: String,
    start_time: String,
    end_time: String,
    transcription: String,
}

/// Parses the model's response content into suggestions. The outer JSON
/// must parse (failure here fails the job per spec §4.4.3); individual
/// malformed entries (bad timestamp, missing field) are skipped silently.
pub fn parse_suggestions(content: &str) -> Result<Vec<ShortSuggestion>, TextGenError> {
    let stripped = strip_code_fence(content);
    let raw: Vec<RawSuggestion> = serde_json::from_str(stripped)
        .map_err(|e| TextGenError::InvalidJson(format!("{e}: {stripped}")))?;

    Ok(raw
        .into_iter()
        .filter_map(|r| {
            let start_time = parse_timestamp(&r.start_time).ok()?;
            let end_time = parse_timestamp(&r.end_time).ok()?;
            Some(ShortSuggestion {
                segment_id: r.segment_id,
                start_time,
                end_time,
                transcription: r.transcription,
            })
        })
        .collect())
}

/// Calls a chat-completions-shaped text-generation model and returns parsed
/// clip suggestions for a formatted transcript.
#[async_trait]
pub trait TextGenClient: Send + Sync {
    async fn suggest_shorts(
        &self,
        transcript_lines: &[TranscriptLine],
        num_shorts: u32,
        custom_prompt: Option<&str>,
    ) -> Result<Vec<ShortSuggestion>, TextGenError>;
}

/// OpenRouter-shaped client (spec §6 `OPENROUTER_API_KEY`), 120s connection
/// timeout per spec §5.
pub struct OpenRouterTextGenClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenRouterTextGenClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("reqwest client builds with static config"),
            api_key: api_key.into(),
            model: "openai/gpt-4o".to_string(),
        }
    }

    fn build_prompt(num_shorts: u32, custom_prompt: Option<&str>, transcript: &str) -> String {
        let custom_section = match custom_prompt {
            Some(p) if !p.trim().is_empty() => format!("\n\nCustom Instructions:\n{p}\n"),
            _ => String::new(),
        };

        format!(
            "You are analyzing a video transcript to find the best moments for creating {num_shorts} \
short-form videos (ideally between 30 and 45 seconds, max 60 seconds if needed for message \
consistency).\n{custom_section}\nCriteria for selection:\n- Engaging moments (exciting, funny, \
emotionally compelling)\n- High information density (valuable tips, insights, key points)\n- \
Complete thoughts (not cut off mid-sentence or mid-idea)\n- Natural start and end points (speech \
pauses, topic transitions)\n- Self-contained segments that feel like standalone content, not \
fragments\n\nTranscript with timestamps:\n{transcript}\n\nPlease identify the {num_shorts} best \
segments. Return your response as a JSON array with this exact format:\n[\n  {{\n    \
\"segment_id\": \"001\",\n    \"start_time\": \"00:01:23,456\",\n    \"end_time\": \
\"00:02:05,789\",\n    \"transcription\": \"The exact words spoken in this segment...\"\n  }}\n]\n\n\
Return ONLY the JSON array, no other text."
        )
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Serialize)]
struct ChatMessageIn<'a> {
    role: &'a str,
    content: &'a str,
}

#[async_trait]
impl TextGenClient for OpenRouterTextGenClient {
    async fn suggest_shorts(
        &self,
        transcript_lines: &[TranscriptLine],
        num_shorts: u32,
        custom_prompt: Option<&str>,
    ) -> Result<Vec<ShortSuggestion>, TextGenError> {
        let transcript = format_transcript_for_ai(transcript_lines);
        let prompt = Self::build_prompt(num_shorts, custom_prompt, &transcript);

        tracing::debug!(model = %self.model, num_shorts, "requesting short suggestions from text-generation model");

        let response = self
            .http
            .post("https://openrouter.ai/api/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", "https://videditor.app")
            .json(&json!({
                "model": self.model,
                "messages": [ChatMessageIn { role: "user", content: &prompt }],
                "temperature": 0.7,
                "max_tokens": 4000,
            }))
            .send()
            .await
            .map_err(|e| {
                let error = e.to_string();
                tracing::warn!(model = %self.model, %error, "text-generation request failed");
                TextGenError::Request(error)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(model = %self.model, %status, %body, "text-generation request returned a failure status");
            return Err(TextGenError::Request(format!("{status}: {body}")));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            let error = e.to_string();
            tracing::warn!(model = %self.model, %error, "text-generation response body did not match the expected shape");
            TextGenError::MalformedResponse(error)
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                tracing::warn!(model = %self.model, "text-generation response had an empty choices array");
                TextGenError::MalformedResponse("empty choices array".to_string())
            })?
            .message
            .content;

        let suggestions = parse_suggestions(&content)?;
        tracing::debug!(model = %self.model, suggestions = suggestions.len(), "parsed short suggestions");
        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_timestamp_round_trips_hms_with_comma_millis() {
        for h in [0, 1, 23] {
            for m in [0, 30, 59] {
                for s in [0, 30, 59] {
                    for ms in [0, 1, 999] {
                        let raw = format!("{h:02}:{m:02}:{s:02},{ms:03}");
                        let expected = (h * 3600 + m * 60 + s) as f64 + ms as f64 / 1000.0;
                        let got = parse_timestamp(&raw).unwrap();
                        assert!((got - expected).abs() < 1e-6, "{raw} -> {got}, want {expected}");
                    }
                }
            }
        }
    }

    #[test]
    fn parse_timestamp_accepts_period_and_mm_ss_forms() {
        assert!((parse_timestamp("00:01:02.500").unwrap() - 62.5).abs() < 1e-9);
        assert!((parse_timestamp("01:02,500").unwrap() - 62.5).abs() < 1e-9);
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("not-a-timestamp").is_err());
    }

    #[test]
    fn strip_code_fence_handles_json_and_bare_fences() {
        assert_eq!(strip_code_fence("```json\n[1,2]\n```"), "[1,2]");
        assert_eq!(strip_code_fence("```\n[1,2]\n```"), "[1,2]");
        assert_eq!(strip_code_fence("[1,2]"), "[1,2]");
    }

    #[test]
    fn parse_suggestions_skips_malformed_entries_but_keeps_the_rest() {
        let content = r#"[
            {"segment_id": "001", "start_time": "00:00:01,000", "end_time": "00:00:31,000", "transcription": "a"},
            {"segment_id": "002", "start_time": "garbage", "end_time": "00:00:31,000", "transcription": "b"},
            {"segment_id": "003", "start_time": "00:01:00,000", "end_time": "00:01:40,000", "transcription": "c"}
        ]"#;
        let suggestions = parse_suggestions(content).unwrap();
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].segment_id, "001");
        assert_eq!(suggestions[1].segment_id, "003");
    }

    #[test]
    fn parse_suggestions_fails_outer_json_that_is_unparseable() {
        assert!(parse_suggestions("not json at all").is_err());
    }

    #[test]
    fn format_transcript_renders_hh_mm_ss_ranges() {
        let lines = vec![TranscriptLine {
            start: 5.0,
            end: 65.0,
            text: "hello world".to_string(),
        }];
        assert_eq!(format_transcript_for_ai(&lines), "00:00:05 - 00:01:05: hello world");
    }
}

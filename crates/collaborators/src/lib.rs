//! External collaborator clients (spec §2, "Out of scope" list): the
//! object store, the media toolchain, the speech-to-text engine, and the
//! text-generation client. Each is a narrow trait so that `crates/testing`
//! can substitute fakes without touching `crates/worker`'s handler code.

mod media;
mod object_store;
mod speech;
mod textgen;

pub use media::{FfmpegMediaToolchain, MediaError, MediaToolchain};
pub use object_store::{ObjectStore, ObjectStoreError, S3ObjectStore};
pub use speech::{SpeechToText, SpeechToTextError, TranscriptSegment, TranscriptionOutcome, WhisperSpeechToText};
pub use textgen::{
    parse_timestamp, parse_suggestions, ShortSuggestion, TextGenClient, TextGenError,
    TranscriptLine, format_transcript_for_ai, OpenRouterTextGenClient,
};

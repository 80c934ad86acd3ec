//! In-memory `Repository` and fake collaborators for clipqueue's
//! integration test suite: test-only infrastructure lives in its own crate
//! so `crates/worker`'s production dependency graph never pulls it in.

mod fakes;
mod in_memory_repository;

pub use fakes::{FakeMediaToolchain, FakeObjectStore, FakeSpeechToText, FakeTextGenClient, ShortSuggestionSeed};
pub use in_memory_repository::InMemoryRepository;

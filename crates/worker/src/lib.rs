//! Library surface for `clipqueue-worker` (spec §4): configuration, the
//! per-job-type handlers, the health endpoint, the Processor, and the poll
//! loop. Split out from `main.rs` so `tests/` can drive the whole pipeline
//! against [`clipqueue_testing::InMemoryRepository`] without a database.

pub mod config;
pub mod handlers;
pub mod health;
pub mod processor;
pub mod worker;

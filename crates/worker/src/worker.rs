//! The poll loop (spec §4.5). Rust rendition of
//! `original_source/apps/jobs/worker.py`'s `JobWorker`: claim a bounded
//! batch, spawn one task per claimed job, and drain in-flight work on
//! shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clipqueue_core::Repository;
use dashmap::DashSet;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use uuid::Uuid;

use crate::processor::Processor;

/// Wall-clock budget for graceful drain (spec §5, "waits up to 30 s for
/// in-flight jobs to complete").
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Owns the poll loop task handle and the in-flight job set. Cloneable —
/// every clone shares the same underlying state, which is what lets the
/// health endpoint read `active_count()` concurrently with the poll loop
/// mutating it (spec §5, "In-flight set... no external readers beyond the
/// health endpoint, which reads size only").
#[derive(Clone)]
pub struct Worker {
    repository: Arc<dyn Repository>,
    processor: Arc<Processor>,
    concurrency: u32,
    poll_interval: Duration,
    in_flight: Arc<DashSet<Uuid>>,
    running: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(
        repository: Arc<dyn Repository>,
        processor: Arc<Processor>,
        concurrency: u32,
        poll_interval_ms: u64,
    ) -> Self {
        Self {
            repository,
            processor,
            concurrency,
            poll_interval: Duration::from_millis(poll_interval_ms),
            in_flight: Arc::new(DashSet::new()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn concurrency(&self) -> u32 {
        self.concurrency
    }

    /// Current in-flight count. The only reader outside this module (spec
    /// §4.6, §6 health contract).
    pub fn active_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Start the poll loop as a background task. Runs one poll immediately,
    /// then sleeps `poll_interval` between polls (spec §4.5 "Loop
    /// schedule").
    pub fn start(&self) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let worker = self.clone();
        tokio::spawn(async move { worker.poll_loop().await })
    }

    async fn poll_loop(&self) {
        tracing::info!(
            concurrency = self.concurrency,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "starting job worker"
        );

        self.poll_once().await;

        while self.running.load(Ordering::SeqCst) {
            sleep(self.poll_interval).await;
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.poll_once().await;
        }
    }

    async fn poll_once(&self) {
        let active = self.in_flight.len() as u32;
        if active >= self.concurrency {
            tracing::debug!(active, concurrency = self.concurrency, "at max concurrency, skipping poll");
            return;
        }

        let budget = (self.concurrency - active) as i64;
        let claimed = match self.repository.claim_ready(budget).await {
            Ok(jobs) => jobs,
            Err(error) => {
                // Transient store errors are not retried within this poll;
                // the next tick tries again (spec §7).
                tracing::error!(%error, "failed to poll for jobs");
                return;
            }
        };

        if claimed.is_empty() {
            return;
        }

        tracing::info!(count = claimed.len(), "claimed jobs from queue");

        for job in claimed {
            if !self.in_flight.insert(job.id) {
                continue;
            }
            let worker = self.clone();
            tokio::spawn(async move {
                // Never propagate exceptions to the poll loop (spec §4.5);
                // Processor::process already maps every outcome to a
                // terminal write and swallows its own errors.
                worker.processor.process(job.id).await;
                worker.in_flight.remove(&job.id);
            });
        }
    }

    /// Stop claiming and wait up to [`SHUTDOWN_GRACE`] for in-flight jobs to
    /// drain (spec §5). Jobs still running after the grace period are
    /// abandoned in `running` state for an external reaper to reclaim.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        tracing::info!("stopping job worker");
        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;

        while !self.in_flight.is_empty() && tokio::time::Instant::now() < deadline {
            tracing::info!(active = self.in_flight.len(), "waiting for active jobs to complete");
            sleep(Duration::from_secs(1)).await;
        }

        if self.in_flight.is_empty() {
            tracing::info!("all jobs completed, worker stopped");
        } else {
            tracing::warn!(active = self.in_flight.len(), "stopping worker with active jobs still running");
        }
    }
}

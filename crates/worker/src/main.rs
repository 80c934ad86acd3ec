//! The Supervisor — process entry point (spec §4.6). Rust rendition of
//! `original_source/apps/jobs/main.py`'s startup/shutdown ordering.

mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use clipqueue_collaborators::{FfmpegMediaToolchain, OpenRouterTextGenClient, S3ObjectStore, WhisperSpeechToText};
use clipqueue_core::Repository;
use clipqueue_postgres::PgRepository;
use clipqueue_worker::config::Config;
use clipqueue_worker::handlers::Handlers;
use clipqueue_worker::processor::Processor;
use clipqueue_worker::worker::Worker;
use clipqueue_worker::health;
use sqlx::postgres::PgPoolOptions;

/// Path to the `whisper.cpp` model file. Not in spec §6's recognized table
/// (speech-to-text is declared an out-of-scope collaborator) but still
/// needed to construct a concrete [`WhisperSpeechToText`]; defaults to the
/// conventional `ggml-base.en.bin` location used by whisper.cpp examples.
fn whisper_model_path() -> String {
    std::env::var("WHISPER_MODEL_PATH").unwrap_or_else(|_| "models/ggml-base.en.bin".to_string())
}

fn main() -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("failed to start async runtime: {error}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run())
}

async fn run() -> ExitCode {
    // 1. Load config.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("configuration error: {error}");
            return ExitCode::FAILURE;
        }
    };

    // 2. Initialize database pool. Sized >= concurrency * 2 (spec §5,
    // "Pool sizing ≥ concurrency × 2 to accommodate overlapping
    // transactions within a single job").
    let pool = match PgPoolOptions::new()
        .max_connections(config.job_concurrency * 2)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => pool,
        Err(error) => {
            eprintln!("failed to connect to database: {error}");
            return ExitCode::FAILURE;
        }
    };

    // 3. Build logger.
    logging::init(config.node_env);
    tracing::info!(node_env = ?config.node_env, port = config.port, "clipqueue worker starting");

    if config.openrouter_api_key.is_none() {
        tracing::warn!("OPENROUTER_API_KEY not set; analysis jobs will fail at the text-generation call");
    }

    let repository: Arc<dyn Repository> = Arc::new(PgRepository::new(pool.clone()));

    let object_store = Arc::new(S3ObjectStore::new(
        &config.tigris.endpoint,
        &config.tigris.region,
        &config.tigris.access_key_id,
        &config.tigris.secret_access_key,
    ));
    let media = Arc::new(FfmpegMediaToolchain::new(config.ffmpeg_binary.clone()));
    let speech = Arc::new(WhisperSpeechToText::new(
        whisper_model_path(),
        config.ffmpeg_binary.clone().unwrap_or_else(|| "ffmpeg".to_string()),
    ));
    let textgen = Arc::new(OpenRouterTextGenClient::new(
        config.openrouter_api_key.clone().unwrap_or_default(),
    ));

    let handlers = Handlers::new(
        repository.clone(),
        object_store,
        media,
        speech,
        textgen,
        config.tigris.bucket.clone(),
    );

    // 4. Construct Processor.
    let processor = Arc::new(Processor::new(handlers));

    // 5. Construct Worker.
    let worker = Worker::new(repository, processor, config.job_concurrency, config.poll_interval_ms);

    // 6. Start health endpoint.
    let health_handle = match health::serve(config.port, worker.clone()).await {
        Ok(handle) => handle,
        Err(error) => {
            eprintln!("failed to start health endpoint: {error}");
            return ExitCode::FAILURE;
        }
    };

    // 7. Start Worker.
    let worker_handle = worker.start();

    // 8. Install termination signal handlers and await shutdown.
    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received");

    // Shutdown order: stop Worker (drain) -> stop health endpoint -> close pool.
    worker.stop().await;
    worker_handle.abort();

    health_handle.abort();

    pool.close().await;
    tracing::info!("clipqueue worker stopped");

    ExitCode::SUCCESS
}

/// Waits for SIGTERM or SIGINT. Only the first of either is awaited; `run`
/// never calls this twice, so a duplicate signal during shutdown is simply
/// not observed by anyone (spec §5, "signal-initiated shutdown is
/// idempotent").
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let interrupt = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    tokio::select! {
        _ = terminate => {}
        _ = interrupt => {}
    }
}

//! The `/healthz` endpoint (spec §6, SPEC_FULL §6.3). Rust rendition of
//! `original_source/apps/jobs/server.py`'s FastAPI health route, served by
//! `axum` instead.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tokio::net::TcpListener;

use crate::worker::Worker;

#[derive(Clone)]
struct HealthState {
    worker: Worker,
}

#[derive(Serialize)]
struct WorkerHealth {
    concurrency: u32,
    #[serde(rename = "activeJobs")]
    active_jobs: usize,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: chrono::DateTime<Utc>,
    worker: WorkerHealth,
}

async fn healthz(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
        worker: WorkerHealth {
            concurrency: state.worker.concurrency(),
            active_jobs: state.worker.active_count(),
        },
    })
}

fn router(worker: Worker) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .with_state(HealthState { worker })
}

/// Bind and serve the health endpoint as a background task. Returns the
/// task handle; the Supervisor aborts it on shutdown (spec §4.6).
pub async fn serve(port: u16, worker: Worker) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "health endpoint listening");
    let app = router(worker);

    Ok(tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, app).await {
            tracing::error!(%error, "health endpoint server error");
        }
    }))
}

//! The `cutting` and `delivery` reserved nodes (spec §4.4.4): "invoked only
//! if explicitly enqueued," with no behavior specified beyond a successful
//! placeholder result. Neither performs I/O, so both are synchronous.
//! `cutting` is not exempted from the `projectId` requirement spec §3
//! places on every job type but `delivery` — `CuttingPayload::project_id`
//! is a required field, so a missing one is already rejected at
//! `JobPayload::parse` before this function ever runs.

use clipqueue_core::{CuttingPayload, DeliveryPayload, RunnerError, StubResult};

pub fn handle_cutting(payload: CuttingPayload) -> Result<StubResult, RunnerError> {
    Ok(StubResult {
        message: format!("cutting is a reserved node; no-op for project {}", payload.project_id),
    })
}

pub fn handle_delivery(payload: DeliveryPayload) -> Result<StubResult, RunnerError> {
    Ok(StubResult {
        message: format!(
            "delivery is a reserved node; no-op for project {:?}",
            payload.project_id
        ),
    })
}

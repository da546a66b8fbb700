use axum::{extract::State, http::StatusCode};
use std::sync::Arc;
use tracing::{error, info};

use super::{fail, ok, ApiResult};
use crate::app::AppState;

/// POST /execute_now: deliver every pending job immediately, regardless of
/// its schedule time. Waits for any in-flight pass to finish first.
pub async fn execute_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    let outcomes = state.scheduler.run_now().await.map_err(|e| {
        error!("manual run failed: {e}");
        fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    if outcomes.is_empty() {
        return ok("No pending uploads");
    }

    let delivered = outcomes.iter().filter(|o| o.is_success()).count();
    info!(total = outcomes.len(), delivered, "manual run finished");
    let lines: Vec<String> = outcomes.iter().map(|o| o.summary_line()).collect();
    ok(lines.join("\n"))
}

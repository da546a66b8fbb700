use axum::{extract::State, Json};
use courier_scheduler::Clock;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::app::AppState;

/// GET /health: liveness check with the scheduler's view of the clock.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let pending = match state.store.list_pending() {
        Ok(jobs) => Some(jobs.len()),
        Err(e) => {
            warn!("health: could not count pending jobs: {e}");
            None
        }
    };
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "now": state.clock.now(),
        "pending": pending,
    }))
}

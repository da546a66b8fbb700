use axum::{extract::State, http::StatusCode, Json};
use courier_core::config::RECENT_JOBS_LIMIT;
use courier_store::JobSummary;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use super::{fail, ok, ApiReply, ApiResult};
use crate::app::AppState;

/// GET /schedules: the most recent jobs, newest first.
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<JobSummary>>, (StatusCode, Json<ApiReply>)> {
    state
        .submissions
        .list_recent(RECENT_JOBS_LIMIT)
        .map(Json)
        .map_err(|e| {
            error!("listing jobs failed: {e}");
            fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })
}

/// POST /clear_all: drops every job, history included, and the payload
/// files they referenced.
pub async fn clear_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    match state.submissions.clear_all() {
        Ok(paths) => {
            for path in &paths {
                state.uploads.discard(Path::new(path)).await;
            }
            info!(removed = paths.len(), "job table cleared");
            ok(format!("Cleared {} scheduled uploads", paths.len()))
        }
        Err(e) => {
            error!("clearing jobs failed: {e}");
            Err(fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

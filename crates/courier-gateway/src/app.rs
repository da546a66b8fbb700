use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use chrono::FixedOffset;
use courier_core::config::CourierConfig;
use courier_scheduler::{Clock, SchedulerHandle, SubmissionGateway};
use courier_store::JobStore;
use std::sync::Arc;

use crate::storage::UploadStorage;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: CourierConfig,
    pub store: Arc<JobStore>,
    pub submissions: SubmissionGateway,
    pub scheduler: SchedulerHandle,
    pub uploads: UploadStorage,
    /// Same clock the scheduler compares `scheduled_at` against.
    pub clock: Arc<dyn Clock>,
    pub civil_offset: FixedOffset,
}

impl AppState {
    pub fn new(
        config: CourierConfig,
        store: Arc<JobStore>,
        scheduler: SchedulerHandle,
        uploads: UploadStorage,
        clock: Arc<dyn Clock>,
        civil_offset: FixedOffset,
    ) -> Self {
        Self {
            config,
            submissions: SubmissionGateway::new(Arc::clone(&store)),
            store,
            scheduler,
            uploads,
            clock,
            civil_offset,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.storage.max_upload_bytes;
    Router::new()
        .route("/", get(crate::http::ui::ui_handler))
        .route("/health", get(crate::http::health::health_handler))
        .route("/upload", post(crate::http::upload::upload_handler))
        .route("/schedules", get(crate::http::jobs::list_handler))
        .route("/execute_now", post(crate::http::execute::execute_handler))
        .route("/clear_all", post(crate::http::jobs::clear_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

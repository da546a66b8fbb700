//! Job submission endpoint, POST /upload (multipart form).
//!
//! Fields: `file`, `schedule_time`, `remote_host`, `remote_user`,
//! `remote_secret`, `remote_directory`. A new upload replaces any job that is
//! still pending.

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::StatusCode,
};
use courier_scheduler::{Clock, Submission, SubmissionError};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{fail, ok, ApiResult};
use crate::app::AppState;
use crate::storage::sanitize_filename;

/// POST /upload
///
/// Validation failures return 400 without writing anything; storage
/// failures return 500.
pub async fn upload_handler(State(state): State<Arc<AppState>>, multipart: Multipart) -> ApiResult {
    let (submission, payload) = read_form(multipart).await.map_err(|e| {
        warn!("malformed upload form: {e}");
        fail(StatusCode::BAD_REQUEST, format!("malformed upload form: {e}"))
    })?;

    if let Err(e) = submission.validate() {
        warn!(reason = %e, "submission rejected");
        return Err(fail(StatusCode::BAD_REQUEST, e.to_string()));
    }
    let Some(payload) = payload else {
        return Err(fail(StatusCode::BAD_REQUEST, "no file was uploaded"));
    };

    let path = state
        .uploads
        .save(&submission.filename, &payload)
        .await
        .map_err(|e| {
            error!("upload write failed: {e}");
            fail(StatusCode::INTERNAL_SERVER_ERROR, format!("could not store file: {e}"))
        })?;
    let filepath = path.to_string_lossy().into_owned();

    let accepted = match state.submissions.submit(&submission, &filepath) {
        Ok(accepted) => accepted,
        Err(e) => {
            state.uploads.discard(&path).await;
            let status = match e {
                SubmissionError::Validation(_) => StatusCode::BAD_REQUEST,
                SubmissionError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error!("submission failed: {e}");
            return Err(fail(status, e.to_string()));
        }
    };

    for superseded in &accepted.superseded {
        state.uploads.discard(Path::new(superseded)).await;
    }

    let job = accepted.job;
    info!(job_id = job.id, filename = %job.filename, scheduled_at = %job.scheduled_at, "upload scheduled");
    ok(format!(
        "Upload of {} scheduled for {}\nCurrent time (UTC{}): {}\nPending jobs are checked every {} seconds",
        job.filename,
        job.scheduled_at,
        state.civil_offset,
        state.clock.now(),
        state.config.scheduler.tick_interval_secs,
    ))
}

/// Collect the text fields and the file part. The file name is sanitised
/// here; the payload is `None` when no file part was sent.
async fn read_form(
    mut multipart: Multipart,
) -> Result<(Submission, Option<Bytes>), axum::extract::multipart::MultipartError> {
    let mut submission = Submission::default();
    let mut payload = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                submission.filename = sanitize_filename(field.file_name().unwrap_or_default());
                payload = Some(field.bytes().await?);
            }
            "schedule_time" => submission.scheduled_at = field.text().await?,
            "remote_host" => submission.remote_host = field.text().await?,
            "remote_user" => submission.remote_user = field.text().await?,
            "remote_secret" => submission.remote_secret = field.text().await?,
            "remote_directory" => submission.remote_directory = field.text().await?,
            other => warn!(field = other, "ignoring unknown form field"),
        }
    }
    Ok((submission, payload))
}

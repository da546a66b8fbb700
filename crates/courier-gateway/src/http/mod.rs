pub mod execute;
pub mod health;
pub mod jobs;
pub mod ui;
pub mod upload;

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Reply body shared by every mutating endpoint.
#[derive(Debug, Serialize)]
pub struct ApiReply {
    pub success: bool,
    pub message: String,
}

pub type ApiResult = Result<Json<ApiReply>, (StatusCode, Json<ApiReply>)>;

pub fn ok(message: impl Into<String>) -> ApiResult {
    Ok(Json(ApiReply {
        success: true,
        message: message.into(),
    }))
}

pub fn fail(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ApiReply>) {
    (
        status,
        Json(ApiReply {
            success: false,
            message: message.into(),
        }),
    )
}

//! HTTP handlers for health and job dispatch.

use crate::worker::{JobInfo, WorkerError};
use crate::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Request body for `POST /jobs`.
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    /// Name of the room the agent should join.
    pub room: String,
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<WorkerError> for ApiError {
    fn from(e: WorkerError) -> Self {
        match e {
            WorkerError::NotWarmedUp => ApiError::ServiceUnavailable(e.to_string()),
            WorkerError::InvalidRoom(_) => ApiError::BadRequest(e.to_string()),
            WorkerError::JobNotFound(_) => ApiError::NotFound(e.to_string()),
            WorkerError::Setup(_) => ApiError::InternalServerError(e.to_string()),
        }
    }
}

/// Handler for `GET /health`.
pub async fn health_handler(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "warmed": state.worker.is_warm(),
        "active_jobs": state.worker.jobs().len(),
    }))
}

/// Handler for `POST /jobs`.
pub async fn create_job_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobInfo>), ApiError> {
    let job = state.worker.dispatch(&payload.room)?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// Handler for `GET /jobs`.
pub async fn list_jobs_handler(Extension(state): Extension<Arc<AppState>>) -> Json<Vec<JobInfo>> {
    Json(state.worker.jobs())
}

/// Handler for `DELETE /jobs/{id}`.
pub async fn end_job_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.worker.end_job(id)?;
    Ok(StatusCode::NO_CONTENT)
}

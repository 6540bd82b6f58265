//! Mileva outreach agent worker.
//!
//! Wires the Tina persona into a voice session per job: [`entry::prewarm`]
//! loads the shared voice activity detector once, [`entry::my_agent`] builds
//! and starts the session in the job's room. The [`worker::Worker`] owns
//! warm-up and dispatch; [`app`] exposes it over HTTP.

pub mod api;
pub mod config;
pub mod entry;
pub mod job;
pub mod persona;
pub mod tools;
pub mod worker;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use worker::Worker;

/// Application state shared across all request handlers.
pub struct AppState {
    pub worker: Arc<Worker>,
}

/// Dispatch requests carry only a room name.
const MAX_REQUEST_BODY_BYTES: usize = 16 * 1024;

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health_handler))
        .route(
            "/jobs",
            get(api::list_jobs_handler).post(api::create_job_handler),
        )
        .route("/jobs/{id}", delete(api::end_job_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}

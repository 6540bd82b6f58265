use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use mileva_agent::entry::prewarm;
use mileva_agent::job::{JobContext, JobError};
use mileva_agent::worker::{JobInfo, Worker};
use mileva_agent::{app, AppState};
use mileva_voice::{LiveKitConfig, LiveKitService};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn worker() -> Arc<Worker> {
    Arc::new(Worker::new(
        prewarm,
        |ctx: JobContext| async move {
            ctx.connect().await?;
            Ok::<(), JobError>(())
        },
        LiveKitService::new(LiveKitConfig::default()),
        "tina",
    ))
}

fn router(worker: &Arc<Worker>) -> Router {
    app(AppState {
        worker: Arc::clone(worker),
    })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_job(room: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/jobs")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({ "room": room }).to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_reports_warm_up_and_jobs() {
    let worker = worker();
    let app = router(&worker);

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["warmed"], false);
    assert_eq!(json["active_jobs"], 0);

    worker.prewarm().await.unwrap();
    worker.dispatch("outreach-1").unwrap();

    let (_, body) = send(&app, get("/health")).await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["warmed"], true);
    assert_eq!(json["active_jobs"], 1);
}

#[tokio::test]
async fn dispatch_is_unavailable_until_warm() {
    let worker = worker();
    let app = router(&worker);

    let (status, body) = send(&app, post_job("outreach-1")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("warmed up"));
}

#[tokio::test]
async fn dispatch_rejects_empty_room() {
    let worker = worker();
    worker.prewarm().await.unwrap();
    let app = router(&worker);

    let (status, _) = send(&app, post_job("")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn job_lifecycle_over_http() {
    let worker = worker();
    worker.prewarm().await.unwrap();
    let app = router(&worker);

    let (status, body) = send(&app, post_job("outreach-9")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job: JobInfo = serde_json::from_slice(&body).unwrap();
    assert_eq!(job.room, "outreach-9");

    let (status, body) = send(&app, get("/jobs")).await;
    assert_eq!(status, StatusCode::OK);
    let jobs: Vec<JobInfo> = serde_json::from_slice(&body).unwrap();
    assert_eq!(jobs, vec![job.clone()]);

    let (status, _) = send(&app, delete(&format!("/jobs/{}", job.id))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, delete(&format!("/jobs/{}", uuid::Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

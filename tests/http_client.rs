use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use scanwatch::client::{HttpScanClient, ScanBackend};
use scanwatch::core::{JobStatus, PollPolicy, ScanTracker, TrackerError};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
struct MockService {
    // scan id -> status body served by GET /scan/{id}
    statuses: Arc<Mutex<Vec<(String, Value)>>>,
    submitted: Arc<Mutex<Vec<String>>>,
}

async fn submit(
    State(service): State<MockService>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let domain = body["domain"].as_str().unwrap_or_default().to_string();
    if domain == "reject.com" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Domain is blocked" })),
        );
    }

    let id = format!("scan-{}", service.submitted.lock().await.len() + 1);
    service.submitted.lock().await.push(domain.clone());
    service
        .statuses
        .lock()
        .await
        .push((id.clone(), json!({ "status": "in_progress", "result": null })));

    (
        StatusCode::CREATED,
        Json(json!({
            "scan_id": id,
            "domain": domain,
            "created_at": "2024-01-01T00:00:00.123456Z",
            "status": "in_progress",
            "result": null,
        })),
    )
}

async fn status(
    State(service): State<MockService>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    let statuses = service.statuses.lock().await;
    match statuses.iter().find(|(scan_id, _)| *scan_id == id) {
        Some((_, body)) => (StatusCode::OK, Json(body.clone())),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Scan not found" })),
        ),
    }
}

async fn all() -> Json<Value> {
    Json(json!([
        {"scan_id": "old", "domain": "a.com", "created_at": "2024-01-01T00:00:00Z", "status": "completed", "result": {"hosts": []}, "completed_at": "2024-01-01T00:01:00Z"},
        {"scan_id": "new", "domain": "b.com", "created_at": "2024-01-03T00:00:00Z", "status": "in_progress", "result": null},
        {"scan_id": "mid", "domain": "c.com", "created_at": "2024-01-02T00:00:00Z", "status": "error", "result": {"error": "timeout"}}
    ]))
}

async fn spawn_service() -> (String, MockService) {
    let service = MockService::default();
    let app = Router::new()
        .route("/scan", post(submit))
        .route("/scan/all", get(all))
        .route("/scan/{id}", get(status))
        .with_state(service.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), service)
}

fn client(base_url: &str) -> HttpScanClient {
    HttpScanClient::new(base_url, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn submit_returns_ticket_with_service_time() {
    let (url, service) = spawn_service().await;
    let client = client(&url);

    let ticket = client.submit("example.com").await.unwrap();

    assert_eq!(ticket.id, "scan-1");
    assert_eq!(
        ticket.started_at.to_rfc3339(),
        "2024-01-01T00:00:00.123456+00:00"
    );
    assert_eq!(*service.submitted.lock().await, vec!["example.com"]);
}

#[tokio::test]
async fn rejected_submit_carries_service_message() {
    let (url, _service) = spawn_service().await;
    let client = client(&url);

    let err = client.submit("reject.com").await.unwrap_err();

    match err {
        TrackerError::Submission(source) => {
            assert!(source.to_string().contains("Domain is blocked"));
            assert!(source.to_string().contains("400"));
        }
        other => panic!("expected submission error, got {other:?}"),
    }
}

#[tokio::test]
async fn status_maps_in_progress_and_completed() {
    let (url, service) = spawn_service().await;
    let client = client(&url);
    let ticket = client.submit("example.com").await.unwrap();

    let update = client.fetch_status(&ticket.id).await.unwrap();
    assert_eq!(update.status, JobStatus::Pending);
    assert!(update.result.is_none());

    service.statuses.lock().await[0].1 = json!({
        "status": "completed",
        "result": {"info": "x"},
        "completed_at": "2024-01-01T00:05:00Z",
        "summary": "2 hosts",
    });

    let update = client.fetch_status(&ticket.id).await.unwrap();
    assert_eq!(update.status, JobStatus::Completed);
    assert_eq!(update.result, Some(json!({"info": "x"})));
    assert_eq!(update.summary.as_deref(), Some("2 hosts"));
    assert!(update.completed_at.is_some());
}

#[tokio::test]
async fn missing_scan_is_unknown_job() {
    let (url, _service) = spawn_service().await;
    let client = client(&url);

    let err = client.fetch_status("nope").await.unwrap_err();
    assert!(matches!(err, TrackerError::UnknownJob(id) if id == "nope"));
}

#[tokio::test]
async fn list_is_normalized_newest_first() {
    let (url, _service) = spawn_service().await;
    let client = client(&url);

    let jobs = client.fetch_all().await.unwrap();

    let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec!["new", "mid", "old"]);
    assert_eq!(jobs[0].status, JobStatus::Pending);
    assert_eq!(jobs[1].status, JobStatus::Error);
    assert_eq!(jobs[2].result, Some(json!({"hosts": []})));
}

#[tokio::test]
async fn unreachable_service_is_a_list_error() {
    // Bind then drop so nothing is listening on the port.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(&format!("http://{}", addr));
    let err = client.fetch_all().await.unwrap_err();
    assert!(matches!(err, TrackerError::List(_)));
}

#[tokio::test]
async fn tracker_resolves_job_against_http_service() {
    let (url, service) = spawn_service().await;
    let tracker = ScanTracker::new(Arc::new(client(&url)), PollPolicy::default());

    let job = tracker.submit("  example.com ").await.unwrap();
    assert_eq!(job.domain, "example.com");

    // The service stamps the scan in 2024; that must not count as pending age.
    let report = tracker.poll_now().await;
    assert_eq!(report.polled, 1);
    assert_eq!(report.stalled, 0);
    assert_eq!(report.resolved, 0);

    service.statuses.lock().await[0].1 = json!({
        "status": "error",
        "result": {"error": "resolver failed"},
        "completed_at": "2024-01-01T00:05:00Z",
    });

    let report = tracker.poll_now().await;
    assert_eq!(report.resolved, 1);

    let jobs = tracker.snapshot().await;
    assert_eq!(jobs[0].status, JobStatus::Error);
    assert_eq!(jobs[0].result, Some(json!({"error": "resolver failed"})));
}

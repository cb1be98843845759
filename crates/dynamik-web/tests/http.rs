//! HTTP integration tests: the whole router over an in-process broker and a
//! temporary document store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use dynamik_common::settings::PacingSettings;
use dynamik_common::{DynamikError, ExecutionStatus, Status};
use dynamik_experiments::{ExperimentCoordinator, UploadPolicy};
use dynamik_queue::MemoryBroker;
use dynamik_store::experiments::{drift_file, result_file};
use dynamik_store::{DocumentStore, ExperimentStore, Folder, FsStore};
use dynamik_web::router::build_router;
use dynamik_web::state::AppState;

const LOG: &str = "case,start,end,activity,resource\n\
                   1,2024-01-01T08:00:00,2024-01-01T09:00:00,Register,ann\n\
                   1,2024-01-01T09:30:00,2024-01-01T10:00:00,Approve,bob\n";

const MAPPING: &str =
    "case=case&activity=activity&enablement=__DISCOVER__&start=start&end=end&resource=resource";

const CONFIG: &str = "window_size=7%20days&drift_magnitude=1%20h&warnings=3";

struct TestApp {
    _dir: TempDir,
    broker: Arc<MemoryBroker>,
    store: ExperimentStore,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        Self::with_policy(UploadPolicy { max_bytes: 1024 * 1024, max_files: 1 })
    }

    fn with_policy(policy: UploadPolicy) -> Self {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FsStore::new(dir.path()));
        Self::with_backend(dir, backend, policy)
    }

    fn with_backend(dir: TempDir, backend: Arc<dyn DocumentStore>, policy: UploadPolicy) -> Self {
        let broker = Arc::new(MemoryBroker::new());
        let store = ExperimentStore::new(backend);
        let coordinator = ExperimentCoordinator::new(store.clone(), broker.clone(), broker.clone());
        let state = AppState::new(coordinator, policy, PacingSettings::none(), dir.path().join("static"));
        Self { _dir: dir, broker, store, router: build_router(state) }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn upload(&self, name: &str, content_type: &str, content: &str) -> Response {
        let boundary = "dynamik-test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
             Content-Type: {content_type}\r\n\r\n\
             {content}\r\n\
             --{boundary}--\r\n"
        );
        self.send(
            Request::builder()
                .method("POST")
                .uri("/")
                .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    async fn wizard(&self, setup_url: &str, form: &str) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(setup_url)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Upload the sample log and walk the wizard up to the review step.
    async fn draft_at_review(&self) -> String {
        let response = self.upload("log.csv", "text/csv", LOG).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let setup_url = location(&response);
        assert!(setup_url.starts_with("/setup-experiment?draft="));

        let response = self.wizard(&setup_url, &format!("action=next&{MAPPING}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = self.wizard(&setup_url, &format!("action=next&{CONFIG}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Validate configuration"));
        setup_url
    }

    /// Full flow; returns the experiment id.
    async fn submit_experiment(&self) -> String {
        let setup_url = self.draft_at_review().await;
        let response = self.wizard(&setup_url, "action=run&email=").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let results_url = location(&response);
        results_url.strip_prefix("/results/").unwrap().to_string()
    }
}

/// Filesystem store whose draft writes can be switched to fail.
struct FlakyDrafts {
    inner: FsStore,
    failing: AtomicBool,
}

#[async_trait]
impl DocumentStore for FlakyDrafts {
    async fn create_if_absent(&self, folder: Folder, name: &str, content: &[u8]) -> dynamik_common::Result<bool> {
        self.inner.create_if_absent(folder, name, content).await
    }

    async fn put(&self, folder: Folder, name: &str, content: &[u8]) -> dynamik_common::Result<()> {
        if folder == Folder::Drafts && self.failing.load(Ordering::SeqCst) {
            return Err(DynamikError::Io(std::io::Error::other("disk full")));
        }
        self.inner.put(folder, name, content).await
    }

    async fn read(&self, folder: Folder, name: &str) -> dynamik_common::Result<Vec<u8>> {
        self.inner.read(folder, name).await
    }

    async fn exists(&self, folder: Folder, name: &str) -> dynamik_common::Result<bool> {
        self.inner.exists(folder, name).await
    }
}

fn location(response: &Response) -> String {
    response.headers()[header::LOCATION].to_str().unwrap().to_string()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ── Basics ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "dynamik");
}

#[tokio::test]
async fn test_upload_page_served() {
    let app = TestApp::new();
    let response = app.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(r#"enctype="multipart/form-data""#));
    assert!(html.contains("1 MiB"));
}

#[tokio::test]
async fn test_unknown_experiment_is_404() {
    let app = TestApp::new();
    let id = "0123456789abcdef0123456789abcdef";
    assert_eq!(app.get(&format!("/results/{id}")).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get(&format!("/results/{id}/download")).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get(&format!("/results/{id}/0")).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get(&format!("/api/results/{id}")).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_setup_without_draft_redirects_to_upload() {
    let app = TestApp::new();
    let response = app.get("/setup-experiment").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let response = app.get("/setup-experiment?draft=6f1c1e0e-8d5b-4a8e-9a0a-1f2b3c4d5e6f").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

// ── Upload ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_non_csv_upload_rejected() {
    let app = TestApp::new();
    let response = app.upload("notes.txt", "text/plain", "hello").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("only CSV files allowed"));
}

#[tokio::test]
async fn test_too_large_upload_rejected() {
    let app = TestApp::with_policy(UploadPolicy { max_bytes: 16, max_files: 1 });
    let response = app.upload("log.csv", "text/csv", LOG).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body_text(response).await.contains("file is larger than 16 B"));
}

#[tokio::test]
async fn test_upload_opens_draft_with_preview() {
    let app = TestApp::new();
    let response = app.upload("log.csv", "text/csv", LOG).await;
    let setup_url = location(&response);

    let html = body_text(app.get(&setup_url).await).await;
    assert!(html.contains("Setup the log mapping"));
    assert!(html.contains("<td>Register</td>"));
    assert!(html.contains(r#"<option value="case" selected>case</option>"#));
}

// ── Wizard and submission ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_full_flow_queues_one_job() {
    let app = TestApp::new();
    let id = app.submit_experiment().await;

    let jobs = app.broker.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, id);

    let html = body_text(app.get(&format!("/results/{id}")).await).await;
    assert!(html.contains("Queued"));
    assert!(html.contains(r#"<span id="drift-count">-</span>"#));
    assert!(html.contains("7 days"));

    let json = body_json(app.get(&format!("/api/results/{id}")).await).await;
    assert_eq!(json["experiment"]["id"], id.as_str());
    assert_eq!(json["results"]["status"]["status"], "queued");
    assert_eq!(json["results"]["drifts"], json!([]));
}

#[tokio::test]
async fn test_identical_submission_is_not_queued_twice() {
    let app = TestApp::new();
    let first = app.submit_experiment().await;
    let second = app.submit_experiment().await;

    assert_eq!(first, second);
    assert_eq!(app.broker.jobs().len(), 1);
}

#[tokio::test]
async fn test_run_blocked_by_invalid_step() {
    let app = TestApp::new();
    let response = app.upload("log.csv", "text/csv", LOG).await;
    let setup_url = location(&response);

    app.wizard(&setup_url, &format!("action=next&{MAPPING}")).await;
    // Window size missing: the wizard moves on but remembers the step as invalid.
    let response = app
        .wizard(&setup_url, "action=next&drift_magnitude=1%20h&warnings=3")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("You have to set a value for every configuration parameter!"));

    let response = app.wizard(&setup_url, "action=run&email=").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(response).await.contains("Error on form submission!"));
    assert!(app.broker.jobs().is_empty());
}

#[tokio::test]
async fn test_broker_offline_is_503() {
    let app = TestApp::new();
    let setup_url = app.draft_at_review().await;
    app.broker.set_offline(true);

    let response = app.wizard(&setup_url, "action=run&email=").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_submission_redirects_when_draft_save_fails() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FlakyDrafts { inner: FsStore::new(dir.path()), failing: AtomicBool::new(false) });
    let app = TestApp::with_backend(dir, backend.clone(), UploadPolicy { max_bytes: 1024 * 1024, max_files: 1 });
    let setup_url = app.draft_at_review().await;

    backend.failing.store(true, Ordering::SeqCst);
    let response = app.wizard(&setup_url, "action=run&email=").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let jobs = app.broker.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(location(&response), format!("/results/{}", jobs[0].id));
}

#[tokio::test]
async fn test_unknown_action_is_422() {
    let app = TestApp::new();
    let response = app.upload("log.csv", "text/csv", LOG).await;
    let response = app.wizard(&location(&response), "action=jump").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// ── Results ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_downloads_are_attachments() {
    let app = TestApp::new();
    let id = app.submit_experiment().await;

    let response = app.get(&format!("/results/{id}/download")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename={id}.json").as_str()
    );
    let json = body_json(response).await;
    assert_eq!(json["status"]["status"], "queued");
}

#[tokio::test]
async fn test_drift_page_and_download() {
    let app = TestApp::new();
    let id = app.submit_experiment().await;

    let drift = json!({
        "index": 0,
        "experiment": id,
        "description": "Cycle time increased",
        "referenceWindow": ["2024-01-01T00:00:00", "2024-01-08T00:00:00"],
        "runningWindow": ["2024-01-08T00:00:00", "2024-01-15T00:00:00"],
        "causes": [
            { "cause": "cycle-time", "reference": [1, 2, 3], "running": [4, 5, 6] },
            { "cause": "cycle-time/waiting-time", "reference": [1], "running": [2] }
        ]
    });
    app.store
        .backend()
        .put(Folder::Results, &drift_file(&id, 0), drift.to_string().as_bytes())
        .await
        .unwrap();

    let html = body_text(app.get(&format!("/results/{id}/0")).await).await;
    assert!(html.contains("Drift 1"));
    assert!(html.contains("Cycle times distribution"));
    assert!(html.contains("Waiting times distribution"));

    let response = app.get(&format!("/results/{id}/0/download")).await;
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename={id}.drift_0.json").as_str()
    );
}

#[tokio::test]
async fn test_non_numeric_drift_is_404() {
    let app = TestApp::new();
    let id = app.submit_experiment().await;
    assert_eq!(app.get(&format!("/results/{id}/abc")).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get(&format!("/results/{id}/abc/download")).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get(&format!("/results/{id}/-1")).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_half_written_results_are_404() {
    let app = TestApp::new();
    let id = app.submit_experiment().await;
    let backend = app.store.backend();
    backend.put(Folder::Results, &result_file(&id), b"").await.unwrap();
    backend.put(Folder::Results, &drift_file(&id, 0), br#"{"index": 0, "exp"#).await.unwrap();

    assert_eq!(app.get(&format!("/results/{id}")).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get(&format!("/results/{id}/download")).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get(&format!("/results/{id}/0")).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_results_page_exposes_live_hooks() {
    let app = TestApp::new();
    let id = app.submit_experiment().await;

    let html = body_text(app.get(&format!("/results/{id}")).await).await;
    assert!(html.contains(&format!(r#"data-experiment="{id}""#)));
    assert!(html.contains(r#"class="summary status-queued""#));
    assert!(html.contains(r#"id="status-badge""#));
    assert!(html.contains(r#"id="drift-count""#));
    assert!(html.contains(r#"id="drifts""#));
    assert!(html.contains(r#"<script src="/static/js/results.js""#));
}

// ── Live status ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_live_relays_status_and_unsubscribes_on_drop() {
    let app = TestApp::new();
    let response = app.get("/live?id=exp").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    assert_eq!(app.broker.subscriber_count(), 1);

    let mut running = ExecutionStatus::queued("2024-05-01T10:00:00.000Z");
    running.status.status = Status::Running;
    running.status.progress = 25;
    app.broker.send_raw("exp", "not json");
    app.broker.publish_status("other", &running).unwrap();
    app.broker.publish_status("exp", &running).unwrap();

    let mut body = response.into_body().into_data_stream();
    let chunk = tokio::time::timeout(Duration::from_secs(1), body.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let event = String::from_utf8(chunk.to_vec()).unwrap();
    assert!(event.starts_with("data: "));
    assert!(event.contains(r#""status":"running""#));
    assert!(event.contains(r#""progress":25"#));

    drop(body);
    assert_eq!(app.broker.subscriber_count(), 0);
}

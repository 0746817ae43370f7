//! Webhook ingress.
//!
//! An actionable pull request event is validated, handed to its own task and
//! acknowledged immediately. The run's outcome is only reported on the pull
//! request itself.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use guardian_core::{is_actionable_action, PullRequestEvent, RunRequest, PULL_REQUEST_EVENT};
use guardian_pipeline::FixOrchestrator;
use serde_json::{json, Value};
use tracing::{error, info, warn};

/// Headers carrying the event category, in lookup order.
pub const EVENT_HEADERS: &[&str] = &["x-gitea-event", "x-github-event"];

#[derive(Clone)]
pub struct AppState {
    orchestrator: FixOrchestrator,
}

impl AppState {
    pub fn new(orchestrator: FixOrchestrator) -> Self {
        Self { orchestrator }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok", "version": guardian_core::VERSION }))
}

fn event_kind(headers: &HeaderMap) -> Option<&str> {
    EVENT_HEADERS
        .iter()
        .find_map(|name| headers.get(*name)?.to_str().ok())
}

fn ignored() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "ignored" })))
}

fn parse_request(body: &[u8]) -> Result<RunRequest, String> {
    let event: PullRequestEvent = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    event.into_request().map_err(|e| e.to_string())
}

async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let event = event_kind(&headers);
    let action = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|v| v.get("action")?.as_str().map(str::to_string));
    info!(event = ?event, action = ?action, "webhook received");

    let actionable = event == Some(PULL_REQUEST_EVENT)
        && action.as_deref().is_some_and(is_actionable_action);
    if !actionable {
        info!(event = ?event, "ignored event");
        return ignored();
    }

    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(message) => {
            warn!(error = %message, "rejected malformed pull request event");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "error", "message": message })),
            );
        }
    };

    let response = json!({
        "status": "processing",
        "message": "Guardian run started",
        "repository": format!("{}/{}", request.repository.owner, request.repository.name),
        "number": request.change_number,
        "branch": request.branch,
    });

    info!(
        repository = %request.repository.name,
        number = request.change_number,
        "scheduling run"
    );
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        let report = orchestrator.run(request).await;
        match &report.failure {
            None => info!(
                run_id = %report.run_id,
                fixed = report.fixed_files.len(),
                "run finished"
            ),
            Some(failure) => error!(
                run_id = %report.run_id,
                stage = failure.kind.as_str(),
                "run failed"
            ),
        }
    });

    (StatusCode::ACCEPTED, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardian_core::fakes::{MemoryVcs, RecordingNotifier, ScriptedAnalyzer, ScriptedOracle};
    use guardian_pipeline::{Collaborators, PipelineConfig, ValidationGate, WorkspaceManager};
    use std::sync::Arc;
    use std::time::Duration;

    struct TestServer {
        url: String,
        analyzer: Arc<ScriptedAnalyzer>,
        _base: tempfile::TempDir,
    }

    async fn serve() -> TestServer {
        let base = tempfile::tempdir().unwrap();
        let analyzer = Arc::new(ScriptedAnalyzer::new(Vec::new()));
        let orchestrator = FixOrchestrator::new(
            Collaborators {
                analyzer: analyzer.clone(),
                oracle: Arc::new(ScriptedOracle::new()),
                vcs: Arc::new(MemoryVcs::new([("app.py", "x = 1\n")])),
                notifier: Arc::new(RecordingNotifier::new()),
            },
            ValidationGate::new(),
            WorkspaceManager::new(base.path()),
            PipelineConfig::default(),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(AppState::new(orchestrator));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            url: format!("http://{addr}"),
            analyzer,
            _base: base,
        }
    }

    fn payload(action: &str) -> Value {
        json!({
            "action": action,
            "number": 1,
            "pull_request": { "head": { "ref": "feat/add-vulnerable-feature", "sha": "abc" } },
            "repository": {
                "name": "vulnerable-repo",
                "owner": { "username": "guardian_admin" },
                "clone_url": "mem://vulnerable-repo"
            }
        })
    }

    async fn post(server: &TestServer, header: &str, event: &str, body: Value) -> (u16, Value) {
        let response = reqwest::Client::new()
            .post(format!("{}/webhook", server.url))
            .header(header, event)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_opened_pull_request_is_scheduled() {
        let server = serve().await;
        let (status, body) = post(&server, "X-Gitea-Event", "pull_request", payload("opened")).await;

        assert_eq!(status, 202);
        assert_eq!(body["status"], "processing");
        assert_eq!(body["repository"], "guardian_admin/vulnerable-repo");

        // the run happens after the response
        let mut waited = 0;
        while server.analyzer.calls().is_empty() && waited < 100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            waited += 1;
        }
        assert_eq!(server.analyzer.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_github_synchronize_is_scheduled() {
        let server = serve().await;
        let (status, _) =
            post(&server, "X-GitHub-Event", "pull_request", payload("synchronize")).await;
        assert_eq!(status, 202);
    }

    #[tokio::test]
    async fn test_other_events_and_actions_are_ignored() {
        let server = serve().await;

        let (status, body) = post(&server, "X-Gitea-Event", "push", payload("opened")).await;
        assert_eq!((status, body["status"].as_str()), (200, Some("ignored")));

        let (status, body) = post(&server, "X-Gitea-Event", "pull_request", payload("closed")).await;
        assert_eq!((status, body["status"].as_str()), (200, Some("ignored")));

        let (status, _) = post(&server, "X-Unrelated", "pull_request", payload("opened")).await;
        assert_eq!(status, 200);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(server.analyzer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_actionable_event_is_bad_request() {
        let server = serve().await;
        let body = json!({ "action": "opened", "number": 1, "repository": { "name": "r" } });
        let (status, body) = post(&server, "X-Gitea-Event", "pull_request", body).await;
        assert_eq!(status, 400);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_healthz() {
        let server = serve().await;
        let body: Value = reqwest::get(format!("{}/healthz", server.url))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }
}

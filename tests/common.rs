#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tower::util::ServiceExt;
use wiremock::MockServer;

use codeferry::core::audit::{AuditLogger, MemoryAuditStore};
use codeferry::core::config::loader::ConfigDialect;
use codeferry::core::github::{Credentials, GitHubClient};
use codeferry::core::metrics::MetricsCollector;
use codeferry::core::notify::Notifier;
use codeferry::core::server::{self, AppState, ServiceSettings};

/// A service wired against a mock GitHub API, with audit enabled on an
/// in-memory store.
pub struct Harness {
    pub github: MockServer,
    pub state: Arc<AppState>,
    _config_dir: TempDir,
}

pub const SECRET: &str = "test-secret";

pub async fn start(config_yaml: &str, webhook_secret: Option<&str>) -> Harness {
    let github = MockServer::start().await;

    let config_dir = TempDir::new().expect("temp dir");
    let config_file: PathBuf = config_dir.path().join("workflow.yaml");
    let mut f = std::fs::File::create(&config_file).expect("config file");
    f.write_all(config_yaml.as_bytes()).expect("write config");

    let metrics = Arc::new(MetricsCollector::new());
    let client = GitHubClient::with_base_url(
        &github.uri(),
        Credentials::Token("test-token".to_string()),
        Arc::clone(&metrics),
    )
    .expect("client");

    let state = Arc::new(AppState::new(
        ServiceSettings {
            config_file,
            config_dialect: ConfigDialect::Workflow,
            webhook_secret: webhook_secret.map(|s| s.to_string()),
        },
        client,
        metrics,
        AuditLogger::new(Arc::new(MemoryAuditStore::new())),
        Notifier::disabled(),
    ));

    Harness {
        github,
        state,
        _config_dir: config_dir,
    }
}

impl Harness {
    pub fn router(&self) -> Router {
        server::router(Arc::clone(&self.state))
    }

    pub async fn post_webhook(
        &self,
        event: &str,
        body: &[u8],
        signature: Option<&str>,
    ) -> Response<Body> {
        let mut request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("Content-Type", "application/json");
        if !event.is_empty() {
            request = request.header("X-GitHub-Event", event);
        }
        if let Some(sig) = signature {
            request = request.header("X-Hub-Signature-256", sig);
        }

        self.router()
            .oneshot(request.body(Body::from(body.to_vec())).unwrap())
            .await
            .expect("router call")
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.router()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("router call")
    }

    /// Waits for the detached background run to finish, as observed
    /// through the processed/failed webhook counters.
    pub async fn wait_for_runs(&self, completed: u64) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let counters = self.state.metrics.counters();
            if counters.webhooks_processed + counters.webhooks_failed >= completed {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "background processing did not finish in time: {counters:?}"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn assert_status(response: &Response<Body>, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}

pub fn merged_pr_payload(repo: &str, number: u64, merge_sha: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "action": "closed",
        "pull_request": {
            "number": number,
            "merged": true,
            "merge_commit_sha": merge_sha
        },
        "repository": { "full_name": repo }
    }))
    .unwrap()
}

pub const WORKFLOW_YAML: &str = r#"
source_repo: octo/source
source_branch: main
copy_rules:
  - name: js-examples
    source:
      type: prefix
      pattern: examples/
      exclude:
        - '\.gitignore$'
    targets:
      - repo: octo/docs
        branch: main
        path_transform: docs/${relative_path}
        commit_strategy:
          type: direct
          commit_message: Sync ${file_count} example(s) from ${source_repo}
        deprecation_check:
          enabled: true
          file_name: deprecated_examples.json
"#;

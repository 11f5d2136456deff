mod common;

use std::collections::HashMap;

use common::{start, WORKFLOW_YAML};
use codeferry::core::audit::AuditEventKind;
use codeferry::core::config::types::StrategyKind;
use codeferry::core::executor;
use codeferry::core::processor::PrJob;
use codeferry::core::staging::{DeprecatedFileEntry, FileContent, UploadBatch, UploadKey};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn job() -> PrJob {
    PrJob {
        number: 7,
        merge_sha: "abc1234def".to_string(),
        repo: "octo/source".to_string(),
        delivery: "delivery-1".to_string(),
    }
}

fn pr_batch() -> (UploadKey, UploadBatch) {
    let key = UploadKey::new("octo/docs", "main", "js-examples", StrategyKind::Pr);
    let batch = UploadBatch {
        repo: "octo/docs".to_string(),
        branch: "main".to_string(),
        strategy: StrategyKind::Pr,
        auto_merge: true,
        commit_message: "Sync 1 example(s)".to_string(),
        pr_title: "Update examples from octo/source".to_string(),
        pr_body: "Automated update".to_string(),
        files: vec![FileContent {
            path: "docs/test.js".to_string(),
            source_path: "examples/test.js".to_string(),
            bytes: b"console.log(1);".to_vec(),
        }],
    };
    (key, batch)
}

async fn mock_commit_chain(server: &MockServer, repo: &str, branch: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/{repo}/git/ref/heads/{branch}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": { "sha": "head000" }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/repos/{repo}/git/commits/head000")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sha": "head000",
            "tree": { "sha": "tree000" }
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/repos/{repo}/git/blobs")))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "sha": "blob111"
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/repos/{repo}/git/trees")))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "sha": "tree111"
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/repos/{repo}/git/commits")))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "sha": "commit222"
        })))
        .mount(server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": { "sha": "commit222" }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn pr_strategy_opens_branch_and_pull_request() {
    let harness = start(WORKFLOW_YAML, None).await;

    // Working branch is created off the target branch head.
    Mock::given(method("POST"))
        .and(path("/repos/octo/docs/git/refs"))
        .and(body_partial_json(serde_json::json!({
            "ref": "refs/heads/codeferry/js-examples-pr7-abc1234",
            "sha": "head000"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "object": { "sha": "head000" }
        })))
        .expect(1)
        .mount(&harness.github)
        .await;

    // The commit chain reads the base branch head, then commits onto the
    // working branch.
    Mock::given(method("GET"))
        .and(path(
            "/repos/octo/docs/git/ref/heads/codeferry/js-examples-pr7-abc1234",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": { "sha": "head000" }
        })))
        .mount(&harness.github)
        .await;
    mock_commit_chain(&harness.github, "octo/docs", "main").await;

    Mock::given(method("POST"))
        .and(path("/repos/octo/docs/pulls"))
        .and(body_partial_json(serde_json::json!({
            "title": "Update examples from octo/source",
            "head": "codeferry/js-examples-pr7-abc1234",
            "base": "main"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "number": 99,
            "html_url": "https://github.com/octo/docs/pull/99"
        })))
        .expect(1)
        .mount(&harness.github)
        .await;

    Mock::given(method("PUT"))
        .and(path("/repos/octo/docs/pulls/99/merge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "merged": true,
            "message": "merged"
        })))
        .expect(1)
        .mount(&harness.github)
        .await;

    let (key, batch) = pr_batch();
    let mut uploads = HashMap::new();
    uploads.insert(key, batch);

    executor::execute_uploads(&harness.state, &job(), uploads).await;

    let counters = harness.state.metrics.counters();
    assert_eq!(counters.files_uploaded, 1);
    assert_eq!(counters.files_upload_failed, 0);

    let events = harness.state.audit.query_recent(10).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, AuditEventKind::Copy);
    assert_eq!(events[0].pr_number, Some(99));
    assert_eq!(events[0].commit_sha.as_deref(), Some("commit222"));
}

#[tokio::test]
async fn failed_batch_audits_every_file_as_error() {
    let harness = start(WORKFLOW_YAML, None).await;

    // Branch head lookup fails outright.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&harness.github)
        .await;

    let key = UploadKey::new("octo/docs", "main", "js-examples", StrategyKind::Direct);
    let batch = UploadBatch {
        repo: "octo/docs".to_string(),
        branch: "main".to_string(),
        strategy: StrategyKind::Direct,
        auto_merge: false,
        commit_message: "msg".to_string(),
        pr_title: String::new(),
        pr_body: String::new(),
        files: vec![
            FileContent {
                path: "docs/a.js".to_string(),
                source_path: "examples/a.js".to_string(),
                bytes: b"a".to_vec(),
            },
            FileContent {
                path: "docs/b.js".to_string(),
                source_path: "examples/b.js".to_string(),
                bytes: b"b".to_vec(),
            },
        ],
    };
    let mut uploads = HashMap::new();
    uploads.insert(key, batch);

    executor::execute_uploads(&harness.state, &job(), uploads).await;

    let counters = harness.state.metrics.counters();
    assert_eq!(counters.files_uploaded, 0);
    assert_eq!(counters.files_upload_failed, 2);

    let failed = harness.state.audit.query_failed(10).await;
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().all(|e| e.event_type == AuditEventKind::Error));
}

#[tokio::test]
async fn manifest_update_appends_to_existing_records() {
    let harness = start(WORKFLOW_YAML, None).await;

    use base64::Engine;
    let existing = serde_json::json!([
        { "path": "docs/ancient.js", "deprecated_on": "2024-11-30", "source_pr": 3 }
    ]);
    Mock::given(method("GET"))
        .and(path("/repos/octo/docs/contents/deprecated_examples.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": base64::engine::general_purpose::STANDARD
                .encode(serde_json::to_vec(&existing).unwrap()),
            "encoding": "base64",
            "sha": "f00d"
        })))
        .expect(1)
        .mount(&harness.github)
        .await;
    mock_commit_chain(&harness.github, "octo/docs", "main").await;

    let mut deprecations = HashMap::new();
    deprecations.insert(
        "deprecated_examples.json".to_string(),
        vec![DeprecatedFileEntry {
            path: "docs/old.js".to_string(),
            repo: "octo/docs".to_string(),
            branch: "main".to_string(),
        }],
    );

    executor::update_manifests(&harness.state, &job(), deprecations).await;

    // No errors were audited; the only API traffic is the read + commit.
    assert!(harness.state.audit.query_failed(10).await.is_empty());
}

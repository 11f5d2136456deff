use std::sync::Arc;

use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::{info, warn};

use crate::core::metrics::humanize;
use crate::core::processor::{self, PrJob};

use super::events::PullRequestEvent;
use super::{signature, AppState};

const MAX_BODY_BYTES: usize = 1024 * 1024;

const EVENT_HEADER: &str = "X-GitHub-Event";
const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";
const DELIVERY_HEADER: &str = "X-GitHub-Delivery";

fn reply(status: StatusCode, body: serde_json::Value) -> Response {
    (status, Json(body)).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// `POST /webhook`. Validates the delivery, answers 202 and hands the
/// heavy lifting to a detached background task so the sender never waits
/// on GitHub round-trips.
pub async fn webhook(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let headers = parts.headers;
    let delivery = header_str(&headers, DELIVERY_HEADER).to_string();

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(_) => {
            state.metrics.inc_webhooks_failed();
            return reply(
                StatusCode::BAD_REQUEST,
                json!({ "error": "request body too large" }),
            );
        }
    };

    state.metrics.inc_webhooks_received();

    let event_type = header_str(&headers, EVENT_HEADER);
    if event_type.is_empty() {
        state.metrics.inc_webhooks_failed();
        return reply(
            StatusCode::BAD_REQUEST,
            json!({ "error": "missing event type" }),
        );
    }

    if let Some(secret) = &state.settings.webhook_secret {
        let sig = header_str(&headers, SIGNATURE_HEADER);
        if !signature::verify(sig, &body, secret) {
            warn!(delivery = %delivery, "webhook signature verification failed");
            state.metrics.inc_webhooks_failed();
            return reply(
                StatusCode::UNAUTHORIZED,
                json!({ "error": "invalid signature" }),
            );
        }
    }

    if event_type != "pull_request" {
        return StatusCode::NO_CONTENT.into_response();
    }

    let event: PullRequestEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            state.metrics.inc_webhooks_failed();
            return reply(
                StatusCode::BAD_REQUEST,
                json!({ "error": format!("invalid payload: {e}") }),
            );
        }
    };

    if !event.is_merged_close() {
        return StatusCode::NO_CONTENT.into_response();
    }

    let Some(repository) = event.repository else {
        state.metrics.inc_webhooks_failed();
        return reply(
            StatusCode::BAD_REQUEST,
            json!({ "error": "missing repository information" }),
        );
    };
    // is_merged_close() guarantees the pull_request block is present.
    let Some(pull_request) = event.pull_request else {
        state.metrics.inc_webhooks_failed();
        return reply(
            StatusCode::BAD_REQUEST,
            json!({ "error": "missing pull request information" }),
        );
    };
    let Some(merge_sha) = pull_request.merge_commit_sha else {
        state.metrics.inc_webhooks_failed();
        return reply(
            StatusCode::BAD_REQUEST,
            json!({ "error": "missing merge commit sha" }),
        );
    };

    let job = PrJob {
        number: pull_request.number,
        merge_sha,
        repo: repository.full_name,
        delivery,
    };

    info!(
        pr = job.number,
        repo = %job.repo,
        delivery = %job.delivery,
        "accepted merged PR webhook, processing in background"
    );

    // Detached task: the request's lifetime ends at the 202 below, the
    // processing must not end with it.
    tokio::spawn(processor::run(Arc::clone(&state), job));

    reply(StatusCode::ACCEPTED, json!({ "status": "accepted" }))
}

/// `GET /health`.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let mut body = json!({
        "status": "ok",
        "started": state.metrics.started_at(),
        "github": {
            "status": if state.github.is_configured() { "configured" } else { "unconfigured" },
            "authenticated": state.github.is_authenticated(),
        },
        "queues": {
            "upload_count": state.staging.upload_count(),
            "deprecation_count": state.staging.deprecation_count(),
        },
        "uptime": humanize(state.metrics.uptime().as_secs()),
    });

    if state.audit.is_enabled() {
        body["audit_logger"] = json!({
            "status": "enabled",
            "connected": state.audit.ping().await,
        });
    }

    reply(StatusCode::OK, body)
}

/// `GET /metrics`.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let report = state.metrics.report(&state.staging);
    (StatusCode::OK, Json(report)).into_response()
}

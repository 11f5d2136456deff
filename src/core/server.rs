//! HTTP ingress: webhook reception plus health and metrics surfaces.

pub mod events;
pub mod routes;
pub mod signature;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::core::audit::AuditLogger;
use crate::core::config::loader::ConfigDialect;
use crate::core::github::GitHubClient;
use crate::core::metrics::MetricsCollector;
use crate::core::notify::Notifier;
use crate::core::staging::StagingStore;

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub config_file: PathBuf,
    pub config_dialect: ConfigDialect,
    pub webhook_secret: Option<String>,
}

/// Shared service state. One instance per process, handed to every
/// request handler and every background PR run.
pub struct AppState {
    pub settings: ServiceSettings,
    pub github: GitHubClient,
    pub staging: StagingStore,
    pub metrics: Arc<MetricsCollector>,
    pub audit: AuditLogger,
    pub notifier: Notifier,
    shutdown: AtomicBool,
}

impl AppState {
    pub fn new(
        settings: ServiceSettings,
        github: GitHubClient,
        metrics: Arc<MetricsCollector>,
        audit: AuditLogger,
        notifier: Notifier,
    ) -> Self {
        Self {
            settings,
            github,
            staging: StagingStore::new(),
            metrics,
            audit,
            notifier,
            shutdown: AtomicBool::new(false),
        }
    }

    /// Signals in-flight PR runs to stop at their next checkpoint.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(routes::webhook))
        .route("/health", get(routes::health))
        .route("/metrics", get(routes::metrics))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let app = router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal(state: Arc<AppState>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
    state.request_shutdown();
    state.audit.close().await;
}

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::ServeArgs;
use crate::core::audit::{AuditLogger, MemoryAuditStore};
use crate::core::config::loader;
use crate::core::config::types::CopierConfig;
use crate::core::github::{AppAuth, Credentials, FileSecretSource, GitHubClient};
use crate::core::metrics::MetricsCollector;
use crate::core::notify::{Notifier, NotifierConfig};
use crate::core::server::{self, AppState, ServiceSettings};
use crate::error::CliError;

pub async fn run(args: ServeArgs) -> Result<()> {
    // Fail fast on an unloadable config. The processor reloads it per PR,
    // so later edits are picked up without a restart.
    let workflows = load_config(&args)?;
    info!(
        workflows = workflows.len(),
        config = %args.config_file.display(),
        "configuration loaded"
    );

    let metrics = Arc::new(MetricsCollector::new());

    let credentials = build_credentials(&args)?;
    let github = GitHubClient::with_base_url(
        &args.github_api_url,
        credentials,
        Arc::clone(&metrics),
    )
    .map_err(CliError::GitHubApi)?;

    if !github.is_configured() {
        warn!("no GitHub credentials configured; webhook deliveries will fail at processing time");
    }

    let audit = if args.audit_enabled {
        info!("audit logging enabled (in-memory store)");
        AuditLogger::new(Arc::new(MemoryAuditStore::new()))
    } else {
        AuditLogger::disabled()
    };

    let notifier = Notifier::new(NotifierConfig {
        webhook_url: args.slack_webhook_url.clone(),
        channel: args.slack_channel.clone(),
        username: args.slack_username.clone(),
        icon_emoji: args.slack_icon.clone(),
    });
    if notifier.is_enabled() {
        info!(channel = %args.slack_channel, "chat notifications enabled");
    }

    let settings = ServiceSettings {
        config_file: args.config_file.clone(),
        config_dialect: args.config_dialect,
        webhook_secret: args.webhook_secret.clone(),
    };

    let state = Arc::new(AppState::new(settings, github, metrics, audit, notifier));

    server::serve(args.listen, state)
        .await
        .map_err(CliError::Server)?;
    Ok(())
}

fn load_config(args: &ServeArgs) -> Result<Vec<CopierConfig>, CliError> {
    Ok(loader::load(&args.config_file, args.config_dialect)?)
}

fn build_credentials(args: &ServeArgs) -> Result<Credentials, CliError> {
    if let Some(token) = &args.github_token {
        return Ok(Credentials::Token(token.clone()));
    }

    match (args.github_app_id, args.github_installation_id, &args.github_private_key) {
        (Some(app_id), Some(installation_id), Some(private_key)) => {
            let auth = AppAuth::new(
                app_id,
                installation_id,
                private_key.clone(),
                Arc::new(FileSecretSource::new(None)),
                args.github_api_url.clone(),
            )?;
            Ok(Credentials::App(Arc::new(auth)))
        }
        (None, None, None) => Ok(Credentials::Unconfigured),
        _ => Err(CliError::InvalidFlags(
            "GitHub App credentials require --github-app-id, --github-installation-id and --github-private-key together".to_string(),
        )),
    }
}

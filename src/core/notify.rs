//! Outbound chat notifications.
//!
//! Posts Slack-style attachment messages for the four operational events.
//! A notifier constructed without a webhook URL is disabled and every
//! method succeeds as a no-op, so call sites never have to branch.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde_json::{json, Value};

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_LISTED_FILES: usize = 10;

const COLOR_SUCCESS: &str = "good";
const COLOR_WARNING: &str = "warning";
const COLOR_DANGER: &str = "danger";

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub webhook_url: Option<String>,
    pub channel: String,
    pub username: String,
    pub icon_emoji: String,
}

#[derive(Clone)]
pub struct Notifier {
    config: Option<NotifierConfig>,
    client: reqwest::Client,
}

impl Notifier {
    pub fn new(config: NotifierConfig) -> Self {
        let enabled = config
            .webhook_url
            .as_ref()
            .is_some_and(|url| !url.is_empty());
        Self {
            config: enabled.then_some(config),
            client: reqwest::Client::builder()
                .timeout(NOTIFY_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            config: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    pub async fn pr_processed(
        &self,
        source_repo: &str,
        pr_number: u64,
        matched: u64,
        copied: u64,
        failed: u64,
        elapsed: Duration,
    ) -> Result<()> {
        let color = if failed == 0 {
            COLOR_SUCCESS
        } else {
            COLOR_WARNING
        };
        self.send(
            color,
            &format!("Processed PR #{pr_number} from {source_repo}"),
            "",
            vec![
                field("Matched", &matched.to_string(), true),
                field("Copied", &copied.to_string(), true),
                field("Failed", &failed.to_string(), true),
                field("Elapsed", &format!("{:.1}s", elapsed.as_secs_f64()), true),
            ],
        )
        .await
    }

    pub async fn error(&self, context: &str, message: &str) -> Result<()> {
        self.send(
            COLOR_DANGER,
            "Replication error",
            message,
            vec![field("Context", context, false)],
        )
        .await
    }

    pub async fn files_copied(&self, target_repo: &str, files: &[String]) -> Result<()> {
        self.send(
            COLOR_SUCCESS,
            &format!("Copied {} file(s) to {target_repo}", files.len()),
            &file_list(files),
            vec![],
        )
        .await
    }

    pub async fn deprecation(
        &self,
        target_repo: &str,
        manifest_file: &str,
        files: &[String],
    ) -> Result<()> {
        self.send(
            COLOR_WARNING,
            &format!("Deprecated {} file(s) in {target_repo}", files.len()),
            &file_list(files),
            vec![field("Manifest", manifest_file, true)],
        )
        .await
    }

    async fn send(&self, color: &str, title: &str, text: &str, fields: Vec<Value>) -> Result<()> {
        let Some(config) = &self.config else {
            return Ok(());
        };
        let url = config.webhook_url.as_deref().unwrap_or_default();

        let payload = json!({
            "channel": config.channel,
            "username": config.username,
            "icon_emoji": config.icon_emoji,
            "attachments": [{
                "color": color,
                "title": title,
                "text": text,
                "fields": fields,
                "footer": "codeferry",
                "ts": Utc::now().timestamp(),
            }],
        });

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .context("failed to send chat notification")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "chat webhook returned status {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            ));
        }

        Ok(())
    }
}

fn field(title: &str, value: &str, short: bool) -> Value {
    json!({ "title": title, "value": value, "short": short })
}

/// Bulleted file list, truncated past ten entries.
fn file_list(files: &[String]) -> String {
    let mut lines: Vec<String> = files
        .iter()
        .take(MAX_LISTED_FILES)
        .map(|f| format!("• {f}"))
        .collect();
    if files.len() > MAX_LISTED_FILES {
        lines.push(format!("... and {} more", files.len() - MAX_LISTED_FILES));
    }
    lines.join("\n")
}

//! Background processing of one merged pull request.
//!
//! Runs detached from the webhook request that triggered it. Errors are
//! contained at the smallest useful granularity: a failing target or file
//! is audited and skipped, while credential exchange and configuration
//! loading abort the whole run (there is no safe default routing).

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::core::audit::AuditDetails;
use crate::core::config::loader;
use crate::core::config::types::{CopierConfig, Rule, Target};
use crate::core::github::types::PullRequestFile;
use crate::core::rules::message::{self, MessageContext};
use crate::core::rules::pattern::{self, MatchResult};
use crate::core::rules::transform;
use crate::core::server::AppState;
use crate::core::staging::{DeprecatedFileEntry, FileContent, UploadBatch, UploadKey};

use super::executor;

#[derive(Debug, Clone)]
pub struct PrJob {
    pub number: u64,
    pub merge_sha: String,
    pub repo: String,
    pub delivery: String,
}

/// A fatal condition that aborts the run.
struct Abort {
    context: &'static str,
    message: String,
}

/// How a background run ended, short of a fatal abort.
enum RunOutcome {
    Completed,
    /// No matching workflow or cancellation: no processing happened.
    Dropped,
}

pub async fn run(state: Arc<AppState>, job: PrJob) {
    let started = Instant::now();
    let before = state.metrics.counters();

    match process(&state, &job).await {
        Ok(RunOutcome::Dropped) => {}
        Ok(RunOutcome::Completed) => {
            state.metrics.inc_webhooks_processed();
            state
                .metrics
                .record_webhook_duration_ms(started.elapsed().as_secs_f64() * 1000.0);

            let after = state.metrics.counters();
            let matched = after.files_matched - before.files_matched;
            let copied = after.files_uploaded - before.files_uploaded;
            let failed = after.files_upload_failed - before.files_upload_failed;

            info!(
                pr = job.number,
                matched = matched,
                copied = copied,
                failed = failed,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "finished processing PR"
            );

            if let Err(e) = state
                .notifier
                .pr_processed(&job.repo, job.number, matched, copied, failed, started.elapsed())
                .await
            {
                warn!("failed to send PR summary notification: {e}");
            }
        }
        Err(abort) => {
            error!(pr = job.number, context = abort.context, "{}", abort.message);
            state.metrics.inc_webhooks_failed();

            state
                .audit
                .log_error(AuditDetails {
                    source_repo: job.repo.clone(),
                    pr_number: Some(job.number),
                    error_message: Some(abort.message.clone()),
                    duration_ms: started.elapsed().as_millis() as u64,
                    ..AuditDetails::default()
                })
                .await;

            if let Err(e) = state.notifier.error(abort.context, &abort.message).await {
                warn!("failed to send error notification: {e}");
            }
        }
    }
}

async fn process(state: &AppState, job: &PrJob) -> Result<RunOutcome, Abort> {
    state
        .github
        .ensure_credentials()
        .await
        .map_err(|e| Abort {
            context: "credential exchange",
            message: e.to_string(),
        })?;

    let workflows = loader::load(&state.settings.config_file, state.settings.config_dialect)
        .map_err(|e| Abort {
            context: "configuration load",
            message: e.to_string(),
        })?;

    let matching: Vec<&CopierConfig> = workflows
        .iter()
        .filter(|w| w.source_repo == job.repo)
        .collect();
    if matching.is_empty() {
        warn!(
            repo = %job.repo,
            "webhook source repo matches no configured workflow, dropping"
        );
        state.metrics.inc_webhooks_failed();
        return Ok(RunOutcome::Dropped);
    }

    let files = state
        .github
        .list_pr_files(&job.repo, job.number)
        .await
        .map_err(|e| Abort {
            context: "changed file listing",
            message: e.to_string(),
        })?;

    info!(pr = job.number, files = files.len(), "evaluating rules");

    for workflow in matching {
        for file in &files {
            if state.is_shutting_down() {
                return cancelled(state, job);
            }
            for rule in &workflow.copy_rules {
                if state.is_shutting_down() {
                    return cancelled(state, job);
                }

                let result = pattern::matches(&file.filename, &rule.source);
                if !result.matched {
                    continue;
                }
                state.metrics.inc_files_matched();

                for target in &rule.targets {
                    stage_target(state, job, workflow, rule, target, file, &result).await;
                }
            }
        }
    }

    let uploads = state.staging.snapshot_uploads();
    executor::execute_uploads(state, job, uploads).await;
    state.staging.clear_uploads();

    let deprecations = state.staging.snapshot_deprecations();
    executor::update_manifests(state, job, deprecations).await;
    state.staging.clear_deprecations();

    Ok(RunOutcome::Completed)
}

fn cancelled(state: &AppState, job: &PrJob) -> Result<RunOutcome, Abort> {
    info!(pr = job.number, "cancellation requested, dropping staged work");
    state.staging.clear_uploads();
    state.staging.clear_deprecations();
    Ok(RunOutcome::Dropped)
}

/// Stages one (file, rule, target) combination. Failures here never
/// propagate: they are audited and the rest of the PR continues.
async fn stage_target(
    state: &AppState,
    job: &PrJob,
    workflow: &CopierConfig,
    rule: &Rule,
    target: &Target,
    file: &PullRequestFile,
    result: &MatchResult,
) {
    let target_path =
        match transform::render_target_path(&file.filename, &target.path_transform, &result.variables)
        {
            Ok(path) => path,
            Err(e) => {
                warn!(rule = %rule.name, file = %file.filename, "path transform failed: {e}");
                state
                    .audit
                    .log_error(AuditDetails {
                        rule_name: rule.name.clone(),
                        source_repo: job.repo.clone(),
                        source_path: file.filename.clone(),
                        target_repo: target.repo.clone(),
                        pr_number: Some(job.number),
                        error_message: Some(e.to_string()),
                        ..AuditDetails::default()
                    })
                    .await;
                return;
            }
        };

    if file.is_removed() {
        let Some(check) = target.deprecation_check.as_ref().filter(|c| c.enabled) else {
            return;
        };

        let mut entries = state
            .staging
            .get_deprecation(&check.file_name)
            .unwrap_or_default();
        entries.push(DeprecatedFileEntry {
            path: target_path.clone(),
            repo: target.repo.clone(),
            branch: target.branch.clone(),
        });
        state.staging.put_deprecation(&check.file_name, entries);
        state.metrics.inc_files_deprecated();

        state
            .audit
            .log_deprecation(AuditDetails {
                rule_name: rule.name.clone(),
                source_repo: job.repo.clone(),
                source_path: file.filename.clone(),
                target_repo: target.repo.clone(),
                target_path,
                pr_number: Some(job.number),
                success: true,
                ..AuditDetails::default()
            })
            .await;
        return;
    }

    // Content must come from the merge commit: HEAD may already have moved.
    let bytes = match state
        .github
        .fetch_content(&job.repo, &file.filename, &job.merge_sha)
        .await
    {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(file = %file.filename, "content fetch failed: {e}");
            state.metrics.inc_files_upload_failed();
            state
                .audit
                .log_error(AuditDetails {
                    rule_name: rule.name.clone(),
                    source_repo: job.repo.clone(),
                    source_path: file.filename.clone(),
                    target_repo: target.repo.clone(),
                    target_path,
                    pr_number: Some(job.number),
                    error_message: Some(e.to_string()),
                    ..AuditDetails::default()
                })
                .await;
            return;
        }
    };

    let key = UploadKey::new(
        &target.repo,
        &target.branch,
        &rule.name,
        target.commit_strategy.kind,
    );
    let mut batch = state.staging.get_upload(&key).unwrap_or_else(|| UploadBatch {
        repo: target.repo.clone(),
        branch: target.branch.clone(),
        strategy: target.commit_strategy.kind,
        auto_merge: target.commit_strategy.auto_merge,
        commit_message: String::new(),
        pr_title: String::new(),
        pr_body: String::new(),
        files: Vec::new(),
    });

    batch.files.push(FileContent {
        path: target_path,
        source_path: file.filename.clone(),
        bytes,
    });

    // Re-render on every append so ${file_count} tracks the batch.
    let ctx = MessageContext {
        rule_name: rule.name.clone(),
        source_repo: workflow.source_repo.clone(),
        source_branch: workflow.source_branch.clone(),
        target_repo: target.repo.clone(),
        target_branch: target.branch.clone(),
        file_count: batch.files.len(),
        pr_number: job.number,
        commit_sha: job.merge_sha.clone(),
        variables: result.variables.clone(),
    };
    batch.commit_message =
        message::render_commit_message(&target.commit_strategy.commit_message, &ctx);
    batch.pr_title = message::render_pr_title(&target.commit_strategy.pr_title, &ctx);
    batch.pr_body = message::render_pr_body(&target.commit_strategy.pr_body, &ctx);

    state.staging.put_upload(key, batch);
}

//! Commit execution: turns staged batches into GitHub writes.
//!
//! Each upload batch becomes either a direct commit on the target branch
//! or a working branch + pull request (optionally merged immediately).
//! Deprecation snapshots become appends to the per-target JSON manifest.
//! The snapshots are passed in explicitly; this module holds no state of
//! its own.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::audit::AuditDetails;
use crate::core::github::ApiError;
use crate::core::server::AppState;
use crate::core::staging::{DeprecatedFileEntry, FileContent, UploadBatch, UploadKey};

use super::processor::PrJob;

use crate::core::config::types::StrategyKind;

struct CommitOutcome {
    commit_sha: String,
    pr_number: Option<u64>,
}

/// Pushes every staged upload batch. Batch failures are audited per file
/// and do not stop the remaining batches.
pub async fn execute_uploads(
    state: &AppState,
    job: &PrJob,
    uploads: HashMap<UploadKey, UploadBatch>,
) {
    for (key, batch) in uploads {
        let started = Instant::now();
        match push_batch(state, job, &key, &batch).await {
            Ok(outcome) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                state
                    .metrics
                    .record_upload_duration_ms(elapsed_ms as f64);

                info!(
                    repo = %batch.repo,
                    branch = %batch.branch,
                    files = batch.files.len(),
                    commit = %outcome.commit_sha,
                    "pushed upload batch"
                );

                for file in &batch.files {
                    state.metrics.inc_files_uploaded();
                    state
                        .audit
                        .log_copy(AuditDetails {
                            rule_name: key.rule.clone(),
                            source_repo: job.repo.clone(),
                            source_path: file.source_path.clone(),
                            target_repo: batch.repo.clone(),
                            target_path: file.path.clone(),
                            commit_sha: Some(outcome.commit_sha.clone()),
                            pr_number: outcome.pr_number,
                            success: true,
                            duration_ms: elapsed_ms,
                            file_size: Some(file.bytes.len() as u64),
                            ..AuditDetails::default()
                        })
                        .await;
                }

                let paths: Vec<String> = batch.files.iter().map(|f| f.path.clone()).collect();
                if let Err(e) = state.notifier.files_copied(&batch.repo, &paths).await {
                    warn!("failed to send copy notification: {e}");
                }
            }
            Err(e) => {
                warn!(repo = %batch.repo, rule = %key.rule, "upload batch failed: {e}");
                let elapsed_ms = started.elapsed().as_millis() as u64;

                for file in &batch.files {
                    state.metrics.inc_files_upload_failed();
                    state
                        .audit
                        .log_error(AuditDetails {
                            rule_name: key.rule.clone(),
                            source_repo: job.repo.clone(),
                            source_path: file.source_path.clone(),
                            target_repo: batch.repo.clone(),
                            target_path: file.path.clone(),
                            pr_number: Some(job.number),
                            error_message: Some(e.to_string()),
                            duration_ms: elapsed_ms,
                            file_size: Some(file.bytes.len() as u64),
                            ..AuditDetails::default()
                        })
                        .await;
                }

                if let Err(notify_err) = state
                    .notifier
                    .error(
                        "upload batch",
                        &format!("failed to push {} file(s) to {}: {e}", batch.files.len(), batch.repo),
                    )
                    .await
                {
                    warn!("failed to send error notification: {notify_err}");
                }
            }
        }
    }
}

async fn push_batch(
    state: &AppState,
    job: &PrJob,
    key: &UploadKey,
    batch: &UploadBatch,
) -> Result<CommitOutcome, ApiError> {
    match batch.strategy {
        StrategyKind::Direct => {
            let sha = state
                .github
                .commit_files(&batch.repo, &batch.branch, &batch.commit_message, &batch.files)
                .await?;
            Ok(CommitOutcome {
                commit_sha: sha,
                pr_number: None,
            })
        }
        StrategyKind::Pr => {
            let base_sha = state.github.get_branch_sha(&batch.repo, &batch.branch).await?;
            let work_branch = work_branch_name(&key.rule, job);
            state
                .github
                .create_branch(&batch.repo, &work_branch, &base_sha)
                .await?;
            let sha = state
                .github
                .commit_files(&batch.repo, &work_branch, &batch.commit_message, &batch.files)
                .await?;
            let pr = state
                .github
                .create_pull_request(
                    &batch.repo,
                    &batch.pr_title,
                    &work_branch,
                    &batch.branch,
                    &batch.pr_body,
                )
                .await?;

            if batch.auto_merge {
                let merge = state.github.merge_pull_request(&batch.repo, pr.number).await?;
                if !merge.merged {
                    warn!(
                        repo = %batch.repo,
                        pr = pr.number,
                        "auto-merge declined: {}",
                        merge.message
                    );
                }
            }

            Ok(CommitOutcome {
                commit_sha: sha,
                pr_number: Some(pr.number),
            })
        }
    }
}

/// Working branch for PR-strategy batches. The merge sha prefix keeps
/// branches from successive source PRs apart.
fn work_branch_name(rule: &str, job: &PrJob) -> String {
    let slug: String = rule
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let sha = &job.merge_sha[..job.merge_sha.len().min(7)];
    format!("codeferry/{slug}-pr{}-{sha}", job.number)
}

/// One record in a target repo's deprecation manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestRecord {
    pub path: String,
    pub deprecated_on: chrono::NaiveDate,
    pub source_pr: u64,
}

/// Applies a deprecation snapshot: for every manifest file, read the
/// current manifest from each affected (repo, branch), append the new
/// records and commit the result back.
pub async fn update_manifests(
    state: &AppState,
    job: &PrJob,
    deprecations: HashMap<String, Vec<DeprecatedFileEntry>>,
) {
    for (manifest_file, entries) in deprecations {
        let mut groups: BTreeMap<(String, String), Vec<DeprecatedFileEntry>> = BTreeMap::new();
        for entry in entries {
            groups
                .entry((entry.repo.clone(), entry.branch.clone()))
                .or_default()
                .push(entry);
        }

        for ((repo, branch), group) in groups {
            if let Err(e) = apply_manifest_update(state, job, &manifest_file, &repo, &branch, &group).await
            {
                warn!(repo = %repo, manifest = %manifest_file, "manifest update failed: {e}");
                for entry in &group {
                    state
                        .audit
                        .log_error(AuditDetails {
                            source_repo: job.repo.clone(),
                            target_repo: repo.clone(),
                            target_path: entry.path.clone(),
                            pr_number: Some(job.number),
                            error_message: Some(e.to_string()),
                            ..AuditDetails::default()
                        })
                        .await;
                }

                if let Err(notify_err) = state
                    .notifier
                    .error(
                        "deprecation manifest",
                        &format!("failed to update {manifest_file} in {repo}: {e}"),
                    )
                    .await
                {
                    warn!("failed to send error notification: {notify_err}");
                }
            }
        }
    }
}

async fn apply_manifest_update(
    state: &AppState,
    job: &PrJob,
    manifest_file: &str,
    repo: &str,
    branch: &str,
    group: &[DeprecatedFileEntry],
) -> Result<(), ApiError> {
    let existing = state
        .github
        .try_fetch_content(repo, manifest_file, branch)
        .await?;

    let mut records: Vec<ManifestRecord> = match existing {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::InvalidResponse(format!("corrupt manifest {manifest_file}: {e}")))?,
        None => Vec::new(),
    };

    let today = Utc::now().date_naive();
    for entry in group {
        if records.iter().any(|r| r.path == entry.path) {
            continue;
        }
        records.push(ManifestRecord {
            path: entry.path.clone(),
            deprecated_on: today,
            source_pr: job.number,
        });
    }

    let bytes = serde_json::to_vec_pretty(&records)?;
    let commit = FileContent {
        path: manifest_file.to_string(),
        source_path: String::new(),
        bytes,
    };
    state
        .github
        .commit_files(
            repo,
            branch,
            &format!("Record {} deprecated example(s)", group.len()),
            &[commit],
        )
        .await?;

    info!(
        repo = %repo,
        manifest = %manifest_file,
        added = group.len(),
        "updated deprecation manifest"
    );

    let paths: Vec<String> = group.iter().map(|e| e.path.clone()).collect();
    if let Err(e) = state.notifier.deprecation(repo, manifest_file, &paths).await {
        warn!("failed to send deprecation notification: {e}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_branch_names_are_slugged_and_scoped() {
        let job = PrJob {
            number: 42,
            merge_sha: "abc1234def5678".to_string(),
            repo: "octo/source".to_string(),
            delivery: String::new(),
        };
        assert_eq!(
            work_branch_name("python examples!", &job),
            "codeferry/python-examples--pr42-abc1234"
        );
    }

    #[test]
    fn work_branch_name_survives_short_shas() {
        let job = PrJob {
            number: 1,
            merge_sha: "ab".to_string(),
            repo: "o/r".to_string(),
            delivery: String::new(),
        };
        assert_eq!(work_branch_name("r", &job), "codeferry/r-pr1-ab");
    }
}

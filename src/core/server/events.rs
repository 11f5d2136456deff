//! Typed webhook payloads.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    #[serde(default)]
    pub action: String,

    #[serde(default)]
    pub pull_request: Option<PullRequest>,

    #[serde(default)]
    pub repository: Option<Repository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,

    #[serde(default)]
    pub merged: bool,

    #[serde(default)]
    pub merge_commit_sha: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub full_name: String,
}

impl PullRequestEvent {
    /// A delivery is actionable when the PR was closed by merging.
    pub fn is_merged_close(&self) -> bool {
        self.action == "closed"
            && self
                .pull_request
                .as_ref()
                .is_some_and(|pr| pr.merged)
    }
}

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use tracing::debug;

use crate::core::metrics::MetricsCollector;
use crate::core::staging::FileContent;

use super::auth::AppAuth;
use super::error::ApiError;
use super::types::{
    ContentResponse, CreatedPullRequest, GitCommit, GitRef, MergeResponse, PullRequestFile,
    ShaResponse, TreeEntry,
};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const PER_PAGE: u32 = 100;

/// How the client authenticates its calls.
pub enum Credentials {
    /// GitHub App installation flow; the token is minted and cached by
    /// [`AppAuth`].
    App(Arc<AppAuth>),
    /// A fixed token, used by tests.
    Token(String),
    /// No credentials configured; every call fails with
    /// [`ApiError::CredentialsMissing`].
    Unconfigured,
}

pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    metrics: Arc<MetricsCollector>,
}

impl GitHubClient {
    pub fn new(credentials: Credentials, metrics: Arc<MetricsCollector>) -> Result<Self, ApiError> {
        Self::with_base_url(DEFAULT_API_BASE, credentials, metrics)
    }

    pub fn with_base_url(
        base_url: &str,
        credentials: Credentials,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent("codeferry")
                .build()
                .map_err(|e| ApiError::ClientCreation(e.to_string()))?,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            metrics,
        })
    }

    pub fn is_configured(&self) -> bool {
        !matches!(self.credentials, Credentials::Unconfigured)
    }

    pub fn is_authenticated(&self) -> bool {
        match &self.credentials {
            Credentials::App(auth) => auth.is_authenticated(),
            Credentials::Token(_) => true,
            Credentials::Unconfigured => false,
        }
    }

    /// Forces a token exchange so startup can fail fast on bad credentials.
    pub async fn ensure_credentials(&self) -> Result<(), ApiError> {
        self.token().await.map(|_| ())
    }

    async fn token(&self) -> Result<String, ApiError> {
        match &self.credentials {
            Credentials::App(auth) => auth.installation_token().await,
            Credentials::Token(token) => Ok(token.clone()),
            Credentials::Unconfigured => Err(ApiError::CredentialsMissing),
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let token = self.token().await?;
        self.metrics.inc_api_calls();

        let response = request
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .inspect_err(|_| self.metrics.inc_api_errors())?;

        if !response.status().is_success() {
            self.metrics.inc_api_errors();
            return Err(ApiError::ApiResponse {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response)
    }

    /// Lists every changed file in a pull request, in the order the API
    /// reports them.
    pub async fn list_pr_files(
        &self,
        repo: &str,
        pr_number: u64,
    ) -> Result<Vec<PullRequestFile>, ApiError> {
        let mut all = Vec::new();
        let mut page = 1;

        loop {
            let response = self
                .send(self.client.get(format!(
                    "{}/repos/{repo}/pulls/{pr_number}/files?per_page={PER_PAGE}&page={page}",
                    self.base_url
                )))
                .await?;

            let files: Vec<PullRequestFile> = response.json().await?;
            let batch_len = files.len();
            all.extend(files);

            if batch_len < PER_PAGE as usize {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    /// Fetches a file's raw bytes at a specific ref.
    pub async fn fetch_content(
        &self,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<u8>, ApiError> {
        let response = self
            .send(self.client.get(format!(
                "{}/repos/{repo}/contents/{path}?ref={git_ref}",
                self.base_url
            )))
            .await?;

        let content: ContentResponse = response.json().await?;
        decode_content(&content)
    }

    /// Like `fetch_content` but maps a missing file to `None`.
    pub async fn try_fetch_content(
        &self,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<Option<Vec<u8>>, ApiError> {
        match self.fetch_content(repo, path, git_ref).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(ApiError::ApiResponse { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn get_branch_sha(&self, repo: &str, branch: &str) -> Result<String, ApiError> {
        let response = self
            .send(self.client.get(format!(
                "{}/repos/{repo}/git/ref/heads/{branch}",
                self.base_url
            )))
            .await?;

        let git_ref: GitRef = response.json().await?;
        Ok(git_ref.object.sha)
    }

    pub async fn create_branch(&self, repo: &str, branch: &str, sha: &str) -> Result<(), ApiError> {
        self.send(
            self.client
                .post(format!("{}/repos/{repo}/git/refs", self.base_url))
                .json(&json!({
                    "ref": format!("refs/heads/{branch}"),
                    "sha": sha,
                })),
        )
        .await?;
        Ok(())
    }

    async fn get_commit(&self, repo: &str, sha: &str) -> Result<GitCommit, ApiError> {
        let response = self
            .send(self.client.get(format!(
                "{}/repos/{repo}/git/commits/{sha}",
                self.base_url
            )))
            .await?;
        Ok(response.json().await?)
    }

    async fn create_blob(&self, repo: &str, bytes: &[u8]) -> Result<String, ApiError> {
        let response = self
            .send(
                self.client
                    .post(format!("{}/repos/{repo}/git/blobs", self.base_url))
                    .json(&json!({
                        "content": BASE64.encode(bytes),
                        "encoding": "base64",
                    })),
            )
            .await?;

        let blob: ShaResponse = response.json().await?;
        Ok(blob.sha)
    }

    async fn create_tree(
        &self,
        repo: &str,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<String, ApiError> {
        let response = self
            .send(
                self.client
                    .post(format!("{}/repos/{repo}/git/trees", self.base_url))
                    .json(&json!({
                        "base_tree": base_tree,
                        "tree": entries,
                    })),
            )
            .await?;

        let tree: ShaResponse = response.json().await?;
        Ok(tree.sha)
    }

    async fn create_commit(
        &self,
        repo: &str,
        message: &str,
        tree_sha: &str,
        parent_sha: &str,
    ) -> Result<String, ApiError> {
        let response = self
            .send(
                self.client
                    .post(format!("{}/repos/{repo}/git/commits", self.base_url))
                    .json(&json!({
                        "message": message,
                        "tree": tree_sha,
                        "parents": [parent_sha],
                    })),
            )
            .await?;

        let commit: ShaResponse = response.json().await?;
        Ok(commit.sha)
    }

    async fn update_ref(&self, repo: &str, branch: &str, sha: &str) -> Result<(), ApiError> {
        self.send(
            self.client
                .patch(format!(
                    "{}/repos/{repo}/git/refs/heads/{branch}",
                    self.base_url
                ))
                .json(&json!({ "sha": sha })),
        )
        .await?;
        Ok(())
    }

    /// Commits a set of files onto `branch` in one commit via the git data
    /// API (blobs, tree, commit, ref update). Returns the new commit sha.
    pub async fn commit_files(
        &self,
        repo: &str,
        branch: &str,
        message: &str,
        files: &[FileContent],
    ) -> Result<String, ApiError> {
        let head_sha = self.get_branch_sha(repo, branch).await?;
        let head_commit = self.get_commit(repo, &head_sha).await?;

        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let blob_sha = self.create_blob(repo, &file.bytes).await?;
            entries.push(TreeEntry::blob(file.path.clone(), blob_sha));
        }

        let tree_sha = self
            .create_tree(repo, &head_commit.tree.sha, &entries)
            .await?;
        let commit_sha = self
            .create_commit(repo, message, &tree_sha, &head_sha)
            .await?;
        self.update_ref(repo, branch, &commit_sha).await?;

        debug!("committed {} file(s) to {repo}@{branch}: {commit_sha}", files.len());
        Ok(commit_sha)
    }

    pub async fn create_pull_request(
        &self,
        repo: &str,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<CreatedPullRequest, ApiError> {
        let response = self
            .send(
                self.client
                    .post(format!("{}/repos/{repo}/pulls", self.base_url))
                    .json(&json!({
                        "title": title,
                        "head": head,
                        "base": base,
                        "body": body,
                    })),
            )
            .await?;

        Ok(response.json().await?)
    }

    pub async fn merge_pull_request(
        &self,
        repo: &str,
        pr_number: u64,
    ) -> Result<MergeResponse, ApiError> {
        let response = self
            .send(
                self.client
                    .put(format!(
                        "{}/repos/{repo}/pulls/{pr_number}/merge",
                        self.base_url
                    ))
                    .json(&json!({ "merge_method": "squash" })),
            )
            .await?;

        Ok(response.json().await?)
    }
}

fn decode_content(content: &ContentResponse) -> Result<Vec<u8>, ApiError> {
    match content.encoding.as_str() {
        "base64" => {
            // The contents API wraps base64 at 60 columns.
            let compact: String = content
                .content
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            BASE64
                .decode(compact)
                .map_err(|e| ApiError::InvalidResponse(format!("bad base64 content: {e}")))
        }
        "" | "none" => Ok(content.content.clone().into_bytes()),
        other => Err(ApiError::InvalidResponse(format!(
            "unsupported content encoding '{other}'"
        ))),
    }
}

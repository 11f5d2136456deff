//! Concurrency-safe staging of pending work.
//!
//! The PR processor stages per-file operations here; the commit executor
//! consumes them in batched form. Uploads are keyed by [`UploadKey`] so
//! files destined for the same (repo, branch, rule, strategy) land in a
//! single commit or PR; deprecations are keyed by manifest file name so
//! multiple deletions accrue to one manifest update.
//!
//! Writes are full replacements. Callers that want to append read the
//! current value, extend it, and write it back; the store itself never
//! merges. Snapshots are deep copies; mutating one has no effect on the
//! store or on later snapshots.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::config::types::StrategyKind;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadKey {
    pub repo: String,
    pub branch_ref: String,
    pub rule: String,
    pub strategy: &'static str,
}

impl UploadKey {
    pub fn new(repo: &str, branch: &str, rule: &str, strategy: StrategyKind) -> Self {
        Self {
            repo: repo.to_string(),
            branch_ref: format!("refs/heads/{branch}"),
            rule: rule.to_string(),
            strategy: strategy.tag(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    /// Rendered target path.
    pub path: String,
    /// Where the bytes came from in the source repo; carried for auditing.
    pub source_path: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct UploadBatch {
    pub repo: String,
    pub branch: String,
    pub strategy: StrategyKind,
    pub auto_merge: bool,
    pub commit_message: String,
    pub pr_title: String,
    pub pr_body: String,
    pub files: Vec<FileContent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeprecatedFileEntry {
    pub path: String,
    pub repo: String,
    pub branch: String,
}

#[derive(Default)]
struct Inner {
    uploads: HashMap<UploadKey, UploadBatch>,
    deprecations: HashMap<String, Vec<DeprecatedFileEntry>>,
}

/// Shared staging state. One writer at a time; snapshotters take the read
/// lock and copy out.
#[derive(Default)]
pub struct StagingStore {
    inner: RwLock<Inner>,
}

impl StagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_upload(&self, key: UploadKey, batch: UploadBatch) {
        self.inner.write().uploads.insert(key, batch);
    }

    pub fn get_upload(&self, key: &UploadKey) -> Option<UploadBatch> {
        self.inner.read().uploads.get(key).cloned()
    }

    pub fn snapshot_uploads(&self) -> HashMap<UploadKey, UploadBatch> {
        self.inner.read().uploads.clone()
    }

    pub fn clear_uploads(&self) {
        self.inner.write().uploads.clear();
    }

    pub fn upload_count(&self) -> usize {
        self.inner.read().uploads.len()
    }

    pub fn put_deprecation(&self, manifest_file: &str, entries: Vec<DeprecatedFileEntry>) {
        self.inner
            .write()
            .deprecations
            .insert(manifest_file.to_string(), entries);
    }

    pub fn get_deprecation(&self, manifest_file: &str) -> Option<Vec<DeprecatedFileEntry>> {
        self.inner.read().deprecations.get(manifest_file).cloned()
    }

    pub fn snapshot_deprecations(&self) -> HashMap<String, Vec<DeprecatedFileEntry>> {
        self.inner.read().deprecations.clone()
    }

    pub fn clear_deprecations(&self) {
        self.inner.write().deprecations.clear();
    }

    pub fn deprecation_count(&self) -> usize {
        self.inner.read().deprecations.len()
    }
}

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditEventKind {
    Copy,
    Deprecation,
    Error,
}

/// A single audit record. `id`, `timestamp` and `kind` are assigned by the
/// sink at write time; everything else comes from the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventKind,
    pub rule_name: String,
    pub source_repo: String,
    pub source_path: String,
    pub target_repo: String,
    pub target_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional: BTreeMap<String, serde_json::Value>,
}

/// Caller-supplied portion of an audit record.
#[derive(Debug, Clone, Default)]
pub struct AuditDetails {
    pub rule_name: String,
    pub source_repo: String,
    pub source_path: String,
    pub target_repo: String,
    pub target_path: String,
    pub commit_sha: Option<String>,
    pub pr_number: Option<u64>,
    pub success: bool,
    pub error_message: Option<String>,
    pub duration_ms: u64,
    pub file_size: Option<u64>,
    pub additional: BTreeMap<String, serde_json::Value>,
}

impl AuditDetails {
    pub(super) fn into_event(self, kind: AuditEventKind) -> AuditEvent {
        AuditEvent {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: kind,
            rule_name: self.rule_name,
            source_repo: self.source_repo,
            source_path: self.source_path,
            target_repo: self.target_repo,
            target_path: self.target_path,
            commit_sha: self.commit_sha,
            pr_number: self.pr_number,
            // Error events are failures no matter what the caller set.
            success: kind != AuditEventKind::Error && self.success,
            error_message: self.error_message,
            duration_ms: self.duration_ms,
            file_size: self.file_size,
            additional: self.additional,
        }
    }
}

/// Aggregate of copy events for one rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleRollup {
    pub rule_name: String,
    pub total: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub avg_duration_ms: f64,
}

/// Copy events per calendar day.
#[derive(Debug, Clone, Serialize)]
pub struct DailyVolume {
    pub day: chrono::NaiveDate,
    pub count: u64,
}

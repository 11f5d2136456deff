use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::event::{AuditEvent, AuditEventKind, DailyVolume, RuleRollup};

#[derive(Debug, thiserror::Error)]
pub enum AuditStoreError {
    #[error("audit store unavailable: {0}")]
    Unavailable(String),

    #[error("audit write failed: {0}")]
    Write(String),

    #[error("audit query failed: {0}")]
    Query(String),
}

pub type Result<T> = std::result::Result<T, AuditStoreError>;

/// Filter for audit queries. The backing store is expected to index on
/// timestamp (descending), event type, rule name, success and source repo.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub event_type: Option<AuditEventKind>,
    pub rule_name: Option<String>,
    pub success: Option<bool>,
    pub since: Option<chrono::DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Document-store driver seam. Production deployments plug a real driver
/// in here; the crate ships an in-memory implementation.
///
/// Results are ordered by timestamp descending. The rollup methods have
/// in-process default implementations built on `query`; a driver backed by
/// a store with server-side aggregation is free to override them.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, event: AuditEvent) -> Result<()>;

    async fn query(&self, query: AuditQuery) -> Result<Vec<AuditEvent>>;

    /// Cheap connectivity probe for the health endpoint.
    async fn ping(&self) -> Result<()>;

    /// Releases the store's resource handle. Must be idempotent.
    async fn close(&self) -> Result<()>;

    async fn rollup_by_rule(&self) -> Result<Vec<RuleRollup>> {
        let events = self
            .query(AuditQuery {
                event_type: Some(AuditEventKind::Copy),
                ..AuditQuery::default()
            })
            .await?;

        let mut by_rule: std::collections::BTreeMap<String, (u64, u64, u64, u64)> =
            std::collections::BTreeMap::new();
        for event in events {
            let slot = by_rule.entry(event.rule_name).or_default();
            slot.0 += 1;
            if event.success {
                slot.1 += 1;
            } else {
                slot.2 += 1;
            }
            slot.3 += event.duration_ms;
        }

        Ok(by_rule
            .into_iter()
            .map(
                |(rule_name, (total, success_count, failure_count, total_ms))| RuleRollup {
                    rule_name,
                    total,
                    success_count,
                    failure_count,
                    avg_duration_ms: if total == 0 {
                        0.0
                    } else {
                        total_ms as f64 / total as f64
                    },
                },
            )
            .collect())
    }

    async fn daily_volume(&self, days: i64) -> Result<Vec<DailyVolume>> {
        let since = Utc::now() - Duration::days(days);
        let events = self
            .query(AuditQuery {
                event_type: Some(AuditEventKind::Copy),
                since: Some(since),
                ..AuditQuery::default()
            })
            .await?;

        let mut by_day: std::collections::BTreeMap<chrono::NaiveDate, u64> =
            std::collections::BTreeMap::new();
        for event in events {
            *by_day.entry(event.timestamp.date_naive()).or_default() += 1;
        }

        // BTreeMap iteration gives the ascending day order the API promises.
        Ok(by_day
            .into_iter()
            .map(|(day, count)| DailyVolume { day, count })
            .collect())
    }
}

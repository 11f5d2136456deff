//! Structured audit trail for every attempted copy, deprecation and error.
//!
//! The logger comes in two variants behind one API: enabled (writes
//! through an [`AuditStore`] driver) and disabled (writes succeed
//! trivially, reads return empty). Write and query failures are logged
//! and swallowed; an unavailable audit store must never stop replication.

pub mod event;
pub mod memory;
pub mod store;

use std::sync::Arc;

pub use event::{AuditDetails, AuditEvent, AuditEventKind, DailyVolume, RuleRollup};
pub use memory::MemoryAuditStore;
pub use store::{AuditQuery, AuditStore, AuditStoreError};

use tracing::warn;

#[derive(Clone)]
pub struct AuditLogger {
    store: Option<Arc<dyn AuditStore>>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store: Some(store) }
    }

    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub async fn log_copy(&self, details: AuditDetails) {
        self.write(details.into_event(AuditEventKind::Copy)).await;
    }

    pub async fn log_deprecation(&self, details: AuditDetails) {
        self.write(details.into_event(AuditEventKind::Deprecation))
            .await;
    }

    /// Records a failure. `success` is forced to false regardless of what
    /// the details carry.
    pub async fn log_error(&self, details: AuditDetails) {
        self.write(details.into_event(AuditEventKind::Error)).await;
    }

    async fn write(&self, event: AuditEvent) {
        let Some(store) = &self.store else { return };
        if let Err(e) = store.append(event).await {
            warn!("audit write failed: {e}");
        }
    }

    pub async fn query_recent(&self, limit: usize) -> Vec<AuditEvent> {
        self.run_query(AuditQuery {
            limit: Some(limit),
            ..AuditQuery::default()
        })
        .await
    }

    pub async fn query_failed(&self, limit: usize) -> Vec<AuditEvent> {
        self.run_query(AuditQuery {
            success: Some(false),
            limit: Some(limit),
            ..AuditQuery::default()
        })
        .await
    }

    pub async fn query_by_rule(&self, rule_name: &str, limit: usize) -> Vec<AuditEvent> {
        self.run_query(AuditQuery {
            rule_name: Some(rule_name.to_string()),
            limit: Some(limit),
            ..AuditQuery::default()
        })
        .await
    }

    async fn run_query(&self, query: AuditQuery) -> Vec<AuditEvent> {
        let Some(store) = &self.store else {
            return Vec::new();
        };
        match store.query(query).await {
            Ok(events) => events,
            Err(e) => {
                warn!("audit query failed: {e}");
                Vec::new()
            }
        }
    }

    pub async fn rollup_by_rule(&self) -> Vec<RuleRollup> {
        let Some(store) = &self.store else {
            return Vec::new();
        };
        store.rollup_by_rule().await.unwrap_or_else(|e| {
            warn!("audit rollup failed: {e}");
            Vec::new()
        })
    }

    pub async fn daily_volume(&self, days: i64) -> Vec<DailyVolume> {
        let Some(store) = &self.store else {
            return Vec::new();
        };
        store.daily_volume(days).await.unwrap_or_else(|e| {
            warn!("audit volume query failed: {e}");
            Vec::new()
        })
    }

    pub async fn ping(&self) -> bool {
        match &self.store {
            Some(store) => store.ping().await.is_ok(),
            None => false,
        }
    }

    pub async fn close(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.close().await {
                warn!("audit close failed: {e}");
            }
        }
    }
}

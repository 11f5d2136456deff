use async_trait::async_trait;
use parking_lot::RwLock;

use super::event::AuditEvent;
use super::store::{AuditQuery, AuditStore, Result};

/// In-memory audit driver. Used by tests and by deployments that want
/// audit queries without an external document store.
#[derive(Default)]
pub struct MemoryAuditStore {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, event: AuditEvent) -> Result<()> {
        self.events.write().push(event);
        Ok(())
    }

    async fn query(&self, query: AuditQuery) -> Result<Vec<AuditEvent>> {
        let events = self.events.read();
        let mut matched: Vec<AuditEvent> = events
            .iter()
            .filter(|e| {
                query.event_type.is_none_or(|t| e.event_type == t)
                    && query
                        .rule_name
                        .as_ref()
                        .is_none_or(|r| &e.rule_name == r)
                    && query.success.is_none_or(|s| e.success == s)
                    && query.since.is_none_or(|since| e.timestamp >= since)
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

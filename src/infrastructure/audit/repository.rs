//! In-memory audit log repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::audit::{AuditLogEntry, AuditLogRepository};
use crate::domain::DomainError;

/// In-memory implementation of AuditLogRepository
#[derive(Debug, Default)]
pub struct InMemoryAuditLogRepository {
    entries: Arc<RwLock<Vec<AuditLogEntry>>>,
}

impl InMemoryAuditLogRepository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditLogRepository {
    async fn append(&self, entry: AuditLogEntry) -> Result<AuditLogEntry, DomainError> {
        let mut entries = self.entries.write().await;
        let entry = entry.with_id(entries.len() as i64 + 1);
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn count_failures_since(
        &self,
        prefix: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let entries = self.entries.read().await;
        let count = entries
            .iter()
            .filter(|e| !e.success && e.key_prefix == prefix && e.timestamp >= since)
            .count();
        Ok(count as u64)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<AuditLogEntry>, DomainError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }

    async fn list_by_prefix(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<AuditLogEntry>, DomainError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .rev()
            .filter(|e| e.key_prefix == prefix)
            .take(limit)
            .cloned()
            .collect())
    }
}

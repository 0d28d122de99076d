//! Audit log repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use super::entity::AuditLogEntry;
use crate::domain::DomainError;

/// Durable store for authentication audit entries
#[async_trait]
pub trait AuditLogRepository: Send + Sync + Debug {
    /// Append an entry and return it with its store-assigned id
    async fn append(&self, entry: AuditLogEntry) -> Result<AuditLogEntry, DomainError>;

    /// Count failed attempts for `prefix` at or after `since`
    async fn count_failures_since(
        &self,
        prefix: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, DomainError>;

    /// Most recent entries, newest first
    async fn list_recent(&self, limit: usize) -> Result<Vec<AuditLogEntry>, DomainError>;

    /// Most recent entries for one key prefix, newest first
    async fn list_by_prefix(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<AuditLogEntry>, DomainError>;
}

//! API Key repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use super::entity::{ApiKey, ApiKeyId, NewApiKey};
use crate::domain::DomainError;

/// Single-record lifecycle transition applied atomically by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleUpdate {
    /// Mark the key revoked. A no-op if it is already revoked.
    Revoke { at: DateTime<Utc> },
    /// Record a successful authentication. A no-op on revoked keys.
    TouchLastUsed { at: DateTime<Utc> },
}

/// Repository trait for issued API keys
#[async_trait]
pub trait ApiKeyRepository: Send + Sync + Debug {
    /// Get an API key by its ID
    async fn find_by_id(&self, id: ApiKeyId) -> Result<Option<ApiKey>, DomainError>;

    /// Get every active, non-revoked key whose stored prefix equals `prefix`
    async fn find_active_candidates_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<ApiKey>, DomainError>;

    /// Persist a new key and return it with its store-assigned id
    async fn insert(&self, new_key: NewApiKey) -> Result<ApiKey, DomainError>;

    /// Apply a lifecycle transition and return the resulting record
    async fn update_lifecycle(
        &self,
        id: ApiKeyId,
        update: LifecycleUpdate,
    ) -> Result<ApiKey, DomainError>;

    /// Insert `replacement` and, when `revoke_old_at` is set, revoke `old_id`
    /// in the same atomic step
    ///
    /// A revoked `old_id` has no successor: the store rejects it with a
    /// validation error under the same lock that guards the insert.
    async fn rotate(
        &self,
        old_id: ApiKeyId,
        replacement: NewApiKey,
        revoke_old_at: Option<DateTime<Utc>>,
    ) -> Result<ApiKey, DomainError>;

    /// List all keys, newest first
    async fn list(&self) -> Result<Vec<ApiKey>, DomainError>;

    /// Count all keys
    async fn count(&self) -> Result<usize, DomainError>;
}

/// Error returned when a rotation targets a revoked key
pub fn revoked_rotation_error(id: ApiKeyId) -> DomainError {
    DomainError::validation(format!("API key '{}' is revoked and cannot be rotated", id))
}

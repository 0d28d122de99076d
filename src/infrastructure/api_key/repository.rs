//! In-memory API key repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::api_key::{
    revoked_rotation_error, ApiKey, ApiKeyId, ApiKeyRepository, LifecycleUpdate, NewApiKey,
};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    keys: HashMap<ApiKeyId, ApiKey>,
    prefix_index: HashMap<String, Vec<ApiKeyId>>,
    hashes: HashSet<String>,
}

impl Inner {
    fn insert(&mut self, new_key: NewApiKey) -> Result<ApiKey, DomainError> {
        if self.hashes.contains(&new_key.key_hash) {
            return Err(DomainError::conflict("API key with this hash already exists"));
        }

        self.next_id += 1;
        let key = new_key.into_api_key(ApiKeyId::new(self.next_id));

        self.hashes.insert(key.key_hash().to_string());
        self.prefix_index
            .entry(key.key_prefix().to_string())
            .or_default()
            .push(key.id());
        self.keys.insert(key.id(), key.clone());

        Ok(key)
    }

    fn get_mut(&mut self, id: ApiKeyId) -> Result<&mut ApiKey, DomainError> {
        self.keys
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))
    }
}

/// In-memory implementation of ApiKeyRepository
///
/// Every write happens under one lock, so readers never see a key halfway
/// through a transition.
#[derive(Debug, Default)]
pub struct InMemoryApiKeyRepository {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryApiKeyRepository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryApiKeyRepository {
    async fn find_by_id(&self, id: ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        let inner = self.inner.read().await;
        Ok(inner.keys.get(&id).cloned())
    }

    async fn find_active_candidates_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<ApiKey>, DomainError> {
        let inner = self.inner.read().await;

        let candidates = inner
            .prefix_index
            .get(prefix)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.keys.get(id))
                    .filter(|key| !key.is_revoked())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(candidates)
    }

    async fn insert(&self, new_key: NewApiKey) -> Result<ApiKey, DomainError> {
        let mut inner = self.inner.write().await;
        inner.insert(new_key)
    }

    async fn update_lifecycle(
        &self,
        id: ApiKeyId,
        update: LifecycleUpdate,
    ) -> Result<ApiKey, DomainError> {
        let mut inner = self.inner.write().await;
        let key = inner.get_mut(id)?;

        match update {
            LifecycleUpdate::Revoke { at } => {
                key.revoke(at);
            }
            LifecycleUpdate::TouchLastUsed { at } => {
                key.record_usage(at);
            }
        }

        Ok(key.clone())
    }

    async fn rotate(
        &self,
        old_id: ApiKeyId,
        replacement: NewApiKey,
        revoke_old_at: Option<DateTime<Utc>>,
    ) -> Result<ApiKey, DomainError> {
        let mut inner = self.inner.write().await;

        // Fail before inserting so a missing or revoked id leaves no orphan behind
        if inner.get_mut(old_id)?.is_revoked() {
            return Err(revoked_rotation_error(old_id));
        }
        let created = inner.insert(replacement)?;

        if let Some(at) = revoke_old_at {
            inner.get_mut(old_id)?.revoke(at);
        }

        Ok(created)
    }

    async fn list(&self) -> Result<Vec<ApiKey>, DomainError> {
        let inner = self.inner.read().await;
        let mut keys: Vec<ApiKey> = inner.keys.values().cloned().collect();
        keys.sort_by(|a, b| b.id().cmp(&a.id()));
        Ok(keys)
    }

    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.inner.read().await.keys.len())
    }
}

//! API Key service
//!
//! Owns every state transition of an issued key: create, rotate, revoke and
//! last-used tracking.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, info, warn};

use crate::domain::api_key::{
    revoked_rotation_error, validate_api_key_name, validate_issuer, ApiKey, ApiKeyId,
    ApiKeyRepository, LifecycleUpdate, NewApiKey,
};
use crate::domain::DomainError;

use super::generator::ApiKeyGenerator;
use super::hasher::ApiKeyHasher;

/// Result of creating or rotating an API key
pub struct CreatedApiKey {
    /// The stored record (without the secret)
    pub api_key: ApiKey,
    /// The full secret key (only returned once)
    pub secret: String,
}

impl std::fmt::Debug for CreatedApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatedApiKey")
            .field("api_key", &self.api_key)
            .field("secret", &"[hidden]")
            .finish()
    }
}

/// API Key service for managing the key lifecycle
#[derive(Debug)]
pub struct ApiKeyService<R: ApiKeyRepository + ?Sized = dyn ApiKeyRepository> {
    repository: Arc<R>,
    hasher: Arc<dyn ApiKeyHasher>,
    generator: ApiKeyGenerator,
    store_timeout: Duration,
}

impl<R: ApiKeyRepository + ?Sized> ApiKeyService<R> {
    /// Create a new API key service
    pub fn new(repository: Arc<R>, hasher: Arc<dyn ApiKeyHasher>) -> Self {
        Self {
            repository,
            hasher,
            generator: ApiKeyGenerator::default(),
            store_timeout: Duration::from_secs(2),
        }
    }

    /// Create with a custom generator
    pub fn with_generator(mut self, generator: ApiKeyGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Bound best-effort usage updates
    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Create a new API key. The secret is returned here and never again.
    pub async fn create(
        &self,
        name: &str,
        created_by: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<CreatedApiKey, DomainError> {
        validate_api_key_name(name).map_err(|e| DomainError::validation(e.to_string()))?;
        validate_issuer(created_by).map_err(|e| DomainError::validation(e.to_string()))?;

        info!("Creating API key: name={}, created_by={}", name, created_by);

        let (new_key, secret) = self.issue(name.trim(), created_by, expires_at).await?;
        let created = self.repository.insert(new_key).await?;

        counter!("api_key_lifecycle_total", "operation" => "create").increment(1);
        info!(
            "API key created: id={}, prefix={}",
            created.id(),
            created.key_prefix()
        );

        Ok(CreatedApiKey {
            api_key: created,
            secret,
        })
    }

    /// Issue a replacement for an existing key
    ///
    /// The replacement keeps the old key's name and expiry unless
    /// `expires_at` is given. With `revoke_old` the old key is revoked in the
    /// same store operation; otherwise both keys stay valid.
    pub async fn rotate(
        &self,
        id: ApiKeyId,
        created_by: &str,
        revoke_old: bool,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<CreatedApiKey, DomainError> {
        validate_issuer(created_by).map_err(|e| DomainError::validation(e.to_string()))?;

        info!(
            "Rotating API key: id={}, revoke_old={}, created_by={}",
            id, revoke_old, created_by
        );

        let old = self.get(id).await?;

        if old.is_revoked() {
            return Err(revoked_rotation_error(id));
        }

        let expires_at = expires_at.or(old.expires_at());
        let (replacement, secret) = self.issue(old.name(), created_by, expires_at).await?;
        let revoke_old_at = revoke_old.then(Utc::now);

        let rotated = self.repository.rotate(id, replacement, revoke_old_at).await?;

        counter!("api_key_lifecycle_total", "operation" => "rotate").increment(1);
        info!(
            "API key rotated: old_id={}, new_id={}, old_revoked={}",
            id,
            rotated.id(),
            revoke_old
        );

        Ok(CreatedApiKey {
            api_key: rotated,
            secret,
        })
    }

    /// Revoke an API key. Revoking an already revoked key changes nothing.
    pub async fn revoke(&self, id: ApiKeyId) -> Result<ApiKey, DomainError> {
        info!("Revoking API key: id={}", id);

        let existing = self.get(id).await?;
        if existing.is_revoked() {
            debug!("API key already revoked: id={}", id);
            return Ok(existing);
        }

        let revoked = self
            .repository
            .update_lifecycle(id, LifecycleUpdate::Revoke { at: Utc::now() })
            .await?;

        counter!("api_key_lifecycle_total", "operation" => "revoke").increment(1);
        info!("API key revoked: id={}", id);

        Ok(revoked)
    }

    /// Record a successful authentication
    ///
    /// Failures are logged and swallowed; an accepted request is never
    /// turned away because this update did not land.
    pub async fn touch_last_used(&self, id: ApiKeyId) {
        let update = self
            .repository
            .update_lifecycle(id, LifecycleUpdate::TouchLastUsed { at: Utc::now() });

        match tokio::time::timeout(self.store_timeout, update).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Failed to record API key usage: id={}, error={}", id, e),
            Err(_) => warn!("Timed out recording API key usage: id={}", id),
        }
    }

    /// Get an API key by ID
    pub async fn get(&self, id: ApiKeyId) -> Result<ApiKey, DomainError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))
    }

    /// List all API keys
    pub async fn list(&self) -> Result<Vec<ApiKey>, DomainError> {
        self.repository.list().await
    }

    /// Count API keys
    pub async fn count(&self) -> Result<usize, DomainError> {
        self.repository.count().await
    }

    async fn issue(
        &self,
        name: &str,
        created_by: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(NewApiKey, String), DomainError> {
        let generated = self.generator.generate();

        let hasher = self.hasher.clone();
        let secret = generated.key.clone();
        let key_hash = tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(|e| DomainError::internal(format!("Hashing task failed: {}", e)))??;

        let new_key = NewApiKey::new(name, key_hash, generated.prefix, created_by)
            .with_expiration(expires_at);

        Ok((new_key, generated.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_key::mock::MockApiKeyRepository;
    use crate::infrastructure::api_key::hasher::test_hasher;
    use crate::infrastructure::api_key::{ApiKeyValidator, InMemoryApiKeyRepository};
    use chrono::Duration as ChronoDuration;

    struct Fixture {
        repository: Arc<MockApiKeyRepository>,
        service: ApiKeyService<MockApiKeyRepository>,
        validator: ApiKeyValidator<MockApiKeyRepository>,
    }

    fn fixture() -> Fixture {
        let repository = Arc::new(MockApiKeyRepository::new());
        let hasher: Arc<dyn ApiKeyHasher> = Arc::new(test_hasher());
        Fixture {
            service: ApiKeyService::new(repository.clone(), hasher.clone()),
            validator: ApiKeyValidator::new(repository.clone(), hasher),
            repository,
        }
    }

    #[tokio::test]
    async fn test_create_api_key() {
        let fixture = fixture();

        let created = fixture
            .service
            .create("k1", "admin@clinic", None)
            .await
            .unwrap();

        assert_eq!(created.secret.len(), 64);
        assert_eq!(created.api_key.name(), "k1");
        assert_eq!(created.api_key.created_by(), "admin@clinic");
        assert_eq!(created.api_key.key_prefix(), &created.secret[..8]);
        assert!(created.api_key.is_active());
        assert!(created.api_key.revoked_at().is_none());
        assert_ne!(created.api_key.key_hash(), created.secret);
        assert!(!format!("{:?}", created).contains(&created.secret));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_name() {
        let fixture = fixture();

        let empty = fixture.service.create("   ", "admin", None).await;
        assert!(matches!(empty, Err(DomainError::Validation { .. })));

        let long = fixture.service.create(&"x".repeat(101), "admin", None).await;
        assert!(matches!(long, Err(DomainError::Validation { .. })));

        let no_issuer = fixture.service.create("k1", "", None).await;
        assert!(matches!(no_issuer, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_create_then_revoke_blocks_authentication() {
        let fixture = fixture();

        let created = fixture.service.create("k1", "admin", None).await.unwrap();
        assert!(fixture.validator.validate(&created.secret).await.is_ok());
        assert!(fixture.validator.validate(&created.secret).await.is_ok());

        let revoked = fixture.service.revoke(created.api_key.id()).await.unwrap();
        assert!(revoked.is_revoked());
        assert!(fixture.validator.validate(&created.secret).await.is_err());
    }

    #[tokio::test]
    async fn test_create_already_expired() {
        let fixture = fixture();

        let created = fixture
            .service
            .create("k1", "admin", Some(Utc::now() - ChronoDuration::days(1)))
            .await
            .unwrap();

        assert!(fixture.validator.validate(&created.secret).await.is_err());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let fixture = fixture();
        let created = fixture.service.create("k1", "admin", None).await.unwrap();

        let first = fixture.service.revoke(created.api_key.id()).await.unwrap();
        let second = fixture.service.revoke(created.api_key.id()).await.unwrap();

        assert_eq!(first.revoked_at(), second.revoked_at());
    }

    #[tokio::test]
    async fn test_revoke_not_found() {
        let fixture = fixture();

        let result = fixture.service.revoke(ApiKeyId::new(999)).await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rotate_revoking_old() {
        let fixture = fixture();
        let expires_at = Utc::now() + ChronoDuration::days(30);
        let created = fixture
            .service
            .create("k1", "admin", Some(expires_at))
            .await
            .unwrap();

        let rotated = fixture
            .service
            .rotate(created.api_key.id(), "ops", true, None)
            .await
            .unwrap();

        assert_ne!(rotated.secret, created.secret);
        assert_eq!(rotated.api_key.name(), "k1");
        assert_eq!(rotated.api_key.created_by(), "ops");
        assert_eq!(rotated.api_key.expires_at(), Some(expires_at));

        assert!(fixture.validator.validate(&created.secret).await.is_err());
        assert!(fixture.validator.validate(&rotated.secret).await.is_ok());

        let old = fixture.service.get(created.api_key.id()).await.unwrap();
        assert!(old.is_revoked());
    }

    #[tokio::test]
    async fn test_rotate_keeping_old() {
        let fixture = fixture();
        let created = fixture.service.create("k1", "admin", None).await.unwrap();
        let override_expiry = Utc::now() + ChronoDuration::days(7);

        let rotated = fixture
            .service
            .rotate(created.api_key.id(), "admin", false, Some(override_expiry))
            .await
            .unwrap();

        assert_eq!(rotated.api_key.expires_at(), Some(override_expiry));
        assert!(fixture.validator.validate(&created.secret).await.is_ok());
        assert!(fixture.validator.validate(&rotated.secret).await.is_ok());
    }

    #[tokio::test]
    async fn test_rotate_revoked_or_missing() {
        let fixture = fixture();
        let created = fixture.service.create("k1", "admin", None).await.unwrap();
        fixture.service.revoke(created.api_key.id()).await.unwrap();

        let revoked = fixture
            .service
            .rotate(created.api_key.id(), "admin", true, None)
            .await;
        assert!(matches!(revoked, Err(DomainError::Validation { .. })));

        let missing = fixture
            .service
            .rotate(ApiKeyId::new(404), "admin", true, None)
            .await;
        assert!(missing.unwrap_err().is_not_found());
    }

    /// Store that revokes the old key just before each rotation lands
    #[derive(Debug, Default)]
    struct RevokeBeforeRotate {
        inner: InMemoryApiKeyRepository,
    }

    #[async_trait::async_trait]
    impl ApiKeyRepository for RevokeBeforeRotate {
        async fn find_by_id(&self, id: ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
            self.inner.find_by_id(id).await
        }

        async fn find_active_candidates_by_prefix(
            &self,
            prefix: &str,
        ) -> Result<Vec<ApiKey>, DomainError> {
            self.inner.find_active_candidates_by_prefix(prefix).await
        }

        async fn insert(&self, new_key: NewApiKey) -> Result<ApiKey, DomainError> {
            self.inner.insert(new_key).await
        }

        async fn update_lifecycle(
            &self,
            id: ApiKeyId,
            update: LifecycleUpdate,
        ) -> Result<ApiKey, DomainError> {
            self.inner.update_lifecycle(id, update).await
        }

        async fn rotate(
            &self,
            old_id: ApiKeyId,
            replacement: NewApiKey,
            revoke_old_at: Option<DateTime<Utc>>,
        ) -> Result<ApiKey, DomainError> {
            self.inner
                .update_lifecycle(old_id, LifecycleUpdate::Revoke { at: Utc::now() })
                .await?;
            self.inner.rotate(old_id, replacement, revoke_old_at).await
        }

        async fn list(&self) -> Result<Vec<ApiKey>, DomainError> {
            self.inner.list().await
        }

        async fn count(&self) -> Result<usize, DomainError> {
            self.inner.count().await
        }
    }

    #[tokio::test]
    async fn test_rotate_loses_race_with_revoke() {
        let repository = Arc::new(RevokeBeforeRotate::default());
        let service = ApiKeyService::new(repository.clone(), Arc::new(test_hasher()));
        let created = service.create("k1", "admin", None).await.unwrap();

        let result = service
            .rotate(created.api_key.id(), "admin", false, None)
            .await;

        assert!(matches!(result, Err(DomainError::Validation { .. })));
        assert_eq!(service.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_touch_last_used() {
        let fixture = fixture();
        let created = fixture.service.create("k1", "admin", None).await.unwrap();

        fixture.service.touch_last_used(created.api_key.id()).await;

        let key = fixture.service.get(created.api_key.id()).await.unwrap();
        assert!(key.last_used_at().is_some());
    }

    #[tokio::test]
    async fn test_touch_failure_is_swallowed() {
        let fixture = fixture();
        let created = fixture.service.create("k1", "admin", None).await.unwrap();

        fixture.repository.set_fail_touch(true);
        fixture.service.touch_last_used(created.api_key.id()).await;

        let key = fixture.service.get(created.api_key.id()).await.unwrap();
        assert!(key.last_used_at().is_none());
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let fixture = fixture();
        fixture.service.create("k1", "admin", None).await.unwrap();
        fixture.service.create("k2", "admin", None).await.unwrap();

        assert_eq!(fixture.service.list().await.unwrap().len(), 2);
        assert_eq!(fixture.service.count().await.unwrap(), 2);
    }
}

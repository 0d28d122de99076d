//! API key validation
//!
//! Narrows stored keys by prefix, then confirms a match with the salted hash.
//! Validation never writes: usage tracking and auditing happen afterwards.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::domain::api_key::{ApiKey, ApiKeyRepository};
use crate::domain::auth::AuthenticationError;

use super::generator::ApiKeyGenerator;
use super::hasher::ApiKeyHasher;

/// Validates presented API keys against the key store
#[derive(Debug)]
pub struct ApiKeyValidator<R: ApiKeyRepository + ?Sized = dyn ApiKeyRepository> {
    repository: Arc<R>,
    hasher: Arc<dyn ApiKeyHasher>,
    generator: ApiKeyGenerator,
    store_timeout: Duration,
}

impl<R: ApiKeyRepository + ?Sized> ApiKeyValidator<R> {
    pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

    pub fn new(repository: Arc<R>, hasher: Arc<dyn ApiKeyHasher>) -> Self {
        Self {
            repository,
            hasher,
            generator: ApiKeyGenerator::default(),
            store_timeout: Self::DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Use a custom generator to define the expected key shape
    pub fn with_generator(mut self, generator: ApiKeyGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Bound the candidate lookup
    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub fn generator(&self) -> &ApiKeyGenerator {
        &self.generator
    }

    /// Validate a presented key, returning the matching record
    pub async fn validate(&self, presented: &str) -> Result<ApiKey, AuthenticationError> {
        if !self.generator.is_well_formed(presented) {
            return Err(AuthenticationError::MalformedCredential);
        }

        let prefix = self.generator.prefix_of(presented);

        let candidates = match tokio::time::timeout(
            self.store_timeout,
            self.repository.find_active_candidates_by_prefix(prefix),
        )
        .await
        {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(e)) => {
                warn!(key_prefix = %prefix, "API key lookup failed: {}", e);
                return Err(AuthenticationError::StoreUnavailable);
            }
            Err(_) => {
                warn!(
                    key_prefix = %prefix,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "API key lookup timed out"
                );
                return Err(AuthenticationError::StoreUnavailable);
            }
        };

        debug!(key_prefix = %prefix, candidates = candidates.len(), "Verifying API key candidates");

        let now = Utc::now();
        let mut rejection = None;

        for candidate in candidates {
            if !self.verify(presented, candidate.key_hash()).await {
                continue;
            }

            // A matched but unusable key does not end the scan: another key may
            // share the prefix.
            if candidate.is_revoked() {
                rejection.get_or_insert(AuthenticationError::Revoked);
                continue;
            }
            if candidate.is_expired_at(now) {
                rejection.get_or_insert(AuthenticationError::Expired);
                continue;
            }

            return Ok(candidate);
        }

        Err(rejection.unwrap_or(AuthenticationError::NoMatch))
    }

    async fn verify(&self, presented: &str, hash: &str) -> bool {
        let hasher = self.hasher.clone();
        let presented = presented.to_string();
        let hash = hash.to_string();

        match tokio::task::spawn_blocking(move || hasher.verify(&presented, &hash)).await {
            Ok(matched) => matched,
            Err(e) => {
                warn!("API key verification task failed: {}", e);
                false
            }
        }
    }
}

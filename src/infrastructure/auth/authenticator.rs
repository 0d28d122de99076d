//! API key authentication
//!
//! Runs one authentication attempt end to end: suspicious prefix check,
//! validation, usage tracking and auditing. Exactly one audit entry is
//! produced for every attempt that presents a key.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::debug;

use crate::domain::api_key::ApiKeyRepository;
use crate::domain::audit::{AuditLogEntry, RequestMetadata};
use crate::domain::auth::{AuthenticatedIdentity, AuthenticationError};
use crate::infrastructure::api_key::{ApiKeyService, ApiKeyValidator, SuspiciousActivityDetector};
use crate::infrastructure::audit::AuditLogger;

/// Result of an authentication attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AuthenticationOutcome {
    /// No key was presented, or API key authentication is disabled
    NotAttempted,
    Authenticated(AuthenticatedIdentity),
    Rejected(AuthenticationError),
}

/// Composes validation, detection and auditing into one decision
#[derive(Debug)]
pub struct ApiKeyAuthenticator<R: ApiKeyRepository + ?Sized = dyn ApiKeyRepository> {
    enabled: bool,
    validator: ApiKeyValidator<R>,
    service: Arc<ApiKeyService<R>>,
    detector: Arc<SuspiciousActivityDetector>,
    audit: AuditLogger,
    last_purge: AtomicI64,
}

impl<R: ApiKeyRepository + ?Sized> ApiKeyAuthenticator<R> {
    pub fn new(
        validator: ApiKeyValidator<R>,
        service: Arc<ApiKeyService<R>>,
        detector: Arc<SuspiciousActivityDetector>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            enabled: true,
            validator,
            service,
            detector,
            audit,
            last_purge: AtomicI64::new(Utc::now().timestamp()),
        }
    }

    /// Enable or disable API key authentication. Disabled means pass-through.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn detector(&self) -> &SuspiciousActivityDetector {
        &self.detector
    }

    pub fn audit_logger(&self) -> &AuditLogger {
        &self.audit
    }

    /// Authenticate a request that may carry an API key
    pub async fn authenticate(
        &self,
        presented: Option<&str>,
        request: RequestMetadata,
    ) -> AuthenticationOutcome {
        let presented = match presented {
            Some(key) if self.enabled => key,
            _ => return AuthenticationOutcome::NotAttempted,
        };

        let now = Utc::now();
        self.purge_if_due(now);

        let prefix = self.validator.generator().prefix_of(presented).to_string();

        if self.detector.is_suspicious(&prefix, now) {
            debug!(key_prefix = %prefix, "Rejecting API key from suspicious prefix");
            return self.reject(request, prefix, AuthenticationError::SuspiciousActivity);
        }

        match self.validator.validate(presented).await {
            Ok(api_key) => {
                self.service.touch_last_used(api_key.id()).await;

                self.audit.record(AuditLogEntry::success(
                    request,
                    api_key.id(),
                    api_key.key_prefix(),
                    Utc::now(),
                ));
                counter!(
                    "api_key_auth_attempts_total",
                    "outcome" => "success",
                    "reason" => "none"
                )
                .increment(1);

                debug!(key_id = %api_key.id(), key_prefix = %prefix, "API key authenticated");
                AuthenticationOutcome::Authenticated(AuthenticatedIdentity::for_api_key(&api_key))
            }
            Err(reason) => {
                self.detector.record_failure(&prefix, Utc::now());
                self.reject(request, prefix, reason)
            }
        }
    }

    fn reject(
        &self,
        request: RequestMetadata,
        prefix: String,
        reason: AuthenticationError,
    ) -> AuthenticationOutcome {
        debug!(key_prefix = %prefix, reason = reason.code(), "API key rejected");

        self.audit
            .record(AuditLogEntry::failure(request, prefix, reason, Utc::now()));
        counter!(
            "api_key_auth_attempts_total",
            "outcome" => "failure",
            "reason" => reason.code()
        )
        .increment(1);

        AuthenticationOutcome::Rejected(reason)
    }

    /// Drop stale detector state at most once per window
    fn purge_if_due(&self, now: DateTime<Utc>) {
        let last = self.last_purge.load(Ordering::Relaxed);
        let due = last + self.detector.window().num_seconds();

        if now.timestamp() < due {
            return;
        }

        if self
            .last_purge
            .compare_exchange(last, now.timestamp(), Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            let removed = self.detector.purge_expired(now);
            debug!(
                removed,
                tracked = self.detector.tracked_prefixes(),
                "Purged expired failure windows"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_key::mock::MockApiKeyRepository;
    use crate::domain::audit::mock::MockAuditLogRepository;
    use crate::domain::auth::Authority;
    use crate::infrastructure::api_key::hasher::test_hasher;
    use crate::infrastructure::api_key::ApiKeyHasher;
    use chrono::Duration;

    struct Fixture {
        repository: Arc<MockApiKeyRepository>,
        audit_repository: Arc<MockAuditLogRepository>,
        service: Arc<ApiKeyService<MockApiKeyRepository>>,
        authenticator: ApiKeyAuthenticator<MockApiKeyRepository>,
    }

    fn fixture() -> Fixture {
        let repository = Arc::new(MockApiKeyRepository::new());
        let audit_repository = Arc::new(MockAuditLogRepository::new());
        let hasher: Arc<dyn ApiKeyHasher> = Arc::new(test_hasher());

        let service = Arc::new(ApiKeyService::new(repository.clone(), hasher.clone()));
        let validator = ApiKeyValidator::new(repository.clone(), hasher);
        let audit = AuditLogger::spawn(audit_repository.clone(), 64);
        let authenticator = ApiKeyAuthenticator::new(
            validator,
            service.clone(),
            Arc::new(SuspiciousActivityDetector::default()),
            audit,
        );

        Fixture {
            repository,
            audit_repository,
            service,
            authenticator,
        }
    }

    fn request() -> RequestMetadata {
        RequestMetadata::new("GET", "/v1/identity").with_client_ip(Some("10.0.0.1".to_string()))
    }

    async fn audit_entries(fixture: &Fixture) -> Vec<AuditLogEntry> {
        fixture.authenticator.audit_logger().flush().await;
        fixture.audit_repository.entries().await
    }

    fn fabricated(prefix: &str, n: usize) -> String {
        format!("{}{:056x}", prefix, n)
    }

    #[tokio::test]
    async fn test_missing_key_passes_through() {
        let fixture = fixture();

        let outcome = fixture.authenticator.authenticate(None, request()).await;

        assert_eq!(outcome, AuthenticationOutcome::NotAttempted);
        assert!(audit_entries(&fixture).await.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_passes_through() {
        let Fixture {
            repository,
            audit_repository,
            service,
            authenticator,
        } = fixture();
        let authenticator = authenticator.with_enabled(false);
        let created = service.create("k1", "admin", None).await.unwrap();

        let outcome = authenticator
            .authenticate(Some(&created.secret), request())
            .await;

        assert_eq!(outcome, AuthenticationOutcome::NotAttempted);
        assert_eq!(repository.lookup_count(), 0);
        authenticator.audit_logger().flush().await;
        assert!(audit_repository.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_successful_authentication() {
        let fixture = fixture();
        let created = fixture
            .service
            .create("k1", "admin@clinic", None)
            .await
            .unwrap();

        let outcome = fixture
            .authenticator
            .authenticate(Some(&created.secret), request())
            .await;

        let identity = match outcome {
            AuthenticationOutcome::Authenticated(identity) => identity,
            other => panic!("expected success, got {:?}", other),
        };
        assert_eq!(identity.key_id(), created.api_key.id());
        assert_eq!(identity.issued_by(), "admin@clinic");
        assert_eq!(identity.authorities(), &[Authority::ApiClient]);
        assert!(!identity.has_authority(Authority::Admin));

        let stored = fixture.service.get(created.api_key.id()).await.unwrap();
        assert!(stored.last_used_at().is_some());

        let entries = audit_entries(&fixture).await;
        assert_eq!(entries.len(), 1);
        assert!(entries[0].success);
        assert_eq!(entries[0].api_key_id, Some(created.api_key.id()));
        assert_eq!(entries[0].key_prefix, created.api_key.key_prefix());
        assert_eq!(entries[0].request.client_ip.as_deref(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_revoked_key_rejected() {
        let fixture = fixture();
        let created = fixture.service.create("k1", "admin", None).await.unwrap();

        let first = fixture
            .authenticator
            .authenticate(Some(&created.secret), request())
            .await;
        assert!(matches!(first, AuthenticationOutcome::Authenticated(_)));

        fixture.service.revoke(created.api_key.id()).await.unwrap();

        let second = fixture
            .authenticator
            .authenticate(Some(&created.secret), request())
            .await;
        assert!(matches!(second, AuthenticationOutcome::Rejected(_)));

        let entries = audit_entries(&fixture).await;
        assert_eq!(entries.len(), 2);
        assert!(!entries[1].success);
        assert!(entries[1].api_key_id.is_none());
    }

    #[tokio::test]
    async fn test_expired_key_rejected() {
        let fixture = fixture();
        let created = fixture
            .service
            .create("k1", "admin", Some(Utc::now() - Duration::days(1)))
            .await
            .unwrap();

        let outcome = fixture
            .authenticator
            .authenticate(Some(&created.secret), request())
            .await;

        assert_eq!(
            outcome,
            AuthenticationOutcome::Rejected(AuthenticationError::Expired)
        );
        let entries = audit_entries(&fixture).await;
        assert_eq!(entries[0].failure_reason, Some(AuthenticationError::Expired));
    }

    #[tokio::test]
    async fn test_malformed_key_rejected_and_audited() {
        let fixture = fixture();

        let outcome = fixture
            .authenticator
            .authenticate(Some("abcdefgh-short"), request())
            .await;

        assert_eq!(
            outcome,
            AuthenticationOutcome::Rejected(AuthenticationError::MalformedCredential)
        );
        assert_eq!(fixture.repository.lookup_count(), 0);

        let entries = audit_entries(&fixture).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key_prefix, "abcdefgh");
    }

    #[tokio::test]
    async fn test_suspicious_prefix_short_circuits() {
        let fixture = fixture();

        for n in 0..5 {
            let outcome = fixture
                .authenticator
                .authenticate(Some(&fabricated("abcdef01", n)), request())
                .await;
            assert_eq!(
                outcome,
                AuthenticationOutcome::Rejected(AuthenticationError::NoMatch)
            );
        }
        assert_eq!(fixture.repository.lookup_count(), 5);

        let sixth = fixture
            .authenticator
            .authenticate(Some(&fabricated("abcdef01", 6)), request())
            .await;

        assert_eq!(
            sixth,
            AuthenticationOutcome::Rejected(AuthenticationError::SuspiciousActivity)
        );
        assert_eq!(fixture.repository.lookup_count(), 5);

        let entries = audit_entries(&fixture).await;
        assert_eq!(entries.len(), 6);
        assert!(entries[5].suspicious);
        assert!(entries[..5].iter().all(|e| !e.suspicious));
    }

    #[tokio::test]
    async fn test_malformed_attempts_count_toward_suspicion() {
        let fixture = fixture();

        // Not hex, so every attempt fails before the store is consulted
        for n in 0..5 {
            let outcome = fixture
                .authenticator
                .authenticate(Some(&fabricated("abcdefgh", n)), request())
                .await;
            assert_eq!(
                outcome,
                AuthenticationOutcome::Rejected(AuthenticationError::MalformedCredential)
            );
        }

        let sixth = fixture
            .authenticator
            .authenticate(Some(&fabricated("abcdefgh", 6)), request())
            .await;

        assert_eq!(
            sixth,
            AuthenticationOutcome::Rejected(AuthenticationError::SuspiciousActivity)
        );
        assert_eq!(fixture.repository.lookup_count(), 0);
        assert_eq!(audit_entries(&fixture).await.len(), 6);
    }

    #[tokio::test]
    async fn test_other_prefixes_unaffected() {
        let fixture = fixture();
        let created = fixture.service.create("k1", "admin", None).await.unwrap();

        for n in 0..5 {
            fixture
                .authenticator
                .authenticate(Some(&fabricated("abcdefgh", n)), request())
                .await;
        }
        assert!(fixture.authenticator.detector().is_suspicious("abcdefgh", Utc::now()));

        let outcome = fixture
            .authenticator
            .authenticate(Some(&created.secret), request())
            .await;
        assert!(matches!(outcome, AuthenticationOutcome::Authenticated(_)));
    }

    #[tokio::test]
    async fn test_store_failure_rejects() {
        let fixture = fixture();
        let created = fixture.service.create("k1", "admin", None).await.unwrap();
        fixture.repository.set_should_fail(true);

        let outcome = fixture
            .authenticator
            .authenticate(Some(&created.secret), request())
            .await;

        assert_eq!(
            outcome,
            AuthenticationOutcome::Rejected(AuthenticationError::StoreUnavailable)
        );
        assert_eq!(audit_entries(&fixture).await.len(), 1);
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_affect_outcome() {
        let fixture = fixture();
        let created = fixture.service.create("k1", "admin", None).await.unwrap();
        fixture.audit_repository.set_should_fail(true);

        let outcome = fixture
            .authenticator
            .authenticate(Some(&created.secret), request())
            .await;

        assert!(matches!(outcome, AuthenticationOutcome::Authenticated(_)));
    }

    #[tokio::test]
    async fn test_touch_failure_does_not_affect_outcome() {
        let fixture = fixture();
        let created = fixture.service.create("k1", "admin", None).await.unwrap();
        fixture.repository.set_fail_touch(true);

        let outcome = fixture
            .authenticator
            .authenticate(Some(&created.secret), request())
            .await;

        assert!(matches!(outcome, AuthenticationOutcome::Authenticated(_)));
    }

    #[tokio::test]
    async fn test_rotation_through_authenticator() {
        let fixture = fixture();
        let created = fixture.service.create("k1", "admin", None).await.unwrap();

        let rotated = fixture
            .service
            .rotate(created.api_key.id(), "admin", true, None)
            .await
            .unwrap();

        let old = fixture
            .authenticator
            .authenticate(Some(&created.secret), request())
            .await;
        let new = fixture
            .authenticator
            .authenticate(Some(&rotated.secret), request())
            .await;

        assert!(matches!(old, AuthenticationOutcome::Rejected(_)));
        assert!(matches!(new, AuthenticationOutcome::Authenticated(_)));
    }
}

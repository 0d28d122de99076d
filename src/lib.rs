//! Pet clinic API
//!
//! Machine clients authenticate with API keys. This crate provides:
//! - Key issuance, rotation and revocation with one-way Argon2id storage
//! - Prefix-indexed validation that fails secure
//! - A sliding-window detector for repeated failures per key prefix
//! - An asynchronous audit trail of every authentication attempt

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderName;

use api::state::AppState;
use domain::DomainError;
use infrastructure::{
    api_key::{
        ApiKeyGenerator, ApiKeyHasher, ApiKeyService, ApiKeyValidator, Argon2KeyHasher,
        SuspiciousActivityDetector,
    },
    audit::AuditLogger,
    auth::{ApiKeyAuthenticator, JwtConfig, JwtService},
    storage::{StorageFactory, Stores},
};

/// Create the application state with in-memory stores and default settings
pub async fn create_app_state() -> anyhow::Result<AppState> {
    create_app_state_with_config(&AppConfig::default()).await
}

/// Create the application state with custom configuration
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    config.validate()?;

    let stores = StorageFactory::create(&config.storage).await?;

    Ok(build_app_state(config, stores)?)
}

/// Wire services over already-opened stores
///
/// Spawns the audit worker, so it must run inside a Tokio runtime.
pub fn build_app_state(config: &AppConfig, stores: Stores) -> Result<AppState, DomainError> {
    let settings = &config.api_key;

    let api_key_header = HeaderName::try_from(settings.header_name.as_str()).map_err(|e| {
        DomainError::configuration(format!(
            "Invalid api_key.header_name '{}': {}",
            settings.header_name, e
        ))
    })?;

    let generator = ApiKeyGenerator::new(settings.key_length, settings.prefix_length);
    let hasher: Arc<dyn ApiKeyHasher> = Arc::new(Argon2KeyHasher::with_params(
        settings.hash_memory_kib,
        settings.hash_cost,
        1,
    )?);
    let store_timeout = Duration::from_millis(settings.store_timeout_ms);

    let api_key_service = Arc::new(
        ApiKeyService::new(stores.api_keys.clone(), hasher.clone())
            .with_generator(generator.clone())
            .with_store_timeout(store_timeout),
    );
    let validator = ApiKeyValidator::new(stores.api_keys.clone(), hasher)
        .with_generator(generator)
        .with_store_timeout(store_timeout);
    let detector = Arc::new(SuspiciousActivityDetector::new(
        settings.failure_threshold,
        settings.failure_window()?,
    ));
    let audit = AuditLogger::spawn(stores.audit_log.clone(), settings.audit_buffer_size);

    let authenticator = Arc::new(
        ApiKeyAuthenticator::new(validator, api_key_service.clone(), detector, audit)
            .with_enabled(settings.enabled),
    );

    let jwt_service = config.admin.jwt_secret.as_ref().map(|secret| {
        Arc::new(JwtService::new(JwtConfig::new(
            secret.clone(),
            config.admin.token_expiration_hours,
        )))
    });

    if jwt_service.is_none() {
        tracing::warn!("admin.jwt_secret is not set; admin routes are disabled");
    }

    Ok(AppState {
        api_key_service,
        authenticator,
        jwt_service,
        audit_log: stores.audit_log,
        api_key_header,
    })
}

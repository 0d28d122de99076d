//! Store selection at startup

use std::sync::Arc;

use tracing::info;

use crate::config::{StorageBackend, StorageConfig};
use crate::domain::api_key::ApiKeyRepository;
use crate::domain::audit::AuditLogRepository;
use crate::domain::DomainError;
use crate::infrastructure::api_key::{InMemoryApiKeyRepository, PostgresApiKeyRepository};
use crate::infrastructure::audit::{InMemoryAuditLogRepository, PostgresAuditLogRepository};

use super::migrations::run_storage_migrations;
use super::postgres::{connect, PostgresConfig};

/// Key and audit stores for one backend
#[derive(Debug, Clone)]
pub struct Stores {
    pub api_keys: Arc<dyn ApiKeyRepository>,
    pub audit_log: Arc<dyn AuditLogRepository>,
}

/// Factory for creating store instances
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Build the stores named by the configuration, migrating PostgreSQL first
    pub async fn create(config: &StorageConfig) -> Result<Stores, DomainError> {
        match config.backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage");
                Ok(Self::in_memory())
            }
            StorageBackend::Postgres => {
                let url = config.database_url.as_deref().ok_or_else(|| {
                    DomainError::configuration(
                        "storage.database_url is required for the postgres backend",
                    )
                })?;

                let pg_config =
                    PostgresConfig::new(url).with_max_connections(config.max_connections);
                let pool = connect(&pg_config).await?;

                run_storage_migrations(&pool).await?;
                info!("Using PostgreSQL storage");

                Ok(Stores {
                    api_keys: Arc::new(PostgresApiKeyRepository::new(pool.clone())),
                    audit_log: Arc::new(PostgresAuditLogRepository::new(pool)),
                })
            }
        }
    }

    /// Creates in-memory stores
    pub fn in_memory() -> Stores {
        Stores {
            api_keys: Arc::new(InMemoryApiKeyRepository::new()),
            audit_log: Arc::new(InMemoryAuditLogRepository::new()),
        }
    }
}

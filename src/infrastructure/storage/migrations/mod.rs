//! Database migrations
//!
//! Forward-only versioned SQL, applied in order at startup. Each migration
//! and its `_migrations` record commit in one transaction.

use sqlx::postgres::PgPool;
use tracing::info;

use crate::domain::DomainError;

/// PostgreSQL migrator for the embedded migrations
#[derive(Debug)]
pub struct PostgresMigrator {
    pool: PgPool,
}

impl PostgresMigrator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the migrations table if it doesn't exist
    async fn ensure_migrations_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create migrations table: {}", e)))?;

        Ok(())
    }

    /// Runs a single migration unless it was applied before
    pub async fn run_migration(&self, migration: &Migration) -> Result<bool, DomainError> {
        self.ensure_migrations_table().await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        // Serialize concurrent starters on the same database
        sqlx::query("LOCK TABLE _migrations IN EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to lock migrations table: {}", e)))?;

        let applied: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = $1)",
        )
        .bind(migration.version)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to check migration status: {}", e)))?;

        if applied {
            return Ok(false);
        }

        // Multi-statement scripts need the simple query protocol
        sqlx::raw_sql(&migration.up)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to run migration {}: {}",
                    migration.version, e
                ))
            })?;

        sqlx::query("INSERT INTO _migrations (version, description) VALUES ($1, $2)")
            .bind(migration.version)
            .bind(&migration.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to record migration {}: {}",
                    migration.version, e
                ))
            })?;

        tx.commit().await.map_err(|e| {
            DomainError::storage(format!(
                "Failed to commit migration {}: {}",
                migration.version, e
            ))
        })?;

        Ok(true)
    }
}

/// Represents a database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version, strictly increasing
    pub version: i64,
    /// Human-readable description
    pub description: String,
    /// SQL to run when applying the migration
    pub up: String,
}

impl Migration {
    pub fn new(version: i64, description: impl Into<String>, up: impl Into<String>) -> Self {
        Self {
            version,
            description: description.into(),
            up: up.into(),
        }
    }
}

/// Collection of migrations for the storage layer
pub fn storage_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "Create api_keys table",
            r#"
            CREATE TABLE IF NOT EXISTS api_keys (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                key_hash TEXT NOT NULL UNIQUE,
                key_prefix VARCHAR(64) NOT NULL,
                created_by VARCHAR(255) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                expires_at TIMESTAMPTZ,
                last_used_at TIMESTAMPTZ,
                revoked_at TIMESTAMPTZ,
                is_active BOOLEAN NOT NULL DEFAULT TRUE
            );
            CREATE INDEX IF NOT EXISTS idx_api_keys_active_prefix
                ON api_keys(key_prefix) WHERE is_active;
            "#,
        ),
        Migration::new(
            2,
            "Create api_key_audit_log table",
            r#"
            CREATE TABLE IF NOT EXISTS api_key_audit_log (
                id BIGSERIAL PRIMARY KEY,
                method VARCHAR(16) NOT NULL,
                path TEXT NOT NULL,
                client_ip VARCHAR(64),
                user_agent TEXT,
                api_key_id BIGINT REFERENCES api_keys(id),
                key_prefix VARCHAR(64) NOT NULL,
                success BOOLEAN NOT NULL,
                failure_reason VARCHAR(32),
                suspicious BOOLEAN NOT NULL DEFAULT FALSE,
                occurred_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_api_key_audit_log_prefix_time
                ON api_key_audit_log(key_prefix, occurred_at);
            "#,
        ),
    ]
}

/// Runs all pending storage migrations
pub async fn run_storage_migrations(pool: &PgPool) -> Result<(), DomainError> {
    let migrator = PostgresMigrator::new(pool.clone());

    for migration in storage_migrations() {
        if migrator.run_migration(&migration).await? {
            info!(
                "Applied migration {}: {}",
                migration.version, migration.description
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creation() {
        let migration = Migration::new(1, "Test migration", "CREATE TABLE test");

        assert_eq!(migration.version, 1);
        assert_eq!(migration.description, "Test migration");
        assert_eq!(migration.up, "CREATE TABLE test");
    }

    #[test]
    fn test_storage_migrations_order() {
        let migrations = storage_migrations();

        assert!(!migrations.is_empty());

        for pair in migrations.windows(2) {
            assert!(
                pair[1].version > pair[0].version,
                "Migrations should be in ascending order"
            );
        }
    }

    #[test]
    fn test_key_table_enforces_unique_hash() {
        let migrations = storage_migrations();
        let api_keys = &migrations[0].up;

        assert!(api_keys.contains("key_hash TEXT NOT NULL UNIQUE"));
        assert!(api_keys.contains("ON api_keys(key_prefix) WHERE is_active"));
    }
}

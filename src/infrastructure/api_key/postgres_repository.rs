//! PostgreSQL API key repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::api_key::{
    revoked_rotation_error, ApiKey, ApiKeyId, ApiKeyRepository, LifecycleUpdate, NewApiKey,
    StoredLifecycle,
};
use crate::domain::DomainError;

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, key_hash, key_prefix, created_by, created_at, expires_at,
           last_used_at, revoked_at, is_active
    FROM api_keys
"#;

/// PostgreSQL implementation of ApiKeyRepository
#[derive(Debug, Clone)]
pub struct PostgresApiKeyRepository {
    pool: PgPool,
}

impl PostgresApiKeyRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyRepository for PostgresApiKeyRepository {
    async fn find_by_id(&self, id: ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        let row = sqlx::query(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get API key: {}", e)))?;

        row.as_ref().map(row_to_api_key).transpose()
    }

    async fn find_active_candidates_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<ApiKey>, DomainError> {
        let rows = sqlx::query(&format!(
            "{} WHERE key_prefix = $1 AND is_active AND revoked_at IS NULL",
            SELECT_COLUMNS
        ))
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to look up API keys: {}", e)))?;

        rows.iter().map(row_to_api_key).collect()
    }

    async fn insert(&self, new_key: NewApiKey) -> Result<ApiKey, DomainError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO api_keys (name, key_hash, key_prefix, created_by, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&new_key.name)
        .bind(&new_key.key_hash)
        .bind(&new_key.key_prefix)
        .bind(&new_key.created_by)
        .bind(new_key.created_at)
        .bind(new_key.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "create"))?;

        Ok(new_key.into_api_key(ApiKeyId::new(id)))
    }

    async fn update_lifecycle(
        &self,
        id: ApiKeyId,
        update: LifecycleUpdate,
    ) -> Result<ApiKey, DomainError> {
        let result = match update {
            LifecycleUpdate::Revoke { at } => {
                sqlx::query(
                    r#"
                    UPDATE api_keys
                    SET revoked_at = $2, is_active = FALSE
                    WHERE id = $1 AND revoked_at IS NULL
                    "#,
                )
                .bind(id.value())
                .bind(at)
                .execute(&self.pool)
                .await
            }
            LifecycleUpdate::TouchLastUsed { at } => {
                sqlx::query(
                    r#"
                    UPDATE api_keys
                    SET last_used_at = $2
                    WHERE id = $1 AND is_active AND revoked_at IS NULL
                    "#,
                )
                .bind(id.value())
                .bind(at)
                .execute(&self.pool)
                .await
            }
        };

        result.map_err(|e| DomainError::storage(format!("Failed to update API key: {}", e)))?;

        // Conditional updates touch no rows on a frozen record, so read back
        // to tell "unchanged" apart from "missing"
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))
    }

    async fn rotate(
        &self,
        old_id: ApiKeyId,
        replacement: NewApiKey,
        revoke_old_at: Option<DateTime<Utc>>,
    ) -> Result<ApiKey, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        // The row lock holds off a concurrent revoke until this transaction ends
        let row = sqlx::query(
            "SELECT revoked_at, is_active FROM api_keys WHERE id = $1 FOR UPDATE",
        )
        .bind(old_id.value())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to lock API key: {}", e)))?
        .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", old_id)))?;

        let revoked_at: Option<DateTime<Utc>> = row
            .try_get("revoked_at")
            .map_err(|e| DomainError::storage(format!("Failed to read API key row: {}", e)))?;
        let is_active: bool = row
            .try_get("is_active")
            .map_err(|e| DomainError::storage(format!("Failed to read API key row: {}", e)))?;

        if revoked_at.is_some() || !is_active {
            return Err(revoked_rotation_error(old_id));
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO api_keys (name, key_hash, key_prefix, created_by, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&replacement.name)
        .bind(&replacement.key_hash)
        .bind(&replacement.key_prefix)
        .bind(&replacement.created_by)
        .bind(replacement.created_at)
        .bind(replacement.expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, "rotate"))?;

        if let Some(at) = revoke_old_at {
            sqlx::query(
                r#"
                UPDATE api_keys
                SET revoked_at = $2, is_active = FALSE
                WHERE id = $1 AND revoked_at IS NULL
                "#,
            )
            .bind(old_id.value())
            .bind(at)
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to revoke API key: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit rotation: {}", e)))?;

        Ok(replacement.into_api_key(ApiKeyId::new(id)))
    }

    async fn list(&self) -> Result<Vec<ApiKey>, DomainError> {
        let rows = sqlx::query(&format!("{} ORDER BY id DESC", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list API keys: {}", e)))?;

        let mut keys = Vec::with_capacity(rows.len());

        for row in rows {
            keys.push(row_to_api_key(&row)?);
        }

        Ok(keys)
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM api_keys")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to count API keys: {}", e)))?;

        Ok(count as usize)
    }
}

fn map_insert_error(e: sqlx::Error, operation: &str) -> DomainError {
    let msg = e.to_string();

    if msg.contains("duplicate key") || msg.contains("unique constraint") {
        DomainError::conflict("API key with this hash already exists")
    } else {
        DomainError::storage(format!("Failed to {} API key: {}", operation, e))
    }
}

fn row_to_api_key(row: &PgRow) -> Result<ApiKey, DomainError> {
    let get_err = |e: sqlx::Error| DomainError::storage(format!("Failed to read API key row: {}", e));

    let id: i64 = row.try_get("id").map_err(get_err)?;

    let fields = NewApiKey {
        name: row.try_get("name").map_err(get_err)?,
        key_hash: row.try_get("key_hash").map_err(get_err)?,
        key_prefix: row.try_get("key_prefix").map_err(get_err)?,
        created_by: row.try_get("created_by").map_err(get_err)?,
        created_at: row.try_get("created_at").map_err(get_err)?,
        expires_at: row.try_get("expires_at").map_err(get_err)?,
    };

    let lifecycle = StoredLifecycle {
        last_used_at: row.try_get("last_used_at").map_err(get_err)?,
        revoked_at: row.try_get("revoked_at").map_err(get_err)?,
        is_active: row.try_get("is_active").map_err(get_err)?,
    };

    Ok(ApiKey::restore(ApiKeyId::new(id), fields, lifecycle))
}

//! PostgreSQL audit log repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::api_key::ApiKeyId;
use crate::domain::audit::{AuditLogEntry, AuditLogRepository, RequestMetadata};
use crate::domain::auth::AuthenticationError;
use crate::domain::DomainError;

const SELECT_COLUMNS: &str = r#"
    SELECT id, method, path, client_ip, user_agent, api_key_id, key_prefix,
           success, failure_reason, suspicious, occurred_at
    FROM api_key_audit_log
"#;

/// PostgreSQL implementation of AuditLogRepository
#[derive(Debug, Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn append(&self, entry: AuditLogEntry) -> Result<AuditLogEntry, DomainError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO api_key_audit_log
                (method, path, client_ip, user_agent, api_key_id, key_prefix,
                 success, failure_reason, suspicious, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(&entry.request.method)
        .bind(&entry.request.path)
        .bind(&entry.request.client_ip)
        .bind(&entry.request.user_agent)
        .bind(entry.api_key_id.map(|id| id.value()))
        .bind(&entry.key_prefix)
        .bind(entry.success)
        .bind(entry.failure_reason.map(|r| r.code()))
        .bind(entry.suspicious)
        .bind(entry.timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to append audit entry: {}", e)))?;

        Ok(entry.with_id(id))
    }

    async fn count_failures_since(
        &self,
        prefix: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM api_key_audit_log
            WHERE key_prefix = $1 AND NOT success AND occurred_at >= $2
            "#,
        )
        .bind(prefix)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to count audit failures: {}", e)))?;

        Ok(count as u64)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<AuditLogEntry>, DomainError> {
        let rows = sqlx::query(&format!("{} ORDER BY id DESC LIMIT $1", SELECT_COLUMNS))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list audit entries: {}", e)))?;

        rows.iter().map(row_to_entry).collect()
    }

    async fn list_by_prefix(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<AuditLogEntry>, DomainError> {
        let rows = sqlx::query(&format!(
            "{} WHERE key_prefix = $1 ORDER BY id DESC LIMIT $2",
            SELECT_COLUMNS
        ))
        .bind(prefix)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list audit entries: {}", e)))?;

        rows.iter().map(row_to_entry).collect()
    }
}

fn row_to_entry(row: &PgRow) -> Result<AuditLogEntry, DomainError> {
    let get_err =
        |e: sqlx::Error| DomainError::storage(format!("Failed to read audit row: {}", e));

    let api_key_id: Option<i64> = row.try_get("api_key_id").map_err(get_err)?;
    let failure_reason: Option<String> = row.try_get("failure_reason").map_err(get_err)?;

    Ok(AuditLogEntry {
        id: Some(row.try_get("id").map_err(get_err)?),
        request: RequestMetadata {
            method: row.try_get("method").map_err(get_err)?,
            path: row.try_get("path").map_err(get_err)?,
            client_ip: row.try_get("client_ip").map_err(get_err)?,
            user_agent: row.try_get("user_agent").map_err(get_err)?,
        },
        api_key_id: api_key_id.map(ApiKeyId::new),
        key_prefix: row.try_get("key_prefix").map_err(get_err)?,
        success: row.try_get("success").map_err(get_err)?,
        failure_reason: failure_reason
            .as_deref()
            .and_then(AuthenticationError::from_code),
        suspicious: row.try_get("suspicious").map_err(get_err)?,
        timestamp: row.try_get("occurred_at").map_err(get_err)?,
    })
}

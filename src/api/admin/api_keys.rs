//! API key management admin endpoints
//!
//! Responses carry public metadata only. The secret appears once, in the
//! create and rotate responses; the hash never leaves the store.

use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::middleware::RequireAdmin;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::config::ApiKeyAuthConfig;
use crate::domain::api_key::{ApiKey, ApiKeyId};
use crate::domain::audit::AuditLogEntry;
use crate::infrastructure::api_key::CreatedApiKey;

const DEFAULT_AUDIT_LIMIT: usize = 100;
const MAX_AUDIT_LIMIT: usize = 1000;

/// Request to create a new API key
#[derive(Debug, Clone, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request to rotate an API key
#[derive(Debug, Clone, Deserialize)]
pub struct RotateApiKeyRequest {
    /// Revoke the old key in the same operation
    #[serde(default = "default_revoke_old")]
    pub revoke_old: bool,
    /// Override the inherited expiry
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_revoke_old() -> bool {
    true
}

impl Default for RotateApiKeyRequest {
    fn default() -> Self {
        Self {
            revoke_old: default_revoke_old(),
            expires_at: None,
        }
    }
}

/// API key response for admin API
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyResponse {
    pub id: i64,
    pub name: String,
    pub key_prefix: String,
    pub status: String,
    pub created_by: String,
    pub created_at: String,
    pub expires_at: Option<String>,
    pub last_used_at: Option<String>,
    pub revoked_at: Option<String>,
}

impl From<&ApiKey> for ApiKeyResponse {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id().value(),
            name: key.name().to_string(),
            key_prefix: key.key_prefix().to_string(),
            status: key.status_at(Utc::now()).to_string(),
            created_by: key.created_by().to_string(),
            created_at: key.created_at().to_rfc3339(),
            expires_at: key.expires_at().map(|dt| dt.to_rfc3339()),
            last_used_at: key.last_used_at().map(|dt| dt.to_rfc3339()),
            revoked_at: key.revoked_at().map(|dt| dt.to_rfc3339()),
        }
    }
}

/// API key response with secret (only on creation and rotation)
#[derive(Clone, Serialize)]
pub struct ApiKeyWithSecretResponse {
    #[serde(flatten)]
    pub api_key: ApiKeyResponse,
    pub secret: String,
}

impl std::fmt::Debug for ApiKeyWithSecretResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyWithSecretResponse")
            .field("api_key", &self.api_key)
            .field("secret", &"[hidden]")
            .finish()
    }
}

impl From<CreatedApiKey> for ApiKeyWithSecretResponse {
    fn from(created: CreatedApiKey) -> Self {
        Self {
            api_key: ApiKeyResponse::from(&created.api_key),
            secret: created.secret,
        }
    }
}

/// List API keys response
#[derive(Debug, Clone, Serialize)]
pub struct ListApiKeysResponse {
    pub api_keys: Vec<ApiKeyResponse>,
    pub total: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl AuditQuery {
    fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_AUDIT_LIMIT)
            .clamp(1, MAX_AUDIT_LIMIT)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListAuditEntriesResponse {
    pub entries: Vec<AuditLogEntry>,
    pub total: usize,
}

impl From<Vec<AuditLogEntry>> for ListAuditEntriesResponse {
    fn from(entries: Vec<AuditLogEntry>) -> Self {
        let total = entries.len();
        Self { entries, total }
    }
}

/// Failure window state for one key prefix
#[derive(Debug, Clone, Serialize)]
pub struct SuspiciousPrefixResponse {
    pub prefix: String,
    pub failures: usize,
    pub threshold: usize,
    pub blocked: bool,
}

/// Result of clearing a prefix's failure window
#[derive(Debug, Clone, Serialize)]
pub struct ClearSuspiciousPrefixResponse {
    pub prefix: String,
    pub failures_cleared: usize,
}

fn parse_prefix(raw: &str) -> Result<&str, ApiError> {
    if raw.is_empty() || raw.chars().count() > ApiKeyAuthConfig::MAX_PREFIX_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Key prefix must be 1 to {} characters",
            ApiKeyAuthConfig::MAX_PREFIX_LENGTH
        ))
        .with_param("prefix"));
    }

    Ok(raw)
}

fn parse_key_id(raw: &str) -> Result<ApiKeyId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid API key id '{}'", raw)).with_param("id"))
}

/// GET /admin/api-keys
pub async fn list_api_keys(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<ListApiKeysResponse>, ApiError> {
    debug!("Admin listing all API keys");

    let keys = state.api_key_service.list().await?;

    let api_keys: Vec<ApiKeyResponse> = keys.iter().map(ApiKeyResponse::from).collect();
    let total = api_keys.len();

    Ok(Json(ListApiKeysResponse { api_keys, total }))
}

/// POST /admin/api-keys
pub async fn create_api_key(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Json(request): Json<CreateApiKeyRequest>,
) -> Result<Json<ApiKeyWithSecretResponse>, ApiError> {
    debug!(name = %request.name, issuer = %admin.subject(), "Admin creating API key");

    let created = state
        .api_key_service
        .create(&request.name, admin.subject(), request.expires_at)
        .await?;

    Ok(Json(created.into()))
}

/// GET /admin/api-keys/{key_id}
pub async fn get_api_key(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(key_id): Path<String>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let id = parse_key_id(&key_id)?;
    let key = state.api_key_service.get(id).await?;

    Ok(Json(ApiKeyResponse::from(&key)))
}

/// POST /admin/api-keys/{key_id}/rotate
///
/// The body is optional; without one the old key is revoked.
pub async fn rotate_api_key(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(key_id): Path<String>,
    request: Option<Json<RotateApiKeyRequest>>,
) -> Result<Json<ApiKeyWithSecretResponse>, ApiError> {
    let id = parse_key_id(&key_id)?;
    let request = request.map(|Json(request)| request).unwrap_or_default();
    debug!(key_id = %id, revoke_old = request.revoke_old, "Admin rotating API key");

    let rotated = state
        .api_key_service
        .rotate(id, admin.subject(), request.revoke_old, request.expires_at)
        .await?;

    Ok(Json(rotated.into()))
}

/// POST /admin/api-keys/{key_id}/revoke
pub async fn revoke_api_key(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(key_id): Path<String>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let id = parse_key_id(&key_id)?;
    debug!(key_id = %id, "Admin revoking API key");

    let key = state.api_key_service.revoke(id).await?;

    Ok(Json(ApiKeyResponse::from(&key)))
}

/// GET /admin/api-keys/{key_id}/audit
///
/// Attempts presented under the key's prefix, including failures that never
/// resolved to a record.
pub async fn get_api_key_audit(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(key_id): Path<String>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<ListAuditEntriesResponse>, ApiError> {
    let id = parse_key_id(&key_id)?;
    let key = state.api_key_service.get(id).await?;

    let entries = state
        .audit_log
        .list_by_prefix(key.key_prefix(), query.limit())
        .await?;

    Ok(Json(entries.into()))
}

/// GET /admin/api-keys/audit
pub async fn list_audit_entries(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<AuditQuery>,
) -> Result<Json<ListAuditEntriesResponse>, ApiError> {
    let entries = match query.prefix.as_deref() {
        Some(prefix) => state.audit_log.list_by_prefix(prefix, query.limit()).await?,
        None => state.audit_log.list_recent(query.limit()).await?,
    };

    Ok(Json(entries.into()))
}

/// GET /admin/api-keys/suspicious/{prefix}
pub async fn get_suspicious_prefix(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(prefix): Path<String>,
) -> Result<Json<SuspiciousPrefixResponse>, ApiError> {
    let prefix = parse_prefix(&prefix)?;
    let detector = state.authenticator.detector();
    let now = Utc::now();

    Ok(Json(SuspiciousPrefixResponse {
        prefix: prefix.to_string(),
        failures: detector.failure_count(prefix, now),
        threshold: detector.threshold(),
        blocked: detector.is_suspicious(prefix, now),
    }))
}

/// DELETE /admin/api-keys/suspicious/{prefix}
///
/// Lifts a block early. The audit trail keeps the failures.
pub async fn clear_suspicious_prefix(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(prefix): Path<String>,
) -> Result<Json<ClearSuspiciousPrefixResponse>, ApiError> {
    let prefix = parse_prefix(&prefix)?;
    let failures_cleared = state.authenticator.detector().reset(prefix);

    info!(
        key_prefix = %prefix,
        failures_cleared,
        admin = %admin.subject(),
        "Cleared suspicious activity window"
    );

    Ok(Json(ClearSuspiciousPrefixResponse {
        prefix: prefix.to_string(),
        failures_cleared,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_key::NewApiKey;

    #[test]
    fn test_create_request_deserialization() {
        let request: CreateApiKeyRequest =
            serde_json::from_str(r#"{"name": "Lab sync"}"#).unwrap();
        assert_eq!(request.name, "Lab sync");
        assert!(request.expires_at.is_none());

        let request: CreateApiKeyRequest = serde_json::from_str(
            r#"{"name": "Lab sync", "expires_at": "2030-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(request.expires_at.is_some());
    }

    #[test]
    fn test_rotate_request_revokes_by_default() {
        let request: RotateApiKeyRequest = serde_json::from_str("{}").unwrap();
        assert!(request.revoke_old);

        let request: RotateApiKeyRequest =
            serde_json::from_str(r#"{"revoke_old": false}"#).unwrap();
        assert!(!request.revoke_old);

        assert!(RotateApiKeyRequest::default().revoke_old);
    }

    #[test]
    fn test_response_omits_hash() {
        let key = NewApiKey::new("Lab sync", "$argon2id$v=19$secret-hash", "abcdef01", "admin")
            .into_api_key(ApiKeyId::new(4));

        let json = serde_json::to_string(&ApiKeyResponse::from(&key)).unwrap();

        assert!(!json.contains("argon2id"));
        assert!(!json.contains("hash"));
        assert!(json.contains("\"status\":\"active\""));
        assert!(json.contains("\"key_prefix\":\"abcdef01\""));
    }

    #[test]
    fn test_audit_limit_is_clamped() {
        assert_eq!(AuditQuery::default().limit(), DEFAULT_AUDIT_LIMIT);

        let zero = AuditQuery {
            prefix: None,
            limit: Some(0),
        };
        assert_eq!(zero.limit(), 1);

        let huge = AuditQuery {
            prefix: None,
            limit: Some(1_000_000),
        };
        assert_eq!(huge.limit(), MAX_AUDIT_LIMIT);
    }

    #[test]
    fn test_parse_prefix() {
        assert_eq!(parse_prefix("abcdef01").unwrap(), "abcdef01");
        assert!(parse_prefix("").is_err());
        assert!(parse_prefix(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_parse_key_id() {
        assert_eq!(parse_key_id("12").unwrap(), ApiKeyId::new(12));
        assert!(parse_key_id("twelve").is_err());
    }
}

//! Audit log entry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::api_key::ApiKeyId;
use crate::domain::auth::AuthenticationError;

/// Longest stored HTTP method, in characters
pub const MAX_METHOD_LENGTH: usize = 16;
/// Longest stored request path, in characters
pub const MAX_PATH_LENGTH: usize = 2048;
/// Longest stored client address, in characters
pub const MAX_CLIENT_IP_LENGTH: usize = 64;
/// Longest stored user agent, in characters
pub const MAX_USER_AGENT_LENGTH: usize = 512;

/// Request details captured for every authentication attempt
///
/// Every field is caller controlled, so the builders cut each one to the
/// width the audit store accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub method: String,
    pub path: String,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMetadata {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: truncate_chars(method.into(), MAX_METHOD_LENGTH),
            path: truncate_chars(path.into(), MAX_PATH_LENGTH),
            client_ip: None,
            user_agent: None,
        }
    }

    pub fn with_client_ip(mut self, client_ip: Option<String>) -> Self {
        self.client_ip = client_ip.map(|ip| truncate_chars(ip, MAX_CLIENT_IP_LENGTH));
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent.map(|ua| truncate_chars(ua, MAX_USER_AGENT_LENGTH));
        self
    }
}

fn truncate_chars(mut value: String, max_chars: usize) -> String {
    if let Some((end, _)) = value.char_indices().nth(max_chars) {
        value.truncate(end);
    }
    value
}

/// One audit record per API key authentication attempt
///
/// Holds the key prefix only; plaintext keys and hashes never reach this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Store-assigned id, `None` until appended
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(flatten)]
    pub request: RequestMetadata,
    pub api_key_id: Option<ApiKeyId>,
    pub key_prefix: String,
    pub success: bool,
    pub failure_reason: Option<AuthenticationError>,
    pub suspicious: bool,
    pub timestamp: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Entry for a successful authentication
    pub fn success(
        request: RequestMetadata,
        api_key_id: ApiKeyId,
        key_prefix: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            request,
            api_key_id: Some(api_key_id),
            key_prefix: key_prefix.into(),
            success: true,
            failure_reason: None,
            suspicious: false,
            timestamp,
        }
    }

    /// Entry for a rejected authentication
    pub fn failure(
        request: RequestMetadata,
        key_prefix: impl Into<String>,
        reason: AuthenticationError,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            request,
            api_key_id: None,
            key_prefix: key_prefix.into(),
            success: false,
            failure_reason: Some(reason),
            suspicious: reason == AuthenticationError::SuspiciousActivity,
            timestamp,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

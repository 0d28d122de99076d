use serde::{Deserialize, Serialize};

use crate::domain::api_key::{ApiKey, ApiKeyId};

/// A granted privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Authority {
    /// Machine client authenticated by an API key
    ApiClient,
    /// Human administrator
    Admin,
}

impl Authority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiClient => "ROLE_API_CLIENT",
            Self::Admin => "ROLE_ADMIN",
        }
    }
}

/// Principal produced by a successful API key authentication
///
/// Always carries exactly [`Authority::ApiClient`], whatever the issuer's own
/// roles are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedIdentity {
    key_id: ApiKeyId,
    key_name: String,
    key_prefix: String,
    issued_by: String,
    authorities: [Authority; 1],
}

impl AuthenticatedIdentity {
    pub fn for_api_key(key: &ApiKey) -> Self {
        Self {
            key_id: key.id(),
            key_name: key.name().to_string(),
            key_prefix: key.key_prefix().to_string(),
            issued_by: key.created_by().to_string(),
            authorities: [Authority::ApiClient],
        }
    }

    /// Principal name, e.g. `api-key:42`
    pub fn principal(&self) -> String {
        format!("api-key:{}", self.key_id)
    }

    pub fn key_id(&self) -> ApiKeyId {
        self.key_id
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn issued_by(&self) -> &str {
        &self.issued_by
    }

    pub fn authorities(&self) -> &[Authority] {
        &self.authorities
    }

    pub fn has_authority(&self, authority: Authority) -> bool {
        self.authorities.contains(&authority)
    }
}

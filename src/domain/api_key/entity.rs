//! API Key entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned API key identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKeyId(i64);

impl ApiKeyId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for ApiKeyId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ApiKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ApiKeyId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(Self)
    }
}

/// Status of an API key, derived from its lifecycle fields and the clock
///
/// Never stored: `Expired` is recomputed from `expires_at` on every check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyStatus {
    Active,
    Revoked,
    Expired,
}

impl ApiKeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for ApiKeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key record that has not been persisted yet
#[derive(Clone)]
pub struct NewApiKey {
    pub name: String,
    pub key_hash: String,
    pub key_prefix: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewApiKey {
    pub fn new(
        name: impl Into<String>,
        key_hash: impl Into<String>,
        key_prefix: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            key_hash: key_hash.into(),
            key_prefix: key_prefix.into(),
            created_by: created_by.into(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    pub fn with_expiration(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Materialize the record once the store has assigned an id
    pub fn into_api_key(self, id: ApiKeyId) -> ApiKey {
        ApiKey {
            id,
            name: self.name,
            key_hash: self.key_hash,
            key_prefix: self.key_prefix,
            created_by: self.created_by,
            created_at: self.created_at,
            expires_at: self.expires_at,
            last_used_at: None,
            revoked_at: None,
            is_active: true,
        }
    }
}

impl std::fmt::Debug for NewApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewApiKey")
            .field("name", &self.name)
            .field("key_hash", &"[hidden]")
            .field("key_prefix", &self.key_prefix)
            .field("created_by", &self.created_by)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Lifecycle fields restored from a durable store
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredLifecycle {
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Issued API key record
///
/// The plaintext key is never part of this type. `key_hash` is only readable
/// through [`ApiKey::key_hash`] and is hidden from `Debug` output.
#[derive(Clone)]
pub struct ApiKey {
    id: ApiKeyId,
    name: String,
    key_hash: String,
    key_prefix: String,
    created_by: String,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    is_active: bool,
}

impl ApiKey {
    /// Rebuild a record read back from a store
    pub fn restore(id: ApiKeyId, fields: NewApiKey, lifecycle: StoredLifecycle) -> Self {
        let mut key = fields.into_api_key(id);
        key.last_used_at = lifecycle.last_used_at;
        key.revoked_at = lifecycle.revoked_at;
        key.is_active = lifecycle.is_active;
        key
    }

    // Getters

    pub fn id(&self) -> ApiKeyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_hash(&self) -> &str {
        &self.key_hash
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    // Status checks

    /// Check if the key has been revoked (either flag counts)
    pub fn is_revoked(&self) -> bool {
        !self.is_active || self.revoked_at.is_some()
    }

    /// Check if the key is past its expiry at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> ApiKeyStatus {
        if self.is_revoked() {
            ApiKeyStatus::Revoked
        } else if self.is_expired_at(now) {
            ApiKeyStatus::Expired
        } else {
            ApiKeyStatus::Active
        }
    }

    // Mutators

    /// Revoke the key. Returns false if it was already revoked.
    pub fn revoke(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_revoked() {
            return false;
        }

        self.revoked_at = Some(at);
        self.is_active = false;
        true
    }

    /// Record a successful authentication. Revoked records stay frozen.
    pub fn record_usage(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_revoked() {
            return false;
        }

        self.last_used_at = Some(at);
        true
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("key_hash", &"[hidden]")
            .field("key_prefix", &self.key_prefix)
            .field("created_by", &self.created_by)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("last_used_at", &self.last_used_at)
            .field("revoked_at", &self.revoked_at)
            .field("is_active", &self.is_active)
            .finish()
    }
}

//! Authentication outcomes and the identities they produce

mod identity;

pub use identity::{AuthenticatedIdentity, Authority};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an API key authentication attempt was rejected
///
/// These distinctions are recorded in the audit trail only. At the protocol
/// boundary every variant is reported as the same authentication failure.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticationError {
    #[error("credential has the wrong length or shape")]
    MalformedCredential,

    #[error("no stored key matches the credential")]
    NoMatch,

    #[error("matching key has expired")]
    Expired,

    #[error("matching key has been revoked")]
    Revoked,

    #[error("key prefix is blocked after repeated failures")]
    SuspiciousActivity,

    #[error("key store unavailable")]
    StoreUnavailable,
}

impl AuthenticationError {
    /// Stable reason code stored with audit entries
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedCredential => "MALFORMED_CREDENTIAL",
            Self::NoMatch => "NO_MATCH",
            Self::Expired => "EXPIRED",
            Self::Revoked => "REVOKED",
            Self::SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "MALFORMED_CREDENTIAL" => Some(Self::MalformedCredential),
            "NO_MATCH" => Some(Self::NoMatch),
            "EXPIRED" => Some(Self::Expired),
            "REVOKED" => Some(Self::Revoked),
            "SUSPICIOUS_ACTIVITY" => Some(Self::SuspiciousActivity),
            "STORE_UNAVAILABLE" => Some(Self::StoreUnavailable),
            _ => None,
        }
    }

    /// Message shown to callers, identical for every variant
    pub fn public_message(&self) -> &'static str {
        "Invalid API key"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [AuthenticationError; 6] = [
        AuthenticationError::MalformedCredential,
        AuthenticationError::NoMatch,
        AuthenticationError::Expired,
        AuthenticationError::Revoked,
        AuthenticationError::SuspiciousActivity,
        AuthenticationError::StoreUnavailable,
    ];

    #[test]
    fn test_codes_are_stable() {
        for reason in ALL {
            assert_eq!(AuthenticationError::from_code(reason.code()), Some(reason));
        }
        assert_eq!(AuthenticationError::from_code("SOMETHING_ELSE"), None);
    }

    #[test]
    fn test_serialized_form_matches_code() {
        for reason in ALL {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.code()));
        }
    }

    #[test]
    fn test_public_message_does_not_leak_reason() {
        let messages: std::collections::HashSet<_> =
            ALL.iter().map(|r| r.public_message()).collect();
        assert_eq!(messages.len(), 1);
    }
}

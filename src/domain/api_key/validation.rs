//! API Key validation utilities

use thiserror::Error;

/// Errors that can occur when validating API key input
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiKeyValidationError {
    #[error("API key name cannot be empty")]
    EmptyName,

    #[error("API key name exceeds maximum length of {0} characters")]
    NameTooLong(usize),

    #[error("API key name cannot contain control characters")]
    InvalidNameCharacter,

    #[error("API key issuer cannot be empty")]
    EmptyIssuer,
}

pub const MAX_API_KEY_NAME_LENGTH: usize = 100;

/// Validate an API key name
///
/// Rules:
/// - Cannot be empty or whitespace only
/// - Maximum 100 characters
/// - No control characters
pub fn validate_api_key_name(name: &str) -> Result<(), ApiKeyValidationError> {
    if name.trim().is_empty() {
        return Err(ApiKeyValidationError::EmptyName);
    }

    if name.chars().count() > MAX_API_KEY_NAME_LENGTH {
        return Err(ApiKeyValidationError::NameTooLong(MAX_API_KEY_NAME_LENGTH));
    }

    if name.chars().any(char::is_control) {
        return Err(ApiKeyValidationError::InvalidNameCharacter);
    }

    Ok(())
}

/// Validate the identity of the principal issuing a key
pub fn validate_issuer(issuer: &str) -> Result<(), ApiKeyValidationError> {
    if issuer.trim().is_empty() {
        return Err(ApiKeyValidationError::EmptyIssuer);
    }

    Ok(())
}

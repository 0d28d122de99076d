//! API Key domain
//!
//! Issued key records, their lifecycle, and the store they live in.

mod entity;
mod repository;
mod validation;

pub use entity::{ApiKey, ApiKeyId, ApiKeyStatus, NewApiKey, StoredLifecycle};
pub use repository::{revoked_rotation_error, ApiKeyRepository, LifecycleUpdate};
pub use validation::{
    validate_api_key_name, validate_issuer, ApiKeyValidationError, MAX_API_KEY_NAME_LENGTH,
};

#[cfg(test)]
pub use repository::mock;

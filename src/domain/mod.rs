//! Domain layer - API key records, authentication outcomes and the audit trail

pub mod api_key;
pub mod audit;
pub mod auth;
pub mod error;

pub use api_key::{ApiKey, ApiKeyId, ApiKeyRepository, ApiKeyStatus, ApiKeyValidationError};
pub use audit::{AuditLogEntry, AuditLogRepository, RequestMetadata};
pub use auth::{AuthenticatedIdentity, AuthenticationError, Authority};
pub use error::DomainError;

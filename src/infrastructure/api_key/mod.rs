//! API Key infrastructure implementations
//!
//! Key generation and hashing, validation, lifecycle management,
//! suspicious activity detection and the key stores.

mod detector;
mod generator;
pub(crate) mod hasher;
mod postgres_repository;
mod repository;
mod service;
mod validator;

pub use detector::SuspiciousActivityDetector;
pub use generator::{ApiKeyGenerator, GeneratedApiKey};
pub use hasher::{ApiKeyHasher, Argon2KeyHasher};
pub use postgres_repository::PostgresApiKeyRepository;
pub use repository::InMemoryApiKeyRepository;
pub use service::{ApiKeyService, CreatedApiKey};
pub use validator::ApiKeyValidator;

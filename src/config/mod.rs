//! Layered application configuration

mod app_config;

pub use app_config::{
    AdminConfig, ApiKeyAuthConfig, AppConfig, LogFormat, LoggingConfig, MetricsConfig,
    ServerConfig, StorageBackend, StorageConfig,
};

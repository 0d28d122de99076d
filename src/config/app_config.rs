use serde::Deserialize;

use crate::domain::DomainError;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub api_key: ApiKeyAuthConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Backing store for keys and audit entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// API key authentication settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiKeyAuthConfig {
    /// Turn API key authentication off entirely (requests pass through)
    pub enabled: bool,
    /// Request header carrying the key
    pub header_name: String,
    /// Generated key length in hex characters
    pub key_length: usize,
    /// Leading characters stored for candidate lookup
    pub prefix_length: usize,
    /// Argon2 iterations
    pub hash_cost: u32,
    /// Argon2 memory cost in KiB
    pub hash_memory_kib: u32,
    /// Failures per prefix that make it suspicious
    pub failure_threshold: usize,
    /// Sliding window for counting failures
    pub failure_window_secs: u64,
    /// Upper bound on a single key store call during authentication
    pub store_timeout_ms: u64,
    /// Audit entries that may wait for the store before new ones are dropped
    pub audit_buffer_size: usize,
}

#[derive(Clone, Deserialize)]
pub struct AdminConfig {
    /// Secret used to sign administrator tokens. Required to serve admin routes.
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_expiration_hours")]
    pub token_expiration_hours: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_max_connections() -> u32 {
    10
}

fn default_token_expiration_hours() -> u64 {
    8
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Default for ApiKeyAuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header_name: "X-API-Key".to_string(),
            key_length: 64,
            prefix_length: 8,
            hash_cost: 3,
            hash_memory_kib: 19 * 1024,
            failure_threshold: 5,
            failure_window_secs: 15 * 60,
            store_timeout_ms: 2000,
            audit_buffer_size: 1024,
        }
    }
}

impl ApiKeyAuthConfig {
    /// Widest stored key prefix, in characters
    pub const MAX_PREFIX_LENGTH: usize = 64;
    /// Longest failure window: one week
    pub const MAX_FAILURE_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;

    /// The detector window as a duration
    pub fn failure_window(&self) -> Result<chrono::Duration, DomainError> {
        i64::try_from(self.failure_window_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                DomainError::configuration(format!(
                    "api_key.failure_window_secs is out of range: {}",
                    self.failure_window_secs
                ))
            })
    }

    /// Reject settings that cannot work together
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.key_length == 0 || self.key_length % 2 != 0 {
            return Err(DomainError::configuration(format!(
                "api_key.key_length must be a positive even number, got {}",
                self.key_length
            )));
        }

        let max_prefix = self.key_length.min(Self::MAX_PREFIX_LENGTH);
        if self.prefix_length < 4 || self.prefix_length > max_prefix {
            return Err(DomainError::configuration(format!(
                "api_key.prefix_length must be between 4 and {}, got {}",
                max_prefix, self.prefix_length
            )));
        }

        if self.header_name.trim().is_empty() {
            return Err(DomainError::configuration(
                "api_key.header_name cannot be empty",
            ));
        }

        if self.failure_threshold == 0 {
            return Err(DomainError::configuration(
                "api_key.failure_threshold must be at least 1",
            ));
        }

        if !(1..=Self::MAX_FAILURE_WINDOW_SECS).contains(&self.failure_window_secs) {
            return Err(DomainError::configuration(format!(
                "api_key.failure_window_secs must be between 1 and {}, got {}",
                Self::MAX_FAILURE_WINDOW_SECS,
                self.failure_window_secs
            )));
        }

        if self.store_timeout_ms == 0 {
            return Err(DomainError::configuration(
                "api_key.store_timeout_ms must be at least 1",
            ));
        }

        Ok(())
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_expiration_hours: default_token_expiration_hours(),
        }
    }
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[hidden]"))
            .field("token_expiration_hours", &self.token_expiration_hours)
            .finish()
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_metrics_path(),
        }
    }
}

impl AppConfig {
    /// Minimum length of the admin token secret
    pub const MIN_JWT_SECRET_LENGTH: usize = 32;

    /// Reject settings the server cannot start with
    pub fn validate(&self) -> Result<(), DomainError> {
        self.api_key.validate()?;

        if let Some(secret) = &self.admin.jwt_secret {
            if secret.len() < Self::MIN_JWT_SECRET_LENGTH {
                return Err(DomainError::configuration(format!(
                    "admin.jwt_secret must be at least {} characters",
                    Self::MIN_JWT_SECRET_LENGTH
                )));
            }
        }

        Ok(())
    }

    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.api_key.enabled);
        assert_eq!(config.api_key.header_name, "X-API-Key");
        assert_eq!(config.api_key.key_length, 64);
        assert_eq!(config.api_key.prefix_length, 8);
        assert_eq!(config.api_key.failure_threshold, 5);
        assert_eq!(config.api_key.failure_window_secs, 900);
        assert!(config.admin.jwt_secret.is_none());
        assert!(config.metrics.enabled);
        assert!(config.api_key.validate().is_ok());
    }

    #[test]
    fn test_validate_key_length() {
        let odd = ApiKeyAuthConfig {
            key_length: 63,
            ..Default::default()
        };
        assert!(odd.validate().is_err());

        let zero = ApiKeyAuthConfig {
            key_length: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_validate_prefix_length() {
        let short = ApiKeyAuthConfig {
            prefix_length: 3,
            ..Default::default()
        };
        assert!(short.validate().is_err());

        let long = ApiKeyAuthConfig {
            key_length: 32,
            prefix_length: 33,
            ..Default::default()
        };
        assert!(long.validate().is_err());

        let wider_than_column = ApiKeyAuthConfig {
            key_length: 128,
            prefix_length: 65,
            ..Default::default()
        };
        assert!(wider_than_column.validate().is_err());

        let custom = ApiKeyAuthConfig {
            key_length: 32,
            prefix_length: 12,
            ..Default::default()
        };
        assert!(custom.validate().is_ok());
    }

    #[test]
    fn test_validate_detector_and_timeout() {
        for config in [
            ApiKeyAuthConfig {
                failure_threshold: 0,
                ..Default::default()
            },
            ApiKeyAuthConfig {
                failure_window_secs: 0,
                ..Default::default()
            },
            ApiKeyAuthConfig {
                failure_window_secs: ApiKeyAuthConfig::MAX_FAILURE_WINDOW_SECS + 1,
                ..Default::default()
            },
            ApiKeyAuthConfig {
                failure_window_secs: u64::MAX,
                ..Default::default()
            },
            ApiKeyAuthConfig {
                store_timeout_ms: 0,
                ..Default::default()
            },
        ] {
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn test_failure_window() {
        let config = ApiKeyAuthConfig::default();
        assert_eq!(
            config.failure_window().unwrap(),
            chrono::Duration::minutes(15)
        );

        let huge = ApiKeyAuthConfig {
            failure_window_secs: u64::MAX,
            ..Default::default()
        };
        assert!(matches!(
            huge.failure_window(),
            Err(DomainError::Configuration { .. })
        ));
    }

    #[test]
    fn test_deserialize_partial_section() {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [api_key]
                failure_threshold = 10
                header_name = "X-Clinic-Key"

                [storage]
                backend = "postgres"
                database_url = "postgres://localhost/petclinic"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.api_key.failure_threshold, 10);
        assert_eq!(config.api_key.header_name, "X-Clinic-Key");
        assert_eq!(config.api_key.key_length, 64);
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_validate_rejects_short_admin_secret() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.admin.jwt_secret = Some("short".to_string());
        assert!(config.validate().is_err());

        config.admin.jwt_secret = Some("x".repeat(AppConfig::MIN_JWT_SECRET_LENGTH));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_admin_debug_hides_secret() {
        let admin = AdminConfig {
            jwt_secret: Some("super-secret".to_string()),
            token_expiration_hours: 8,
        };

        assert!(!format!("{:?}", admin).contains("super-secret"));
    }
}

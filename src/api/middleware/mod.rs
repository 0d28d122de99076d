//! API middleware components

pub mod admin_auth;
pub mod auth;
pub mod logging;
pub mod metrics;

pub use admin_auth::RequireAdmin;
pub use auth::{api_key_auth_middleware, extract_client_ip, RequireApiClient};
pub use logging::logging_middleware;
pub use metrics::metrics_middleware;

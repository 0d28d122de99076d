//! Application state for shared services

use std::sync::Arc;

use axum::http::HeaderName;

use crate::domain::audit::AuditLogRepository;
use crate::infrastructure::api_key::ApiKeyService;
use crate::infrastructure::audit::AuditLogger;
use crate::infrastructure::auth::{ApiKeyAuthenticator, JwtService};

/// Application state shared by every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub api_key_service: Arc<ApiKeyService>,
    pub authenticator: Arc<ApiKeyAuthenticator>,
    /// `None` when no admin secret is configured; admin routes then answer 503
    pub jwt_service: Option<Arc<JwtService>>,
    pub audit_log: Arc<dyn AuditLogRepository>,
    /// Header carrying API keys
    pub api_key_header: HeaderName,
}

impl AppState {
    pub fn audit_logger(&self) -> &AuditLogger {
        self.authenticator.audit_logger()
    }
}

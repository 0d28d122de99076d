//! Administrator authentication
//!
//! Admin routes accept a JWT bearer token carrying the admin role. Requests
//! already authenticated by an API key are refused: machine clients never
//! hold administrative privilege.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::auth::AuthenticatedIdentity;
use crate::infrastructure::auth::JwtClaims;

/// Extractor that requires an administrator token
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub JwtClaims);

impl RequireAdmin {
    /// Subject of the administrator token
    pub fn subject(&self) -> &str {
        &self.0.sub
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<AuthenticatedIdentity>() {
            debug!(principal = %identity.principal(), "API client denied admin access");
            return Err(ApiError::forbidden("Administrator access required"));
        }

        let jwt_service = state
            .jwt_service
            .as_ref()
            .ok_or_else(|| ApiError::unavailable("Admin API is not configured"))?;

        let token = extract_bearer_token(&parts.headers)?;

        let claims = jwt_service
            .validate(&token)
            .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

        if !claims.is_admin() {
            return Err(ApiError::forbidden("Administrator access required"));
        }

        debug!(subject = %claims.sub, "Admin access via JWT");
        Ok(RequireAdmin(claims))
    }
}

/// Extract a bearer token from the Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| ApiError::bad_request("Invalid Authorization header encoding"))?;

        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            return Ok(token.trim().to_string());
        }
    }

    Err(ApiError::unauthorized(
        "Authentication required. Provide a token via 'Authorization: Bearer <token>' header",
    ))
}

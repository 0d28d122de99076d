//! Admin API endpoints for managing API keys

pub mod api_keys;

use axum::{
    routing::{get, post},
    Router,
};

use super::state::AppState;

/// Create admin API router
pub fn create_admin_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api-keys",
            get(api_keys::list_api_keys).post(api_keys::create_api_key),
        )
        .route("/api-keys/audit", get(api_keys::list_audit_entries))
        .route(
            "/api-keys/suspicious/{prefix}",
            get(api_keys::get_suspicious_prefix).delete(api_keys::clear_suspicious_prefix),
        )
        .route("/api-keys/{key_id}", get(api_keys::get_api_key))
        .route("/api-keys/{key_id}/rotate", post(api_keys::rotate_api_key))
        .route("/api-keys/{key_id}/revoke", post(api_keys::revoke_api_key))
        .route("/api-keys/{key_id}/audit", get(api_keys::get_api_key_audit))
}

//! Machine client endpoints

pub mod identity;

use axum::{routing::get, Router};

use super::state::AppState;

/// Create v1 API router
pub fn create_v1_router() -> Router<AppState> {
    Router::new().route("/identity", get(identity::get_identity))
}

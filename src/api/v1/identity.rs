//! Identity of the calling API key

use serde::Serialize;

use crate::api::middleware::RequireApiClient;
use crate::api::types::Json;
use crate::domain::auth::Authority;

#[derive(Debug, Clone, Serialize)]
pub struct IdentityResponse {
    pub principal: String,
    pub key_id: i64,
    pub key_name: String,
    pub key_prefix: String,
    pub issued_by: String,
    pub authorities: Vec<&'static str>,
}

/// GET /v1/identity
pub async fn get_identity(RequireApiClient(identity): RequireApiClient) -> Json<IdentityResponse> {
    Json(IdentityResponse {
        principal: identity.principal(),
        key_id: identity.key_id().value(),
        key_name: identity.key_name().to_string(),
        key_prefix: identity.key_prefix().to_string(),
        issued_by: identity.issued_by().to_string(),
        authorities: identity.authorities().iter().map(Authority::as_str).collect(),
    })
}

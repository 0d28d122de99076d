//! API key authentication middleware
//!
//! Runs on every request. A request without the key header passes through
//! untouched so other mechanisms can decide; a request with one is either
//! authenticated (the identity lands in the request extensions) or rejected
//! with 401.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::audit::RequestMetadata;
use crate::domain::auth::{AuthenticatedIdentity, Authority};
use crate::infrastructure::auth::AuthenticationOutcome;

/// Authenticate the configured API key header, if present
pub async fn api_key_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Non UTF-8 bytes survive as replacement characters and fail validation
    let presented = request
        .headers()
        .get(&state.api_key_header)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).trim().to_string());

    if presented.is_none() {
        return next.run(request).await;
    }

    let metadata = request_metadata(&request);

    match state
        .authenticator
        .authenticate(presented.as_deref(), metadata)
        .await
    {
        AuthenticationOutcome::NotAttempted => next.run(request).await,
        AuthenticationOutcome::Authenticated(identity) => {
            debug!(principal = %identity.principal(), "Request authenticated by API key");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        AuthenticationOutcome::Rejected(reason) => ApiError::from(reason).into_response(),
    }
}

fn request_metadata(request: &Request) -> RequestMetadata {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(String::from);

    RequestMetadata::new(request.method().as_str(), request.uri().path())
        .with_client_ip(extract_client_ip(request.headers(), peer))
        .with_user_agent(user_agent)
}

/// Client address, preferring proxy headers over the socket peer
///
/// Takes the first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer.
/// A header value that does not parse as an address is skipped.
pub fn extract_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    for header_name in ["x-forwarded-for", "x-real-ip"] {
        let first_hop = headers
            .get(header_name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(parse_ip);

        if let Some(ip) = first_hop {
            return Some(ip.to_string());
        }
    }

    peer.map(|addr| addr.ip().to_string())
}

/// Accepts a bare address or one carrying a port
fn parse_ip(value: &str) -> Option<IpAddr> {
    let value = value.trim();

    value
        .parse::<IpAddr>()
        .ok()
        .or_else(|| value.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

/// Extractor that requires a request authenticated by an API key
#[derive(Debug, Clone)]
pub struct RequireApiClient(pub AuthenticatedIdentity);

impl<S: Send + Sync> FromRequestParts<S> for RequireApiClient {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("API key required"))?;

        if !identity.has_authority(Authority::ApiClient) {
            return Err(ApiError::forbidden("API client access required"));
        }

        Ok(RequireApiClient(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_for_first_hop_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.2".parse().unwrap());
        headers.insert("x-real-ip", "198.51.100.1".parse().unwrap());
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        assert_eq!(
            extract_client_ip(&headers, Some(peer)),
            Some("203.0.113.7".to_string())
        );
    }

    #[test]
    fn test_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.1".parse().unwrap());

        assert_eq!(
            extract_client_ip(&headers, None),
            Some("198.51.100.1".to_string())
        );
    }

    #[test]
    fn test_peer_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", " ".parse().unwrap());
        let peer: SocketAddr = "192.0.2.10:443".parse().unwrap();

        assert_eq!(
            extract_client_ip(&headers, Some(peer)),
            Some("192.0.2.10".to_string())
        );
        assert_eq!(extract_client_ip(&HeaderMap::new(), None), None);
    }

    #[test]
    fn test_unparseable_forwarded_for_is_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "1".repeat(200).parse().unwrap());
        headers.insert("x-real-ip", "not-an-address".parse().unwrap());
        let peer: SocketAddr = "192.0.2.10:443".parse().unwrap();

        assert_eq!(
            extract_client_ip(&headers, Some(peer)),
            Some("192.0.2.10".to_string())
        );
        assert_eq!(extract_client_ip(&headers, None), None);
    }

    #[test]
    fn test_forwarded_for_with_port() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "[2001:db8::1]:8443".parse().unwrap());
        assert_eq!(
            extract_client_ip(&headers, None),
            Some("2001:db8::1".to_string())
        );

        headers.insert("x-forwarded-for", "203.0.113.7:51000".parse().unwrap());
        assert_eq!(
            extract_client_ip(&headers, None),
            Some("203.0.113.7".to_string())
        );
    }

    #[test]
    fn test_request_metadata() {
        let request = axum::http::Request::builder()
            .method("DELETE")
            .uri("/v1/identity?verbose=true")
            .header("user-agent", "clinic-sync/2.1")
            .header("x-real-ip", "198.51.100.4")
            .body(axum::body::Body::empty())
            .unwrap();

        let metadata = request_metadata(&request);

        assert_eq!(metadata.method, "DELETE");
        assert_eq!(metadata.path, "/v1/identity");
        assert_eq!(metadata.client_ip.as_deref(), Some("198.51.100.4"));
        assert_eq!(metadata.user_agent.as_deref(), Some("clinic-sync/2.1"));
    }
}

//! Authentication infrastructure module
//!
//! API key authentication for machine clients and JWT bearer tokens for
//! administrators.

mod authenticator;
mod jwt;

pub use authenticator::{ApiKeyAuthenticator, AuthenticationOutcome};
pub use jwt::{JwtClaims, JwtConfig, JwtService};

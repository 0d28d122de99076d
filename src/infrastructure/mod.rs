//! Infrastructure layer - stores, hashing, authentication and observability

pub mod api_key;
pub mod audit;
pub mod auth;
pub mod logging;
pub mod observability;
pub mod storage;

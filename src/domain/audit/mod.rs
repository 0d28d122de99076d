//! Authentication audit trail domain

mod entity;
mod repository;

pub use entity::{
    AuditLogEntry, RequestMetadata, MAX_CLIENT_IP_LENGTH, MAX_METHOD_LENGTH, MAX_PATH_LENGTH,
    MAX_USER_AGENT_LENGTH,
};
pub use repository::AuditLogRepository;

#[cfg(test)]
pub use repository::mock;

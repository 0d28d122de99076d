//! Authentication audit trail infrastructure

mod logger;
mod postgres_repository;
mod repository;

pub use logger::AuditLogger;
pub use postgres_repository::PostgresAuditLogRepository;
pub use repository::InMemoryAuditLogRepository;

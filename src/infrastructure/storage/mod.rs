//! Storage infrastructure - backend selection, pooling and migrations

mod factory;
pub mod migrations;
mod postgres;

pub use factory::{StorageFactory, Stores};
pub use migrations::{run_storage_migrations, Migration, PostgresMigrator};
pub use postgres::{connect, PostgresConfig};

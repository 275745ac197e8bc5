//! Tabula Store - SQLite persistence for the mapping kernel
//!
//! Provides:
//! - Connection setup and TOML/builder configuration
//! - The migration engine with rollback snapshots
//! - Query execution and result-graph mapping
//! - The entity manager, typed repositories and the `Database` handle

pub mod config;
pub mod database;
pub mod db;
pub mod entity_manager;
pub mod errors;
pub mod executor;
pub mod mapper;
pub mod migrations;
pub mod repository;
pub mod values;

// Re-export key types
pub use config::DatabaseConfiguration;
pub use database::Database;
pub use entity_manager::EntityManager;
pub use errors::Result;
pub use migrations::MigrationOutcome;
pub use repository::Repository;

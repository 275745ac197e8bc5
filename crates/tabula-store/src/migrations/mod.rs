//! Schema migration engine
//!
//! Provides:
//! - The internal `__tabula_schema` table holding the current version and
//!   rollback snapshots
//! - Catalogue checksums
//! - Snapshot dump/restore of managed tables
//! - The runner executing one planned migration step in a transaction

mod checksums;
pub mod schema_table;
pub mod snapshot;
mod runner;

pub use checksums::compute_checksum;
pub use runner::{migrate, MigrationOutcome};
pub use schema_table::SCHEMA_TABLE;

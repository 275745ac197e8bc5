//! Core types shared across Tabula crates
//!
//! This crate provides the foundational types used by the pure mapping
//! kernel, the SQLite store, and the logging facility:
//!
//! - **Values**: `SqlValue`, the storage-class value exchanged with SQLite
//! - **Rows**: `Row`, an ordered list of column-name/value pairs
//! - **Schema constants**: canonical field keys and event names for logging

pub mod row;
pub mod schema;
pub mod value;

pub use row::Row;
pub use value::SqlValue;

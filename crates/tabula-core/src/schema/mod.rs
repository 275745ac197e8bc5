//! Physical schema
//!
//! The catalogue is the serialized table/column layout derived from the
//! registry and relation graph. It is what gets persisted with each schema
//! version and what migrations diff against.

pub mod catalogue;
pub mod ddl;
pub mod diff;

pub use catalogue::{Catalogue, ColumnSchema, ForeignKeyRef, OnDelete, TableKind, TableSchema};
pub use ddl::quote;
pub use diff::{diff_catalogues, SchemaChange};

//! Relation graph
//!
//! Built from the metadata registry; shared by DDL generation, the predicate
//! compiler and the store.

pub mod graph;

pub use graph::{FkPlacement, ForeignKeyColumn, JoinTable, RelationEdge, RelationGraph};

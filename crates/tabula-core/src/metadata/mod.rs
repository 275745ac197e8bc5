//! Entity metadata
//!
//! Raw descriptor input (produced by an external scanner or by
//! `EntityType::descriptor`) is resolved once into immutable descriptors.

pub mod descriptor;
pub mod raw;
pub mod registry;

pub use descriptor::{ColumnDescriptor, EntityDescriptor, RelationDescriptor};
pub use raw::{Cardinality, FetchMode, RawEntity, RawField, RawRelation, SqlType};
pub use registry::MetadataRegistry;

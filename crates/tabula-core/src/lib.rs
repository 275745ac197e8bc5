//! Tabula Core - pure object-relational mapping kernel
//!
//! Everything here is deterministic and free of SQL execution:
//! - Entity metadata resolution and relation graph placement
//! - Physical schema catalogue, DDL rendering and additive diffing
//! - Migration planning
//! - Criteria model and the predicate compiler
//! - Dynamic entity records
//!
//! `tabula-store` executes what this crate produces.

pub mod compiler;
pub mod criteria;
pub mod errors;
pub mod logging_facility;
pub mod metadata;
pub mod migration;
pub mod model;
pub mod relations;
pub mod schema;

pub use tabula_core_types as types;

pub use compiler::{CompiledQuery, QueryCompiler};
pub use criteria::{JoinMode, Predicate, Predicates, Root, SortDirection};
pub use errors::{ExError, ExErrorKind, Result, TabulaError};
pub use metadata::{Cardinality, FetchMode, MetadataRegistry, RawEntity, SqlType};
pub use migration::{plan_migration, CreationMode, MigrationState};
pub use model::{Entity, EntityType, Related};
pub use relations::RelationGraph;
pub use schema::Catalogue;
pub use types::{Row, SqlValue};

//! Resolved entity descriptors
//!
//! Descriptors are immutable once the registry is built. Relation placement
//! (foreign keys, join tables) is added by the relation graph, not here.

use super::raw::{Cardinality, FetchMode, SqlType};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// Logical field name
    pub field: String,
    /// Physical column name
    pub column: String,
    pub sql_type: SqlType,
    /// Excluded from DDL and SQL
    pub transient: bool,
    pub is_id: bool,
}

impl ColumnDescriptor {
    pub fn is_persistent(&self) -> bool {
        !self.transient
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationDescriptor {
    pub field: String,
    pub cardinality: Cardinality,
    /// Type name of the target entity
    pub target: String,
    pub target_table: String,
    pub fetch: FetchMode,
    /// Cascade on store is unconditional
    pub cascade_store: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    pub type_name: String,
    pub table: String,
    /// Declaration order, identifier and transient fields included
    pub columns: Vec<ColumnDescriptor>,
    /// Declaration order
    pub relations: Vec<RelationDescriptor>,
    pub(crate) id_index: usize,
}

impl EntityDescriptor {
    pub fn id_column(&self) -> &ColumnDescriptor {
        &self.columns[self.id_index]
    }

    /// Non-identifier columns that are persisted, in declaration order
    pub fn value_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| !c.is_id && !c.transient)
    }

    /// Look up a persistent column by field name, falling back to column name
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .filter(|c| !c.transient)
            .find(|c| c.field == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .filter(|c| !c.transient)
                    .find(|c| c.column == name)
            })
    }

    pub fn relation(&self, field: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|r| r.field == field)
    }
}

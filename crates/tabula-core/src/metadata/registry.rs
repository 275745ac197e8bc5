//! Metadata registry
//!
//! Resolves raw descriptors into `EntityDescriptor`s. Resolution is a pure
//! transform: identical input yields identical descriptors, and no SQL is
//! involved.

use super::descriptor::{ColumnDescriptor, EntityDescriptor, RelationDescriptor};
use super::raw::{RawEntity, SqlType};
use crate::errors::{Result, TabulaError};
use convert_case::{Case, Casing};
use std::collections::BTreeMap;

/// Prefix reserved for internal tables and compiler aliases
pub const RESERVED_PREFIX: &str = "__";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetadataRegistry {
    entities: Vec<EntityDescriptor>,
    by_type: BTreeMap<String, usize>,
    by_table: BTreeMap<String, usize>,
}

impl MetadataRegistry {
    /// Build the registry from scanner output
    ///
    /// # Errors
    ///
    /// Returns a Metadata-kind error for a missing, duplicated, non-numeric
    /// or transient identifier, an unregistered relation target, a duplicate
    /// type or table name, two fields on one column, or an unusable name.
    pub fn resolve(raw: &[RawEntity]) -> Result<Self> {
        let mut registry = MetadataRegistry::default();

        for raw_entity in raw {
            let descriptor = resolve_entity(raw_entity)?;

            if registry.by_type.contains_key(&descriptor.type_name) {
                return Err(TabulaError::DuplicateEntity {
                    entity: descriptor.type_name,
                });
            }
            if let Some(&existing) = registry.by_table.get(&descriptor.table) {
                return Err(TabulaError::DuplicateTable {
                    table: descriptor.table,
                    first: registry.entities[existing].type_name.clone(),
                    second: raw_entity.type_name.clone(),
                });
            }

            let index = registry.entities.len();
            registry
                .by_type
                .insert(descriptor.type_name.clone(), index);
            registry.by_table.insert(descriptor.table.clone(), index);
            registry.entities.push(descriptor);
        }

        // Relation targets can only be checked once every type is known
        for raw_entity in raw {
            let index = registry.by_type[&raw_entity.type_name];
            let mut relations = Vec::with_capacity(raw_entity.relations.len());
            for rel in &raw_entity.relations {
                let target = registry.entity(&rel.target).ok_or_else(|| {
                    TabulaError::UnknownRelationTarget {
                        entity: raw_entity.type_name.clone(),
                        field: rel.field.clone(),
                        target: rel.target.clone(),
                    }
                })?;
                relations.push(RelationDescriptor {
                    field: rel.field.clone(),
                    cardinality: rel.cardinality,
                    target: rel.target.clone(),
                    target_table: target.table.clone(),
                    fetch: rel.fetch,
                    cascade_store: true,
                });
            }
            registry.entities[index].relations = relations;
        }

        tracing::debug!(
            entity_count = registry.entities.len(),
            "Resolved entity metadata"
        );

        Ok(registry)
    }

    pub fn entity(&self, type_name: &str) -> Option<&EntityDescriptor> {
        self.by_type.get(type_name).map(|&i| &self.entities[i])
    }

    /// Like `entity`, but an unknown type is an error
    pub fn require(&self, type_name: &str) -> Result<&EntityDescriptor> {
        self.entity(type_name)
            .ok_or_else(|| TabulaError::UnknownEntity {
                entity: type_name.to_string(),
            })
    }

    pub fn entity_by_table(&self, table: &str) -> Option<&EntityDescriptor> {
        self.by_table.get(table).map(|&i| &self.entities[i])
    }

    /// Declaration position of a type, used for deterministic ordering
    pub fn position(&self, type_name: &str) -> Option<usize> {
        self.by_type.get(type_name).copied()
    }

    /// All entities in declaration order
    pub fn entities(&self) -> &[EntityDescriptor] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Derive a physical name: explicit wins, else snake_case of the logical name
pub fn derive_name(explicit: Option<&str>, logical: &str) -> String {
    match explicit {
        Some(name) => name.to_string(),
        None => logical.to_case(Case::Snake),
    }
}

fn check_name(entity: &str, name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.starts_with(RESERVED_PREFIX) {
        Some("names starting with '__' are reserved")
    } else if name.contains('"') {
        Some("names cannot contain double quotes")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(TabulaError::InvalidName {
            entity: entity.to_string(),
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn resolve_entity(raw: &RawEntity) -> Result<EntityDescriptor> {
    let entity = raw.type_name.as_str();
    check_name(entity, entity)?;

    let table = derive_name(raw.table.as_deref(), entity);
    check_name(entity, &table)?;

    let ids: Vec<&str> = raw
        .fields
        .iter()
        .filter(|f| f.id)
        .map(|f| f.name.as_str())
        .collect();
    match ids.len() {
        0 => {
            return Err(TabulaError::MissingIdentifier {
                entity: entity.to_string(),
            });
        }
        1 => {}
        _ => {
            return Err(TabulaError::MultipleIdentifiers {
                entity: entity.to_string(),
                fields: ids.iter().map(|s| s.to_string()).collect(),
            });
        }
    }

    let mut columns = Vec::with_capacity(raw.fields.len());
    let mut id_index = 0;
    for (index, field) in raw.fields.iter().enumerate() {
        if field.id {
            if field.sql_type != SqlType::Integer {
                return Err(TabulaError::NonNumericIdentifier {
                    entity: entity.to_string(),
                    field: field.name.clone(),
                    sql_type: field.sql_type.name().to_string(),
                });
            }
            if field.transient {
                return Err(TabulaError::TransientIdentifier {
                    entity: entity.to_string(),
                    field: field.name.clone(),
                });
            }
            id_index = index;
        }

        let column = derive_name(field.column.as_deref(), &field.name);
        check_name(entity, &column)?;

        if !field.transient
            && columns
                .iter()
                .any(|c: &ColumnDescriptor| !c.transient && c.column == column)
        {
            return Err(TabulaError::DuplicateColumn {
                entity: entity.to_string(),
                column,
            });
        }

        columns.push(ColumnDescriptor {
            field: field.name.clone(),
            column,
            sql_type: field.sql_type,
            transient: field.transient,
            is_id: field.id,
        });
    }

    Ok(EntityDescriptor {
        type_name: entity.to_string(),
        table,
        columns,
        relations: Vec::new(),
        id_index,
    })
}

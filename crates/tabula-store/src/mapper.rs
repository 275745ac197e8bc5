//! Result mapper
//!
//! Rebuilds entity records from flat rows. Root rows are deduplicated by
//! identifier; EAGER relations are then loaded with one lookup per entity
//! and relation, to at most `fetch_depth` hops from the root.

use crate::errors::Result;
use crate::executor;
use rusqlite::Connection;
use std::collections::BTreeSet;
use tabula_core::errors::TabulaError;
use tabula_core::metadata::EntityDescriptor;
use tabula_core::relations::{FkPlacement, RelationEdge};
use tabula_core::schema::quote;
use tabula_core::types::{Row, SqlValue};
use tabula_core::{Entity, FetchMode, MetadataRegistry, Related, RelationGraph};

pub struct Mapper<'a> {
    registry: &'a MetadataRegistry,
    graph: &'a RelationGraph,
    fetch_depth: usize,
}

impl<'a> Mapper<'a> {
    pub fn new(
        registry: &'a MetadataRegistry,
        graph: &'a RelationGraph,
        fetch_depth: usize,
    ) -> Self {
        Self {
            registry,
            graph,
            fetch_depth,
        }
    }

    /// Map query rows of `entity_type` into records
    ///
    /// Rows with a NULL identifier are skipped; a repeated identifier keeps
    /// the first row seen.
    pub fn map_rows(
        &self,
        conn: &Connection,
        entity_type: &str,
        rows: &[Row],
    ) -> Result<Vec<Entity>> {
        let descriptor = self.registry.require(entity_type)?;
        let mut seen = BTreeSet::new();
        let mut entities = Vec::new();

        for row in rows {
            let Some(mut entity) = hydrate(descriptor, row)? else {
                continue;
            };
            let Some(id) = entity.id else {
                continue;
            };
            if !seen.insert(id) {
                continue;
            }
            self.load_eager(conn, &mut entity, 0)?;
            entities.push(entity);
        }

        tracing::debug!(
            entity = %entity_type,
            row_count = rows.len(),
            entity_count = entities.len(),
            "Mapped rows"
        );
        Ok(entities)
    }

    /// Load one relation of a stored entity, as a LAZY access would
    ///
    /// Targets get their own EAGER relations within the fetch depth, counting
    /// the requested relation as the first hop.
    pub fn fetch_relation(
        &self,
        conn: &Connection,
        entity_type: &str,
        id: i64,
        field: &str,
    ) -> Result<Related> {
        self.registry.require(entity_type)?;
        let edge = self
            .graph
            .edge(entity_type, field)
            .ok_or_else(|| TabulaError::UnknownRelation {
                entity: entity_type.to_string(),
                field: field.to_string(),
            })?;
        self.load_relation(conn, edge, id, 1)
    }

    fn load_eager(&self, conn: &Connection, entity: &mut Entity, depth: usize) -> Result<()> {
        if depth >= self.fetch_depth {
            return Ok(());
        }
        let Some(id) = entity.id else {
            return Ok(());
        };
        let edges: Vec<&RelationEdge> = self
            .graph
            .edges_from(&entity.entity_type)
            .filter(|e| e.fetch == FetchMode::Eager)
            .collect();

        for edge in edges {
            let related = self.load_relation(conn, edge, id, depth + 1)?;
            entity.relations.insert(edge.field.clone(), related);
        }
        Ok(())
    }

    /// `depth` is the hop count of the loaded targets
    fn load_relation(
        &self,
        conn: &Connection,
        edge: &RelationEdge,
        source_id: i64,
        depth: usize,
    ) -> Result<Related> {
        let target = self.registry.require(&edge.target)?;
        let source = self.registry.require(&edge.source)?;
        let sql = related_sql(source, target, edge);
        let rows = executor::query(conn, &sql, &[SqlValue::Integer(source_id)])?;

        let mut targets = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(mut entity) = hydrate(target, row)? {
                self.load_eager(conn, &mut entity, depth)?;
                targets.push(entity);
            }
        }

        if edge.cardinality.is_to_one() {
            Ok(Related::One(targets.into_iter().next().map(Box::new)))
        } else {
            Ok(Related::Many(targets))
        }
    }
}

/// Targets of `edge` for one source identifier, ordered by target id
fn related_sql(
    source: &EntityDescriptor,
    target: &EntityDescriptor,
    edge: &RelationEdge,
) -> String {
    let target_id = format!("\"t\".{}", quote(&target.id_column().column));
    let columns = select_list(target);

    match &edge.placement {
        FkPlacement::Source { column } => format!(
            concat!(
                "SELECT {} FROM {} AS \"t\" WHERE {} IN ",
                "(SELECT \"s\".{} FROM {} AS \"s\" WHERE \"s\".{} = ?) ORDER BY {}"
            ),
            columns,
            quote(&target.table),
            target_id,
            quote(column),
            quote(&source.table),
            quote(&source.id_column().column),
            target_id
        ),
        FkPlacement::Target { column } => format!(
            "SELECT {} FROM {} AS \"t\" WHERE \"t\".{} = ? ORDER BY {}",
            columns,
            quote(&target.table),
            quote(column),
            target_id
        ),
        FkPlacement::JoinTable {
            table,
            source_column,
            target_column,
        } => format!(
            concat!(
                "SELECT {} FROM {} AS \"t\" INNER JOIN {} AS \"l\" ON \"l\".{} = {} ",
                "WHERE \"l\".{} = ? ORDER BY {}"
            ),
            columns,
            quote(&target.table),
            quote(table),
            quote(target_column),
            target_id,
            quote(source_column),
            target_id
        ),
    }
}

fn select_list(entity: &EntityDescriptor) -> String {
    std::iter::once(entity.id_column())
        .chain(entity.value_columns())
        .map(|c| format!("\"t\".{} AS {}", quote(&c.column), quote(&c.column)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Identifier and scalar fields of one row; `None` when the id is NULL
pub(crate) fn hydrate(descriptor: &EntityDescriptor, row: &Row) -> Result<Option<Entity>> {
    let id_column = descriptor.id_column();
    let id = match row.get(&id_column.column) {
        None | Some(SqlValue::Null) => return Ok(None),
        Some(SqlValue::Integer(id)) => *id,
        Some(other) => {
            return Err(TabulaError::FieldConversion {
                entity: descriptor.type_name.clone(),
                field: id_column.field.clone(),
                value_type: other.type_name().to_string(),
                reason: "identifier must be an integer".to_string(),
            }
            .into());
        }
    };

    let mut entity = Entity::new(descriptor.type_name.clone()).with_id(id);
    for column in descriptor.value_columns() {
        let value = row.get(&column.column).cloned().unwrap_or(SqlValue::Null);
        entity.set(column.field.clone(), value);
    }
    Ok(Some(entity))
}

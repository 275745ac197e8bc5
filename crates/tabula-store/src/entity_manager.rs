//! Entity manager
//!
//! The query and persistence surface over one shared connection. Every
//! cascading store or delete runs in its own transaction, so a failure leaves
//! no partial rows behind.

use crate::errors::Result;
use crate::executor;
use crate::mapper::Mapper;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tabula_core::errors::{ExError, ExErrorKind, TabulaError};
use tabula_core::metadata::EntityDescriptor;
use tabula_core::relations::{FkPlacement, RelationEdge};
use tabula_core::schema::quote;
use tabula_core::types::{Row, SqlValue};
use tabula_core::{log_op_end, log_op_error, log_op_start};
use tabula_core::{
    Cardinality, Entity, MetadataRegistry, Predicate, Predicates, QueryCompiler, Related,
    RelationGraph, Root,
};

#[derive(Clone)]
pub struct EntityManager {
    conn: Arc<Mutex<Connection>>,
    registry: Arc<MetadataRegistry>,
    graph: Arc<RelationGraph>,
    fetch_depth: usize,
}

impl EntityManager {
    pub(crate) fn new(
        conn: Arc<Mutex<Connection>>,
        registry: Arc<MetadataRegistry>,
        graph: Arc<RelationGraph>,
        fetch_depth: usize,
    ) -> Self {
        Self {
            conn,
            registry,
            graph,
            fetch_depth,
        }
    }

    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    /// Insert or update an entity, cascading into every loaded relation slot
    ///
    /// Assigned identifiers are written back into `entity` and its related
    /// records. Unloaded slots are left untouched in the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity type is unknown, an update targets a
    /// missing row, or a statement fails; nothing is written in that case.
    pub fn store(&self, entity: &mut Entity) -> Result<i64> {
        let start = Instant::now();
        let entity_type = entity.entity_type.clone();
        log_op_start!("store", entity = %entity_type);

        let result = self.store_in_transaction(entity);
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(id) => {
                log_op_end!(
                    "store",
                    duration_ms = duration_ms,
                    entity = %entity_type,
                    entity_id = *id
                );
            }
            Err(err) => {
                log_op_error!("store", err, duration_ms = duration_ms, entity = %entity_type);
            }
        }
        result
    }

    fn store_in_transaction(&self, entity: &mut Entity) -> Result<i64> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(crate::errors::from_rusqlite)?;
        let id = Persister {
            conn: &tx,
            registry: &self.registry,
            graph: &self.graph,
        }
        .store(entity, None)?;
        tx.commit().map_err(crate::errors::from_rusqlite)?;
        Ok(id)
    }

    /// Delete an entity and its owned dependents
    ///
    /// Cascades along owning one-to-many and one-to-one edges and removes
    /// join rows; many-to-one targets are never deleted.
    ///
    /// # Errors
    ///
    /// Returns a NotFound error when no row has the identifier.
    pub fn delete(&self, entity_type: &str, id: i64) -> Result<()> {
        let start = Instant::now();
        log_op_start!("delete", entity = %entity_type, entity_id = id);

        let result = self.delete_in_transaction(entity_type, id);
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(removed) => {
                log_op_end!(
                    "delete",
                    duration_ms = duration_ms,
                    entity = %entity_type,
                    row_count = *removed
                );
            }
            Err(err) => {
                log_op_error!("delete", err, duration_ms = duration_ms, entity = %entity_type);
            }
        }
        result.map(|_| ())
    }

    fn delete_in_transaction(&self, entity_type: &str, id: i64) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(crate::errors::from_rusqlite)?;
        let persister = Persister {
            conn: &tx,
            registry: &self.registry,
            graph: &self.graph,
        };
        let mut visited = BTreeSet::new();
        let removed = persister.delete(entity_type, id, &mut visited)?;
        if removed == 0 {
            return Err(TabulaError::EntityNotFound {
                entity: entity_type.to_string(),
                id,
            }
            .into());
        }
        tx.commit().map_err(crate::errors::from_rusqlite)?;
        Ok(removed)
    }

    /// # Errors
    ///
    /// Returns an error for an unknown entity type or a failed query.
    pub fn find_by_id(&self, entity_type: &str, id: i64) -> Result<Option<Entity>> {
        let id_field = self.registry.require(entity_type)?.id_column().field.clone();
        let mut found = self.find(entity_type, |_, predicates| {
            predicates.add(Predicate::eq(id_field, id));
        })?;
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.swap_remove(0))
        })
    }

    /// Find entities matching a filter built by `build`
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn demo(em: &tabula_store::EntityManager) -> tabula_store::Result<()> {
    /// use tabula_core::{Predicate, SortDirection};
    /// let people = em.find("Person", |_, p| {
    ///     p.add(Predicate::eq("name", "john"))
    ///         .sort(SortDirection::Asc, ["age"]);
    /// })?;
    /// # Ok(()) }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a QueryCompilation error for an invalid filter, or an
    /// Execution error if the query fails.
    pub fn find<F>(&self, entity_type: &str, build: F) -> Result<Vec<Entity>>
    where
        F: FnOnce(&mut Root, &mut Predicates),
    {
        let start = Instant::now();
        log_op_start!("find", entity = %entity_type);

        let result = self.find_inner(entity_type, build);
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(found) => {
                log_op_end!(
                    "find",
                    duration_ms = duration_ms,
                    entity = %entity_type,
                    entity_count = found.len()
                );
            }
            Err(err) => {
                log_op_error!("find", err, duration_ms = duration_ms, entity = %entity_type);
            }
        }
        result
    }

    fn find_inner<F>(&self, entity_type: &str, build: F) -> Result<Vec<Entity>>
    where
        F: FnOnce(&mut Root, &mut Predicates),
    {
        let mut root = Root::new(entity_type);
        let mut predicates = Predicates::new();
        build(&mut root, &mut predicates);

        let compiled =
            QueryCompiler::new(&self.registry, &self.graph).compile(&root, &predicates)?;
        let conn = self.conn.lock();
        let rows = executor::query_compiled(&conn, &compiled)?;
        Mapper::new(&self.registry, &self.graph, self.fetch_depth)
            .map_rows(&conn, &compiled.entity, &rows)
    }

    /// # Errors
    ///
    /// Returns an error for an unknown entity type or a failed query.
    pub fn find_all(&self, entity_type: &str) -> Result<Vec<Entity>> {
        self.find(entity_type, |_, _| {})
    }

    /// Number of distinct entities matching a filter; sort and paging are ignored
    ///
    /// # Errors
    ///
    /// Same as `find`.
    pub fn count<F>(&self, entity_type: &str, build: F) -> Result<i64>
    where
        F: FnOnce(&mut Root, &mut Predicates),
    {
        let mut root = Root::new(entity_type);
        let mut predicates = Predicates::new();
        build(&mut root, &mut predicates);

        let compiled =
            QueryCompiler::new(&self.registry, &self.graph).compile_count(&root, &predicates)?;
        let conn = self.conn.lock();
        executor::query_scalar(&conn, &compiled.sql, &compiled.params)
    }

    /// Load one relation of a stored entity
    ///
    /// # Errors
    ///
    /// Returns a QueryCompilation error when the relation is not declared.
    pub fn fetch_relation(&self, entity_type: &str, id: i64, field: &str) -> Result<Related> {
        let conn = self.conn.lock();
        Mapper::new(&self.registry, &self.graph, self.fetch_depth)
            .fetch_relation(&conn, entity_type, id, field)
    }

    /// Run literal SQL; rows come back unmapped
    ///
    /// # Errors
    ///
    /// Returns an Execution error if the statement fails.
    pub fn native_query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let conn = self.conn.lock();
        executor::query(&conn, sql, params)
    }

    /// Run literal SQL and transform each row
    ///
    /// # Errors
    ///
    /// Returns an Execution error if the statement fails, or the first error
    /// returned by `map`.
    pub fn native_query_map<T, F>(
        &self,
        sql: &str,
        params: &[SqlValue],
        mut map: F,
    ) -> Result<Vec<T>>
    where
        F: FnMut(&Row) -> Result<T>,
    {
        self.native_query(sql, params)?
            .iter()
            .map(&mut map)
            .collect()
    }
}

/// The inverse slot a cascaded child must not walk back into, and the
/// foreign-key column it must point at its parent with
struct ParentLink<'e> {
    skip_field: Option<&'e str>,
    fk: Option<(&'e str, i64)>,
}

struct Persister<'c> {
    conn: &'c Connection,
    registry: &'c MetadataRegistry,
    graph: &'c RelationGraph,
}

impl Persister<'_> {
    fn store(&self, entity: &mut Entity, link: Option<ParentLink<'_>>) -> Result<i64> {
        let descriptor = self.registry.require(&entity.entity_type)?;
        let skip = link.as_ref().and_then(|l| l.skip_field);
        let edges: Vec<&RelationEdge> = self
            .graph
            .edges_from(&descriptor.type_name)
            .filter(|e| Some(e.field.as_str()) != skip)
            .collect();

        let mut assignments: Vec<(String, SqlValue)> = descriptor
            .value_columns()
            .map(|c| {
                let value = entity.get(&c.field).cloned().unwrap_or(SqlValue::Null);
                (c.column.clone(), value)
            })
            .collect();

        // To-one targets whose key lives here are stored first
        for edge in edges
            .iter()
            .filter(|e| matches!(e.placement, FkPlacement::Source { .. }))
        {
            let Some(slot) = entity.relations.get_mut(&edge.field) else {
                continue;
            };
            let value = match slot {
                Related::Unloaded => continue,
                Related::One(None) => SqlValue::Null,
                Related::One(Some(target)) => {
                    let child_link = ParentLink {
                        skip_field: edge.inverse.as_deref(),
                        fk: None,
                    };
                    SqlValue::Integer(self.store(target, Some(child_link))?)
                }
                Related::Many(_) => return Err(slot_mismatch(descriptor, edge)),
            };
            assignments.push((edge.foreign_key().to_string(), value));
        }

        if let Some((column, parent_id)) = link.as_ref().and_then(|l| l.fk) {
            assignments.retain(|(c, _)| c != column);
            assignments.push((column.to_string(), SqlValue::Integer(parent_id)));
        }

        let id = match entity.id {
            None => self.insert(descriptor, &assignments)?,
            Some(id) => {
                self.update(descriptor, id, &assignments)?;
                id
            }
        };
        entity.id = Some(id);

        for edge in &edges {
            match &edge.placement {
                FkPlacement::Source { .. } => {}
                FkPlacement::Target { column } => {
                    self.store_dependents(entity, descriptor, edge, column, id)?
                }
                FkPlacement::JoinTable {
                    table,
                    source_column,
                    target_column,
                } => self.store_links(
                    entity,
                    descriptor,
                    edge,
                    table,
                    source_column,
                    target_column,
                    id,
                )?,
            }
        }

        tracing::debug!(entity = %descriptor.type_name, id = id, "Stored entity");
        Ok(id)
    }

    fn insert(
        &self,
        descriptor: &EntityDescriptor,
        assignments: &[(String, SqlValue)],
    ) -> Result<i64> {
        let sql = if assignments.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote(&descriptor.table))
        } else {
            let columns: Vec<String> = assignments.iter().map(|(c, _)| quote(c)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote(&descriptor.table),
                columns.join(", "),
                vec!["?"; assignments.len()].join(", ")
            )
        };
        let values: Vec<SqlValue> = assignments.iter().map(|(_, v)| v.clone()).collect();
        executor::execute(self.conn, &sql, &values)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(
        &self,
        descriptor: &EntityDescriptor,
        id: i64,
        assignments: &[(String, SqlValue)],
    ) -> Result<()> {
        let id_column = quote(&descriptor.id_column().column);
        let sets: Vec<String> = if assignments.is_empty() {
            vec![format!("{} = {}", id_column, id_column)]
        } else {
            assignments
                .iter()
                .map(|(c, _)| format!("{} = ?", quote(c)))
                .collect()
        };
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote(&descriptor.table),
            sets.join(", "),
            id_column
        );
        let mut values: Vec<SqlValue> = assignments.iter().map(|(_, v)| v.clone()).collect();
        values.push(SqlValue::Integer(id));

        if executor::execute(self.conn, &sql, &values)? == 0 {
            return Err(TabulaError::EntityNotFound {
                entity: descriptor.type_name.clone(),
                id,
            }
            .into());
        }
        Ok(())
    }

    /// Store the targets of a relation keyed on their table, then detach
    /// rows that no longer belong to the slot
    fn store_dependents(
        &self,
        entity: &mut Entity,
        descriptor: &EntityDescriptor,
        edge: &RelationEdge,
        column: &str,
        id: i64,
    ) -> Result<()> {
        let Some(slot) = entity.relations.get_mut(&edge.field) else {
            return Ok(());
        };
        let targets: Vec<&mut Entity> = match slot {
            Related::Unloaded => return Ok(()),
            Related::One(None) => Vec::new(),
            Related::One(Some(target)) => vec![target.as_mut()],
            Related::Many(targets) if edge.cardinality == Cardinality::OneToMany => {
                targets.iter_mut().collect()
            }
            Related::Many(_) => return Err(slot_mismatch(descriptor, edge)),
        };

        let mut kept = Vec::with_capacity(targets.len());
        for target in targets {
            let child_link = ParentLink {
                skip_field: edge.inverse.as_deref(),
                fk: Some((column, id)),
            };
            kept.push(self.store(target, Some(child_link))?);
        }

        let target = self.registry.require(&edge.target)?;
        let mut sql = format!(
            "UPDATE {} SET {} = NULL WHERE {} = ?",
            quote(&target.table),
            quote(column),
            quote(column)
        );
        let mut params = vec![SqlValue::Integer(id)];
        if !kept.is_empty() {
            sql.push_str(&format!(
                " AND {} NOT IN ({})",
                quote(&target.id_column().column),
                vec!["?"; kept.len()].join(", ")
            ));
            params.extend(kept.into_iter().map(SqlValue::Integer));
        }
        executor::execute(self.conn, &sql, &params)?;
        Ok(())
    }

    /// Store many-to-many targets and replace this entity's join rows
    #[allow(clippy::too_many_arguments)]
    fn store_links(
        &self,
        entity: &mut Entity,
        descriptor: &EntityDescriptor,
        edge: &RelationEdge,
        table: &str,
        source_column: &str,
        target_column: &str,
        id: i64,
    ) -> Result<()> {
        let Some(slot) = entity.relations.get_mut(&edge.field) else {
            return Ok(());
        };
        let targets = match slot {
            Related::Unloaded => return Ok(()),
            Related::Many(targets) => targets,
            Related::One(_) => return Err(slot_mismatch(descriptor, edge)),
        };

        let mut target_ids = Vec::with_capacity(targets.len());
        for target in targets.iter_mut() {
            let child_link = ParentLink {
                skip_field: edge.inverse.as_deref(),
                fk: None,
            };
            target_ids.push(self.store(target, Some(child_link))?);
        }

        executor::execute(
            self.conn,
            &format!("DELETE FROM {} WHERE {} = ?", quote(table), quote(source_column)),
            &[SqlValue::Integer(id)],
        )?;
        let insert = format!(
            "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?, ?)",
            quote(table),
            quote(source_column),
            quote(target_column)
        );
        for target_id in target_ids {
            executor::execute(
                self.conn,
                &insert,
                &[SqlValue::Integer(id), SqlValue::Integer(target_id)],
            )?;
        }
        Ok(())
    }

    /// Returns the number of entity rows removed
    fn delete(
        &self,
        entity_type: &str,
        id: i64,
        visited: &mut BTreeSet<(String, i64)>,
    ) -> Result<usize> {
        if !visited.insert((entity_type.to_string(), id)) {
            return Ok(0);
        }
        let descriptor = self.registry.require(entity_type)?;
        let id_param = [SqlValue::Integer(id)];
        let mut dependents: Vec<(String, i64)> = Vec::new();

        for edge in self.graph.edges_from(entity_type) {
            match &edge.placement {
                FkPlacement::JoinTable {
                    table,
                    source_column,
                    ..
                } => {
                    executor::execute(
                        self.conn,
                        &format!("DELETE FROM {} WHERE {} = ?", quote(table), quote(source_column)),
                        &id_param,
                    )?;
                }
                FkPlacement::Target { column } if edge.owning => {
                    let target = self.registry.require(&edge.target)?;
                    let sql = format!(
                        "SELECT {} FROM {} WHERE {} = ?",
                        quote(&target.id_column().column),
                        quote(&target.table),
                        quote(column)
                    );
                    dependents.extend(
                        self.ids(&sql, &id_param)?
                            .into_iter()
                            .map(|d| (edge.target.clone(), d)),
                    );
                }
                FkPlacement::Source { column }
                    if edge.owning && edge.cardinality == Cardinality::OneToOne =>
                {
                    let sql = format!(
                        "SELECT {} FROM {} WHERE {} = ? AND {} IS NOT NULL",
                        quote(column),
                        quote(&descriptor.table),
                        quote(&descriptor.id_column().column),
                        quote(column)
                    );
                    dependents.extend(
                        self.ids(&sql, &id_param)?
                            .into_iter()
                            .map(|d| (edge.target.clone(), d)),
                    );
                }
                _ => {}
            }
        }

        let mut removed = executor::execute(
            self.conn,
            &format!(
                "DELETE FROM {} WHERE {} = ?",
                quote(&descriptor.table),
                quote(&descriptor.id_column().column)
            ),
            &id_param,
        )?;
        if removed == 0 {
            return Ok(0);
        }

        for (dependent_type, dependent_id) in dependents {
            removed += self.delete(&dependent_type, dependent_id, visited)?;
        }
        Ok(removed)
    }

    fn ids(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<i64>> {
        Ok(executor::query(self.conn, sql, params)?
            .iter()
            .filter_map(|row| row.get_index(0).and_then(SqlValue::as_i64))
            .collect())
    }
}

fn slot_mismatch(descriptor: &EntityDescriptor, edge: &RelationEdge) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op("store")
        .with_entity(descriptor.type_name.clone())
        .with_column(edge.field.clone())
        .with_message(format!(
            "relation slot does not match cardinality {:?}",
            edge.cardinality
        ))
}

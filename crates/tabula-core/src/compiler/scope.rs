//! Alias scope and join planning

use crate::criteria::{JoinMode, Root};
use crate::errors::{Result, TabulaError};
use crate::metadata::{EntityDescriptor, MetadataRegistry};
use crate::relations::{FkPlacement, RelationGraph};
use crate::schema::quote;

/// `"alias"."column"`
pub(crate) fn qualified(alias: &str, column: &str) -> String {
    format!("{}.{}", quote(alias), quote(column))
}

/// Every physical column of an entity table: id, values, foreign keys
pub(crate) fn physical_columns(entity: &EntityDescriptor, graph: &RelationGraph) -> Vec<String> {
    let mut columns = vec![entity.id_column().column.clone()];
    columns.extend(entity.value_columns().map(|c| c.column.clone()));
    columns.extend(graph.foreign_keys_on(&entity.table).map(|fk| fk.column.clone()));
    columns
}

/// Aliases are spliced into SQL next to generated ones (`"{alias}__link"`,
/// `"__full"`) and split on `.` in column references
fn check_alias(alias: &str) -> Result<()> {
    if alias.is_empty() || alias.contains('.') || alias.contains("__") {
        return Err(TabulaError::InvalidAlias {
            alias: alias.to_string(),
        });
    }
    Ok(())
}

/// Join-table hop of a many-to-many join
#[derive(Debug, Clone)]
pub(crate) struct LinkHop {
    pub table: String,
    pub alias: String,
    pub on: String,
}

#[derive(Debug, Clone)]
pub(crate) struct JoinStep<'a> {
    pub alias: String,
    pub mode: JoinMode,
    pub target: &'a EntityDescriptor,
    pub link: Option<LinkHop>,
    /// Condition tying the joined alias to its parent (or link hop)
    pub on: String,
}

impl JoinStep<'_> {
    /// Render as a join clause; FULL renders as LEFT
    pub fn render(&self) -> String {
        let keyword = match self.mode {
            JoinMode::Inner => "INNER JOIN",
            JoinMode::Left | JoinMode::Full => "LEFT JOIN",
        };
        let mut sql = String::new();
        if let Some(link) = &self.link {
            sql.push_str(&format!(
                " {} {} AS {} ON {}",
                keyword,
                quote(&link.table),
                quote(&link.alias),
                link.on
            ));
        }
        sql.push_str(&format!(
            " {} {} AS {} ON {}",
            keyword,
            quote(&self.target.table),
            quote(&self.alias),
            self.on
        ));
        sql
    }
}

/// Aliases bound by a root and its joins, in binding order
pub(crate) struct Scope<'a> {
    pub root_alias: String,
    pub root: &'a EntityDescriptor,
    pub steps: Vec<JoinStep<'a>>,
    bindings: Vec<(String, &'a EntityDescriptor)>,
}

impl<'a> Scope<'a> {
    pub fn build(
        registry: &'a MetadataRegistry,
        graph: &'a RelationGraph,
        root: &Root,
    ) -> Result<Self> {
        let root_entity = registry.require(root.entity())?;
        check_alias(root.alias())?;
        let mut scope = Scope {
            root_alias: root.alias().to_string(),
            root: root_entity,
            steps: Vec::with_capacity(root.joins().len()),
            bindings: vec![(root.alias().to_string(), root_entity)],
        };

        for join in root.joins() {
            if join.path.is_empty() {
                return Err(TabulaError::UnknownJoinPath {
                    path: join.path.clone(),
                });
            }
            check_alias(&join.alias)?;
            if scope.lookup(&join.alias).is_some() {
                return Err(TabulaError::DuplicateAlias {
                    alias: join.alias.clone(),
                });
            }

            let (parent_alias, field) = match join.path.split_once('.') {
                Some((alias, field)) => (alias.to_string(), field),
                None => (scope.root_alias.clone(), join.path.as_str()),
            };
            let parent = scope
                .lookup(&parent_alias)
                .ok_or_else(|| TabulaError::UnknownAlias {
                    alias: parent_alias.clone(),
                })?;
            let edge = graph
                .edge(&parent.type_name, field)
                .ok_or_else(|| TabulaError::UnknownRelation {
                    entity: parent.type_name.clone(),
                    field: field.to_string(),
                })?;
            let target = registry.require(&edge.target)?;

            let parent_id = qualified(&parent_alias, &parent.id_column().column);
            let target_id = qualified(&join.alias, &target.id_column().column);
            let (link, on) = match &edge.placement {
                FkPlacement::Source { column } => (
                    None,
                    format!("{} = {}", target_id, qualified(&parent_alias, column)),
                ),
                FkPlacement::Target { column } => (
                    None,
                    format!("{} = {}", qualified(&join.alias, column), parent_id),
                ),
                FkPlacement::JoinTable {
                    table,
                    source_column,
                    target_column,
                } => {
                    let link_alias = format!("{}__link", join.alias);
                    let link = LinkHop {
                        table: table.clone(),
                        on: format!("{} = {}", qualified(&link_alias, source_column), parent_id),
                        alias: link_alias.clone(),
                    };
                    let on = format!("{} = {}", target_id, qualified(&link_alias, target_column));
                    (Some(link), on)
                }
            };

            scope.steps.push(JoinStep {
                alias: join.alias.clone(),
                mode: join.mode,
                target,
                link,
                on,
            });
            scope.bindings.push((join.alias.clone(), target));
        }

        Ok(scope)
    }

    pub fn lookup(&self, alias: &str) -> Option<&'a EntityDescriptor> {
        self.bindings
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, e)| *e)
    }

    pub fn has_full_join(&self) -> bool {
        self.steps.iter().any(|s| s.mode == JoinMode::Full)
    }

    /// Resolve `"alias.field"` or `"field"` to a qualified column
    ///
    /// Fields resolve through the descriptor first (identifier included),
    /// then foreign-key columns by name, then to-one relations holding a key.
    pub fn column(&self, graph: &RelationGraph, reference: &str) -> Result<String> {
        let (alias, field) = match reference.split_once('.') {
            Some((alias, field)) => (alias, field),
            None => (self.root_alias.as_str(), reference),
        };
        let entity = self.lookup(alias).ok_or_else(|| TabulaError::UnknownAlias {
            alias: alias.to_string(),
        })?;

        if let Some(column) = entity.column(field) {
            return Ok(qualified(alias, &column.column));
        }
        if let Some(fk) = graph
            .foreign_keys_on(&entity.table)
            .find(|fk| fk.column == field)
        {
            return Ok(qualified(alias, &fk.column));
        }
        if let Some(FkPlacement::Source { column }) =
            graph.edge(&entity.type_name, field).map(|e| &e.placement)
        {
            return Ok(qualified(alias, column));
        }

        Err(TabulaError::UnknownColumn {
            entity: entity.type_name.clone(),
            column: field.to_string(),
        })
    }
}

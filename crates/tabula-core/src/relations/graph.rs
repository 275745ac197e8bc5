//! Relation graph resolution
//!
//! Places every relation physically: which table holds the foreign key, or
//! which join table links a many-to-many pair. Placement is derived from
//! table names alone, so it is stable across runs without extra input.

use crate::errors::{Result, TabulaError};
use crate::metadata::{Cardinality, FetchMode, MetadataRegistry};
use convert_case::{Case, Casing};
use std::collections::{BTreeMap, BTreeSet};

/// Where the linking column(s) of a relation live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FkPlacement {
    /// On the declaring entity's table, pointing at the target
    Source { column: String },
    /// On the target's table, pointing back at the declaring entity
    Target { column: String },
    /// In a synthesized join table
    JoinTable {
        table: String,
        source_column: String,
        target_column: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationEdge {
    pub source: String,
    pub source_table: String,
    pub field: String,
    pub target: String,
    pub target_table: String,
    pub cardinality: Cardinality,
    pub fetch: FetchMode,
    pub cascade_store: bool,
    pub placement: FkPlacement,
    /// Owning direction for cascading deletes
    pub owning: bool,
    /// Field of the paired edge on the target, if the relation is bidirectional
    pub inverse: Option<String>,
}

impl RelationEdge {
    /// The foreign-key column, or the join-table column pointing at the source
    pub fn foreign_key(&self) -> &str {
        match &self.placement {
            FkPlacement::Source { column } | FkPlacement::Target { column } => column,
            FkPlacement::JoinTable { source_column, .. } => source_column,
        }
    }

    pub fn join_table(&self) -> Option<&str> {
        match &self.placement {
            FkPlacement::JoinTable { table, .. } => Some(table),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTable {
    pub name: String,
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
}

/// A foreign-key column added to an entity table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyColumn {
    pub table: String,
    pub column: String,
    pub references: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelationGraph {
    edges: Vec<RelationEdge>,
    index: BTreeMap<(String, String), usize>,
    join_tables: Vec<JoinTable>,
    foreign_keys: Vec<ForeignKeyColumn>,
}

impl RelationGraph {
    /// Resolve physical placement for every declared relation
    ///
    /// # Errors
    ///
    /// Returns a Metadata-kind error when a derived foreign-key column or
    /// join-table name cannot be placed without colliding.
    pub fn resolve(registry: &MetadataRegistry) -> Result<Self> {
        let mut edges: Vec<RelationEdge> = Vec::new();
        for entity in registry.entities() {
            for rel in &entity.relations {
                edges.push(RelationEdge {
                    source: entity.type_name.clone(),
                    source_table: entity.table.clone(),
                    field: rel.field.clone(),
                    target: rel.target.clone(),
                    target_table: rel.target_table.clone(),
                    cardinality: rel.cardinality,
                    fetch: rel.fetch,
                    cascade_store: rel.cascade_store,
                    // Placeholder until the placement passes below run
                    placement: FkPlacement::Source {
                        column: String::new(),
                    },
                    owning: true,
                    inverse: None,
                });
            }
        }

        let pairs = pair_inverses(&edges);
        for (&a, &b) in &pairs {
            edges[a].inverse = Some(edges[b].field.clone());
            edges[a].owning = match edges[a].cardinality {
                Cardinality::OneToMany => true,
                Cardinality::ManyToOne => false,
                // First declared wins for symmetric pairs
                Cardinality::OneToOne | Cardinality::ManyToMany => a < b,
            };
        }

        let mut columns = ColumnAllocator::new(registry);
        let mut foreign_keys = Vec::new();

        // Pass 1: keys held by the declaring side
        for i in 0..edges.len() {
            let edge = &edges[i];
            let holds_key = match edge.cardinality {
                Cardinality::ManyToOne => true,
                Cardinality::OneToOne => edge.owning,
                _ => false,
            };
            if !holds_key {
                continue;
            }
            let column = columns.allocate(
                &edge.source,
                &edge.source_table,
                &[
                    format!("{}_id", edge.target_table),
                    format!("{}_id", snake(&edge.field)),
                ],
            )?;
            foreign_keys.push(ForeignKeyColumn {
                table: edge.source_table.clone(),
                column: column.clone(),
                references: edge.target_table.clone(),
            });
            edges[i].placement = FkPlacement::Source { column };
        }

        // Pass 2: keys held by the target side
        for i in 0..edges.len() {
            let edge = &edges[i];
            let needs_target_key = match edge.cardinality {
                Cardinality::OneToMany => true,
                Cardinality::OneToOne => !edge.owning,
                _ => false,
            };
            if !needs_target_key {
                continue;
            }
            let column = match pairs.get(&i) {
                Some(&j) => edges[j].foreign_key().to_string(),
                None => {
                    let column = columns.allocate(
                        &edge.target,
                        &edge.target_table,
                        &[
                            format!("{}_id", edge.source_table),
                            format!("{}_{}_id", edge.source_table, snake(&edge.field)),
                        ],
                    )?;
                    foreign_keys.push(ForeignKeyColumn {
                        table: edge.target_table.clone(),
                        column: column.clone(),
                        references: edge.source_table.clone(),
                    });
                    column
                }
            };
            edges[i].placement = FkPlacement::Target { column };
        }

        // Pass 3: join tables, owning side first so the inverse can mirror it
        let mut join_tables: Vec<JoinTable> = Vec::new();
        let mut taken_tables: BTreeSet<String> = registry
            .entities()
            .iter()
            .map(|e| e.table.clone())
            .collect();
        for i in 0..edges.len() {
            let edge = &edges[i];
            if edge.cardinality != Cardinality::ManyToMany || !edge.owning {
                continue;
            }
            let mut names = [edge.source_table.clone(), edge.target_table.clone()];
            names.sort();
            let preferred = format!("{}_{}", names[0], names[1]);
            let name = if !taken_tables.contains(&preferred) {
                preferred
            } else {
                let fallback = format!("{}_{}", edge.source_table, snake(&edge.field));
                if taken_tables.contains(&fallback) {
                    return Err(TabulaError::DuplicateTable {
                        table: fallback,
                        first: edge.source.clone(),
                        second: edge.target.clone(),
                    });
                }
                fallback
            };
            taken_tables.insert(name.clone());

            let source_column = format!("{}_id", edge.source_table);
            let target_column = if edge.source_table == edge.target_table {
                format!("{}_id", snake(&edge.field))
            } else {
                format!("{}_id", edge.target_table)
            };
            if source_column == target_column {
                return Err(TabulaError::DuplicateColumn {
                    entity: edge.source.clone(),
                    column: source_column,
                });
            }

            join_tables.push(JoinTable {
                name: name.clone(),
                source_table: edge.source_table.clone(),
                source_column: source_column.clone(),
                target_table: edge.target_table.clone(),
                target_column: target_column.clone(),
            });
            if let Some(&j) = pairs.get(&i) {
                edges[j].placement = FkPlacement::JoinTable {
                    table: name.clone(),
                    source_column: target_column.clone(),
                    target_column: source_column.clone(),
                };
            }
            edges[i].placement = FkPlacement::JoinTable {
                table: name,
                source_column,
                target_column,
            };
        }

        let index = edges
            .iter()
            .enumerate()
            .map(|(i, e)| ((e.source.clone(), e.field.clone()), i))
            .collect();

        let graph = RelationGraph {
            edges,
            index,
            join_tables,
            foreign_keys,
        };

        if graph.has_eager_cycle() {
            tracing::debug!("Eager relation cycle detected; fetch depth bounds recursion");
        }

        Ok(graph)
    }

    pub fn edge(&self, entity: &str, field: &str) -> Option<&RelationEdge> {
        self.index
            .get(&(entity.to_string(), field.to_string()))
            .map(|&i| &self.edges[i])
    }

    /// Edges declared by one entity, in declaration order
    pub fn edges_from<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a RelationEdge> {
        self.edges.iter().filter(move |e| e.source == entity)
    }

    pub fn edges(&self) -> &[RelationEdge] {
        &self.edges
    }

    pub fn inverse_of(&self, edge: &RelationEdge) -> Option<&RelationEdge> {
        edge.inverse
            .as_deref()
            .and_then(|field| self.edge(&edge.target, field))
    }

    pub fn join_tables(&self) -> &[JoinTable] {
        &self.join_tables
    }

    pub fn foreign_keys(&self) -> &[ForeignKeyColumn] {
        &self.foreign_keys
    }

    /// Foreign-key columns physically stored on `table`
    pub fn foreign_keys_on<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = &'a ForeignKeyColumn> {
        self.foreign_keys.iter().filter(move |fk| fk.table == table)
    }

    /// Whether following EAGER edges can revisit an entity type
    pub fn has_eager_cycle(&self) -> bool {
        let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for edge in self.edges.iter().filter(|e| e.fetch == FetchMode::Eager) {
            adjacency
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
        }

        fn visit<'a>(
            node: &'a str,
            adjacency: &BTreeMap<&'a str, Vec<&'a str>>,
            on_path: &mut BTreeSet<&'a str>,
            done: &mut BTreeSet<&'a str>,
        ) -> bool {
            if on_path.contains(node) {
                return true;
            }
            if !done.insert(node) {
                return false;
            }
            on_path.insert(node);
            let cyclic = adjacency
                .get(node)
                .map(|next| next.iter().any(|n| visit(n, adjacency, on_path, done)))
                .unwrap_or(false);
            on_path.remove(node);
            cyclic
        }

        let mut done = BTreeSet::new();
        adjacency
            .keys()
            .any(|node| visit(node, &adjacency, &mut BTreeSet::new(), &mut done))
    }
}

fn snake(name: &str) -> String {
    name.to_case(Case::Snake)
}

/// Pair each edge with its first unpaired complementary edge, both ways
fn pair_inverses(edges: &[RelationEdge]) -> BTreeMap<usize, usize> {
    let mut pairs = BTreeMap::new();
    for i in 0..edges.len() {
        if pairs.contains_key(&i) {
            continue;
        }
        let a = &edges[i];
        let candidate = (0..edges.len()).find(|&j| {
            j != i
                && !pairs.contains_key(&j)
                && edges[j].source == a.target
                && edges[j].target == a.source
                && edges[j].cardinality == a.cardinality.inverse()
        });
        if let Some(j) = candidate {
            pairs.insert(i, j);
            pairs.insert(j, i);
        }
    }
    pairs
}

/// Tracks physical column names per table so foreign keys never collide
struct ColumnAllocator {
    taken: BTreeMap<String, BTreeSet<String>>,
}

impl ColumnAllocator {
    fn new(registry: &MetadataRegistry) -> Self {
        let taken = registry
            .entities()
            .iter()
            .map(|e| {
                let columns = e
                    .columns
                    .iter()
                    .filter(|c| c.is_persistent())
                    .map(|c| c.column.clone())
                    .collect();
                (e.table.clone(), columns)
            })
            .collect();
        Self { taken }
    }

    fn allocate(&mut self, entity: &str, table: &str, candidates: &[String]) -> Result<String> {
        let columns = self.taken.entry(table.to_string()).or_default();
        for candidate in candidates {
            if columns.insert(candidate.clone()) {
                return Ok(candidate.clone());
            }
        }
        Err(TabulaError::DuplicateColumn {
            entity: entity.to_string(),
            column: candidates.first().cloned().unwrap_or_default(),
        })
    }
}

use crate::errors::{Result, TabulaError};
use crate::metadata::{MetadataRegistry, SqlType};
use crate::relations::RelationGraph;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Entity,
    Join,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnDelete {
    SetNull,
    Cascade,
}

impl OnDelete {
    pub fn sql(&self) -> &'static str {
        match self {
            OnDelete::SetNull => "SET NULL",
            OnDelete::Cascade => "CASCADE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
    pub on_delete: OnDelete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub sql_type: SqlType,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignKeyRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub kind: TableKind,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Every managed table: entity tables in declaration order, then join tables
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Catalogue {
    pub tables: Vec<TableSchema>,
}

impl Catalogue {
    pub fn build(registry: &MetadataRegistry, graph: &RelationGraph) -> Self {
        let mut tables = Vec::with_capacity(registry.len() + graph.join_tables().len());

        for entity in registry.entities() {
            let id = entity.id_column();
            let mut columns = vec![ColumnSchema {
                name: id.column.clone(),
                sql_type: SqlType::Integer,
                primary_key: true,
                references: None,
            }];
            columns.extend(entity.value_columns().map(|c| ColumnSchema {
                name: c.column.clone(),
                sql_type: c.sql_type,
                primary_key: false,
                references: None,
            }));
            for fk in graph.foreign_keys_on(&entity.table) {
                columns.push(ColumnSchema {
                    name: fk.column.clone(),
                    sql_type: SqlType::Integer,
                    primary_key: false,
                    references: Some(ForeignKeyRef {
                        table: fk.references.clone(),
                        column: id_column_of(registry, &fk.references),
                        on_delete: OnDelete::SetNull,
                    }),
                });
            }
            tables.push(TableSchema {
                name: entity.table.clone(),
                kind: TableKind::Entity,
                columns,
            });
        }

        for join in graph.join_tables() {
            let link = |column: &str, table: &str| ColumnSchema {
                name: column.to_string(),
                sql_type: SqlType::Integer,
                primary_key: true,
                references: Some(ForeignKeyRef {
                    table: table.to_string(),
                    column: id_column_of(registry, table),
                    on_delete: OnDelete::Cascade,
                }),
            };
            tables.push(TableSchema {
                name: join.name.clone(),
                kind: TableKind::Join,
                columns: vec![
                    link(&join.source_column, &join.source_table),
                    link(&join.target_column, &join.target_table),
                ],
            });
        }

        Catalogue { tables }
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Canonical JSON form, stable for identical catalogues
    ///
    /// # Errors
    ///
    /// Returns a Serialization error if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| TabulaError::Serialization {
            message: format!("catalogue encode failed: {}", e),
        })
    }

    /// # Errors
    ///
    /// Returns a Serialization error for malformed catalogue JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TabulaError::Serialization {
            message: format!("catalogue decode failed: {}", e),
        })
    }
}

fn id_column_of(registry: &MetadataRegistry, table: &str) -> String {
    registry
        .entity_by_table(table)
        .map(|e| e.id_column().column.clone())
        .unwrap_or_else(|| "id".to_string())
}

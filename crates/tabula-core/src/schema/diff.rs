//! Additive catalogue diff
//!
//! Only new tables and new columns are representable. Anything that would
//! lose data or reinterpret it is rejected instead.

use super::catalogue::{Catalogue, ColumnSchema, TableSchema};
use super::ddl;
use crate::errors::{Result, TabulaError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    CreateTable(TableSchema),
    AddColumn { table: TableSchema, column: ColumnSchema },
}

impl SchemaChange {
    pub fn to_sql(&self) -> String {
        match self {
            SchemaChange::CreateTable(table) => ddl::create_table(table),
            SchemaChange::AddColumn { table, column } => ddl::add_column(table, column),
        }
    }
}

/// Changes that turn `old` into `new`
///
/// # Errors
///
/// Returns `DestructiveChange` when a table or column disappears or a
/// column's key/reference changes, and `IncompatibleColumn` when a column
/// changes type.
pub fn diff_catalogues(old: &Catalogue, new: &Catalogue) -> Result<Vec<SchemaChange>> {
    for table in &old.tables {
        if new.table(&table.name).is_none() {
            return Err(TabulaError::DestructiveChange {
                table: table.name.clone(),
                reason: "table would be dropped".to_string(),
            });
        }
    }

    let mut changes = Vec::new();
    for table in &new.tables {
        let Some(previous) = old.table(&table.name) else {
            changes.push(SchemaChange::CreateTable(table.clone()));
            continue;
        };

        for column in &previous.columns {
            let Some(current) = table.column(&column.name) else {
                return Err(TabulaError::DestructiveChange {
                    table: table.name.clone(),
                    reason: format!("column {} would be dropped", column.name),
                });
            };
            if current.sql_type.ddl() != column.sql_type.ddl() {
                return Err(TabulaError::IncompatibleColumn {
                    table: table.name.clone(),
                    column: column.name.clone(),
                    from: column.sql_type.name().to_string(),
                    to: current.sql_type.name().to_string(),
                });
            }
            if current.primary_key != column.primary_key || current.references != column.references
            {
                return Err(TabulaError::DestructiveChange {
                    table: table.name.clone(),
                    reason: format!("key constraints of column {} changed", column.name),
                });
            }
        }

        for column in &table.columns {
            if previous.column(&column.name).is_none() {
                if column.primary_key {
                    return Err(TabulaError::DestructiveChange {
                        table: table.name.clone(),
                        reason: format!("primary key column {} cannot be added", column.name),
                    });
                }
                changes.push(SchemaChange::AddColumn {
                    table: table.clone(),
                    column: column.clone(),
                });
            }
        }
    }

    Ok(changes)
}

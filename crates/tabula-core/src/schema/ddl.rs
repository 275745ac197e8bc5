//! DDL rendering
//!
//! Identifiers are always double-quoted. Names reaching this module were
//! validated by the registry, so they never contain a quote character.

use super::catalogue::{Catalogue, ColumnSchema, TableKind, TableSchema};

/// Quote an SQL identifier
pub fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_definition(kind: TableKind, column: &ColumnSchema) -> String {
    let mut def = format!("{} {}", quote(&column.name), column.sql_type.ddl());
    match kind {
        TableKind::Entity if column.primary_key => def.push_str(" PRIMARY KEY AUTOINCREMENT"),
        TableKind::Join => def.push_str(" NOT NULL"),
        TableKind::Entity => {}
    }
    if let Some(fk) = &column.references {
        def.push_str(&format!(
            " REFERENCES {}({}) ON DELETE {}",
            quote(&fk.table),
            quote(&fk.column),
            fk.on_delete.sql()
        ));
    }
    def
}

pub fn create_table(table: &TableSchema) -> String {
    let mut parts: Vec<String> = table
        .columns
        .iter()
        .map(|c| column_definition(table.kind, c))
        .collect();
    if table.kind == TableKind::Join {
        let keys: Vec<String> = table
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| quote(&c.name))
            .collect();
        parts.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }
    format!("CREATE TABLE {} ({})", quote(&table.name), parts.join(", "))
}

pub fn add_column(table: &TableSchema, column: &ColumnSchema) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote(&table.name),
        column_definition(TableKind::Entity, &ColumnSchema {
            primary_key: false,
            ..column.clone()
        })
    )
}

pub fn drop_table(name: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote(name))
}

/// `CREATE TABLE` for every table, in catalogue order
pub fn create_statements(catalogue: &Catalogue) -> Vec<String> {
    catalogue.tables.iter().map(create_table).collect()
}

/// `DROP TABLE` for every table, join tables first
pub fn drop_statements(catalogue: &Catalogue) -> Vec<String> {
    catalogue.tables.iter().rev().map(|t| drop_table(&t.name)).collect()
}

//! Data dump and restore for rollback snapshots

use crate::errors::{from_rusqlite, Result};
use crate::executor;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tabula_core::schema::quote;
use tabula_core::types::SqlValue;
use tabula_core::Catalogue;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableDump {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

/// Every row of every managed table, plus AUTOINCREMENT counters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataDump {
    pub tables: Vec<TableDump>,
    #[serde(default)]
    pub sequences: Vec<(String, i64)>,
}

impl DataDump {
    pub fn row_count(&self) -> usize {
        self.tables.iter().map(|t| t.rows.len()).sum()
    }
}

fn has_sequence_table(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'sqlite_sequence'",
            [],
            |row| row.get(0),
        )
        .map_err(from_rusqlite)?;
    Ok(count > 0)
}

/// Dump the tables named by `catalogue`, rows in rowid order
pub fn dump(conn: &Connection, catalogue: &Catalogue) -> Result<DataDump> {
    let mut dump = DataDump::default();

    for table in &catalogue.tables {
        let columns: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
        let quoted: Vec<String> = columns.iter().map(|c| quote(c)).collect();
        let sql = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            quoted.join(", "),
            quote(&table.name)
        );
        let rows = executor::query(conn, &sql, &[])?
            .into_iter()
            .map(|row| row.into_pairs().into_iter().map(|(_, v)| v).collect())
            .collect();
        dump.tables.push(TableDump {
            table: table.name.clone(),
            columns,
            rows,
        });
    }

    if has_sequence_table(conn)? {
        let mut stmt = conn
            .prepare("SELECT name, seq FROM sqlite_sequence ORDER BY name")
            .map_err(from_rusqlite)?;
        let sequences = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        dump.sequences = sequences
            .into_iter()
            .filter(|(name, _)| catalogue.table(name).is_some())
            .collect();
    }

    Ok(dump)
}

/// Insert dumped rows into freshly created tables
///
/// Foreign keys must be deferred by the caller; tables are filled in dump
/// order, which is not necessarily dependency order.
pub fn restore(conn: &Connection, dump: &DataDump) -> Result<()> {
    for table in &dump.tables {
        if table.rows.is_empty() {
            continue;
        }
        let quoted: Vec<String> = table.columns.iter().map(|c| quote(c)).collect();
        let placeholders = vec!["?"; table.columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(&table.table),
            quoted.join(", "),
            placeholders
        );
        for row in &table.rows {
            executor::execute(conn, &sql, row)?;
        }
    }

    for (name, seq) in &dump.sequences {
        conn.execute("DELETE FROM sqlite_sequence WHERE name = ?1", [name])
            .map_err(from_rusqlite)?;
        conn.execute(
            "INSERT INTO sqlite_sequence (name, seq) VALUES (?1, ?2)",
            params![name, seq],
        )
        .map_err(from_rusqlite)?;
    }

    tracing::debug!(row_count = dump.row_count(), "Restored snapshot data");
    Ok(())
}

//! Query executor
//!
//! Runs SQL with positional `SqlValue` parameters. Works on a plain
//! connection or inside a transaction, which derefs to one.

use crate::errors::{from_rusqlite, Result};
use crate::values::{from_value_ref, to_values};
use rusqlite::{params_from_iter, Connection};
use tabula_core::types::{Row, SqlValue};
use tabula_core::CompiledQuery;

/// Run a row-returning statement
pub fn query(conn: &Connection, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql).map_err(from_rusqlite)?;
    let names: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let mut rows = stmt
        .query(params_from_iter(to_values(params)))
        .map_err(from_rusqlite)?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(from_rusqlite)? {
        let mut mapped = Row::new();
        for (i, name) in names.iter().enumerate() {
            let value = row.get_ref(i).map_err(from_rusqlite)?;
            mapped.push(name.clone(), from_value_ref(value));
        }
        out.push(mapped);
    }

    tracing::debug!(row_count = out.len(), param_count = params.len(), "Executed query");
    Ok(out)
}

/// Run a compiled query
pub fn query_compiled(conn: &Connection, compiled: &CompiledQuery) -> Result<Vec<Row>> {
    query(conn, &compiled.sql, &compiled.params)
}

/// Run a statement that returns no rows; yields the affected row count
pub fn execute(conn: &Connection, sql: &str, params: &[SqlValue]) -> Result<usize> {
    conn.execute(sql, params_from_iter(to_values(params)))
        .map_err(from_rusqlite)
}

/// Run a statement expected to return a single integer, such as a count
pub fn query_scalar(conn: &Connection, sql: &str, params: &[SqlValue]) -> Result<i64> {
    conn.query_row(sql, params_from_iter(to_values(params)), |row| row.get(0))
        .map_err(from_rusqlite)
}

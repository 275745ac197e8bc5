//! Database connection management
//!
//! Provides utilities for opening and configuring SQLite connections

use crate::errors::{from_rusqlite, Result};
use rusqlite::Connection;
use std::path::Path;

/// Name that selects an in-memory database
pub const IN_MEMORY: &str = ":memory:";

/// Open a SQLite database at the given path
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    Connection::open(path).map_err(from_rusqlite)
}

/// Open an in-memory SQLite database
pub fn open_in_memory() -> Result<Connection> {
    Connection::open_in_memory().map_err(from_rusqlite)
}

/// Open by configured name, `:memory:` selecting an in-memory database
pub fn open_named(name: &str) -> Result<Connection> {
    let conn = if name == IN_MEMORY {
        open_in_memory()?
    } else {
        open(name)?
    };
    configure(&conn, name != IN_MEMORY)?;
    Ok(conn)
}

/// Enable foreign keys, and WAL for file-backed databases
///
/// `journal_mode` reports the resulting mode as a row, so it goes through
/// `pragma_update_and_check` rather than a plain execute.
pub fn configure(conn: &Connection, file_backed: bool) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)
        .map_err(from_rusqlite)?;

    if file_backed {
        let _mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(from_rusqlite)?;
    }

    Ok(())
}

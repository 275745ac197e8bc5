//! The `__tabula_schema` table
//!
//! One `current` row records the applied version and its catalogue. When
//! rollback is enabled, `snapshot` rows keep earlier catalogues with their
//! DDL and a data dump; `seq` orders them oldest first.

use super::checksums::compute_checksum;
use super::snapshot::DataDump;
use crate::errors::{from_rusqlite, serialization_error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tabula_core::errors::TabulaError;
use tabula_core::Catalogue;

pub const SCHEMA_TABLE: &str = "__tabula_schema";

const KIND_CURRENT: &str = "current";
const KIND_SNAPSHOT: &str = "snapshot";

/// The applied schema
#[derive(Debug, Clone)]
pub struct CurrentSchema {
    pub version: i64,
    pub catalogue: Catalogue,
    /// Exactly as stored; compared byte-for-byte against the target
    pub catalogue_json: String,
}

#[derive(Debug, Clone)]
pub struct SnapshotRecord {
    pub seq: i64,
    pub version: i64,
    pub catalogue_json: String,
    pub ddl: Vec<String>,
    pub data: DataDump,
    pub created_at: String,
}

pub fn ensure(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL CHECK (kind IN ('current', 'snapshot')),
            version INTEGER NOT NULL,
            catalogue TEXT NOT NULL,
            checksum TEXT NOT NULL,
            ddl TEXT,
            data TEXT,
            applied_at TEXT,
            created_at TEXT
        )",
        SCHEMA_TABLE
    ))
    .map_err(from_rusqlite)
}

fn verify_checksum(catalogue_json: &str, stored: &str) -> Result<()> {
    let actual = compute_checksum(catalogue_json);
    if actual != stored {
        return Err(TabulaError::CatalogueChecksumMismatch {
            expected: stored.to_string(),
            actual,
        }
        .into());
    }
    Ok(())
}

/// The applied schema, or `None` for a database never migrated
pub fn read_current(conn: &Connection) -> Result<Option<CurrentSchema>> {
    let row: Option<(i64, String, String)> = conn
        .query_row(
            &format!(
                "SELECT version, catalogue, checksum FROM \"{}\" WHERE kind = ?1",
                SCHEMA_TABLE
            ),
            [KIND_CURRENT],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()
        .map_err(from_rusqlite)?;

    let Some((version, catalogue_json, checksum)) = row else {
        return Ok(None);
    };
    verify_checksum(&catalogue_json, &checksum)?;
    let catalogue = Catalogue::from_json(&catalogue_json)?;

    Ok(Some(CurrentSchema {
        version,
        catalogue,
        catalogue_json,
    }))
}

/// Replace the `current` row
pub fn write_current(conn: &Connection, version: i64, catalogue_json: &str) -> Result<()> {
    conn.execute(
        &format!("DELETE FROM \"{}\" WHERE kind = ?1", SCHEMA_TABLE),
        [KIND_CURRENT],
    )
    .map_err(from_rusqlite)?;

    conn.execute(
        &format!(
            "INSERT INTO \"{}\" (kind, version, catalogue, checksum, applied_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            SCHEMA_TABLE
        ),
        params![
            KIND_CURRENT,
            version,
            catalogue_json,
            compute_checksum(catalogue_json),
            chrono::Utc::now().to_rfc3339(),
        ],
    )
    .map_err(from_rusqlite)?;

    Ok(())
}

pub fn insert_snapshot(
    conn: &Connection,
    version: i64,
    catalogue_json: &str,
    ddl: &[String],
    data: &DataDump,
) -> Result<()> {
    let ddl_json = serde_json::to_string(ddl).map_err(|e| serialization_error("snapshot", e))?;
    let data_json = serde_json::to_string(data).map_err(|e| serialization_error("snapshot", e))?;

    conn.execute(
        &format!(
            "INSERT INTO \"{}\" (kind, version, catalogue, checksum, ddl, data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            SCHEMA_TABLE
        ),
        params![
            KIND_SNAPSHOT,
            version,
            catalogue_json,
            compute_checksum(catalogue_json),
            ddl_json,
            data_json,
            chrono::Utc::now().to_rfc3339(),
        ],
    )
    .map_err(from_rusqlite)?;

    Ok(())
}

/// Identity of a stored snapshot, without its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub seq: i64,
    pub version: i64,
    /// Checksum of the snapshot's catalogue JSON
    pub checksum: String,
}

/// Every snapshot, oldest first
pub fn snapshot_index(conn: &Connection) -> Result<Vec<SnapshotEntry>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT seq, version, checksum FROM \"{}\" WHERE kind = ?1 ORDER BY seq",
            SCHEMA_TABLE
        ))
        .map_err(from_rusqlite)?;

    let index = stmt
        .query_map([KIND_SNAPSHOT], |row| {
            Ok(SnapshotEntry {
                seq: row.get(0)?,
                version: row.get(1)?,
                checksum: row.get(2)?,
            })
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    Ok(index)
}

pub fn read_snapshot(conn: &Connection, seq: i64) -> Result<SnapshotRecord> {
    let (version, catalogue_json, checksum, ddl_json, data_json, created_at): (
        i64,
        String,
        String,
        String,
        String,
        String,
    ) = conn
        .query_row(
            &format!(
                "SELECT version, catalogue, checksum, ddl, data, created_at
                 FROM \"{}\" WHERE kind = ?1 AND seq = ?2",
                SCHEMA_TABLE
            ),
            params![KIND_SNAPSHOT, seq],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            },
        )
        .map_err(from_rusqlite)?;

    verify_checksum(&catalogue_json, &checksum)?;
    let ddl = serde_json::from_str(&ddl_json).map_err(|e| serialization_error("rollback", e))?;
    let data = serde_json::from_str(&data_json).map_err(|e| serialization_error("rollback", e))?;

    Ok(SnapshotRecord {
        seq,
        version,
        catalogue_json,
        ddl,
        data,
        created_at,
    })
}

/// Delete the snapshot at `seq` and every newer one
pub fn consume_snapshots_from(conn: &Connection, seq: i64) -> Result<usize> {
    conn.execute(
        &format!(
            "DELETE FROM \"{}\" WHERE kind = ?1 AND seq >= ?2",
            SCHEMA_TABLE
        ),
        params![KIND_SNAPSHOT, seq],
    )
    .map_err(from_rusqlite)
}

/// Drop the oldest snapshots beyond `history_size`
pub fn evict(conn: &Connection, history_size: usize) -> Result<usize> {
    let index = snapshot_index(conn)?;
    let excess = tabula_core::migration::eviction_count(index.len(), history_size);
    if excess == 0 {
        return Ok(0);
    }
    let last_evicted = index[excess - 1].seq;

    conn.execute(
        &format!(
            "DELETE FROM \"{}\" WHERE kind = ?1 AND seq <= ?2",
            SCHEMA_TABLE
        ),
        params![KIND_SNAPSHOT, last_evicted],
    )
    .map_err(from_rusqlite)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        ensure(&conn).unwrap();
        conn
    }

    #[test]
    fn test_current_round_trip() {
        let conn = setup_test_db();
        assert!(read_current(&conn).unwrap().is_none());

        write_current(&conn, 1, "{\"tables\":[]}").unwrap();
        write_current(&conn, 2, "{\"tables\":[]}").unwrap();

        let current = read_current(&conn).unwrap().unwrap();
        assert_eq!(current.version, 2);
        assert!(current.catalogue.tables.is_empty());
    }

    #[test]
    fn test_tampered_catalogue_is_detected() {
        let conn = setup_test_db();
        write_current(&conn, 1, "{\"tables\":[]}").unwrap();
        conn.execute(
            "UPDATE __tabula_schema SET catalogue = '{\"tables\": []}' WHERE kind = 'current'",
            [],
        )
        .unwrap();

        let err = read_current(&conn).unwrap_err();
        assert_eq!(err.kind(), tabula_core::ExErrorKind::Migration);
    }

    #[test]
    fn test_eviction_keeps_newest() {
        let conn = setup_test_db();
        for version in 1..=5 {
            insert_snapshot(&conn, version, "{\"tables\":[]}", &[], &DataDump::default()).unwrap();
        }

        assert_eq!(evict(&conn, 3).unwrap(), 2);
        let versions: Vec<i64> = snapshot_index(&conn)
            .unwrap()
            .into_iter()
            .map(|entry| entry.version)
            .collect();
        assert_eq!(versions, vec![3, 4, 5]);
        assert_eq!(evict(&conn, 3).unwrap(), 0);
    }

    #[test]
    fn test_consume_removes_newer_snapshots() {
        let conn = setup_test_db();
        let ddl = vec!["SELECT 1".to_string()];
        for version in 1..=3 {
            insert_snapshot(&conn, version, "{\"tables\":[]}", &ddl, &DataDump::default()).unwrap();
        }
        let index = snapshot_index(&conn).unwrap();
        assert_eq!(index[1].checksum, compute_checksum("{\"tables\":[]}"));
        let snapshot = read_snapshot(&conn, index[1].seq).unwrap();
        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.ddl, vec!["SELECT 1".to_string()]);

        assert_eq!(consume_snapshots_from(&conn, snapshot.seq).unwrap(), 2);
        assert_eq!(snapshot_index(&conn).unwrap().len(), 1);
    }
}

//! Migration runner
//!
//! Executes one planned step (create, update, rollback or nothing) inside a
//! single transaction. On failure the transaction rolls back, so the stored
//! version and every managed table are left as they were.

use super::checksums::compute_checksum;
use super::schema_table::{self, CurrentSchema};
use super::snapshot;
use crate::config::DatabaseConfiguration;
use crate::errors::{from_rusqlite, migration_error, Result};
use rusqlite::Connection;
use std::time::Instant;
use tabula_core::errors::{ExError, ExErrorKind, TabulaError};
use tabula_core::migration::{select_snapshot, SnapshotCandidate};
use tabula_core::schema::ddl::{create_statements, drop_statements};
use tabula_core::schema::diff_catalogues;
use tabula_core::{log_op_end, log_op_error, log_op_start};
use tabula_core::{plan_migration, Catalogue, CreationMode, MigrationState};

/// What a migration step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub state: MigrationState,
    /// Persisted version after the step
    pub version: i64,
}

/// Bring the database to `config.version` with the given target catalogue
///
/// With `rollback_requested`, the newest snapshot whose schema matches
/// `catalogue` is restored regardless of versions.
///
/// # Errors
///
/// Returns a Migration-kind error when the step cannot complete, for example
/// a destructive change or a rollback without an available snapshot. Other
/// failures during the step are wrapped as the error's source.
pub fn migrate(
    conn: &mut Connection,
    catalogue: &Catalogue,
    config: &DatabaseConfiguration,
    rollback_requested: bool,
) -> Result<MigrationOutcome> {
    let start = Instant::now();
    log_op_start!("migrate", schema_version = config.version);

    let result = run(conn, catalogue, config, rollback_requested).map_err(|err| {
        if err.kind() == ExErrorKind::Migration {
            err
        } else {
            migration_error(config.version, err)
        }
    });
    let duration_ms = start.elapsed().as_millis() as u64;

    match &result {
        Ok(outcome) => {
            log_op_end!(
                "migrate",
                duration_ms = duration_ms,
                migration_state = outcome.state.as_str(),
                schema_version = outcome.version
            );
        }
        Err(err) => {
            log_op_error!("migrate", err, duration_ms = duration_ms);
        }
    }

    result
}

fn run(
    conn: &mut Connection,
    catalogue: &Catalogue,
    config: &DatabaseConfiguration,
    rollback_requested: bool,
) -> Result<MigrationOutcome> {
    let target_json = catalogue.to_json()?;
    let tx = conn.transaction().map_err(from_rusqlite)?;
    schema_table::ensure(&tx)?;
    tx.pragma_update(None, "defer_foreign_keys", true)
        .map_err(from_rusqlite)?;

    let current = schema_table::read_current(&tx)?;
    let state = plan_migration(
        current.as_ref().map(|c| c.version),
        config.version,
        rollback_requested,
    );
    tracing::debug!(
        migration_state = state.as_str(),
        persisted = ?current.as_ref().map(|c| c.version),
        target = config.version,
        "Planned migration"
    );

    let version = match (state, current) {
        (MigrationState::None, Some(current)) => {
            if current.catalogue_json != target_json {
                return Err(TabulaError::SchemaDrift {
                    version: current.version,
                }
                .into());
            }
            current.version
        }
        (MigrationState::Create, _) => {
            if config.mode == CreationMode::Create {
                execute_all(&tx, &drop_statements(catalogue), config.version)?;
            }
            execute_all(&tx, &create_statements(catalogue), config.version)?;
            schema_table::write_current(&tx, config.version, &target_json)?;
            config.version
        }
        (MigrationState::Update, Some(current)) => {
            if config.rollback_allowed {
                take_snapshot(&tx, &current, config.rollback_history_size)?;
            }
            match config.mode {
                CreationMode::Update => {
                    let changes = diff_catalogues(&current.catalogue, catalogue)?;
                    let statements: Vec<String> = changes.iter().map(|c| c.to_sql()).collect();
                    execute_all(&tx, &statements, config.version)?;
                }
                CreationMode::Create => {
                    execute_all(&tx, &drop_statements(&current.catalogue), config.version)?;
                    execute_all(&tx, &create_statements(catalogue), config.version)?;
                }
            }
            schema_table::write_current(&tx, config.version, &target_json)?;
            config.version
        }
        (MigrationState::Rollback, current) => {
            if !config.rollback_allowed {
                return Err(TabulaError::RollbackDisabled.into());
            }
            rollback(
                &tx,
                current.as_ref(),
                &target_json,
                config.version,
                rollback_requested,
            )?
        }
        (_, None) => {
            return Err(ExError::new(ExErrorKind::Internal)
                .with_op("migrate")
                .with_message("planned a step that needs a persisted schema, but none exists"));
        }
    };

    tx.commit().map_err(from_rusqlite)?;

    Ok(MigrationOutcome { state, version })
}

/// DDL failures surface as Migration errors carrying the cause
fn execute_all(conn: &Connection, statements: &[String], version: i64) -> Result<()> {
    for sql in statements {
        tracing::debug!(sql = %sql, "Applying DDL");
        conn.execute_batch(sql)
            .map_err(|e| migration_error(version, from_rusqlite(e)))?;
    }
    Ok(())
}

fn take_snapshot(conn: &Connection, current: &CurrentSchema, history_size: usize) -> Result<()> {
    let ddl = create_statements(&current.catalogue);
    let data = snapshot::dump(conn, &current.catalogue)?;
    schema_table::insert_snapshot(conn, current.version, &current.catalogue_json, &ddl, &data)?;
    let evicted = schema_table::evict(conn, history_size)?;

    tracing::debug!(
        schema_version = current.version,
        row_count = data.row_count(),
        evicted = evicted,
        "Took rollback snapshot"
    );
    Ok(())
}

/// Restore the newest snapshot matching `target_json`; returns its version
fn rollback(
    conn: &Connection,
    current: Option<&CurrentSchema>,
    target_json: &str,
    target: i64,
    explicit: bool,
) -> Result<i64> {
    let index = schema_table::snapshot_index(conn)?;
    let target_checksum = compute_checksum(target_json);
    let candidates: Vec<SnapshotCandidate> = index
        .iter()
        .map(|entry| SnapshotCandidate {
            version: entry.version,
            compatible: entry.checksum == target_checksum,
        })
        .collect();

    let Some(position) = select_snapshot(&candidates, target, explicit) else {
        let eligible = candidates.iter().any(|c| explicit || c.version == target);
        return Err(if eligible {
            TabulaError::IncompatibleSnapshot { version: target }
        } else {
            TabulaError::NoRollbackSnapshot { version: target }
        }
        .into());
    };
    let snapshot = schema_table::read_snapshot(conn, index[position].seq)?;
    let snapshot_catalogue = Catalogue::from_json(&snapshot.catalogue_json)?;

    if let Some(current) = current {
        execute_all(conn, &drop_statements(&current.catalogue), snapshot.version)?;
    }
    execute_all(conn, &drop_statements(&snapshot_catalogue), snapshot.version)?;
    execute_all(conn, &snapshot.ddl, snapshot.version)?;
    snapshot::restore(conn, &snapshot.data)?;

    schema_table::write_current(conn, snapshot.version, &snapshot.catalogue_json)?;
    let consumed = schema_table::consume_snapshots_from(conn, snapshot.seq)?;

    tracing::debug!(
        schema_version = snapshot.version,
        taken_at = %snapshot.created_at,
        consumed = consumed,
        "Restored rollback snapshot"
    );
    Ok(snapshot.version)
}

//! Migration planning
//!
//! Deciding what a migration step does is pure; executing it against a
//! connection is the store's job.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a migration step will do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// Persisted version equals the target
    None,
    /// Nothing persisted yet
    Create,
    /// Persisted version is behind the target
    Update,
    /// Persisted version is ahead of the target, or a rollback was requested
    Rollback,
}

impl MigrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationState::None => "none",
            MigrationState::Create => "create",
            MigrationState::Update => "update",
            MigrationState::Rollback => "rollback",
        }
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an UPDATE reshapes existing tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreationMode {
    /// Drop and recreate every managed table
    Create,
    /// Apply additive changes only
    #[default]
    Update,
}

pub fn plan_migration(
    persisted: Option<i64>,
    target: i64,
    rollback_requested: bool,
) -> MigrationState {
    if rollback_requested {
        return MigrationState::Rollback;
    }
    match persisted {
        None => MigrationState::Create,
        Some(v) if v < target => MigrationState::Update,
        Some(v) if v > target => MigrationState::Rollback,
        Some(_) => MigrationState::None,
    }
}

/// A stored rollback snapshot, as seen by snapshot selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotCandidate {
    pub version: i64,
    /// The snapshot's catalogue equals the one built from the descriptors
    pub compatible: bool,
}

/// Pick the snapshot a rollback restores
///
/// `snapshots` are ordered oldest first. Only snapshots compatible with the
/// descriptors qualify. An explicit request takes the newest of them; an
/// implicit one (persisted ahead of target) also requires the target version.
pub fn select_snapshot(
    snapshots: &[SnapshotCandidate],
    target: i64,
    explicit: bool,
) -> Option<usize> {
    snapshots
        .iter()
        .rposition(|s| s.compatible && (explicit || s.version == target))
}

/// How many of the oldest snapshots to drop so at most `history_size` remain
pub fn eviction_count(snapshot_count: usize, history_size: usize) -> usize {
    snapshot_count.saturating_sub(history_size)
}

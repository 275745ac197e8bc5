//! Database handle
//!
//! Opening a database resolves the descriptors, builds the relation graph and
//! catalogue, and runs the migration step before anything else can touch the
//! connection.

use crate::config::DatabaseConfiguration;
use crate::db;
use crate::entity_manager::EntityManager;
use crate::errors::Result;
use crate::migrations::{migrate, MigrationOutcome};
use crate::repository::Repository;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;
use tabula_core::{Catalogue, EntityType, MetadataRegistry, RawEntity, RelationGraph};

pub struct Database {
    conn: Arc<Mutex<Connection>>,
    registry: Arc<MetadataRegistry>,
    graph: Arc<RelationGraph>,
    catalogue: Catalogue,
    config: DatabaseConfiguration,
    outcome: MigrationOutcome,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.config.name)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open and migrate to `config.version`
    ///
    /// # Errors
    ///
    /// Returns a Configuration error for invalid settings, a Metadata error
    /// for malformed descriptors, or a Migration error if the schema cannot
    /// be brought to the target version.
    pub fn open(config: DatabaseConfiguration, entities: &[RawEntity]) -> Result<Self> {
        Self::open_inner(config, entities, false)
    }

    /// Open and restore the newest rollback snapshot taken with the schema
    /// `entities` describe
    ///
    /// # Errors
    ///
    /// As `open`; additionally fails with a Migration error when rollback is
    /// disabled or no snapshot matching `entities` is left.
    pub fn open_with_rollback(
        config: DatabaseConfiguration,
        entities: &[RawEntity],
    ) -> Result<Self> {
        Self::open_inner(config, entities, true)
    }

    fn open_inner(
        config: DatabaseConfiguration,
        entities: &[RawEntity],
        rollback: bool,
    ) -> Result<Self> {
        config.validate()?;
        let registry = MetadataRegistry::resolve(entities)?;
        let graph = RelationGraph::resolve(&registry)?;
        if graph.has_eager_cycle() {
            tracing::info!(
                fetch_depth = config.fetch_depth,
                "EAGER relations form a cycle; loading stops at the fetch depth"
            );
        }
        let catalogue = Catalogue::build(&registry, &graph);

        let mut conn = db::open_named(&config.name)?;
        let outcome = migrate(&mut conn, &catalogue, &config, rollback)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            registry: Arc::new(registry),
            graph: Arc::new(graph),
            catalogue,
            config,
            outcome,
        })
    }

    pub fn entity_manager(&self) -> EntityManager {
        EntityManager::new(
            Arc::clone(&self.conn),
            Arc::clone(&self.registry),
            Arc::clone(&self.graph),
            self.config.fetch_depth,
        )
    }

    pub fn repository<T: EntityType>(&self) -> Repository<T> {
        Repository::new(self.entity_manager())
    }

    /// What the migration at open did
    pub fn outcome(&self) -> MigrationOutcome {
        self.outcome
    }

    /// The catalogue derived from the descriptors given at open
    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &RelationGraph {
        &self.graph
    }

    pub fn config(&self) -> &DatabaseConfiguration {
        &self.config
    }
}

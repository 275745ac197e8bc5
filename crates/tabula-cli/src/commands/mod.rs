pub mod ddl;
pub mod migrate;
pub mod sql;

use std::path::Path;
use tabula_core::RawEntity;
use tabula_store::{Database, DatabaseConfiguration};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Read a JSON array of entity descriptors
pub fn load_entities(path: &Path) -> Result<Vec<RawEntity>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let entities = serde_json::from_str(&content)
        .map_err(|e| format!("invalid descriptors in {}: {}", path.display(), e))?;
    Ok(entities)
}

pub fn open_database(
    config: &Path,
    entities: &Path,
    rollback: bool,
) -> Result<Database, Box<dyn std::error::Error>> {
    let config = DatabaseConfiguration::from_toml_file(config)?;
    let entities = load_entities(entities)?;
    let db = if rollback {
        Database::open_with_rollback(config, &entities)?
    } else {
        Database::open(config, &entities)?
    };
    Ok(db)
}

//! DDL preview command

use super::{load_entities, CommandResult};
use clap::Args;
use std::path::PathBuf;
use tabula_core::schema::ddl::create_statements;
use tabula_core::{Catalogue, MetadataRegistry, RelationGraph};

#[derive(Debug, Args)]
pub struct DdlArgs {
    /// JSON array of entity descriptors
    #[arg(long)]
    pub entities: PathBuf,
}

pub fn execute(args: DdlArgs) -> CommandResult {
    let entities = load_entities(&args.entities)?;
    let registry = MetadataRegistry::resolve(&entities).map_err(tabula_core::ExError::from)?;
    let graph = RelationGraph::resolve(&registry).map_err(tabula_core::ExError::from)?;
    let catalogue = Catalogue::build(&registry, &graph);

    for statement in create_statements(&catalogue) {
        println!("{};", statement);
    }
    Ok(())
}

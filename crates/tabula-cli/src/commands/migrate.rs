//! Migration command

use super::{open_database, CommandResult};
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// TOML database configuration
    #[arg(long)]
    pub config: PathBuf,

    /// JSON array of entity descriptors
    #[arg(long)]
    pub entities: PathBuf,

    /// Restore the newest rollback snapshot instead of migrating forward
    #[arg(long)]
    pub rollback: bool,
}

pub fn execute(args: MigrateArgs) -> CommandResult {
    let db = open_database(&args.config, &args.entities, args.rollback)?;
    let outcome = db.outcome();

    println!("Migration complete:");
    println!("  state: {}", outcome.state);
    println!("  version: {}", outcome.version);
    Ok(())
}

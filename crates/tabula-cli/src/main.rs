//! Tabula CLI
//!
//! Command-line front end: DDL preview, migration and raw SQL

use clap::{Parser, Subcommand};
use tabula_core::logging_facility::{init, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "tabula")]
#[command(about = "Tabula - object-relational mapping over SQLite", long_about = None)]
struct Cli {
    /// Emit development logs (RUST_LOG overrides the filter)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the CREATE TABLE statements for a descriptor set
    Ddl(commands::ddl::DdlArgs),
    /// Open a database, migrating it to the configured version
    Migrate(commands::migrate::MigrateArgs),
    /// Run one raw SQL statement and print rows as JSON lines
    Sql(commands::sql::SqlArgs),
}

fn main() {
    let cli = Cli::parse();
    if cli.verbose {
        init(Profile::Development);
    }

    let result = match cli.command {
        Commands::Ddl(args) => commands::ddl::execute(args),
        Commands::Migrate(args) => commands::migrate::execute(args),
        Commands::Sql(args) => commands::sql::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

//! Raw SQL command

use super::{open_database, CommandResult};
use clap::Args;
use std::path::PathBuf;
use tabula_core::SqlValue;

#[derive(Debug, Args)]
pub struct SqlArgs {
    /// TOML database configuration
    #[arg(long)]
    pub config: PathBuf,

    /// JSON array of entity descriptors
    #[arg(long)]
    pub entities: PathBuf,

    /// Statement with `?` placeholders
    pub sql: String,

    /// Positional parameters: integers, reals, `null`, otherwise text
    pub params: Vec<String>,
}

fn parse_param(raw: &str) -> SqlValue {
    if raw == "null" {
        SqlValue::Null
    } else if let Ok(i) = raw.parse::<i64>() {
        SqlValue::Integer(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        SqlValue::Real(f)
    } else {
        SqlValue::Text(raw.to_string())
    }
}

pub fn execute(args: SqlArgs) -> CommandResult {
    let db = open_database(&args.config, &args.entities, false)?;
    let params: Vec<SqlValue> = args.params.iter().map(|p| parse_param(p)).collect();

    for row in db.entity_manager().native_query(&args.sql, &params)? {
        println!("{}", serde_json::to_string(&row)?);
    }
    Ok(())
}

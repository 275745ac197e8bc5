//! CLI integration tests
//!
//! Run the built `tabula` binary against file-backed databases in a
//! temporary directory.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const ENTITIES: &str = r#"[
  {
    "type_name": "Person",
    "fields": [
      { "name": "id", "sql_type": "INTEGER", "id": true },
      { "name": "name", "sql_type": "TEXT" }
    ],
    "relations": [
      { "field": "books", "target": "Book", "cardinality": "MANY_TO_MANY", "fetch": "EAGER" }
    ]
  },
  {
    "type_name": "Book",
    "fields": [
      { "name": "id", "sql_type": "INTEGER", "id": true },
      { "name": "title", "sql_type": "TEXT" }
    ]
  }
]"#;

fn setup_test_repo(temp_dir: &TempDir, version: i64) -> (PathBuf, PathBuf) {
    let entities = temp_dir.path().join("entities.json");
    fs::write(&entities, ENTITIES).unwrap();

    let config = temp_dir.path().join("tabula.toml");
    let db_path = temp_dir.path().join("library.db");
    fs::write(
        &config,
        format!(
            "name = {:?}\nversion = {}\nrollback_allowed = true\n",
            db_path.to_str().unwrap(),
            version
        ),
    )
    .unwrap();

    (config, entities)
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tabula"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to execute CLI")
}

#[test]
fn test_cli_ddl_prints_create_statements() {
    let temp_dir = TempDir::new().unwrap();
    let (_config, entities) = setup_test_repo(&temp_dir, 1);

    let output = run(temp_dir.path(), &["ddl", "--entities", entities.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("CREATE TABLE \"person\" ("));
    assert!(stdout.contains("CREATE TABLE \"book_person\" ("));
    assert_eq!(stdout.lines().count(), 3);
}

#[test]
fn test_cli_migrate_then_noop() {
    let temp_dir = TempDir::new().unwrap();
    let (config, entities) = setup_test_repo(&temp_dir, 1);
    let args = [
        "migrate",
        "--config",
        config.to_str().unwrap(),
        "--entities",
        entities.to_str().unwrap(),
    ];

    let first = run(temp_dir.path(), &args);
    assert!(first.status.success());
    assert!(String::from_utf8_lossy(&first.stdout).contains("state: create"));

    let second = run(temp_dir.path(), &args);
    assert!(second.status.success());
    let stdout = String::from_utf8_lossy(&second.stdout);
    assert!(stdout.contains("state: none"));
    assert!(stdout.contains("version: 1"));
}

#[test]
fn test_cli_sql_prints_json_rows() {
    let temp_dir = TempDir::new().unwrap();
    let (config, entities) = setup_test_repo(&temp_dir, 1);
    let base = [
        "sql",
        "--config",
        config.to_str().unwrap(),
        "--entities",
        entities.to_str().unwrap(),
    ];

    let mut insert = base.to_vec();
    insert.extend(["INSERT INTO person (name) VALUES (?)", "john"]);
    assert!(run(temp_dir.path(), &insert).status.success());

    let mut select = base.to_vec();
    select.extend(["SELECT id, name FROM person WHERE name = ?", "john"]);
    let output = run(temp_dir.path(), &select);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1);
    let row: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(row["id"]["integer"], 1);
    assert_eq!(row["name"]["text"], "john");
}

#[test]
fn test_cli_rollback_without_snapshot_fails() {
    let temp_dir = TempDir::new().unwrap();
    let (config, entities) = setup_test_repo(&temp_dir, 1);

    let output = run(
        temp_dir.path(),
        &[
            "migrate",
            "--config",
            config.to_str().unwrap(),
            "--entities",
            entities.to_str().unwrap(),
            "--rollback",
        ],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERR_MIGRATION"));
}

#[test]
fn test_cli_rejects_bad_config() {
    let temp_dir = TempDir::new().unwrap();
    let (config, entities) = setup_test_repo(&temp_dir, 1);
    fs::write(&config, "version = 0\n").unwrap();

    let output = run(
        temp_dir.path(),
        &[
            "migrate",
            "--config",
            config.to_str().unwrap(),
            "--entities",
            entities.to_str().unwrap(),
        ],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERR_CONFIGURATION"));
}

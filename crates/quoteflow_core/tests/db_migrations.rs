use quoteflow_core::config::DatabaseConfig;
use quoteflow_core::db::migrations::{current_user_version, latest_version};
use quoteflow_core::db::{open_db, open_db_in_memory, open_with_config, DbError};
use quoteflow_core::repo::quote_repo::SqliteQuoteRepository;
use quoteflow_core::repo::{Collection, RepoError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(current_user_version(&conn).unwrap(), latest_version());
    for collection in Collection::ALL {
        assert_table_exists(&conn, collection.table_name());
    }
}

#[test]
fn foreign_keys_are_enforced() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let err = conn
        .execute(
            "INSERT INTO spaces (id, quote_id, name, position) VALUES ('s1', 'missing', 'Hall', 0);",
            [],
        )
        .unwrap_err();
    assert!(err.to_string().contains("FOREIGN KEY"));
}

#[test]
fn settings_tables_are_seeded_with_one_row() {
    let conn = open_db_in_memory().unwrap();
    let (payment, adjustment): (f64, f64) = conn
        .query_row(
            "SELECT default_payment_percentage, default_adjustment_percentage
             FROM preset_values;",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(payment, 50.0);
    assert_eq!(adjustment, 0.0);

    let templates: i64 = conn
        .query_row("SELECT COUNT(*) FROM template_settings;", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(templates, 1);
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quoteflow.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(current_user_version(&conn_first).unwrap(), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(current_user_version(&conn_second).unwrap(), latest_version());
    let presets: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM preset_values;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(presets, 1);
}

#[test]
fn config_path_selects_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("configured.db");
    let config = DatabaseConfig {
        path: Some(path.to_str().unwrap().to_string()),
        busy_timeout_ms: 250,
    };

    let conn = open_with_config(&config).unwrap();
    assert_eq!(current_user_version(&conn).unwrap(), latest_version());
    assert!(path.exists());
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repositories_reject_unmigrated_connections() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteQuoteRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}

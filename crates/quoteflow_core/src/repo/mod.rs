//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define per-collection data access contracts (the store gateway).
//! - Isolate SQLite query details from service/workflow orchestration.
//!
//! # Invariants
//! - Repository writes call `Schema::validate()` before SQL mutations.
//! - Repository APIs return semantic errors (`NotFound`, `InvalidData`) in
//!   addition to DB transport errors; no store error is swallowed.
//! - Repositories refuse connections that are not fully migrated.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::validation::{EnumField, ValidationError};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod catalog_repo;
pub mod order_repo;
pub mod quote_repo;
pub mod receipt_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Named collection (table) in the quoting store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Quotes,
    Spaces,
    Items,
    Orders,
    Receipts,
    Categories,
    TemplateSettings,
    PresetValues,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Quotes,
        Collection::Spaces,
        Collection::Items,
        Collection::Orders,
        Collection::Receipts,
        Collection::Categories,
        Collection::TemplateSettings,
        Collection::PresetValues,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            Self::Quotes => "quotes",
            Self::Spaces => "spaces",
            Self::Items => "items",
            Self::Orders => "orders",
            Self::Receipts => "receipts",
            Self::Categories => "categories",
            Self::TemplateSettings => "template_settings",
            Self::PresetValues => "preset_values",
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Store-level error for quoting persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Input rejected before reaching SQL.
    Validation(ValidationError),
    /// SQLite reported a failure (constraint, IO, syntax).
    Db(DbError),
    /// Target row does not exist.
    NotFound { collection: Collection, id: Uuid },
    /// A single-row read found a different number of rows.
    RowCount {
        collection: Collection,
        expected: usize,
        actual: usize,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { collection, id } => write!(f, "{collection} row not found: {id}"),
            Self::RowCount {
                collection,
                expected,
                actual,
            } => write!(
                f,
                "expected {expected} row(s) from {collection}, got {actual}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "repository requires table `{table}`"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::RowCount { .. } => None,
            Self::InvalidData(_) => None,
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Rejects connections that are not migrated or lack `collections`.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    collections: &[Collection],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for collection in collections {
        if !table_exists(conn, collection.table_name())? {
            return Err(RepoError::MissingRequiredTable(collection.table_name()));
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn parse_enum<T: EnumField>(value: &str, column: &str) -> RepoResult<T> {
    T::parse_str(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid value `{value}` in {column}")))
}

/// Next zero-based position among rows sharing one parent.
pub(crate) fn next_position(
    conn: &Connection,
    collection: Collection,
    parent_column: &str,
    parent_id: Uuid,
) -> RepoResult<i64> {
    let next = conn.query_row(
        &format!(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM {} WHERE {parent_column} = ?1;",
            collection.table_name()
        ),
        [parent_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(next)
}

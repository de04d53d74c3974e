//! Store contracts and helpers shared by every SQLite repository.
//!
//! # Responsibility
//! - Define the read (`ObjectStore`) and write (`Persister`) capabilities the
//!   lifecycle engine is generic over.
//! - Own the repository error type and row-decoding helpers.
//!
//! # Invariants
//! - Uuid lookups distinguish zero rows (`NotFound`) from several rows
//!   (`AmbiguousResult`).
//! - Repositories refuse connections that are not at the latest schema.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::object::{ObjectKind, ObjectModel, ValidationError};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for vault persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Row failed model validation before a write.
    Validation(ValidationError),
    /// Uuid lookup matched zero rows.
    NotFound { kind: ObjectKind, uuid: Uuid },
    /// Uuid lookup matched more than one row.
    AmbiguousResult {
        kind: ObjectKind,
        uuid: Uuid,
        count: usize,
    },
    /// Hard delete requested for a row that is not soft-deleted.
    LiveObject { kind: ObjectKind, uuid: Uuid },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be decoded into a valid model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { kind, uuid } => write!(f, "{kind} not found: {uuid}"),
            Self::AmbiguousResult { kind, uuid, count } => {
                write!(f, "{kind} uuid {uuid} matched {count} rows")
            }
            Self::LiveObject { kind, uuid } => {
                write!(f, "{kind} {uuid} must be soft-deleted before removal")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "vault repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "vault repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "vault repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted vault data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
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

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Read capability over one object type.
pub trait ObjectStore {
    type Object: ObjectModel;

    /// Loads one row by uuid, including soft-deleted rows.
    fn find_by_uuid(&self, uuid: Uuid) -> RepoResult<Self::Object>;
    /// Lists every row owned by `user_id`, including soft-deleted rows.
    fn find_all_by_user_id(&self, user_id: &str) -> RepoResult<Vec<Self::Object>>;
    /// Lists soft-deleted rows across all users.
    fn find_all_deleted(&self) -> RepoResult<Vec<Self::Object>>;
}

/// Write capability over one object type.
pub trait Persister: ObjectStore {
    /// Inserts (`id == None`) or updates the row and returns it as stored.
    fn save(&self, object: &Self::Object) -> RepoResult<Self::Object>;
    /// Permanently removes a soft-deleted row.
    fn hard_delete(&self, object: &Self::Object) -> RepoResult<()>;
}

/// Reduces uuid lookup results to exactly one row.
pub(crate) fn exactly_one<T>(kind: ObjectKind, uuid: Uuid, mut rows: Vec<T>) -> RepoResult<T> {
    match rows.len() {
        0 => Err(RepoError::NotFound { kind, uuid }),
        1 => Ok(rows.remove(0)),
        count => Err(RepoError::AmbiguousResult { kind, uuid, count }),
    }
}

/// Checks schema version, table and column presence for one store.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    table: &'static str,
    columns: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, table)? {
        return Err(RepoError::MissingRequiredTable(table));
    }

    let present = table_columns(conn, table)?;
    for &column in columns {
        if !present.iter().any(|name| name == column) {
            return Err(RepoError::MissingRequiredColumn { table, column });
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

fn table_columns(conn: &Connection, table: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(1)?);
    }
    Ok(columns)
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_optional_uuid(
    value: Option<String>,
    column: &'static str,
) -> RepoResult<Option<Uuid>> {
    value.map(|text| parse_uuid(&text, column)).transpose()
}

pub(crate) fn parse_flag(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for habits and tags.
//! - Serve list queries as `QuerySource`s over SQLite.
//! - Translate compiled sort keys to SQL through per-table whitelists.
//!
//! # Invariants
//! - Only whitelisted column expressions ever reach an `ORDER BY` clause.
//! - Every ordering ends with the primary key so paging is total.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.

use crate::db::DbError;
use crate::query::{CompiledSort, SortDirection};
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod habit_repo;
pub mod tag_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for habit/tag persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound { entity: &'static str, id: String },
    /// Unique constraint violation (duplicate name).
    Conflict { entity: &'static str, detail: String },
    InvalidData(String),
    /// A compiled sort key names a path with no column.
    UnsortableField(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict { entity, detail } => write!(f, "{entity} conflict: {detail}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UnsortableField(path) => write!(f, "no sortable column for `{path}`"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
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

/// Maps a unique-constraint failure to `Conflict`, anything else to `Db`.
pub(crate) fn conflict_or_db(err: rusqlite::Error, entity: &'static str) -> RepoError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            RepoError::Conflict {
                entity,
                detail: message
                    .clone()
                    .unwrap_or_else(|| "constraint violation".to_string()),
            }
        }
        _ => RepoError::from(err),
    }
}

/// Source path -> SQL column expression whitelist for one table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SortColumns {
    pub columns: &'static [(&'static str, &'static str)],
    pub primary_key: (&'static str, &'static str),
}

impl SortColumns {
    fn column(&self, path: &str) -> Option<&'static str> {
        if path == self.primary_key.0 {
            return Some(self.primary_key.1);
        }
        self.columns
            .iter()
            .find(|(source_path, _)| *source_path == path)
            .map(|(_, column)| *column)
    }

    /// Renders `ORDER BY ...` for `sort`, appending the primary key.
    pub fn order_by(&self, sort: &CompiledSort) -> RepoResult<String> {
        let mut terms = Vec::with_capacity(sort.len() + 1);
        for key in sort.keys() {
            let column = self
                .column(&key.source_field_path)
                .ok_or_else(|| RepoError::UnsortableField(key.source_field_path.clone()))?;
            terms.push(format!("{column} {}", key.direction.as_sql()));
        }
        if !sort.contains_path(self.primary_key.0) {
            terms.push(format!(
                "{} {}",
                self.primary_key.1,
                SortDirection::Ascending.as_sql()
            ));
        }
        Ok(format!(" ORDER BY {}", terms.join(", ")))
    }
}

/// Builds a `LIKE` pattern matching `search` as a literal substring.
///
/// Pair with `ESCAPE '\'`.
pub(crate) fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for ch in search.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

pub(crate) fn to_sql_offset(offset: u64) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

//! Tag repository contract and SQLite implementation.
//!
//! # Invariants
//! - Tag names are unique case-insensitively; a duplicate insert or rename
//!   surfaces as `RepoError::Conflict`.
//! - Deleting a tag cascades to its habit links.

use crate::model::tag::Tag;
use crate::query::{CompiledSort, QuerySource};
use crate::repo::{
    conflict_or_db, like_pattern, to_sql_offset, RepoError, RepoResult, SortColumns,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const TAG_COLUMNS: &str = "id, name, description, created_at_utc, updated_at_utc";

const TAG_SORT_COLUMNS: SortColumns = SortColumns {
    columns: &[
        ("name", "name COLLATE NOCASE"),
        ("description", "description COLLATE NOCASE"),
        ("created_at_utc", "created_at_utc"),
        ("updated_at_utc", "updated_at_utc"),
    ],
    primary_key: ("id", "id"),
};

/// Filter for tag list queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    /// Case-insensitive substring of name or description.
    pub search: Option<String>,
}

impl TagFilter {
    fn where_clause(&self) -> (String, Vec<Value>) {
        match self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
        {
            Some(search) => {
                let pattern = like_pattern(search);
                (
                    " WHERE (name LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\')"
                        .to_string(),
                    vec![Value::Text(pattern.clone()), Value::Text(pattern)],
                )
            }
            None => (String::new(), Vec::new()),
        }
    }
}

/// Repository interface for tag use-cases.
pub trait TagRepository: QuerySource<Item = Tag, Filter = TagFilter, Error = RepoError> {
    fn create_tag(&self, tag: &Tag) -> RepoResult<()>;
    fn get_tag(&self, id: &str) -> RepoResult<Option<Tag>>;
    fn update_tag(&self, tag: &Tag) -> RepoResult<()>;
    fn delete_tag(&self, id: &str) -> RepoResult<()>;
    fn name_taken(&self, name: &str, except_id: Option<&str>) -> RepoResult<bool>;
}

/// SQLite-backed tag repository.
pub struct SqliteTagRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTagRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl QuerySource for SqliteTagRepository<'_> {
    type Item = Tag;
    type Filter = TagFilter;
    type Error = RepoError;

    fn count_matching(&self, filter: &TagFilter) -> RepoResult<u64> {
        let (where_sql, bind_values) = filter.where_clause();
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM tags{where_sql};"),
            params_from_iter(bind_values),
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn fetch_window(
        &self,
        filter: &TagFilter,
        sort: &CompiledSort,
        offset: u64,
        limit: u32,
    ) -> RepoResult<Vec<Tag>> {
        let (where_sql, mut bind_values) = filter.where_clause();
        let order_by = TAG_SORT_COLUMNS.order_by(sort)?;
        bind_values.push(Value::Integer(i64::from(limit)));
        bind_values.push(Value::Integer(to_sql_offset(offset)));

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TAG_COLUMNS} FROM tags{where_sql}{order_by} LIMIT ? OFFSET ?;"
        ))?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(map_tag_row(row)?);
        }
        Ok(tags)
    }
}

impl TagRepository for SqliteTagRepository<'_> {
    fn create_tag(&self, tag: &Tag) -> RepoResult<()> {
        self.conn
            .execute(
                &format!("INSERT INTO tags ({TAG_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5);"),
                params![
                    tag.id,
                    tag.name,
                    tag.description,
                    tag.created_at_utc,
                    tag.updated_at_utc
                ],
            )
            .map_err(|err| conflict_or_db(err, "tag"))?;
        Ok(())
    }

    fn get_tag(&self, id: &str) -> RepoResult<Option<Tag>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TAG_COLUMNS} FROM tags WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(map_tag_row(row)?)),
            None => Ok(None),
        }
    }

    fn update_tag(&self, tag: &Tag) -> RepoResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE tags
                 SET name = ?2, description = ?3, updated_at_utc = ?4
                 WHERE id = ?1;",
                params![tag.id, tag.name, tag.description, tag.updated_at_utc],
            )
            .map_err(|err| conflict_or_db(err, "tag"))?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "tag",
                id: tag.id.clone(),
            });
        }
        Ok(())
    }

    fn delete_tag(&self, id: &str) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM tags WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "tag",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn name_taken(&self, name: &str, except_id: Option<&str>) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM tags
                WHERE name = ?1 COLLATE NOCASE
                  AND (?2 IS NULL OR id <> ?2)
            );",
            params![name.trim(), except_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

fn map_tag_row(row: &Row<'_>) -> RepoResult<Tag> {
    Ok(Tag {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at_utc: row.get("created_at_utc")?,
        updated_at_utc: row.get("updated_at_utc")?,
    })
}

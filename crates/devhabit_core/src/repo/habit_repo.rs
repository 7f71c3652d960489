//! Habit repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist habits with their flattened frequency/target/milestone columns.
//! - Serve filtered, sorted habit windows for list queries.
//! - Own habit-tag link replacement with atomic semantics.
//!
//! # Invariants
//! - Count and window queries share one filter clause.
//! - Enum columns store stable integer codes.
//! - `replace_habit_tags` applies the whole new set in a single transaction.

use crate::model::habit::{
    Frequency, FrequencyType, Habit, HabitStatus, HabitType, Milestone, Target,
};
use crate::query::{CompiledSort, QuerySource};
use crate::repo::{
    conflict_or_db, like_pattern, to_sql_offset, RepoError, RepoResult, SortColumns,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::BTreeSet;

const HABIT_COLUMNS: &str = "id, name, description, habit_type, frequency_type,
    frequency_times_per_period, target_value, target_unit, status, is_archived,
    end_date, milestone_target, milestone_current, created_at_utc, updated_at_utc,
    last_completed_at_utc";

const HABIT_SORT_COLUMNS: SortColumns = SortColumns {
    columns: &[
        ("name", "name COLLATE NOCASE"),
        ("description", "description COLLATE NOCASE"),
        ("kind", "habit_type"),
        ("frequency.kind", "frequency_type"),
        ("frequency.times_per_period", "frequency_times_per_period"),
        ("target.value", "target_value"),
        ("target.unit", "target_unit COLLATE NOCASE"),
        ("status", "status"),
        ("end_date", "end_date"),
        ("created_at_utc", "created_at_utc"),
        ("updated_at_utc", "updated_at_utc"),
        ("last_completed_at_utc", "last_completed_at_utc"),
    ],
    primary_key: ("id", "id"),
};

/// Filter for habit list queries; every set field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HabitFilter {
    /// Case-insensitive substring of name or description.
    pub search: Option<String>,
    pub kind: Option<HabitType>,
    pub status: Option<HabitStatus>,
}

impl HabitFilter {
    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut conditions = Vec::new();
        let mut bind_values = Vec::new();

        if let Some(search) = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
        {
            conditions.push(
                "(name LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\')".to_string(),
            );
            let pattern = like_pattern(search);
            bind_values.push(Value::Text(pattern.clone()));
            bind_values.push(Value::Text(pattern));
        }
        if let Some(kind) = self.kind {
            conditions.push("habit_type = ?".to_string());
            bind_values.push(Value::Integer(habit_type_code(kind)));
        }
        if let Some(status) = self.status {
            conditions.push("status = ?".to_string());
            bind_values.push(Value::Integer(habit_status_code(status)));
        }

        if conditions.is_empty() {
            (String::new(), bind_values)
        } else {
            (format!(" WHERE {}", conditions.join(" AND ")), bind_values)
        }
    }
}

/// Repository interface for habit use-cases.
pub trait HabitRepository:
    QuerySource<Item = Habit, Filter = HabitFilter, Error = RepoError>
{
    fn create_habit(&self, habit: &Habit) -> RepoResult<()>;
    fn get_habit(&self, id: &str) -> RepoResult<Option<Habit>>;
    /// Rewrites every stored column of an existing habit.
    fn update_habit(&self, habit: &Habit) -> RepoResult<()>;
    fn delete_habit(&self, id: &str) -> RepoResult<()>;
    /// Whether another habit already uses `name` (case-insensitive).
    fn name_taken(&self, name: &str, except_id: Option<&str>) -> RepoResult<bool>;
    /// Tag names linked to a habit, sorted by name.
    fn tag_names_for_habit(&self, habit_id: &str) -> RepoResult<Vec<String>>;
    fn tag_ids_for_habit(&self, habit_id: &str) -> RepoResult<BTreeSet<String>>;
    /// Subset of `tag_ids` present in `tags`.
    fn existing_tag_ids(&self, tag_ids: &BTreeSet<String>) -> RepoResult<BTreeSet<String>>;
    /// Makes the habit's link set equal to `tag_ids`.
    ///
    /// Returns `false` when the set was already equal and nothing changed.
    fn replace_habit_tags(
        &self,
        habit_id: &str,
        tag_ids: &BTreeSet<String>,
        now: i64,
    ) -> RepoResult<bool>;
    fn delete_habit_tag(&self, habit_id: &str, tag_id: &str) -> RepoResult<()>;
}

/// SQLite-backed habit repository.
pub struct SqliteHabitRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHabitRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl QuerySource for SqliteHabitRepository<'_> {
    type Item = Habit;
    type Filter = HabitFilter;
    type Error = RepoError;

    fn count_matching(&self, filter: &HabitFilter) -> RepoResult<u64> {
        let (where_sql, bind_values) = filter.where_clause();
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM habits{where_sql};"),
            params_from_iter(bind_values),
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn fetch_window(
        &self,
        filter: &HabitFilter,
        sort: &CompiledSort,
        offset: u64,
        limit: u32,
    ) -> RepoResult<Vec<Habit>> {
        let (where_sql, mut bind_values) = filter.where_clause();
        let order_by = HABIT_SORT_COLUMNS.order_by(sort)?;
        let sql = format!("SELECT {HABIT_COLUMNS} FROM habits{where_sql}{order_by} LIMIT ? OFFSET ?;");
        bind_values.push(Value::Integer(i64::from(limit)));
        bind_values.push(Value::Integer(to_sql_offset(offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut habits = Vec::new();
        while let Some(row) = rows.next()? {
            habits.push(map_habit_row(row)?);
        }
        Ok(habits)
    }
}

impl HabitRepository for SqliteHabitRepository<'_> {
    fn create_habit(&self, habit: &Habit) -> RepoResult<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO habits ({HABIT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16);"
                ),
                params![
                    habit.id,
                    habit.name,
                    habit.description,
                    habit_type_code(habit.kind),
                    frequency_type_code(habit.frequency.kind),
                    habit.frequency.times_per_period,
                    habit.target.value,
                    habit.target.unit,
                    habit_status_code(habit.status),
                    habit.is_archived,
                    habit.end_date,
                    habit.milestone.as_ref().map(|milestone| milestone.target),
                    habit.milestone.as_ref().map(|milestone| milestone.current),
                    habit.created_at_utc,
                    habit.updated_at_utc,
                    habit.last_completed_at_utc,
                ],
            )
            .map_err(|err| conflict_or_db(err, "habit"))?;
        Ok(())
    }

    fn get_habit(&self, id: &str) -> RepoResult<Option<Habit>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(map_habit_row(row)?)),
            None => Ok(None),
        }
    }

    fn update_habit(&self, habit: &Habit) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE habits
             SET
                name = ?2,
                description = ?3,
                habit_type = ?4,
                frequency_type = ?5,
                frequency_times_per_period = ?6,
                target_value = ?7,
                target_unit = ?8,
                status = ?9,
                is_archived = ?10,
                end_date = ?11,
                milestone_target = ?12,
                milestone_current = ?13,
                updated_at_utc = ?14,
                last_completed_at_utc = ?15
             WHERE id = ?1;",
            params![
                habit.id,
                habit.name,
                habit.description,
                habit_type_code(habit.kind),
                frequency_type_code(habit.frequency.kind),
                habit.frequency.times_per_period,
                habit.target.value,
                habit.target.unit,
                habit_status_code(habit.status),
                habit.is_archived,
                habit.end_date,
                habit.milestone.as_ref().map(|milestone| milestone.target),
                habit.milestone.as_ref().map(|milestone| milestone.current),
                habit.updated_at_utc,
                habit.last_completed_at_utc,
            ],
        )
        .map_err(|err| conflict_or_db(err, "habit"))?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "habit",
                id: habit.id.clone(),
            });
        }
        Ok(())
    }

    fn delete_habit(&self, id: &str) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM habits WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "habit",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn name_taken(&self, name: &str, except_id: Option<&str>) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM habits
                WHERE name = ?1 COLLATE NOCASE
                  AND (?2 IS NULL OR id <> ?2)
            );",
            params![name.trim(), except_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn tag_names_for_habit(&self, habit_id: &str) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.name
             FROM habit_tags ht
             INNER JOIN tags t ON t.id = ht.tag_id
             WHERE ht.habit_id = ?1
             ORDER BY t.name COLLATE NOCASE ASC;",
        )?;
        let mut rows = stmt.query([habit_id])?;
        let mut names = Vec::new();
        while let Some(row) = rows.next()? {
            names.push(row.get(0)?);
        }
        Ok(names)
    }

    fn tag_ids_for_habit(&self, habit_id: &str) -> RepoResult<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT tag_id FROM habit_tags WHERE habit_id = ?1;")?;
        let mut rows = stmt.query([habit_id])?;
        let mut ids = BTreeSet::new();
        while let Some(row) = rows.next()? {
            ids.insert(row.get(0)?);
        }
        Ok(ids)
    }

    fn existing_tag_ids(&self, tag_ids: &BTreeSet<String>) -> RepoResult<BTreeSet<String>> {
        if tag_ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        let placeholders = vec!["?"; tag_ids.len()].join(", ");
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id FROM tags WHERE id IN ({placeholders});"))?;
        let mut rows = stmt.query(params_from_iter(tag_ids.iter()))?;
        let mut existing = BTreeSet::new();
        while let Some(row) = rows.next()? {
            existing.insert(row.get(0)?);
        }
        Ok(existing)
    }

    fn replace_habit_tags(
        &self,
        habit_id: &str,
        tag_ids: &BTreeSet<String>,
        now: i64,
    ) -> RepoResult<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let current = self.tag_ids_for_habit(habit_id)?;
        if &current == tag_ids {
            return Ok(false);
        }

        for removed in current.difference(tag_ids) {
            tx.execute(
                "DELETE FROM habit_tags WHERE habit_id = ?1 AND tag_id = ?2;",
                params![habit_id, removed],
            )?;
        }
        for added in tag_ids.difference(&current) {
            tx.execute(
                "INSERT INTO habit_tags (habit_id, tag_id, created_at_utc)
                 VALUES (?1, ?2, ?3);",
                params![habit_id, added, now],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }

    fn delete_habit_tag(&self, habit_id: &str, tag_id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM habit_tags WHERE habit_id = ?1 AND tag_id = ?2;",
            [habit_id, tag_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "habit tag",
                id: format!("{habit_id}/{tag_id}"),
            });
        }
        Ok(())
    }
}

fn map_habit_row(row: &Row<'_>) -> RepoResult<Habit> {
    let milestone_target: Option<u32> = row.get("milestone_target")?;
    let milestone_current: Option<u32> = row.get("milestone_current")?;

    Ok(Habit {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        kind: habit_type_from_code(row.get("habit_type")?)?,
        frequency: Frequency {
            kind: frequency_type_from_code(row.get("frequency_type")?)?,
            times_per_period: row.get("frequency_times_per_period")?,
        },
        target: Target {
            value: row.get("target_value")?,
            unit: row.get("target_unit")?,
        },
        status: habit_status_from_code(row.get("status")?)?,
        is_archived: row.get("is_archived")?,
        end_date: row.get("end_date")?,
        milestone: milestone_target.map(|target| Milestone {
            target,
            current: milestone_current.unwrap_or(0),
        }),
        created_at_utc: row.get("created_at_utc")?,
        updated_at_utc: row.get("updated_at_utc")?,
        last_completed_at_utc: row.get("last_completed_at_utc")?,
    })
}

fn habit_type_code(kind: HabitType) -> i64 {
    match kind {
        HabitType::None => 0,
        HabitType::Binary => 1,
        HabitType::Measurable => 2,
    }
}

fn habit_type_from_code(code: i64) -> RepoResult<HabitType> {
    match code {
        0 => Ok(HabitType::None),
        1 => Ok(HabitType::Binary),
        2 => Ok(HabitType::Measurable),
        other => Err(invalid_code("habits.habit_type", other)),
    }
}

fn habit_status_code(status: HabitStatus) -> i64 {
    match status {
        HabitStatus::None => 0,
        HabitStatus::Ongoing => 1,
        HabitStatus::Completed => 2,
    }
}

fn habit_status_from_code(code: i64) -> RepoResult<HabitStatus> {
    match code {
        0 => Ok(HabitStatus::None),
        1 => Ok(HabitStatus::Ongoing),
        2 => Ok(HabitStatus::Completed),
        other => Err(invalid_code("habits.status", other)),
    }
}

fn frequency_type_code(kind: FrequencyType) -> i64 {
    match kind {
        FrequencyType::None => 0,
        FrequencyType::Daily => 1,
        FrequencyType::Weekly => 2,
        FrequencyType::Monthly => 3,
    }
}

fn frequency_type_from_code(code: i64) -> RepoResult<FrequencyType> {
    match code {
        0 => Ok(FrequencyType::None),
        1 => Ok(FrequencyType::Daily),
        2 => Ok(FrequencyType::Weekly),
        3 => Ok(FrequencyType::Monthly),
        other => Err(invalid_code("habits.frequency_type", other)),
    }
}

fn invalid_code(column: &str, code: i64) -> RepoError {
    RepoError::InvalidData(format!("unknown code `{code}` in {column}"))
}

#[cfg(test)]
mod tests {
    use super::{
        frequency_type_code, frequency_type_from_code, HabitFilter, HabitRepository,
        SqliteHabitRepository, HABIT_SORT_COLUMNS,
    };
    use crate::db::open_db_in_memory;
    use crate::model::habit::{
        CreateHabitDto, Frequency, FrequencyType, Habit, HabitDto, HabitStatus, HabitType, Target,
    };
    use crate::query::{QueryEngine, QuerySource, SortMapping, SortMappingRegistry};
    use crate::repo::RepoError;

    fn habit(name: &str) -> Habit {
        CreateHabitDto {
            name: name.to_string(),
            description: None,
            kind: HabitType::Binary,
            frequency: Frequency {
                kind: FrequencyType::Daily,
                times_per_period: 1,
            },
            target: Target {
                value: 1,
                unit: "times".to_string(),
            },
            end_date: None,
            milestone_target: None,
        }
        .into_entity(1_700_000_000_000)
    }

    #[test]
    fn empty_filter_has_no_where_clause() {
        let (sql, binds) = HabitFilter::default().where_clause();
        assert!(sql.is_empty());
        assert!(binds.is_empty());
    }

    #[test]
    fn filter_combines_search_and_status() {
        let filter = HabitFilter {
            search: Some(" run ".to_string()),
            kind: None,
            status: Some(HabitStatus::Completed),
        };
        let (sql, binds) = filter.where_clause();
        assert!(sql.starts_with(" WHERE (name LIKE ?"));
        assert!(sql.ends_with("AND status = ?"));
        assert_eq!(binds.len(), 3);
    }

    #[test]
    fn frequency_codes_round_trip_and_reject_unknown() {
        for kind in [
            FrequencyType::None,
            FrequencyType::Daily,
            FrequencyType::Weekly,
            FrequencyType::Monthly,
        ] {
            assert_eq!(frequency_type_from_code(frequency_type_code(kind)).unwrap(), kind);
        }
        assert!(matches!(
            frequency_type_from_code(9),
            Err(RepoError::InvalidData(_))
        ));
    }

    #[test]
    fn duplicate_name_is_a_conflict_even_without_service_check() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteHabitRepository::new(&conn);
        repo.create_habit(&habit("Read")).unwrap();

        let err = repo.create_habit(&habit("READ")).unwrap_err();
        assert!(matches!(err, RepoError::Conflict { entity: "habit", .. }));

        let mut renamed = habit("Run");
        repo.create_habit(&renamed).unwrap();
        renamed.name = "read".to_string();
        let err = repo.update_habit(&renamed).unwrap_err();
        assert!(matches!(err, RepoError::Conflict { entity: "habit", .. }));
    }

    #[test]
    fn reversed_mapping_renders_descending_for_client_asc() {
        let registry = SortMappingRegistry::builder()
            .register::<HabitDto, Habit>(vec![SortMapping::new("name", "name").reversed()])
            .unwrap()
            .build();
        let compiled = QueryEngine::new(registry)
            .compile_sort::<HabitDto, Habit>(Some("name asc"))
            .unwrap();
        assert_eq!(
            HABIT_SORT_COLUMNS.order_by(&compiled).unwrap(),
            " ORDER BY name COLLATE NOCASE DESC, id ASC"
        );

        let conn = open_db_in_memory().unwrap();
        let repo = SqliteHabitRepository::new(&conn);
        for name in ["Journal", "Stretch", "meditate"] {
            repo.create_habit(&habit(name)).unwrap();
        }
        let names: Vec<String> = repo
            .fetch_window(&HabitFilter::default(), &compiled, 0, 10)
            .unwrap()
            .into_iter()
            .map(|habit| habit.name)
            .collect();
        assert_eq!(names, vec!["Stretch", "meditate", "Journal"]);
    }
}

//! Habit use-case service.
//!
//! # Responsibility
//! - Serve shaped, sorted, paged habit lists and shaped habit details.
//! - Validate and persist habit writes.
//! - Maintain habit-tag links.
//!
//! # Invariants
//! - `sort` and `fields` are validated before the repository is touched.
//! - Filters always apply, whether or not a search term is present.
//! - Habit names are unique case-insensitively.

use crate::config::PagingConfig;
use crate::model::habit::{
    CreateHabitDto, Habit, HabitDto, HabitPatch, HabitStatus, HabitType, HabitWithTagsDto,
    UpdateHabitDto,
};
use crate::model::now_epoch_ms;
use crate::query::{fetch_page, PageRequest, PaginationResult, QueryEngine, ShapedView};
use crate::repo::habit_repo::{HabitFilter, HabitRepository};
use crate::service::{ServiceError, ServiceResult};
use log::info;
use std::collections::BTreeSet;

/// Client list parameters for habits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HabitQueryParameters {
    /// Case-insensitive substring of name or description.
    pub search: Option<String>,
    pub kind: Option<HabitType>,
    pub status: Option<HabitStatus>,
    /// Comma-separated `field [asc|desc]` list.
    pub sort: Option<String>,
    /// Comma-separated view field names.
    pub fields: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl HabitQueryParameters {
    fn filter(&self) -> HabitFilter {
        HabitFilter {
            search: self.search.clone(),
            kind: self.kind,
            status: self.status,
        }
    }
}

/// Habit service facade over repository implementations.
pub struct HabitService<R: HabitRepository> {
    repo: R,
    engine: QueryEngine,
    paging: PagingConfig,
}

impl<R: HabitRepository> HabitService<R> {
    pub fn new(repo: R, engine: QueryEngine, paging: PagingConfig) -> Self {
        Self {
            repo,
            engine,
            paging,
        }
    }

    /// Lists habits matching `params`, shaped per `params.fields`.
    ///
    /// # Errors
    /// - `Query` when `sort` or `fields` names an unknown field.
    pub fn list_habits(
        &self,
        params: &HabitQueryParameters,
    ) -> ServiceResult<PaginationResult<ShapedView>> {
        let sort = params.sort.as_deref();
        let fields = params.fields.as_deref();
        self.engine.check_sort::<HabitDto, Habit>(sort)?;
        self.engine.check_fields::<HabitDto>(fields)?;

        let compiled = self.engine.compile_sort::<HabitDto, Habit>(sort)?;
        let request = PageRequest::normalized(params.page, params.page_size, &self.paging);
        let page = fetch_page(&self.repo, &params.filter(), &compiled, request)?;

        Ok(page.map_items(|habits| {
            let dtos: Vec<HabitDto> = habits.iter().map(Habit::to_dto).collect();
            self.engine.shape_many(&dtos, fields)
        }))
    }

    /// Gets one habit with its tag names, shaped per `fields`.
    pub fn get_habit(&self, id: &str, fields: Option<&str>) -> ServiceResult<ShapedView> {
        self.engine.check_fields::<HabitWithTagsDto>(fields)?;
        let habit = self.load(id)?;
        let tags = self.repo.tag_names_for_habit(id)?;
        Ok(self.engine.shape(&habit.to_dto_with_tags(tags), fields))
    }

    pub fn create_habit(&self, dto: CreateHabitDto) -> ServiceResult<HabitDto> {
        dto.validate()?;
        self.ensure_name_free(&dto.name, None)?;

        let habit = dto.into_entity(now_epoch_ms());
        self.repo.create_habit(&habit)?;
        info!(
            "event=habit_created module=service status=ok habit_id={}",
            habit.id
        );
        Ok(habit.to_dto())
    }

    /// Replaces every editable field of an existing habit.
    pub fn update_habit(&self, id: &str, dto: UpdateHabitDto) -> ServiceResult<HabitDto> {
        dto.validate()?;
        let mut habit = self.load(id)?;
        self.ensure_name_free(&dto.name, Some(id))?;

        habit.apply_update(dto, now_epoch_ms());
        self.repo.update_habit(&habit)?;
        Ok(habit.to_dto())
    }

    /// Applies a partial name/description update.
    pub fn patch_habit(&self, id: &str, patch: HabitPatch) -> ServiceResult<HabitDto> {
        patch.validate()?;
        let mut habit = self.load(id)?;
        if let Some(name) = patch.name.as_deref() {
            self.ensure_name_free(name, Some(id))?;
        }

        habit.apply_patch(patch, now_epoch_ms());
        self.repo.update_habit(&habit)?;
        Ok(habit.to_dto())
    }

    pub fn delete_habit(&self, id: &str) -> ServiceResult<()> {
        self.repo.delete_habit(id)?;
        info!("event=habit_deleted module=service status=ok habit_id={id}");
        Ok(())
    }

    /// Makes the habit's tag set equal to `tag_ids`.
    ///
    /// Blank ids are ignored and duplicates collapse. Returns `false` when
    /// the set was already equal.
    ///
    /// # Errors
    /// - `NotFound` for an unknown habit.
    /// - `UnknownTags` when any id has no tag; nothing is changed.
    pub fn upsert_habit_tags(&self, habit_id: &str, tag_ids: &[String]) -> ServiceResult<bool> {
        self.load(habit_id)?;
        let requested: BTreeSet<String> = tag_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();

        let existing = self.repo.existing_tag_ids(&requested)?;
        if existing.len() != requested.len() {
            let unknown = requested.difference(&existing).cloned().collect();
            return Err(ServiceError::UnknownTags(unknown));
        }

        let changed = self
            .repo
            .replace_habit_tags(habit_id, &requested, now_epoch_ms())?;
        info!(
            "event=habit_tags_replaced module=service status=ok habit_id={} tags={} changed={}",
            habit_id,
            requested.len(),
            changed
        );
        Ok(changed)
    }

    /// Removes one habit-tag link.
    pub fn remove_habit_tag(&self, habit_id: &str, tag_id: &str) -> ServiceResult<()> {
        self.repo.delete_habit_tag(habit_id, tag_id)?;
        Ok(())
    }

    fn load(&self, id: &str) -> ServiceResult<Habit> {
        self.repo
            .get_habit(id)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "habit",
                id: id.to_string(),
            })
    }

    fn ensure_name_free(&self, name: &str, except_id: Option<&str>) -> ServiceResult<()> {
        if self.repo.name_taken(name, except_id)? {
            return Err(ServiceError::Conflict(format!(
                "habit with name `{}` already exists",
                name.trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{HabitQueryParameters, HabitService};
    use crate::config::PagingConfig;
    use crate::db::open_db_in_memory;
    use crate::model::habit::{CreateHabitDto, Frequency, FrequencyType, HabitPatch, HabitType, Target};
    use crate::model::mappings::build_sort_registry;
    use crate::query::QueryEngine;
    use crate::repo::habit_repo::SqliteHabitRepository;
    use crate::service::ServiceError;
    use rusqlite::Connection;

    fn service(conn: &Connection) -> HabitService<SqliteHabitRepository<'_>> {
        let engine = QueryEngine::new(build_sort_registry().unwrap());
        HabitService::new(
            SqliteHabitRepository::new(conn),
            engine,
            PagingConfig::default(),
        )
    }

    fn dto(name: &str) -> CreateHabitDto {
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
    }

    #[test]
    fn invalid_sort_is_rejected_before_querying() {
        let conn = open_db_in_memory().unwrap();
        let service = service(&conn);
        let params = HabitQueryParameters {
            sort: Some("owner desc".to_string()),
            ..HabitQueryParameters::default()
        };
        let err = service.list_habits(&params).unwrap_err();
        assert!(matches!(err, ServiceError::Query(_)));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn duplicate_name_is_a_conflict() {
        let conn = open_db_in_memory().unwrap();
        let service = service(&conn);
        service.create_habit(dto("Meditate")).unwrap();
        let err = service.create_habit(dto("meditate")).unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn patch_updates_name_and_clears_description() {
        let conn = open_db_in_memory().unwrap();
        let service = service(&conn);
        let mut create = dto("Walk");
        create.description = Some("outside".to_string());
        let created = service.create_habit(create).unwrap();

        let patched = service
            .patch_habit(
                &created.id,
                HabitPatch {
                    name: Some("Long walk".to_string()),
                    description: Some(None),
                },
            )
            .unwrap();
        assert_eq!(patched.name, "Long walk");
        assert_eq!(patched.description, None);
        assert!(patched.updated_at_utc.is_some());
    }

    #[test]
    fn missing_habit_is_not_found() {
        let conn = open_db_in_memory().unwrap();
        let service = service(&conn);
        let err = service.get_habit("h_missing", None).unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(service.delete_habit("h_missing").unwrap_err().status_code(), 404);
    }
}

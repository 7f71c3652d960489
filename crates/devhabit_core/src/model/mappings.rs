//! Sort mapping declarations for every list endpoint.
//!
//! View fields are the camelCase names clients send; source paths are the
//! dotted paths the repositories whitelist.

use crate::model::habit::{Habit, HabitDto};
use crate::model::tag::{Tag, TagDto};
use crate::query::{QueryResult, SortMapping, SortMappingRegistry};

pub fn habit_sort_mappings() -> Vec<SortMapping> {
    vec![
        SortMapping::new("name", "name"),
        SortMapping::new("description", "description"),
        SortMapping::new("type", "kind"),
        SortMapping::new("frequency.type", "frequency.kind"),
        SortMapping::new("frequency.timesPerPeriod", "frequency.times_per_period"),
        SortMapping::new("target.value", "target.value"),
        SortMapping::new("target.unit", "target.unit"),
        SortMapping::new("status", "status"),
        SortMapping::new("endDate", "end_date"),
        SortMapping::new("createdAtUtc", "created_at_utc"),
        SortMapping::new("updatedAtUtc", "updated_at_utc"),
        SortMapping::new("lastCompletedAtUtc", "last_completed_at_utc"),
    ]
}

pub fn tag_sort_mappings() -> Vec<SortMapping> {
    vec![
        SortMapping::new("name", "name"),
        SortMapping::new("description", "description"),
        SortMapping::new("createdAtUtc", "created_at_utc"),
        SortMapping::new("updatedAtUtc", "updated_at_utc"),
    ]
}

/// Builds the process registry; a conflict here is a startup failure.
pub fn build_sort_registry() -> QueryResult<SortMappingRegistry> {
    Ok(SortMappingRegistry::builder()
        .register::<HabitDto, Habit>(habit_sort_mappings())?
        .register::<TagDto, Tag>(tag_sort_mappings())?
        .build())
}

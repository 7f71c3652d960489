//! Habit entity, client views and write payloads.
//!
//! # Responsibility
//! - Define the stored `Habit` record and its nested value objects.
//! - Define `HabitDto`/`HabitWithTagsDto` views and their field tables.
//! - Validate create/update payloads before persistence.
//!
//! # Invariants
//! - New habits start `ongoing`, unarchived, with milestone progress at 0.
//! - `end_date` is a calendar date formatted `YYYY-MM-DD`.
//! - View field names are camelCase and match the serde wire names.

use crate::model::{
    new_prefixed_id, optional_text, require_text, ValidationError,
};
use crate::query::{FieldDescriptor, QueryShape, Shaped};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;

pub const HABIT_NAME_MAX: usize = 100;
pub const HABIT_DESCRIPTION_MAX: usize = 500;
pub const TARGET_UNIT_MAX: usize = 50;

static END_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").expect("valid end date regex")
});

pub type HabitId = String;

/// How a habit is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitType {
    None,
    /// Done / not done.
    Binary,
    /// Progress counted against a target value.
    Measurable,
}

/// Lifecycle of a habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitStatus {
    None,
    Ongoing,
    Completed,
}

/// Period a frequency counts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyType {
    None,
    Daily,
    Weekly,
    Monthly,
}

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!(
                        "unknown {} `{other}`; expected one of: {}",
                        stringify!($name),
                        [$($text),+].join("|")
                    )),
                }
            }
        }
    };
}

text_enum!(HabitType { None => "none", Binary => "binary", Measurable => "measurable" });
text_enum!(HabitStatus { None => "none", Ongoing => "ongoing", Completed => "completed" });
text_enum!(FrequencyType {
    None => "none",
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frequency {
    #[serde(rename = "type")]
    pub kind: FrequencyType,
    pub times_per_period: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub value: u32,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub target: u32,
    pub current: u32,
}

/// Stored habit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Habit {
    pub id: HabitId,
    pub name: String,
    pub description: Option<String>,
    pub kind: HabitType,
    pub frequency: Frequency,
    pub target: Target,
    pub status: HabitStatus,
    pub is_archived: bool,
    pub end_date: Option<String>,
    pub milestone: Option<Milestone>,
    pub created_at_utc: i64,
    pub updated_at_utc: Option<i64>,
    pub last_completed_at_utc: Option<i64>,
}

impl QueryShape for Habit {
    const SHAPE_ID: &'static str = "Habit";
}

impl Habit {
    pub fn to_dto(&self) -> HabitDto {
        HabitDto {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            kind: self.kind,
            frequency: self.frequency.clone(),
            target: self.target.clone(),
            status: self.status,
            is_archived: self.is_archived,
            end_date: self.end_date.clone(),
            milestone: self.milestone.clone(),
            created_at_utc: self.created_at_utc,
            updated_at_utc: self.updated_at_utc,
            last_completed_at_utc: self.last_completed_at_utc,
        }
    }

    pub fn to_dto_with_tags(&self, tags: Vec<String>) -> HabitWithTagsDto {
        HabitWithTagsDto {
            habit: self.to_dto(),
            tags,
        }
    }

    /// Replaces every editable field from `update`; keeps milestone progress.
    pub fn apply_update(&mut self, update: UpdateHabitDto, now: i64) {
        self.name = update.name.trim().to_string();
        self.description = update.description;
        self.kind = update.kind;
        self.frequency = update.frequency;
        self.target = update.target;
        self.end_date = update.end_date;
        if let Some(target) = update.milestone_target {
            let current = self.milestone.as_ref().map_or(0, |milestone| milestone.current);
            self.milestone = Some(Milestone { target, current });
        }
        self.updated_at_utc = Some(now);
    }

    /// Applies a partial update of name and description.
    pub fn apply_patch(&mut self, patch: HabitPatch, now: i64) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        self.updated_at_utc = Some(now);
    }
}

/// Client view of a habit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitDto {
    pub id: HabitId,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: HabitType,
    pub frequency: Frequency,
    pub target: Target,
    pub status: HabitStatus,
    pub is_archived: bool,
    pub end_date: Option<String>,
    pub milestone: Option<Milestone>,
    pub created_at_utc: i64,
    pub updated_at_utc: Option<i64>,
    pub last_completed_at_utc: Option<i64>,
}

impl QueryShape for HabitDto {
    const SHAPE_ID: &'static str = "HabitDto";
}

impl Shaped for HabitDto {
    fn field_table() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::new("id", |h: &Self| json!(h.id)),
            FieldDescriptor::new("name", |h: &Self| json!(h.name)),
            FieldDescriptor::new("description", |h: &Self| json!(h.description)),
            FieldDescriptor::new("type", |h: &Self| json!(h.kind)),
            FieldDescriptor::new("frequency", |h: &Self| json!(h.frequency)),
            FieldDescriptor::new("target", |h: &Self| json!(h.target)),
            FieldDescriptor::new("status", |h: &Self| json!(h.status)),
            FieldDescriptor::new("isArchived", |h: &Self| json!(h.is_archived)),
            FieldDescriptor::new("endDate", |h: &Self| json!(h.end_date)),
            FieldDescriptor::new("milestone", |h: &Self| json!(h.milestone)),
            FieldDescriptor::new("createdAtUtc", |h: &Self| json!(h.created_at_utc)),
            FieldDescriptor::new("updatedAtUtc", |h: &Self| json!(h.updated_at_utc)),
            FieldDescriptor::new("lastCompletedAtUtc", |h: &Self| json!(h.last_completed_at_utc)),
        ]
    }
}

/// Habit detail view including tag names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitWithTagsDto {
    #[serde(flatten)]
    pub habit: HabitDto,
    pub tags: Vec<String>,
}

impl QueryShape for HabitWithTagsDto {
    const SHAPE_ID: &'static str = "HabitWithTagsDto";
}

impl Shaped for HabitWithTagsDto {
    fn field_table() -> Vec<FieldDescriptor<Self>> {
        let mut table: Vec<FieldDescriptor<Self>> = vec![
            FieldDescriptor::new("id", |h: &Self| json!(h.habit.id)),
            FieldDescriptor::new("name", |h: &Self| json!(h.habit.name)),
            FieldDescriptor::new("description", |h: &Self| json!(h.habit.description)),
            FieldDescriptor::new("type", |h: &Self| json!(h.habit.kind)),
            FieldDescriptor::new("frequency", |h: &Self| json!(h.habit.frequency)),
            FieldDescriptor::new("target", |h: &Self| json!(h.habit.target)),
            FieldDescriptor::new("status", |h: &Self| json!(h.habit.status)),
            FieldDescriptor::new("isArchived", |h: &Self| json!(h.habit.is_archived)),
            FieldDescriptor::new("endDate", |h: &Self| json!(h.habit.end_date)),
            FieldDescriptor::new("milestone", |h: &Self| json!(h.habit.milestone)),
            FieldDescriptor::new("createdAtUtc", |h: &Self| json!(h.habit.created_at_utc)),
            FieldDescriptor::new("updatedAtUtc", |h: &Self| json!(h.habit.updated_at_utc)),
            FieldDescriptor::new("lastCompletedAtUtc", |h: &Self| {
                json!(h.habit.last_completed_at_utc)
            }),
        ];
        table.push(FieldDescriptor::new("tags", |h: &Self| json!(h.tags)));
        table
    }
}

/// Payload for creating a habit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHabitDto {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: HabitType,
    pub frequency: Frequency,
    pub target: Target,
    pub end_date: Option<String>,
    pub milestone_target: Option<u32>,
}

impl CreateHabitDto {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_habit_fields(
            &self.name,
            self.description.as_deref(),
            &self.frequency,
            &self.target,
            self.end_date.as_deref(),
            self.milestone_target,
        )
    }

    /// Builds a new stored habit; callers validate first.
    pub fn into_entity(self, now: i64) -> Habit {
        Habit {
            id: new_prefixed_id("h"),
            name: self.name.trim().to_string(),
            description: self.description,
            kind: self.kind,
            frequency: self.frequency,
            target: self.target,
            status: HabitStatus::Ongoing,
            is_archived: false,
            end_date: self.end_date,
            milestone: self
                .milestone_target
                .map(|target| Milestone { target, current: 0 }),
            created_at_utc: now,
            updated_at_utc: None,
            last_completed_at_utc: None,
        }
    }
}

/// Payload for a full habit update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHabitDto {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: HabitType,
    pub frequency: Frequency,
    pub target: Target,
    pub end_date: Option<String>,
    pub milestone_target: Option<u32>,
}

impl UpdateHabitDto {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_habit_fields(
            &self.name,
            self.description.as_deref(),
            &self.frequency,
            &self.target,
            self.end_date.as_deref(),
            self.milestone_target,
        )
    }
}

/// Partial update; `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HabitPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl HabitPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_text("name", name, HABIT_NAME_MAX)?;
        }
        if let Some(description) = &self.description {
            optional_text("description", description.as_deref(), HABIT_DESCRIPTION_MAX)?;
        }
        Ok(())
    }
}

fn validate_habit_fields(
    name: &str,
    description: Option<&str>,
    frequency: &Frequency,
    target: &Target,
    end_date: Option<&str>,
    milestone_target: Option<u32>,
) -> Result<(), ValidationError> {
    require_text("name", name, HABIT_NAME_MAX)?;
    optional_text("description", description, HABIT_DESCRIPTION_MAX)?;
    if frequency.times_per_period == 0 {
        return Err(ValidationError::OutOfRange {
            field: "frequency.timesPerPeriod",
            min: 1,
        });
    }
    if target.value == 0 {
        return Err(ValidationError::OutOfRange {
            field: "target.value",
            min: 1,
        });
    }
    require_text("target.unit", &target.unit, TARGET_UNIT_MAX)?;
    if let Some(date) = end_date {
        if !END_DATE_RE.is_match(date) {
            return Err(ValidationError::InvalidFormat {
                field: "endDate",
                value: date.to_string(),
            });
        }
    }
    if milestone_target == Some(0) {
        return Err(ValidationError::OutOfRange {
            field: "milestone.target",
            min: 1,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        CreateHabitDto, Frequency, FrequencyType, HabitPatch, HabitStatus, HabitType, Target,
    };
    use crate::model::ValidationError;

    fn create_dto() -> CreateHabitDto {
        CreateHabitDto {
            name: "  Read ".to_string(),
            description: Some("pages".to_string()),
            kind: HabitType::Measurable,
            frequency: Frequency {
                kind: FrequencyType::Daily,
                times_per_period: 1,
            },
            target: Target {
                value: 20,
                unit: "pages".to_string(),
            },
            end_date: Some("2026-12-31".to_string()),
            milestone_target: Some(100),
        }
    }

    #[test]
    fn new_habit_starts_ongoing_with_zero_progress() {
        let dto = create_dto();
        dto.validate().unwrap();
        let habit = dto.into_entity(1_000);
        assert!(habit.id.starts_with("h_"));
        assert_eq!(habit.name, "Read");
        assert_eq!(habit.status, HabitStatus::Ongoing);
        assert!(!habit.is_archived);
        assert_eq!(habit.milestone.as_ref().map(|m| m.current), Some(0));
        assert_eq!(habit.created_at_utc, 1_000);
    }

    #[test]
    fn validation_rejects_bad_end_date_and_zero_target() {
        let mut dto = create_dto();
        dto.end_date = Some("31/12/2026".to_string());
        assert!(matches!(
            dto.validate(),
            Err(ValidationError::InvalidFormat { field: "endDate", .. })
        ));

        let mut dto = create_dto();
        dto.target.value = 0;
        assert_eq!(
            dto.validate(),
            Err(ValidationError::OutOfRange {
                field: "target.value",
                min: 1
            })
        );
    }

    #[test]
    fn patch_validation_rejects_blank_name() {
        let patch = HabitPatch {
            name: Some(" ".to_string()),
            description: None,
        };
        assert_eq!(patch.validate(), Err(ValidationError::Required("name")));
    }

    #[test]
    fn enum_text_round_trips_case_insensitively() {
        assert_eq!("Measurable".parse::<HabitType>(), Ok(HabitType::Measurable));
        assert_eq!("weekly".parse::<FrequencyType>(), Ok(FrequencyType::Weekly));
        assert_eq!(HabitStatus::Completed.as_str(), "completed");
        assert!("sometimes".parse::<HabitStatus>().is_err());
    }

    #[test]
    fn dto_serializes_with_camel_case_wire_names() {
        let habit = create_dto().into_entity(5);
        let value = serde_json::to_value(habit.to_dto()).unwrap();
        assert_eq!(value["type"], "measurable");
        assert_eq!(value["frequency"]["timesPerPeriod"], 1);
        assert_eq!(value["isArchived"], false);
    }
}

//! Tag entity, client view and write payloads.
//!
//! # Invariants
//! - Tag names are unique case-insensitively (enforced by storage).
//! - Names are at most 50 characters; descriptions at most 500.

use crate::model::{new_prefixed_id, optional_text, require_text, ValidationError};
use crate::query::{FieldDescriptor, QueryShape, Shaped};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const TAG_NAME_MAX: usize = 50;
pub const TAG_DESCRIPTION_MAX: usize = 500;

pub type TagId = String;

/// Stored tag record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub description: Option<String>,
    pub created_at_utc: i64,
    pub updated_at_utc: Option<i64>,
}

impl QueryShape for Tag {
    const SHAPE_ID: &'static str = "Tag";
}

impl Tag {
    pub fn to_dto(&self) -> TagDto {
        TagDto {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            created_at_utc: self.created_at_utc,
            updated_at_utc: self.updated_at_utc,
        }
    }

    pub fn apply_update(&mut self, update: UpdateTagDto, now: i64) {
        self.name = update.name.trim().to_string();
        self.description = update.description;
        self.updated_at_utc = Some(now);
    }
}

/// Client view of a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDto {
    pub id: TagId,
    pub name: String,
    pub description: Option<String>,
    pub created_at_utc: i64,
    pub updated_at_utc: Option<i64>,
}

impl QueryShape for TagDto {
    const SHAPE_ID: &'static str = "TagDto";
}

impl Shaped for TagDto {
    fn field_table() -> Vec<FieldDescriptor<Self>> {
        vec![
            FieldDescriptor::new("id", |t: &Self| json!(t.id)),
            FieldDescriptor::new("name", |t: &Self| json!(t.name)),
            FieldDescriptor::new("description", |t: &Self| json!(t.description)),
            FieldDescriptor::new("createdAtUtc", |t: &Self| json!(t.created_at_utc)),
            FieldDescriptor::new("updatedAtUtc", |t: &Self| json!(t.updated_at_utc)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTagDto {
    pub name: String,
    pub description: Option<String>,
}

impl CreateTagDto {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_tag_fields(&self.name, self.description.as_deref())
    }

    pub fn into_entity(self, now: i64) -> Tag {
        Tag {
            id: new_prefixed_id("t"),
            name: self.name.trim().to_string(),
            description: self.description,
            created_at_utc: now,
            updated_at_utc: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTagDto {
    pub name: String,
    pub description: Option<String>,
}

impl UpdateTagDto {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_tag_fields(&self.name, self.description.as_deref())
    }
}

fn validate_tag_fields(name: &str, description: Option<&str>) -> Result<(), ValidationError> {
    require_text("name", name, TAG_NAME_MAX)?;
    optional_text("description", description, TAG_DESCRIPTION_MAX)
}

#[cfg(test)]
mod tests {
    use super::{CreateTagDto, TAG_NAME_MAX};
    use crate::model::ValidationError;

    #[test]
    fn name_longer_than_limit_is_rejected() {
        let dto = CreateTagDto {
            name: "x".repeat(TAG_NAME_MAX + 1),
            description: None,
        };
        assert_eq!(
            dto.validate(),
            Err(ValidationError::TooLong {
                field: "name",
                max: TAG_NAME_MAX
            })
        );
    }

    #[test]
    fn into_entity_trims_name_and_assigns_prefixed_id() {
        let tag = CreateTagDto {
            name: " Health ".to_string(),
            description: Some("body".to_string()),
        }
        .into_entity(42);
        assert!(tag.id.starts_with("t_"));
        assert_eq!(tag.name, "Health");
        assert_eq!(tag.to_dto().created_at_utc, 42);
    }
}

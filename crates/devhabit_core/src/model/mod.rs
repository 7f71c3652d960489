//! Domain model for habits and tags.
//!
//! # Responsibility
//! - Define stored entities (source shapes) and client views (view shapes).
//! - Declare each view's shaping field table and sort mappings.
//!
//! # Invariants
//! - Entity ids are prefixed (`h_`, `t_`) time-ordered UUIDs and never reused.
//! - Timestamps are Unix epoch milliseconds in UTC.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub mod habit;
pub mod mappings;
pub mod tag;

/// Input validation failure for create/update payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Required(&'static str),
    TooLong { field: &'static str, max: usize },
    OutOfRange { field: &'static str, min: u32 },
    InvalidFormat { field: &'static str, value: String },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required(field) => write!(f, "`{field}` is required"),
            Self::TooLong { field, max } => {
                write!(f, "`{field}` must be at most {max} characters")
            }
            Self::OutOfRange { field, min } => write!(f, "`{field}` must be at least {min}"),
            Self::InvalidFormat { field, value } => {
                write!(f, "`{field}` has invalid format: `{value}`")
            }
        }
    }
}

impl Error for ValidationError {}

/// Checks a required, length-bounded text value.
pub(crate) fn require_text(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required(field));
    }
    optional_text(field, Some(value), max)
}

/// Checks an optional, length-bounded text value.
pub(crate) fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<(), ValidationError> {
    match value {
        Some(text) if text.chars().count() > max => Err(ValidationError::TooLong { field, max }),
        _ => Ok(()),
    }
}

/// Current time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}

pub(crate) fn new_prefixed_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::now_v7())
}

//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate query validation, repository calls and shaping into
//!   use-case level APIs.
//! - Map every failure to one `ServiceError` with a transport status.
//!
//! # Invariants
//! - Sort and field input is rejected before any repository call.

use crate::model::ValidationError;
use crate::query::QueryError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod habit_service;
pub mod tag_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for habit/tag use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Invalid `sort` or `fields` input, or a registry wiring failure.
    Query(QueryError),
    Validation(ValidationError),
    /// Requested tag ids that do not exist.
    UnknownTags(Vec<String>),
    NotFound { entity: &'static str, id: String },
    Conflict(String),
    Repo(RepoError),
}

impl ServiceError {
    /// HTTP-equivalent status for transport layers.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Query(err) if err.is_client_error() => 400,
            Self::Validation(_) | Self::UnknownTags(_) => 400,
            Self::NotFound { .. } => 404,
            Self::Conflict(_) => 409,
            Self::Query(_) | Self::Repo(_) => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Query(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::UnknownTags(ids) => {
                write!(f, "one or more tag ids are invalid: {}", ids.join(", "))
            }
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(detail) => write!(f, "{detail}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Query(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<QueryError> for ServiceError {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Conflict { entity, detail } => {
                Self::Conflict(format!("{entity} already exists: {detail}"))
            }
            other => Self::Repo(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceError;
    use crate::model::ValidationError;
    use crate::query::QueryError;
    use crate::repo::RepoError;

    #[test]
    fn status_codes_follow_error_kind() {
        let bad_sort = ServiceError::from(QueryError::InvalidSortField {
            view_shape: "HabitDto",
            field: "owner".to_string(),
        });
        let wiring = ServiceError::from(QueryError::InvalidFieldPath {
            view_shape: "HabitDto",
            path: "a b".to_string(),
        });
        let missing = ServiceError::from(RepoError::NotFound {
            entity: "habit",
            id: "h_1".to_string(),
        });
        let duplicate = ServiceError::from(RepoError::Conflict {
            entity: "tag",
            detail: "UNIQUE constraint failed".to_string(),
        });

        assert_eq!(bad_sort.status_code(), 400);
        assert_eq!(wiring.status_code(), 500);
        assert_eq!(missing.status_code(), 404);
        assert_eq!(duplicate.status_code(), 409);
        assert_eq!(
            ServiceError::from(ValidationError::Required("name")).status_code(),
            400
        );
        assert!(bad_sort.is_client_error());
        assert!(!ServiceError::Repo(RepoError::UnsortableField("x".to_string())).is_client_error());
    }
}

//! Generic query-shaping engine.
//!
//! # Responsibility
//! - Translate client `sort` strings into whitelisted, ordered sort keys.
//! - Project result objects into sparse views driven by client `fields`.
//! - Sequence filter, sort, count and pagination against a query source.
//!
//! # Invariants
//! - Client input is validated before any query executes or any view is built.
//! - The sort registry is immutable once built; the metadata cache only grows.
//! - Nothing in this module performs I/O.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod compose;
pub mod engine;
pub mod mapping;
pub mod metadata;
pub mod shaping;
pub mod sort;

pub use compose::{fetch_page, PageRequest, PaginationResult, QuerySource};
pub use engine::QueryEngine;
pub use mapping::{SortMapping, SortMappingRegistry, SortMappingRegistryBuilder, SortMappingSet};
pub use metadata::{FieldDescriptor, FieldMetadataCache, ShapeMetadata};
pub use shaping::{DataShaper, FieldSelection, ShapedView};
pub use sort::{CompiledSort, SortDirection, SortKey};

/// Stable identity of a result type used as a registry/cache key.
pub trait QueryShape: 'static {
    /// Human-readable shape name used in logs and error messages.
    const SHAPE_ID: &'static str;
    /// Source path used as the deterministic tiebreaker when no sort is given.
    const DEFAULT_SORT_FIELD: &'static str = "id";
}

/// A result shape with a declared table of addressable fields.
///
/// The table order is the canonical order of every shaped view.
pub trait Shaped: QueryShape + Sized {
    fn field_table() -> Vec<FieldDescriptor<Self>>;
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while validating client query input or building the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A sort token names a field with no registered mapping.
    InvalidSortField { view_shape: &'static str, field: String },
    /// A fields token names a field the shape does not expose.
    InvalidShapeField { shape: &'static str, field: String },
    /// Duplicate view field or duplicate shape-pair registration.
    RegistrationConflict {
        view_shape: &'static str,
        source_shape: &'static str,
        detail: String,
    },
    /// A mapping path is not a dotted identifier path.
    InvalidFieldPath {
        view_shape: &'static str,
        path: String,
    },
}

impl QueryError {
    /// Whether the error was caused by request input rather than startup wiring.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSortField { .. } | Self::InvalidShapeField { .. }
        )
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSortField { view_shape, field } => {
                write!(f, "the provided sort field `{field}` is not valid for {view_shape}")
            }
            Self::InvalidShapeField { shape, field } => {
                write!(f, "the provided data shaping field `{field}` is not valid for {shape}")
            }
            Self::RegistrationConflict {
                view_shape,
                source_shape,
                detail,
            } => write!(
                f,
                "sort mapping conflict for {view_shape} -> {source_shape}: {detail}"
            ),
            Self::InvalidFieldPath { view_shape, path } => {
                write!(f, "invalid field path `{path}` in sort mappings for {view_shape}")
            }
        }
    }
}

impl Error for QueryError {}

/// Splits a comma-separated client list into trimmed, non-empty tokens.
pub(crate) fn split_tokens(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|token| !token.is_empty())
}

/// Case fold shared by field and sort-field matching.
///
/// Field names are ASCII identifiers, so only ASCII letters are folded.
pub(crate) fn fold_field_name(name: &str) -> String {
    name.to_ascii_lowercase()
}

//! Sort specification parsing and compilation.
//!
//! # Responsibility
//! - Parse `field[ asc|desc]` tokens from a comma-separated client string.
//! - Compile validated tokens into ordered source-path sort keys.
//!
//! # Invariants
//! - Keys keep client token order: the first token is the primary key.
//! - Storage direction is the client direction flipped by `reverse_direction`.
//! - An absent or blank sort compiles to one ascending tiebreaker key.
//! - Compilation never touches a data source.

use crate::query::mapping::SortMappingSet;
use crate::query::{split_tokens, QueryError, QueryResult};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Effective storage direction of one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

impl Display for SortDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One compiled `(source path, direction)` ordering key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub source_field_path: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(source_field_path: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            source_field_path: source_field_path.into(),
            direction,
        }
    }
}

/// Ordered multi-key sort handed verbatim to the storage layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CompiledSort {
    keys: Vec<SortKey>,
}

impl CompiledSort {
    pub fn from_keys(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether some key already orders by `source_field_path`.
    pub fn contains_path(&self, source_field_path: &str) -> bool {
        self.keys
            .iter()
            .any(|key| key.source_field_path == source_field_path)
    }
}

impl Display for CompiledSort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, key) in self.keys.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{} {}", key.source_field_path, key.direction)?;
        }
        Ok(())
    }
}

/// A parsed client sort token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SortToken<'a> {
    pub field: &'a str,
    pub descending: bool,
}

/// Parses one trimmed token. Anything other than `desc` after the field
/// name leaves the client direction ascending.
pub(crate) fn parse_token(token: &str) -> SortToken<'_> {
    let mut parts = token.split_whitespace();
    let field = parts.next().unwrap_or_default();
    let descending = parts
        .next()
        .is_some_and(|direction| direction.eq_ignore_ascii_case("desc"));
    SortToken { field, descending }
}

/// Effective storage direction for a client request on one mapping.
pub fn resolve_direction(client_descending: bool, reverse_direction: bool) -> SortDirection {
    match (client_descending, reverse_direction) {
        (false, false) => SortDirection::Ascending,
        (false, true) => SortDirection::Descending,
        (true, false) => SortDirection::Descending,
        (true, true) => SortDirection::Ascending,
    }
}

/// Compiles `raw_sort` against `mappings`.
///
/// Blank input yields a single ascending key on `default_field`.
///
/// # Errors
/// - `InvalidSortField` when a token has no mapping. Callers are expected to
///   have validated first; this keeps compilation total without panicking.
pub fn compile(
    mappings: &SortMappingSet,
    raw_sort: Option<&str>,
    default_field: &str,
) -> QueryResult<CompiledSort> {
    let mut keys = Vec::new();
    for token in raw_sort.into_iter().flat_map(split_tokens) {
        let requested = parse_token(token);
        let mapping = mappings
            .find(requested.field)
            .ok_or_else(|| QueryError::InvalidSortField {
                view_shape: mappings.view_shape(),
                field: requested.field.to_string(),
            })?;
        keys.push(SortKey::new(
            mapping.source_field_path.as_str(),
            resolve_direction(requested.descending, mapping.reverse_direction),
        ));
    }

    if keys.is_empty() {
        keys.push(SortKey::new(default_field, SortDirection::Ascending));
    }

    Ok(CompiledSort::from_keys(keys))
}

#[cfg(test)]
mod tests {
    use super::{compile, parse_token, resolve_direction, SortDirection, SortKey};
    use crate::query::mapping::{SortMapping, SortMappingRegistry};
    use crate::query::{QueryError, QueryShape};

    struct View;
    struct Source;

    impl QueryShape for View {
        const SHAPE_ID: &'static str = "View";
    }
    impl QueryShape for Source {
        const SHAPE_ID: &'static str = "Source";
    }

    fn registry() -> SortMappingRegistry {
        SortMappingRegistry::builder()
            .register::<View, Source>(vec![
                SortMapping::new("name", "name"),
                SortMapping::new("type", "kind"),
                SortMapping::new("frequency.type", "frequency.type"),
                SortMapping::new("age", "born_at").reversed(),
            ])
            .expect("mappings should register")
            .build()
    }

    #[test]
    fn direction_truth_table() {
        assert_eq!(resolve_direction(false, false), SortDirection::Ascending);
        assert_eq!(resolve_direction(false, true), SortDirection::Descending);
        assert_eq!(resolve_direction(true, false), SortDirection::Descending);
        assert_eq!(resolve_direction(true, true), SortDirection::Ascending);
    }

    #[test]
    fn parse_token_reads_optional_direction() {
        assert!(!parse_token("name").descending);
        assert!(parse_token("name DESC").descending);
        assert!(!parse_token("name asc").descending);
        assert_eq!(parse_token("frequency.type desc").field, "frequency.type");
    }

    #[test]
    fn multi_key_sort_keeps_token_order() {
        let registry = registry();
        let compiled = compile(
            &registry.lookup::<View, Source>(),
            Some("type,name desc"),
            "id",
        )
        .unwrap();
        assert_eq!(
            compiled.keys(),
            &[
                SortKey::new("kind", SortDirection::Ascending),
                SortKey::new("name", SortDirection::Descending),
            ]
        );
    }

    #[test]
    fn nested_field_sort_compiles_to_source_paths() {
        let registry = registry();
        let compiled = compile(
            &registry.lookup::<View, Source>(),
            Some("frequency.type desc,name"),
            "id",
        )
        .unwrap();
        assert_eq!(
            compiled.keys(),
            &[
                SortKey::new("frequency.type", SortDirection::Descending),
                SortKey::new("name", SortDirection::Ascending),
            ]
        );
        assert_eq!(compiled.to_string(), "frequency.type DESC,name ASC");
    }

    #[test]
    fn reversed_mapping_flips_client_direction() {
        let registry = registry();
        let set = registry.lookup::<View, Source>();
        let asc = compile(&set, Some("age"), "id").unwrap();
        let desc = compile(&set, Some("AGE desc"), "id").unwrap();
        assert_eq!(asc.keys()[0].direction, SortDirection::Descending);
        assert_eq!(desc.keys()[0].direction, SortDirection::Ascending);
    }

    #[test]
    fn blank_sort_compiles_to_tiebreaker() {
        let registry = registry();
        let set = registry.lookup::<View, Source>();
        for raw in [None, Some(""), Some(" , ")] {
            let compiled = compile(&set, raw, "id").unwrap();
            assert_eq!(
                compiled.keys(),
                &[SortKey::new("id", SortDirection::Ascending)]
            );
        }
    }

    #[test]
    fn unmapped_field_is_reported_not_defaulted() {
        let registry = registry();
        let err = compile(&registry.lookup::<View, Source>(), Some("name,unknown"), "id")
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidSortField { field, .. } if field == "unknown"));
    }
}

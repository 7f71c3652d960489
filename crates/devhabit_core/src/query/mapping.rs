//! Sort mapping declarations and the startup-built registry.
//!
//! # Responsibility
//! - Declare which client-facing view fields may be sorted on and which
//!   source paths they translate to.
//! - Reject ambiguous or malformed declarations at startup.
//!
//! # Invariants
//! - View fields are unique per set, compared case-insensitively.
//! - Every view field and source path is a dotted identifier path, so
//!   compiled sort keys are safe to hand to a storage layer whitelist.
//! - A built registry is never mutated.

use crate::query::{fold_field_name, split_tokens, sort, QueryError, QueryResult, QueryShape};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::any::TypeId;
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};

static FIELD_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("valid field path regex")
});

/// One view field -> source path translation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortMapping {
    pub view_field: String,
    pub source_field_path: String,
    /// When set, client `asc` sorts the source descending and vice versa.
    pub reverse_direction: bool,
}

impl SortMapping {
    pub fn new(view_field: impl Into<String>, source_field_path: impl Into<String>) -> Self {
        Self {
            view_field: view_field.into(),
            source_field_path: source_field_path.into(),
            reverse_direction: false,
        }
    }

    /// Marks this mapping as inverting the client's direction.
    pub fn reversed(mut self) -> Self {
        self.reverse_direction = true;
        self
    }

    fn matches(&self, view_field: &str) -> bool {
        fold_field_name(&self.view_field) == fold_field_name(view_field)
    }
}

/// Ordered mappings for one (view shape, source shape) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortMappingSet {
    view_shape: &'static str,
    source_shape: &'static str,
    mappings: Vec<SortMapping>,
}

impl SortMappingSet {
    /// Set with no sortable fields, still named after its shapes.
    pub fn empty<V: QueryShape, S: QueryShape>() -> Self {
        Self {
            view_shape: V::SHAPE_ID,
            source_shape: S::SHAPE_ID,
            mappings: Vec::new(),
        }
    }

    pub fn view_shape(&self) -> &'static str {
        self.view_shape
    }

    pub fn source_shape(&self) -> &'static str {
        self.source_shape
    }

    pub fn mappings(&self) -> &[SortMapping] {
        &self.mappings
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// First mapping whose view field matches case-insensitively.
    pub fn find(&self, view_field: &str) -> Option<&SortMapping> {
        self.mappings.iter().find(|mapping| mapping.matches(view_field))
    }

    /// Checks every requested field; returns the first unmapped one as an error.
    ///
    /// Blank or absent input is always valid.
    pub fn check_request(&self, raw_sort: Option<&str>) -> QueryResult<()> {
        let Some(raw_sort) = raw_sort else {
            return Ok(());
        };

        for token in split_tokens(raw_sort) {
            let requested = sort::parse_token(token);
            if self.find(requested.field).is_none() {
                return Err(QueryError::InvalidSortField {
                    view_shape: self.view_shape,
                    field: requested.field.to_string(),
                });
            }
        }

        Ok(())
    }

    /// True iff every requested field has a mapping.
    pub fn validate_request(&self, raw_sort: Option<&str>) -> bool {
        self.check_request(raw_sort).is_ok()
    }
}

/// Immutable registry of sort mapping sets keyed by shape pair.
#[derive(Debug, Default)]
pub struct SortMappingRegistry {
    sets: HashMap<(TypeId, TypeId), SortMappingSet>,
}

impl SortMappingRegistry {
    pub fn builder() -> SortMappingRegistryBuilder {
        SortMappingRegistryBuilder::default()
    }

    /// Registered set for `V -> S`, or an empty set for that pair when
    /// unregistered.
    pub fn lookup<V: QueryShape, S: QueryShape>(&self) -> Cow<'_, SortMappingSet> {
        match self.sets.get(&(TypeId::of::<V>(), TypeId::of::<S>())) {
            Some(set) => Cow::Borrowed(set),
            None => Cow::Owned(SortMappingSet::empty::<V, S>()),
        }
    }

    pub fn validate_request<V: QueryShape, S: QueryShape>(&self, raw_sort: Option<&str>) -> bool {
        self.lookup::<V, S>().validate_request(raw_sort)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Startup-time collector for sort mapping sets.
#[derive(Debug, Default)]
pub struct SortMappingRegistryBuilder {
    sets: HashMap<(TypeId, TypeId), SortMappingSet>,
}

impl SortMappingRegistryBuilder {
    /// Registers the mappings for view shape `V` over source shape `S`.
    ///
    /// # Errors
    /// - `RegistrationConflict` on a duplicate view field or a second
    ///   registration of the same pair.
    /// - `InvalidFieldPath` when a field is not a dotted identifier path.
    pub fn register<V: QueryShape, S: QueryShape>(
        mut self,
        mappings: Vec<SortMapping>,
    ) -> QueryResult<Self> {
        let key = (TypeId::of::<V>(), TypeId::of::<S>());
        if self.sets.contains_key(&key) {
            return Err(QueryError::RegistrationConflict {
                view_shape: V::SHAPE_ID,
                source_shape: S::SHAPE_ID,
                detail: "shape pair registered twice".to_string(),
            });
        }

        let mut seen = BTreeSet::new();
        for mapping in &mappings {
            for path in [&mapping.view_field, &mapping.source_field_path] {
                if !FIELD_PATH_RE.is_match(path) {
                    return Err(QueryError::InvalidFieldPath {
                        view_shape: V::SHAPE_ID,
                        path: path.clone(),
                    });
                }
            }
            if !seen.insert(fold_field_name(&mapping.view_field)) {
                return Err(QueryError::RegistrationConflict {
                    view_shape: V::SHAPE_ID,
                    source_shape: S::SHAPE_ID,
                    detail: format!("duplicate view field `{}`", mapping.view_field),
                });
            }
        }

        self.sets.insert(
            key,
            SortMappingSet {
                view_shape: V::SHAPE_ID,
                source_shape: S::SHAPE_ID,
                mappings,
            },
        );
        Ok(self)
    }

    pub fn build(self) -> SortMappingRegistry {
        info!(
            "event=sort_registry_built module=query status=ok sets={}",
            self.sets.len()
        );
        SortMappingRegistry { sets: self.sets }
    }
}

#[cfg(test)]
mod tests {
    use super::{SortMapping, SortMappingRegistry};
    use crate::query::{QueryError, QueryShape};

    struct View;
    struct Source;
    struct Other;

    impl QueryShape for View {
        const SHAPE_ID: &'static str = "View";
    }
    impl QueryShape for Source {
        const SHAPE_ID: &'static str = "Source";
    }
    impl QueryShape for Other {
        const SHAPE_ID: &'static str = "Other";
    }

    fn registry() -> SortMappingRegistry {
        SortMappingRegistry::builder()
            .register::<View, Source>(vec![
                SortMapping::new("name", "name"),
                SortMapping::new("frequency.type", "frequency.kind"),
            ])
            .expect("mappings should register")
            .build()
    }

    #[test]
    fn validate_request_is_case_insensitive_and_ignores_direction() {
        let registry = registry();
        assert!(registry.validate_request::<View, Source>(Some("NAME desc, Frequency.Type")));
        assert!(registry.validate_request::<View, Source>(Some(" , name asc ,")));
    }

    #[test]
    fn validate_request_rejects_unmapped_field() {
        let registry = registry();
        assert!(!registry.validate_request::<View, Source>(Some("name,createdAt desc")));
        let err = registry
            .lookup::<View, Source>()
            .check_request(Some("name,createdAt desc"))
            .unwrap_err();
        assert_eq!(
            err,
            QueryError::InvalidSortField {
                view_shape: "View",
                field: "createdAt".to_string(),
            }
        );
    }

    #[test]
    fn absent_or_blank_sort_is_always_valid() {
        let registry = registry();
        assert!(registry.validate_request::<View, Source>(None));
        assert!(registry.validate_request::<View, Source>(Some("")));
        assert!(registry.validate_request::<View, Source>(Some("   ")));
    }

    #[test]
    fn unregistered_pair_yields_empty_set() {
        let registry = registry();
        let set = registry.lookup::<View, Other>();
        assert!(set.is_empty());
        assert_eq!(set.view_shape(), "View");
        assert_eq!(set.source_shape(), "Other");
        assert!(!registry.validate_request::<View, Other>(Some("name")));
        assert!(registry.validate_request::<View, Other>(None));

        let err = set.check_request(Some("name")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "the provided sort field `name` is not valid for View"
        );
    }

    #[test]
    fn duplicate_view_fields_fail_registration() {
        let err = SortMappingRegistry::builder()
            .register::<View, Source>(vec![
                SortMapping::new("name", "name"),
                SortMapping::new("Name", "title"),
            ])
            .unwrap_err();
        assert!(matches!(err, QueryError::RegistrationConflict { .. }));
    }

    #[test]
    fn registering_the_same_pair_twice_fails() {
        let err = SortMappingRegistry::builder()
            .register::<View, Source>(vec![SortMapping::new("name", "name")])
            .unwrap()
            .register::<View, Source>(vec![SortMapping::new("id", "id")])
            .unwrap_err();
        assert!(matches!(err, QueryError::RegistrationConflict { .. }));
    }

    #[test]
    fn malformed_source_path_fails_registration() {
        let err = SortMappingRegistry::builder()
            .register::<View, Source>(vec![SortMapping::new("name", "name; DROP TABLE habits")])
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidFieldPath { .. }));
    }
}

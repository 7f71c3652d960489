//! Sparse field shaping of result objects.
//!
//! # Responsibility
//! - Validate client `fields` lists against a shape's declared metadata.
//! - Project one or many objects into ordered keyed views.
//!
//! # Invariants
//! - View key order is the metadata order, never the client token order.
//! - A blank field list selects every declared field.
//! - Shaping itself never fails; rejection happens in validation.

use crate::query::metadata::{FieldDescriptor, FieldMetadataCache, ShapeMetadata};
use crate::query::{fold_field_name, split_tokens, QueryError, QueryResult, Shaped};
use log::debug;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Ordered field-name -> value payload for one shaped object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapedView {
    entries: Vec<(&'static str, Value)>,
}

impl ShapedView {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(key, _)| *key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.entries.iter().map(|(key, value)| (*key, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, name: &'static str, value: Value) {
        self.entries.push((name, value));
    }
}

impl Serialize for ShapedView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Parsed client field list, folded to lowercase for comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelection {
    requested: Vec<String>,
    folded: HashSet<String>,
}

impl FieldSelection {
    pub fn parse(raw_fields: Option<&str>) -> Self {
        let mut selection = Self::default();
        for token in raw_fields.into_iter().flat_map(split_tokens) {
            if selection.folded.insert(fold_field_name(token)) {
                selection.requested.push(token.to_string());
            }
        }
        selection
    }

    /// True when the client asked for every field.
    pub fn is_all(&self) -> bool {
        self.folded.is_empty()
    }

    /// Tokens as the client wrote them, first occurrence only.
    pub fn requested(&self) -> &[String] {
        &self.requested
    }

    /// Descriptors retained by this selection, in metadata order.
    pub fn resolve<'m, T>(&self, metadata: &'m ShapeMetadata<T>) -> Vec<&'m FieldDescriptor<T>> {
        if self.is_all() {
            return metadata.fields().iter().collect();
        }
        metadata
            .fields()
            .iter()
            .filter(|descriptor| self.folded.contains(descriptor.folded_name()))
            .collect()
    }
}

/// Field shaping service backed by a metadata cache.
#[derive(Debug, Clone)]
pub struct DataShaper {
    cache: Arc<FieldMetadataCache>,
}

impl Default for DataShaper {
    fn default() -> Self {
        Self::new()
    }
}

impl DataShaper {
    /// Shaper over the process-wide metadata cache.
    pub fn new() -> Self {
        Self::with_cache(FieldMetadataCache::shared())
    }

    pub fn with_cache(cache: Arc<FieldMetadataCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<FieldMetadataCache> {
        &self.cache
    }

    /// Checks a field list; returns the first unknown field as an error.
    pub fn check_fields<T: Shaped>(&self, raw_fields: Option<&str>) -> QueryResult<()> {
        let selection = FieldSelection::parse(raw_fields);
        if selection.is_all() {
            return Ok(());
        }

        let metadata = self.cache.get_fields::<T>();
        match selection
            .requested()
            .iter()
            .find(|field| metadata.find(field).is_none())
        {
            Some(unknown) => Err(QueryError::InvalidShapeField {
                shape: T::SHAPE_ID,
                field: unknown.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn validate_fields<T: Shaped>(&self, raw_fields: Option<&str>) -> bool {
        self.check_fields::<T>(raw_fields).is_ok()
    }

    /// Projects one object into a view holding only the requested fields.
    pub fn shape<T: Shaped>(&self, item: &T, raw_fields: Option<&str>) -> ShapedView {
        let metadata = self.cache.get_fields::<T>();
        let selected = FieldSelection::parse(raw_fields).resolve(&*metadata);
        project(item, &selected)
    }

    /// Projects every item, resolving the field selection once.
    pub fn shape_many<T: Shaped>(&self, items: &[T], raw_fields: Option<&str>) -> Vec<ShapedView> {
        let metadata = self.cache.get_fields::<T>();
        let selected = FieldSelection::parse(raw_fields).resolve(&*metadata);
        debug!(
            "event=shape_many module=query status=ok shape={} items={} fields={}",
            T::SHAPE_ID,
            items.len(),
            selected.len()
        );
        items.iter().map(|item| project(item, &selected)).collect()
    }
}

fn project<T>(item: &T, selected: &[&FieldDescriptor<T>]) -> ShapedView {
    let mut view = ShapedView::default();
    for descriptor in selected {
        view.push(descriptor.name(), descriptor.read(item));
    }
    view
}

#[cfg(test)]
mod tests {
    use super::{DataShaper, FieldSelection};
    use crate::query::metadata::{FieldDescriptor, FieldMetadataCache};
    use crate::query::{QueryError, QueryShape, Shaped};
    use serde_json::json;
    use std::sync::Arc;

    struct Item {
        id: String,
        name: String,
        description: Option<String>,
    }

    impl QueryShape for Item {
        const SHAPE_ID: &'static str = "Item";
    }

    impl Shaped for Item {
        fn field_table() -> Vec<FieldDescriptor<Self>> {
            vec![
                FieldDescriptor::new("id", |i: &Self| json!(i.id)),
                FieldDescriptor::new("name", |i: &Self| json!(i.name)),
                FieldDescriptor::new("description", |i: &Self| json!(i.description)),
            ]
        }
    }

    fn item(id: &str, name: &str) -> Item {
        Item {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
        }
    }

    fn shaper() -> DataShaper {
        DataShaper::with_cache(Arc::new(FieldMetadataCache::new()))
    }

    #[test]
    fn shaped_keys_follow_metadata_order_not_client_order() {
        let view = shaper().shape(&item("i_1", "Read"), Some("Name, id"));
        assert_eq!(view.keys().collect::<Vec<_>>(), vec!["id", "name"]);
        assert_eq!(view.get("name"), Some(&json!("Read")));
        assert_eq!(
            serde_json::to_string(&view).unwrap(),
            r#"{"id":"i_1","name":"Read"}"#
        );
    }

    #[test]
    fn blank_fields_select_everything() {
        let shaper = shaper();
        for raw in [None, Some(""), Some("  ,  ")] {
            let view = shaper.shape(&item("i_1", "Read"), raw);
            assert_eq!(view.keys().collect::<Vec<_>>(), vec!["id", "name", "description"]);
            assert_eq!(view.get("description"), Some(&json!(null)));
        }
    }

    #[test]
    fn validation_is_case_insensitive_and_names_unknown_fields() {
        let shaper = shaper();
        assert!(shaper.validate_fields::<Item>(Some("ID, Description")));
        assert!(shaper.validate_fields::<Item>(None));
        assert!(shaper.validate_fields::<Item>(Some("")));

        let err = shaper.check_fields::<Item>(Some("id,secret")).unwrap_err();
        assert_eq!(
            err,
            QueryError::InvalidShapeField {
                shape: "Item",
                field: "secret".to_string(),
            }
        );
    }

    #[test]
    fn shape_many_applies_one_selection_to_every_item() {
        let items = vec![item("i_1", "Read"), item("i_2", "Run")];
        let views = shaper().shape_many(&items, Some("name"));
        assert_eq!(views.len(), 2);
        assert!(views.iter().all(|view| view.len() == 1));
        assert_eq!(views[1].get("name"), Some(&json!("Run")));
    }

    #[test]
    fn selection_deduplicates_tokens_case_insensitively() {
        let selection = FieldSelection::parse(Some("name,NAME, id"));
        assert_eq!(selection.requested(), &["name".to_string(), "id".to_string()]);
        assert!(!selection.is_all());
    }
}

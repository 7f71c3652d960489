//! Per-shape field metadata and its process-wide cache.
//!
//! # Responsibility
//! - Hold the ordered field descriptors declared by each `Shaped` type.
//! - Compute each shape's metadata at most once per cache and share it.
//!
//! # Invariants
//! - Descriptor order equals the order declared in `Shaped::field_table`.
//! - Callers only ever observe complete entries; a lost race discards the
//!   redundant copy and returns the published one.

use crate::query::{fold_field_name, Shaped};
use log::debug;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

static SHARED_CACHE: Lazy<Arc<FieldMetadataCache>> =
    Lazy::new(|| Arc::new(FieldMetadataCache::new()));

type CachedEntry = Arc<dyn Any + Send + Sync>;

/// One addressable field of a result shape.
pub struct FieldDescriptor<T> {
    name: &'static str,
    folded: String,
    read: fn(&T) -> Value,
}

impl<T> FieldDescriptor<T> {
    pub fn new(name: &'static str, read: fn(&T) -> Value) -> Self {
        Self {
            name,
            folded: fold_field_name(name),
            read,
        }
    }

    /// Field name exactly as exposed to clients.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Reads this field's value from `item`.
    pub fn read(&self, item: &T) -> Value {
        (self.read)(item)
    }

    pub(crate) fn folded_name(&self) -> &str {
        &self.folded
    }
}

impl<T> std::fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .finish()
    }
}

/// Ordered field descriptors for one shape.
#[derive(Debug)]
pub struct ShapeMetadata<T> {
    shape: &'static str,
    fields: Vec<FieldDescriptor<T>>,
}

impl<T: Shaped> ShapeMetadata<T> {
    fn build() -> Self {
        Self {
            shape: T::SHAPE_ID,
            fields: T::field_table(),
        }
    }
}

impl<T> ShapeMetadata<T> {
    pub fn shape(&self) -> &'static str {
        self.shape
    }

    pub fn fields(&self) -> &[FieldDescriptor<T>] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Case-insensitive descriptor lookup.
    pub fn find(&self, name: &str) -> Option<&FieldDescriptor<T>> {
        let folded = fold_field_name(name);
        self.fields
            .iter()
            .find(|descriptor| descriptor.folded_name() == folded)
    }

    /// Field names in canonical order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(FieldDescriptor::name)
    }
}

/// Lazily populated metadata cache keyed by shape type.
#[derive(Default)]
pub struct FieldMetadataCache {
    entries: RwLock<HashMap<TypeId, CachedEntry>>,
}

impl FieldMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache shared by every `DataShaper` built with `DataShaper::new`.
    pub fn shared() -> Arc<FieldMetadataCache> {
        Arc::clone(&SHARED_CACHE)
    }

    /// Returns the metadata for `T`, computing it on first access.
    pub fn get_fields<T: Shaped>(&self) -> Arc<ShapeMetadata<T>> {
        if let Some(found) = self.lookup::<T>() {
            return found;
        }

        let computed = Arc::new(ShapeMetadata::<T>::build());
        debug!(
            "event=shape_metadata_built module=query status=ok shape={} fields={}",
            T::SHAPE_ID,
            computed.len()
        );

        let published = {
            let mut entries = self
                .entries
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                entries
                    .entry(TypeId::of::<T>())
                    .or_insert_with(|| Arc::clone(&computed) as CachedEntry),
            )
        };

        published.downcast::<ShapeMetadata<T>>().unwrap_or(computed)
    }

    /// Number of shapes with cached metadata.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup<T: Shaped>(&self) -> Option<Arc<ShapeMetadata<T>>> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|entry| entry.downcast::<ShapeMetadata<T>>().ok())
    }
}

impl std::fmt::Debug for FieldMetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldMetadataCache")
            .field("shapes", &self.len())
            .finish()
    }
}

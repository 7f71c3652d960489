//! Query engine facade used by the service layer.
//!
//! # Responsibility
//! - Bundle the immutable sort registry with the field shaper.
//! - Expose sort/field validation, sort compilation and shaping by shape type.

use crate::query::mapping::SortMappingRegistry;
use crate::query::shaping::{DataShaper, ShapedView};
use crate::query::sort::{self, CompiledSort};
use crate::query::{QueryResult, QueryShape, Shaped};
use log::warn;
use std::sync::Arc;

/// Sort + shaping entry points shared by every list/detail use-case.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    registry: Arc<SortMappingRegistry>,
    shaper: DataShaper,
}

impl QueryEngine {
    /// Builds an engine over the process-wide metadata cache.
    pub fn new(registry: SortMappingRegistry) -> Self {
        Self::with_shaper(Arc::new(registry), DataShaper::new())
    }

    pub fn with_shaper(registry: Arc<SortMappingRegistry>, shaper: DataShaper) -> Self {
        Self { registry, shaper }
    }

    pub fn registry(&self) -> &SortMappingRegistry {
        &self.registry
    }

    pub fn shaper(&self) -> &DataShaper {
        &self.shaper
    }

    pub fn validate_sort<V: QueryShape, S: QueryShape>(&self, raw_sort: Option<&str>) -> bool {
        self.check_sort::<V, S>(raw_sort).is_ok()
    }

    /// Like `validate_sort`, but names the rejected field.
    pub fn check_sort<V: QueryShape, S: QueryShape>(&self, raw_sort: Option<&str>) -> QueryResult<()> {
        self.registry
            .lookup::<V, S>()
            .check_request(raw_sort)
            .inspect_err(|err| {
                warn!(
                    "event=sort_rejected module=query status=rejected view={} source={} error={}",
                    V::SHAPE_ID,
                    S::SHAPE_ID,
                    err
                );
            })
    }

    /// Compiles `raw_sort` for `V` over `S`; blank input orders by
    /// `S::DEFAULT_SORT_FIELD`.
    pub fn compile_sort<V: QueryShape, S: QueryShape>(
        &self,
        raw_sort: Option<&str>,
    ) -> QueryResult<CompiledSort> {
        sort::compile(
            &self.registry.lookup::<V, S>(),
            raw_sort,
            S::DEFAULT_SORT_FIELD,
        )
    }

    pub fn validate_fields<T: Shaped>(&self, raw_fields: Option<&str>) -> bool {
        self.check_fields::<T>(raw_fields).is_ok()
    }

    /// Like `validate_fields`, but names the rejected field.
    pub fn check_fields<T: Shaped>(&self, raw_fields: Option<&str>) -> QueryResult<()> {
        self.shaper.check_fields::<T>(raw_fields).inspect_err(|err| {
            warn!(
                "event=fields_rejected module=query status=rejected shape={} error={}",
                T::SHAPE_ID,
                err
            );
        })
    }

    pub fn shape<T: Shaped>(&self, item: &T, raw_fields: Option<&str>) -> ShapedView {
        self.shaper.shape(item, raw_fields)
    }

    pub fn shape_many<T: Shaped>(&self, items: &[T], raw_fields: Option<&str>) -> Vec<ShapedView> {
        self.shaper.shape_many(items, raw_fields)
    }
}

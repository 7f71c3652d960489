//! List query composition over a query source.
//!
//! # Responsibility
//! - Define the contract a storage layer implements to serve list queries.
//! - Sequence count and windowed fetch so pagination is computed on the
//!   filtered, sorted set.
//!
//! # Invariants
//! - Total count is taken before the page window is applied.
//! - The same filter drives count and fetch; sort applies to the filtered set.
//! - Offset is `(page - 1) * page_size`.

use crate::config::PagingConfig;
use crate::query::sort::CompiledSort;
use log::info;
use serde::Serialize;
use std::time::Instant;

/// Storage-side query source consumed by list use-cases.
///
/// Implementations must apply `filter` before ordering by `sort`, and must
/// order before applying the offset/limit window.
pub trait QuerySource {
    type Item;
    type Filter;
    type Error;

    /// Counts every item matching `filter`, ignoring pagination.
    fn count_matching(&self, filter: &Self::Filter) -> Result<u64, Self::Error>;

    /// Materializes one ordered window of matching items.
    fn fetch_window(
        &self,
        filter: &Self::Filter,
        sort: &CompiledSort,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Self::Item>, Self::Error>;
}

/// Normalized 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Applies paging defaults and caps from `config`.
    pub fn normalized(page: Option<u32>, page_size: Option<u32>, config: &PagingConfig) -> Self {
        Self {
            page: page.filter(|value| *value > 0).unwrap_or(1),
            page_size: config.normalize_page_size(page_size),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// One page of results plus navigation metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResult<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

impl<T> PaginationResult<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_count: u64) -> Self {
        let total_pages = if request.page_size == 0 {
            0
        } else {
            total_count.div_ceil(u64::from(request.page_size))
        };
        Self {
            items,
            page: request.page,
            page_size: request.page_size,
            total_count,
            total_pages,
            has_previous_page: request.page > 1,
            has_next_page: u64::from(request.page) < total_pages,
        }
    }

    /// Converts items while keeping paging metadata.
    pub fn map_items<U>(self, convert: impl FnOnce(Vec<T>) -> Vec<U>) -> PaginationResult<U> {
        PaginationResult {
            items: convert(self.items),
            page: self.page,
            page_size: self.page_size,
            total_count: self.total_count,
            total_pages: self.total_pages,
            has_previous_page: self.has_previous_page,
            has_next_page: self.has_next_page,
        }
    }
}

/// Counts, then fetches the requested window in `sort` order.
///
/// # Side effects
/// - Emits one `list_query` event with duration and totals.
pub fn fetch_page<Q: QuerySource>(
    source: &Q,
    filter: &Q::Filter,
    sort: &CompiledSort,
    request: PageRequest,
) -> Result<PaginationResult<Q::Item>, Q::Error> {
    let started_at = Instant::now();
    let total_count = source.count_matching(filter)?;
    let items = if request.offset() >= total_count {
        Vec::new()
    } else {
        source.fetch_window(filter, sort, request.offset(), request.page_size)?
    };

    info!(
        "event=list_query module=query status=ok duration_ms={} sort={} page={} page_size={} total={} returned={}",
        started_at.elapsed().as_millis(),
        sort,
        request.page,
        request.page_size,
        total_count,
        items.len()
    );
    Ok(PaginationResult::new(items, request, total_count))
}

//! Core domain logic for the DevHabit habit tracker.
//! This crate owns query shaping, persistence and business invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig, LogSettings, PagingConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::mappings::build_sort_registry;
pub use query::{
    CompiledSort, DataShaper, FieldMetadataCache, PaginationResult, QueryEngine, QueryError,
    QueryShape, Shaped, ShapedView, SortMapping, SortMappingRegistry,
};
pub use repo::{RepoError, RepoResult};
pub use service::habit_service::{HabitQueryParameters, HabitService};
pub use service::tag_service::{TagQueryParameters, TagService};
pub use service::{ServiceError, ServiceResult};

//! Runtime configuration resolved from the process environment.
//!
//! # Responsibility
//! - Collect logging, storage and paging settings in one value.
//! - Normalize list paging parameters.
//!
//! # Invariants
//! - `default_page_size` is never zero and never exceeds `max_page_size`.
//! - Unset variables fall back to documented defaults; malformed values are
//!   rejected instead of silently ignored.

use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_LOG_LEVEL: &str = "DEVHABIT_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "DEVHABIT_LOG_DIR";
pub const ENV_DB_PATH: &str = "DEVHABIT_DB_PATH";
pub const ENV_DEFAULT_PAGE_SIZE: &str = "DEVHABIT_DEFAULT_PAGE_SIZE";
pub const ENV_MAX_PAGE_SIZE: &str = "DEVHABIT_MAX_PAGE_SIZE";

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

/// Configuration loading error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidNumber { key: &'static str, value: String },
    InvalidPaging { default: u32, max: u32 },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber { key, value } => {
                write!(f, "`{key}` must be a positive integer, got `{value}`")
            }
            Self::InvalidPaging { default, max } => write!(
                f,
                "default page size {default} must be between 1 and max page size {max}"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Logging destination and verbosity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    /// File logging is disabled when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

/// List paging defaults and caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl PagingConfig {
    pub fn new(default_page_size: u32, max_page_size: u32) -> Result<Self, ConfigError> {
        if default_page_size == 0 || default_page_size > max_page_size {
            return Err(ConfigError::InvalidPaging {
                default: default_page_size,
                max: max_page_size,
            });
        }
        Ok(Self {
            default_page_size,
            max_page_size,
        })
    }

    /// Missing or zero falls back to the default; oversize is capped.
    pub fn normalize_page_size(&self, page_size: Option<u32>) -> u32 {
        match page_size {
            Some(0) | None => self.default_page_size,
            Some(value) if value > self.max_page_size => self.max_page_size,
            Some(value) => value,
        }
    }
}

/// Complete core configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreConfig {
    pub log: LogSettings,
    /// In-memory database when unset.
    pub db_path: Option<PathBuf>,
    pub paging: PagingConfig,
}

impl CoreConfig {
    /// Reads `DEVHABIT_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let log = LogSettings {
            level: read(ENV_LOG_LEVEL).unwrap_or_else(|| default_log_level().to_string()),
            dir: read(ENV_LOG_DIR).map(PathBuf::from),
        };
        let defaults = PagingConfig::default();
        let default_page_size = parse_u32(ENV_DEFAULT_PAGE_SIZE, read(ENV_DEFAULT_PAGE_SIZE))?
            .unwrap_or(defaults.default_page_size);
        let max_page_size = parse_u32(ENV_MAX_PAGE_SIZE, read(ENV_MAX_PAGE_SIZE))?
            .unwrap_or(defaults.max_page_size);

        Ok(Self {
            log,
            db_path: read(ENV_DB_PATH).map(PathBuf::from),
            paging: PagingConfig::new(default_page_size, max_page_size)?,
        })
    }
}

fn parse_u32(key: &'static str, value: Option<String>) -> Result<Option<u32>, ConfigError> {
    match value {
        None => Ok(None),
        Some(text) => match text.parse::<u32>() {
            Ok(parsed) if parsed > 0 => Ok(Some(parsed)),
            _ => Err(ConfigError::InvalidNumber { key, value: text }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, PagingConfig, ENV_DB_PATH, ENV_MAX_PAGE_SIZE};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn config_from(pairs: &[(&str, &str)]) -> Result<CoreConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        CoreConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.paging, PagingConfig::default());
        assert_eq!(config.db_path, None);
        assert_eq!(config.log.dir, None);
    }

    #[test]
    fn environment_overrides_are_applied() {
        let config = config_from(&[(ENV_DB_PATH, "/tmp/habits.db"), (ENV_MAX_PAGE_SIZE, "25")])
            .unwrap();
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/habits.db")));
        assert_eq!(config.paging.max_page_size, 25);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = config_from(&[(ENV_MAX_PAGE_SIZE, "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));
    }

    #[test]
    fn default_page_size_cannot_exceed_max() {
        let err = config_from(&[(ENV_MAX_PAGE_SIZE, "5")]).unwrap_err();
        assert_eq!(err, ConfigError::InvalidPaging { default: 10, max: 5 });
    }

    #[test]
    fn page_size_normalization_defaults_and_caps() {
        let paging = PagingConfig::default();
        assert_eq!(paging.normalize_page_size(None), 10);
        assert_eq!(paging.normalize_page_size(Some(0)), 10);
        assert_eq!(paging.normalize_page_size(Some(500)), 100);
        assert_eq!(paging.normalize_page_size(Some(25)), 25);
    }
}

//! Runtime configuration for the catalog.
//!
//! Values come from the environment (see [`CatalogConfig::from_env`]) and can
//! be overridden programmatically with the `with_*` builders.

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

/// Trace name used when no override is configured.
pub const DEFAULT_COMMAND_TRACE_NAME: &str = "catalog.command";

/// Default name of the course search index.
pub const DEFAULT_COURSE_INDEX_NAME: &str = "course";

/// Default number of courses prepared per indexing page.
pub const DEFAULT_QUERYSET_PAGINATION: usize = 10_000;

/// Catalog configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Wrap management commands in a monitoring scope
    pub enable_command_monitoring: bool,
    /// Override for the function trace name
    pub command_trace_name: Option<String>,
    /// Name of the course search index
    pub course_index_name: String,
    /// Courses prepared per indexing page
    pub queryset_pagination: usize,
    /// Course type slugs excluded from indexing
    pub retired_course_types: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            enable_command_monitoring: false,
            command_trace_name: None,
            course_index_name: DEFAULT_COURSE_INDEX_NAME.to_string(),
            queryset_pagination: DEFAULT_QUERYSET_PAGINATION,
            retired_course_types: Vec::new(),
        }
    }
}

impl CatalogConfig {
    /// Create from environment variables
    ///
    /// Reads:
    /// - CATALOG_ENABLE_COMMAND_MONITORING (optional, default: "false")
    /// - CATALOG_COMMAND_TRACE_NAME (optional)
    /// - CATALOG_COURSE_INDEX_NAME (optional, default: "course")
    /// - CATALOG_QUERYSET_PAGINATION (optional, default: 10000)
    /// - CATALOG_RETIRED_COURSE_TYPES (optional, comma separated slugs)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let enable_command_monitoring = match lookup("CATALOG_ENABLE_COMMAND_MONITORING") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                CatalogError::Config(format!(
                    "CATALOG_ENABLE_COMMAND_MONITORING must be a boolean, got '{raw}'"
                ))
            })?,
            None => defaults.enable_command_monitoring,
        };

        let command_trace_name = lookup("CATALOG_COMMAND_TRACE_NAME")
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let course_index_name = lookup("CATALOG_COURSE_INDEX_NAME")
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(defaults.course_index_name);

        let queryset_pagination = match lookup("CATALOG_QUERYSET_PAGINATION") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or_else(|| {
                    CatalogError::Config(format!(
                        "CATALOG_QUERYSET_PAGINATION must be a positive integer, got '{raw}'"
                    ))
                })?,
            None => defaults.queryset_pagination,
        };

        let retired_course_types = lookup("CATALOG_RETIRED_COURSE_TYPES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|slug| !slug.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            enable_command_monitoring,
            command_trace_name,
            course_index_name,
            queryset_pagination,
            retired_course_types,
        })
    }

    /// Enable or disable command monitoring
    pub fn with_command_monitoring(mut self, enabled: bool) -> Self {
        self.enable_command_monitoring = enabled;
        self
    }

    /// Set a custom function trace name
    pub fn with_command_trace_name(mut self, name: impl Into<String>) -> Self {
        self.command_trace_name = Some(name.into());
        self
    }

    /// Set the course index name
    pub fn with_course_index_name(mut self, name: impl Into<String>) -> Self {
        self.course_index_name = name.into();
        self
    }

    /// Set the indexing page size (clamped to at least 1)
    pub fn with_queryset_pagination(mut self, size: usize) -> Self {
        self.queryset_pagination = size.max(1);
        self
    }

    /// Set the retired course type slugs
    pub fn with_retired_course_types<I, S>(mut self, slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retired_course_types = slugs.into_iter().map(Into::into).collect();
        self
    }

    /// Trace name in effect: the override, or [`DEFAULT_COMMAND_TRACE_NAME`].
    pub fn command_trace_name(&self) -> &str {
        self.command_trace_name
            .as_deref()
            .unwrap_or(DEFAULT_COMMAND_TRACE_NAME)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

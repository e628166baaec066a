//! Catalog Core Library
//!
//! Model utilities, query-set adapters, the course search document and the
//! command monitoring scope, built on top of `catalog-store`.

pub mod config;
pub mod course_key;
pub mod documents;
pub mod error;
pub mod indexing;
pub mod model_utils;
pub mod monitoring;
pub mod query;
pub mod search;
pub mod telemetry;

pub use config::{CatalogConfig, DEFAULT_COMMAND_TRACE_NAME};
pub use course_key::CourseKey;
pub use documents::{CourseDocument, CourseSource, Document, FieldKind, FieldMapping};
pub use error::{CatalogError, CourseKeyError, Result};
pub use indexing::{index_courses, IndexReport};
pub use model_utils::{
    delete_orphans, delete_orphans_by_model, get_all_related_field_names,
    related_field_names_for, update_instance, update_instance_and_commit,
};
pub use monitoring::{
    monitor_management_command, CommandMonitor, MonitoringBackend, TracingMonitor,
};
pub use query::{ModelRef, QuerySet, RecordQuerySet};
pub use search::{
    execute_search, MemorySearchIndex, SearchHit, SearchIndex, SearchQuery,
    SearchQuerySetWrapper, SearchResults,
};
pub use telemetry::init_tracing;

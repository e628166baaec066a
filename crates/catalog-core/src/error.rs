//! Error taxonomy for catalog-core.

use catalog_store::StoreError;

/// Errors produced while parsing course keys.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CourseKeyError {
    #[error("course key must not be empty")]
    Empty,

    #[error("malformed course key: {0}")]
    Malformed(String),
}

/// Catalog errors.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid course key: {0}")]
    InvalidCourseKey(#[from] CourseKeyError),

    #[error("search backend error: {0}")]
    Search(String),

    #[error("invalid search query: {0}")]
    InvalidQuery(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

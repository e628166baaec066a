//! Error types for catalog-store

use thiserror::Error;

/// Errors that can occur in the record persistence layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// Record does not exist
    #[error("{model} record not found: {id}")]
    NotFound { model: String, id: u64 },

    /// Model is not part of the relation registry
    #[error("unknown model: {model}")]
    UnknownModel { model: String },

    /// Field is not declared on the record type
    #[error("{model} has no field named '{field}'")]
    UnknownField { model: String, field: String },

    /// A relation field holds something other than record ids
    #[error("invalid reference in {model}.{field}: {value}")]
    InvalidReference {
        model: String,
        field: String,
        value: String,
    },

    /// Serialization / deserialization failure
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Snapshot document is malformed
    #[error("invalid snapshot: {0}")]
    Snapshot(String),

    /// Backend-level failure (lock poisoning, I/O in a real backend)
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

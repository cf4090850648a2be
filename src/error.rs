//! Error types for resource schema loading.
//!
//! Only construction can fail. Resolution degrades to empty results instead of
//! returning errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading or registering a resource schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    // Schema errors (exit code 2)
    #[error("resource schema missing required field \"{field}\"")]
    MissingField { field: &'static str },

    #[error("invalid resource schema {type_name}: {source}")]
    InvalidDocument {
        type_name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("resource type {type_name} is already registered")]
    DuplicateType { type_name: String },
}

impl SchemaError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SchemaError::FileNotFound { .. } | SchemaError::ReadError { .. } => 3,
            _ => 2,
        }
    }
}

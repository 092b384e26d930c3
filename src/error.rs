//! Error types for schema loading
//!
//! These are load-time faults. Problems with a user's configuration document
//! are never errors of this type; they are reported as
//! [`ValidationError`](crate::validator::ValidationError)s.

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema loading errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema not found: {package} version {version}")]
    NotFound { package: String, version: String },

    #[error("Malformed schema {package} version {version}: {reason}")]
    Malformed {
        package: String,
        version: String,
        reason: String,
    },

    #[error("Invalid package name: {0}")]
    InvalidPackage(String),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Semver error: {0}")]
    Semver(#[from] semver::Error),
}

impl SchemaError {
    /// True for errors that mean "no document exists for this key".
    pub fn is_not_found(&self) -> bool {
        matches!(self, SchemaError::NotFound { .. })
    }
}

//! Storage error type.

use delivman_core::{CoreError, Partition};

use crate::report::CreationReport;

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while loading, saving or extending a project.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed document
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document root marker does not match
    #[error("unexpected document format '{found}' (expected '{expected}')")]
    Format {
        /// Configured marker
        expected: String,
        /// Marker found in the document
        found: String,
    },

    /// Delivery name collision
    #[error("delivery '{0}' already exists")]
    DuplicateName(String),

    /// A loaded plugin is older than the plugin that wrote the file
    #[error(
        "plugin '{plugin}' version {current} is older than {recorded} used for component '{component}'"
    )]
    VersionIncompatible {
        /// Plugin name
        plugin: String,
        /// Component path, joined with '/'
        component: String,
        /// Version of the loaded plugin
        current: String,
        /// Version recorded in the file
        recorded: String,
    },

    /// General and volatile settings are never written
    #[error("{0} settings cannot be stored in a file")]
    NotPersistable(Partition),

    /// Collecting a delivery failed and the delivery was withdrawn
    #[error("delivery '{}' failed: {}", .0.delivery, .0)]
    DeliveryFailed(CreationReport),

    /// Model error
    #[error(transparent)]
    Core(CoreError),
}

impl From<CoreError> for StorageError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DuplicateName(name) => StorageError::DuplicateName(name),
            other => StorageError::Core(other),
        }
    }
}

//! Error types for the document model.

use crate::id::ComponentId;
use crate::value::ContentKind;

/// Error type for model operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the in-memory document model.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A typed mutation targeted a cell of another kind
    #[error("cannot store a {found} value in a {expected} cell")]
    KindMismatch {
        /// Kind of the target cell
        expected: ContentKind,
        /// Kind of the offered value
        found: ContentKind,
    },

    /// A delivery with the same name already exists
    #[error("delivery '{0}' already exists")]
    DuplicateName(String),

    /// Delivery lookup failed
    #[error("unknown delivery '{0}'")]
    UnknownDelivery(String),

    /// Component lookup failed
    #[error("unknown component {0}")]
    UnknownComponent(ComponentId),

    /// Component still owns data and cannot be destroyed
    #[error("component '{0}' still has children or delivery information")]
    ComponentNotEmpty(String),

    /// Plugin lookup failed
    #[error("plugin '{0}' is not loaded")]
    UnknownPlugin(String),

    /// The plugin offers no strategy of this name
    #[error("plugin '{plugin}' has no strategy '{strategy}'")]
    UnknownStrategy {
        /// Plugin name
        plugin: String,
        /// Requested strategy
        strategy: String,
    },

    /// Re-parenting would place a component below itself
    #[error("component {id} cannot be placed under {parent}")]
    InvalidParent {
        /// Component being moved
        id: ComponentId,
        /// Requested parent
        parent: ComponentId,
    },

    /// The invisible root cannot be renamed, moved or removed
    #[error("operation not permitted on the root component")]
    RootComponent,
}

/// Failure raised inside a plugin while collecting delivery information.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// File access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// External command failed or was interrupted
    #[error("command '{command}' failed: {message}")]
    Command {
        /// Command line that was run
        command: String,
        /// Exit status or stderr summary
        message: String,
    },

    /// A parameter was missing or of the wrong kind
    #[error("invalid parameter '{0}'")]
    InvalidParameter(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

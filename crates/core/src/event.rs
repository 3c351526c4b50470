//! Change notifications emitted after each mutation of a project.

use std::path::PathBuf;

use crate::id::ComponentId;

/// Something that changed in an open project.
///
/// Views and exporters subscribe to these instead of observing the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectEvent {
    /// A delivery was added
    DeliveryAdded {
        /// Delivery name
        name: String,
    },

    /// A delivery and all information recorded for it were removed
    DeliveryRemoved {
        /// Delivery name
        name: String,
    },

    /// A component was created
    ComponentAdded {
        /// New component
        id: ComponentId,
    },

    /// A component was destroyed
    ComponentRemoved {
        /// Removed component
        id: ComponentId,
    },

    /// A component got a new display name
    ComponentRenamed {
        /// Renamed component
        id: ComponentId,
        /// New name
        name: String,
    },

    /// Strategy, parameters or delivery information of a component changed
    ComponentChanged {
        /// Changed component
        id: ComponentId,
    },

    /// A project file was loaded into the context
    ProjectLoaded {
        /// Loaded file
        path: PathBuf,
    },

    /// The project was written
    ProjectSaved {
        /// Written file
        path: PathBuf,
    },
}

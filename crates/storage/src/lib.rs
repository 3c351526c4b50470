//! Project persistence and entry points for delivman.
//!
//! This crate reads and writes project documents, keeps settings files and
//! exposes [`ProjectContext`], the single owner of an open project.

#![warn(missing_docs)]

mod error;
mod report;
pub mod version;
pub mod document;
pub mod engine;
pub mod settings_file;
mod context;

pub use error::{Result, StorageError};
pub use report::{CreationFailure, CreationReport};
pub use version::{check_version, compare_versions};
pub use document::{ProjectDocument, PROJECT_FORMAT};
pub use engine::{EngineConfig, LoadState, PersistenceEngine};
pub use settings_file::SettingsFiles;
pub use context::{NewInformation, ProjectContext};

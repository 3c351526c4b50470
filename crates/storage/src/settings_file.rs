//! Settings files.
//!
//! Each file holds exactly one partition. General settings sit next to the
//! executable, user settings in the per-user configuration directory and
//! project settings next to the project file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use directories::ProjectDirs;
use tokio::fs;
use tracing::{debug, info};

use delivman_core::{Partition, SettingsDocument, SettingsStore, SETTINGS_MARKER};

use crate::error::{Result, StorageError};

/// File name of general settings, next to the executable.
pub const GENERAL_SETTINGS_FILE: &str = "delivman.settings.json";

/// File name of user settings inside the user configuration directory.
pub const USER_SETTINGS_FILE: &str = "settings.json";

/// Reading and writing settings partitions.
#[async_trait]
pub trait SettingsFiles {
    /// Replace `partition` with the settings stored at `path`.
    async fn load(&mut self, path: &Path, partition: Partition) -> Result<()>;

    /// Write `partition` to `path`. Only user and project settings are written.
    async fn save(&self, path: &Path, partition: Partition) -> Result<()>;
}

#[async_trait]
impl SettingsFiles for SettingsStore {
    async fn load(&mut self, path: &Path, partition: Partition) -> Result<()> {
        if partition == Partition::Volatile {
            return Err(StorageError::NotPersistable(partition));
        }
        let text = fs::read_to_string(path).await?;
        let document: SettingsDocument = serde_json::from_str(&text)?;
        if document.marker != SETTINGS_MARKER {
            return Err(StorageError::Format {
                expected: SETTINGS_MARKER.to_string(),
                found: document.marker,
            });
        }
        self.replace(partition, &document);
        info!(%partition, count = document.settings.len(), "Loaded settings from {}", path.display());
        Ok(())
    }

    async fn save(&self, path: &Path, partition: Partition) -> Result<()> {
        if !partition.is_persistable() {
            return Err(StorageError::NotPersistable(partition));
        }
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }
        let mut text = serde_json::to_string_pretty(&self.to_document(partition))?;
        text.push('\n');
        fs::write(path, text.as_bytes()).await?;
        debug!(%partition, "Saved settings to {}", path.display());
        Ok(())
    }
}

/// General settings file of the running executable.
pub fn general_settings_path() -> Result<PathBuf> {
    Ok(std::env::current_exe()?.with_file_name(GENERAL_SETTINGS_FILE))
}

/// Per-user settings file, when a home directory can be determined.
pub fn user_settings_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "delivman").map(|dirs| dirs.config_dir().join(USER_SETTINGS_FILE))
}

/// Project settings file that accompanies a project file.
pub fn project_settings_path(project: &Path) -> PathBuf {
    project.with_extension("settings.json")
}

/// Load a partition if its file exists. Returns whether it was loaded.
pub async fn load_if_present(
    store: &mut SettingsStore,
    path: &Path,
    partition: Partition,
) -> Result<bool> {
    match fs::try_exists(path).await {
        Ok(true) => {
            store.load(path, partition).await?;
            Ok(true)
        }
        Ok(false) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delivman_core::ValueCell;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_save_and_load_user_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user").join("settings.json");

        let mut store = SettingsStore::new();
        let mut aliases = BTreeMap::new();
        aliases.insert("ci", vec!["jenkins", "gitlab"]);
        store.add("aliases", aliases, &[Partition::User]);
        store.add("depth", 4, &[Partition::User]);
        store.add("token", "secret", &[Partition::Volatile]);
        store.save(&path, Partition::User).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("secret"));

        let mut loaded = SettingsStore::new();
        loaded.add("stale", true, &[Partition::User]);
        loaded.add("kept", true, &[Partition::Project]);
        loaded.load(&path, Partition::User).await.unwrap();

        assert_eq!(loaded.partition(Partition::User), store.partition(Partition::User));
        assert_eq!(loaded.get_integer("depth"), Some(4));
        assert_eq!(loaded.get("stale"), None);
        assert_eq!(loaded.get("kept"), Some(&ValueCell::from(true)));
    }

    #[tokio::test]
    async fn test_wrong_marker_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"marker": "something-else", "settings": []}"#).unwrap();

        let mut store = SettingsStore::new();
        store.add("kept", 1, &[Partition::Project]);
        let err = store.load(&path, Partition::Project).await.unwrap_err();
        assert!(matches!(err, StorageError::Format { .. }));
        assert_eq!(store.get_integer("kept"), Some(1));
    }

    #[tokio::test]
    async fn test_general_and_volatile_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new();
        for partition in [Partition::General, Partition::Volatile] {
            let err = store.save(&dir.path().join("x.json"), partition).await.unwrap_err();
            assert!(matches!(err, StorageError::NotPersistable(p) if p == partition));
        }
        assert!(!dir.path().join("x.json").exists());
    }

    #[tokio::test]
    async fn test_load_if_present() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::new();
        let path = dir.path().join("missing.json");
        assert!(!load_if_present(&mut store, &path, Partition::General).await.unwrap());
    }

    #[test]
    fn test_project_settings_path() {
        assert_eq!(
            project_settings_path(Path::new("/tmp/site.json")),
            PathBuf::from("/tmp/site.settings.json")
        );
    }
}

//! Settings store - named values in four partitions.
//!
//! Lookups resolve `Volatile > User > Project > General`; a setting present in
//! several partitions is shadowed, never merged. Volatile settings (for
//! example credentials) exist only in memory.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::{CellElement, ValueCell};

/// Root marker of a settings document.
pub const SETTINGS_MARKER: &str = "delivman-settings";

/// Setting name whose value replaces the logging filter.
pub const LOG_FILTER_SETTING: &str = "log.filter";

/// A settings partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    /// Installation-wide defaults next to the executable
    General,
    /// Settings of the opened project
    Project,
    /// Per-user settings
    User,
    /// In-memory only
    Volatile,
}

impl Partition {
    /// All partitions, highest precedence first.
    pub const PRECEDENCE: [Partition; 4] = [
        Partition::Volatile,
        Partition::User,
        Partition::Project,
        Partition::General,
    ];

    /// Whether settings of this partition are ever written to disk.
    pub fn is_persistable(&self) -> bool {
        matches!(self, Partition::User | Partition::Project)
    }

    fn index(&self) -> usize {
        match self {
            Partition::General => 0,
            Partition::Project => 1,
            Partition::User => 2,
            Partition::Volatile => 3,
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Partition::General => "general",
            Partition::Project => "project",
            Partition::User => "user",
            Partition::Volatile => "volatile",
        };
        f.write_str(name)
    }
}

/// On-disk shape of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsDocument {
    /// Root marker, must equal [`SETTINGS_MARKER`]
    pub marker: String,

    /// One element per setting
    #[serde(default)]
    pub settings: Vec<CellElement>,
}

/// Settings of the running application.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    partitions: [BTreeMap<String, ValueCell>; 4],
}

impl SettingsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a setting across all partitions.
    pub fn get(&self, name: &str) -> Option<&ValueCell> {
        self.get_in(name, &Partition::PRECEDENCE)
    }

    /// Resolve a setting across the given partitions only, by precedence.
    pub fn get_in(&self, name: &str, partitions: &[Partition]) -> Option<&ValueCell> {
        Partition::PRECEDENCE
            .iter()
            .filter(|p| partitions.contains(*p))
            .find_map(|p| self.partitions[p.index()].get(name))
    }

    /// Resolve a text setting.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ValueCell::as_str)
    }

    /// Resolve a boolean setting.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ValueCell::as_bool)
    }

    /// Resolve an integer setting.
    pub fn get_integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ValueCell::as_integer)
    }

    /// Store a setting in the highest-priority partition of `partitions`.
    ///
    /// Returns the partition written, or `None` when the set is empty.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ValueCell>,
        partitions: &[Partition],
    ) -> Option<Partition> {
        let target = Partition::PRECEDENCE
            .into_iter()
            .find(|p| partitions.contains(p))?;
        self.partitions[target.index()].insert(name.into(), value.into());
        Some(target)
    }

    /// Remove a setting from the highest-priority partition of `partitions`
    /// that holds it.
    pub fn remove(&mut self, name: &str, partitions: &[Partition]) -> Option<ValueCell> {
        Partition::PRECEDENCE
            .into_iter()
            .filter(|p| partitions.contains(p))
            .find_map(|p| self.partitions[p.index()].remove(name))
    }

    /// All settings of one partition.
    pub fn partition(&self, partition: Partition) -> &BTreeMap<String, ValueCell> {
        &self.partitions[partition.index()]
    }

    /// Drop every setting of one partition.
    pub fn clear(&mut self, partition: Partition) {
        self.partitions[partition.index()].clear();
    }

    /// Serialize one partition.
    pub fn to_document(&self, partition: Partition) -> SettingsDocument {
        SettingsDocument {
            marker: SETTINGS_MARKER.to_string(),
            settings: self.partitions[partition.index()]
                .iter()
                .map(|(name, value)| value.to_element(name.clone()))
                .collect(),
        }
    }

    /// Replace one partition with the content of a document.
    ///
    /// The caller is responsible for checking the document marker.
    pub fn replace(&mut self, partition: Partition, document: &SettingsDocument) {
        self.partitions[partition.index()] = document
            .settings
            .iter()
            .map(|element| (element.name.clone(), ValueCell::from_element(element)))
            .collect();
    }

    /// Logging filter configured in the settings, if any.
    pub fn log_filter(&self) -> Option<&str> {
        self.get_str(LOG_FILTER_SETTING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_precedence_shadows() {
        let mut store = SettingsStore::new();
        store.add("editor", "vi", &[Partition::General]);
        store.add("editor", "emacs", &[Partition::Project]);
        assert_eq!(store.get_str("editor"), Some("emacs"));

        store.add("editor", "nano", &[Partition::User]);
        assert_eq!(store.get_str("editor"), Some("nano"));
        assert_eq!(
            store.get_in("editor", &[Partition::General, Partition::Project]),
            Some(&ValueCell::from("emacs"))
        );
        assert_eq!(store.get_in("editor", &[Partition::Volatile]), None);
    }

    #[test]
    fn test_add_picks_highest_priority_partition() {
        let mut store = SettingsStore::new();
        let target = store.add("token", "secret", &[Partition::User, Partition::Volatile]);
        assert_eq!(target, Some(Partition::Volatile));
        assert!(store.partition(Partition::User).is_empty());

        let target = store.add("depth", 3, &[Partition::General, Partition::Project]);
        assert_eq!(target, Some(Partition::Project));
        assert_eq!(store.add("x", 1, &[]), None);
    }

    #[test]
    fn test_replace_is_not_additive() {
        let mut store = SettingsStore::new();
        store.add("kept", true, &[Partition::User]);
        store.add("stale", 1, &[Partition::Project]);

        let mut other = SettingsStore::new();
        other.add("fresh", vec!["a", "b"], &[Partition::Project]);
        let document = other.to_document(Partition::Project);
        assert_eq!(document.marker, SETTINGS_MARKER);

        store.replace(Partition::Project, &document);
        assert_eq!(store.get("stale"), None);
        assert_eq!(store.get("fresh"), Some(&ValueCell::from(vec!["a", "b"])));
        assert_eq!(store.get_bool("kept"), Some(true));
    }

    #[test]
    fn test_remove_and_log_filter() {
        let mut store = SettingsStore::new();
        store.add(LOG_FILTER_SETTING, "debug", &[Partition::User]);
        assert_eq!(store.log_filter(), Some("debug"));
        assert_eq!(store.remove(LOG_FILTER_SETTING, &[Partition::Project]), None);
        assert!(store.remove(LOG_FILTER_SETTING, &[Partition::User]).is_some());
        assert_eq!(store.log_filter(), None);
    }

    #[test]
    fn test_persistable_partitions() {
        assert!(Partition::User.is_persistable());
        assert!(Partition::Project.is_persistable());
        assert!(!Partition::General.is_persistable());
        assert!(!Partition::Volatile.is_persistable());
    }
}

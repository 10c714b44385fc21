//! Last-known modification times of polled objects

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Object name → modification time recorded at its last download.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectStateStore {
    objects: BTreeMap<String, DateTime<Utc>>,
}

impl ObjectStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load state from a JSON file. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// True when the object was never recorded or `file_time` is strictly newer.
    pub fn is_object_outdated(&self, file_time: DateTime<Utc>, object_name: &str) -> bool {
        match self.objects.get(object_name) {
            Some(recorded) => file_time > *recorded,
            None => true,
        }
    }

    pub fn record(&mut self, object_name: impl Into<String>, file_time: DateTime<Utc>) {
        self.objects.insert(object_name.into(), file_time);
    }

    pub fn last_modified(&self, object_name: &str) -> Option<DateTime<Utc>> {
        self.objects.get(object_name).copied()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_unknown_object_is_outdated() {
        let store = ObjectStateStore::new();
        assert!(store.is_object_outdated(at(0), "a.csv"));
    }

    #[test]
    fn test_only_strictly_newer_is_outdated() {
        let mut store = ObjectStateStore::new();
        store.record("a.csv", at(1_000));

        assert!(!store.is_object_outdated(at(999), "a.csv"));
        assert!(!store.is_object_outdated(at(1_000), "a.csv"));
        assert!(store.is_object_outdated(at(1_001), "a.csv"));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = ObjectStateStore::load(&temp.path().join("missing.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_creates_parent_and_reloads() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("state.json");

        let mut store = ObjectStateStore::new();
        store.record("a.csv", Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap());
        store.record("b.csv", at(42));
        store.save(&path).unwrap();

        let loaded = ObjectStateStore::load(&path).unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.last_modified("b.csv"), Some(at(42)));
    }

    #[test]
    fn test_load_corrupt_file_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            ObjectStateStore::load(&path),
            Err(crate::PollerError::Json(_))
        ));
    }
}

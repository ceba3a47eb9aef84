use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tab_reconciler::{RegistryEntries, RegistryStore, StoreError};

/// Managed-tab registry persisted as a JSON object keyed by login.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-save leaves the previous registry intact.
#[derive(Clone, Debug)]
pub struct JsonRegistryStore {
    path: PathBuf,
}

impl JsonRegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RegistryStore for JsonRegistryStore {
    fn load(&mut self) -> Result<RegistryEntries, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RegistryEntries::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(RegistryEntries::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Encoding(e.to_string()))
    }

    fn save(&mut self, entries: &RegistryEntries) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json =
            serde_json::to_vec_pretty(entries).map_err(|e| StoreError::Encoding(e.to_string()))?;
        let tmp = self.tmp_path();
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tab_reconciler::{Login, ManagedEntry, TabId};

    fn entries() -> RegistryEntries {
        let now = Utc::now();
        let mut entries = RegistryEntries::new();
        entries.insert(
            Login::parse("alice").unwrap(),
            ManagedEntry {
                tab_id: TabId::new("T1"),
                opened_at: now,
                touched_at: now,
            },
        );
        entries
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = JsonRegistryStore::new(tmp.path().join("registry.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state").join("registry.json");
        let mut store = JsonRegistryStore::new(&path);
        let saved = entries();
        store.save(&saved).unwrap();

        assert!(path.exists());
        assert!(!tmp.path().join("state/registry.json.tmp").exists());

        let mut reopened = JsonRegistryStore::new(&path);
        assert_eq!(reopened.load().unwrap(), saved);
    }

    #[test]
    fn test_file_is_keyed_by_login() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("registry.json");
        JsonRegistryStore::new(&path).save(&entries()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["alice"]["tab_id"], "T1");
    }

    #[test]
    fn test_corrupt_file_is_an_encoding_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("registry.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = JsonRegistryStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Encoding(_)));
    }

    #[test]
    fn test_empty_file_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("registry.json");
        std::fs::write(&path, "\n").unwrap();
        assert!(JsonRegistryStore::new(&path).load().unwrap().is_empty());
    }
}

//! File-backed key/value store.
//!
//! Stores all keys in one JSON object at `<dir>/state.json`. Writes go to a
//! temp file and are renamed into place. A file that is not valid UTF-8 JSON is moved
//! aside to `state.json.corrupt` and treated as empty.

use anyhow::Context;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::KeyValueStore;

const STATE_FILE: &str = "state.json";

pub struct FileKvStore {
    path: PathBuf,
    // serialises read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileKvStore {
    pub fn open(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create state directory {}", dir.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(0o700)) {
                tracing::warn!("failed to set state directory permissions: {}", e);
            }
        }

        Ok(Self {
            path: dir.join(STATE_FILE),
            write_lock: Mutex::new(()),
        })
    }

    /// Default location: `<data dir>/gatekeeper`.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("gatekeeper"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> anyhow::Result<BTreeMap<String, String>> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", self.path.display()))
            }
        };

        let parsed = std::str::from_utf8(&bytes)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str(content).map_err(|e| e.to_string()));

        match parsed {
            Ok(map) => Ok(map),
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "local state file is corrupted ({}); starting empty",
                    err
                );
                preserve_corrupt_state(&self.path, &bytes);
                Ok(BTreeMap::new())
            }
        }
    }
}

impl KeyValueStore for FileKvStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        let content = serde_json::to_string_pretty(&map)?;
        write_state_atomic(&self.path, &content)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

fn preserve_corrupt_state(path: &Path, content: &[u8]) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

fn write_state_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
            tracing::warn!("failed to set state file permissions: {}", e);
        }
    }

    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    drop(file);

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).unwrap();
        assert_eq!(store.get("accessCodes").unwrap(), None);
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FileKvStore::open(dir.path()).unwrap();
            store.set("approvalStatus", "approved").unwrap();
            store.set("accessCodes", r#"["40231"]"#).unwrap();
        }
        let reopened = FileKvStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get("approvalStatus").unwrap().as_deref(), Some("approved"));
        assert_eq!(reopened.get("accessCodes").unwrap().as_deref(), Some(r#"["40231"]"#));
    }

    #[test]
    fn test_corrupt_file_is_moved_aside() {
        let dir = tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).unwrap();
        fs::write(store.path(), "{not json").unwrap();

        assert_eq!(store.get("accessCodes").unwrap(), None);
        assert!(dir.path().join("state.json.corrupt").exists());

        // writes still work afterwards
        store.set("accessCodes", "[]").unwrap();
        assert_eq!(store.get("accessCodes").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_non_utf8_file_is_moved_aside() {
        let dir = tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).unwrap();
        fs::write(store.path(), [0xff, 0xfe, 0x00]).unwrap();

        assert_eq!(store.get("approvalStatus").unwrap(), None);
        assert!(dir.path().join("state.json.corrupt").exists());

        store.set("approvalStatus", "approved").unwrap();
        let reopened = FileKvStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get("approvalStatus").unwrap().as_deref(), Some("approved"));
    }

    #[test]
    fn test_set_overwrites_single_key() {
        let dir = tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).unwrap();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.set("a", "3").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("3"));
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
        assert!(!dir.path().join("state.tmp").exists());
    }
}

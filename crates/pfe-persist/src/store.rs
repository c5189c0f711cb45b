//! Key-value stores and the address bar.
//!
//! A [`StateStore`] is session-scoped string storage keyed by name; an
//! [`AddressBar`] holds the current query string. Both are thin seams so the
//! engine can run against memory in tests and against the filesystem from
//! the CLI.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use pfe_core::SessionId;

use crate::error::PersistenceError;

// ─── Stores ──────────────────────────────────────────────────────────

/// Session-scoped key-value storage.
pub trait StateStore: Send + Sync {
    /// The value under `key`, if any.
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    /// Replace the value under `key`.
    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
    /// Delete `key`. Absent keys are not an error.
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// In-process store. Clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // Poison is ignored; every mutation is a single map operation.
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl StateStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.lock().remove(key);
        Ok(())
    }
}

/// A directory holding one `<key>.json` file per key.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never observes a half-written snapshot.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Use (and create if needed) `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| PersistenceError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// The directory of one session under `root`.
    pub fn for_session(root: impl AsRef<Path>, session: &SessionId) -> Result<Self, PersistenceError> {
        Self::new(root.as_ref().join(session.to_string()))
    }

    /// The backing directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(PersistenceError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl StateStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.file_for(key)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::io(path, e)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let path = self.file_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|e| PersistenceError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| PersistenceError::io(&path, e))
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let path = self.file_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistenceError::io(path, e)),
        }
    }
}

// ─── Address bar ─────────────────────────────────────────────────────

/// The page's query string.
pub trait AddressBar: Send + Sync {
    /// Current query string, without a leading `?`.
    fn query(&self) -> String;
    /// Replace the query string without adding a history entry.
    fn replace_query(&self, query: &str) -> Result<(), PersistenceError>;
}

/// In-process address bar. Clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryAddressBar {
    query: Arc<Mutex<String>>,
}

impl MemoryAddressBar {
    /// Start at `query` (a leading `?` is dropped).
    pub fn new(query: impl Into<String>) -> Self {
        let query = query.into();
        let query = query.strip_prefix('?').map(str::to_string).unwrap_or(query);
        Self {
            query: Arc::new(Mutex::new(query)),
        }
    }
}

impl AddressBar for MemoryAddressBar {
    fn query(&self) -> String {
        self.query.lock().map(|q| q.clone()).unwrap_or_else(|p| p.into_inner().clone())
    }

    fn replace_query(&self, query: &str) -> Result<(), PersistenceError> {
        let mut guard = self.query.lock().unwrap_or_else(|p| p.into_inner());
        *guard = query.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_shared_between_clones() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.write("k", "v").unwrap();
        assert_eq!(other.read("k").unwrap().as_deref(), Some("v"));
        other.remove("k").unwrap();
        assert_eq!(store.read("k").unwrap(), None);
    }

    #[test]
    fn test_file_store_read_write_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path().join("nested/dir")).unwrap();
        assert_eq!(store.read("portfolio-filters").unwrap(), None);
        store.write("portfolio-filters", "{\"a\":1}").unwrap();
        store.write("portfolio-filters", "{\"a\":2}").unwrap();
        assert_eq!(store.read("portfolio-filters").unwrap().as_deref(), Some("{\"a\":2}"));
        assert!(store.dir().join("portfolio-filters.json").exists());
        assert!(!store.dir().join("portfolio-filters.json.tmp").exists());
        store.remove("portfolio-filters").unwrap();
        store.remove("portfolio-filters").unwrap();
        assert_eq!(store.read("portfolio-filters").unwrap(), None);
    }

    #[test]
    fn test_file_store_sessions_are_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let a = FileStore::for_session(tmp.path(), &SessionId::new()).unwrap();
        let b = FileStore::for_session(tmp.path(), &SessionId::new()).unwrap();
        a.write("k", "from a").unwrap();
        assert_eq!(b.read("k").unwrap(), None);
    }

    #[test]
    fn test_file_store_rejects_escaping_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path()).unwrap();
        for key in ["", "../etc", "a/b", ".hidden"] {
            assert!(matches!(store.write(key, "x"), Err(PersistenceError::InvalidKey(_))), "{key}");
        }
    }

    #[test]
    fn test_address_bar_strips_question_mark() {
        let bar = MemoryAddressBar::new("?f_riskGrades=CM1");
        assert_eq!(bar.query(), "f_riskGrades=CM1");
        bar.replace_query("x=1").unwrap();
        assert_eq!(bar.clone().query(), "x=1");
    }
}

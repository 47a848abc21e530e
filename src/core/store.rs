// src/core/store.rs

//! Persistent name-keyed stores for macros and aliases.
//!
//! A store is loaded whole through a [`Repository`], mutated in memory and
//! written back whole on [`NamedStore::flush`]. Mutations are journaled the
//! same way for both kinds of store: the first write access keeps a snapshot
//! of the loaded state, and a flush only touches the disk when the current
//! state differs from that snapshot.

use serde::{Serialize, de::DeserializeOwned};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or saving a store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("Could not access store file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The backing file is not valid JSON for this store.
    #[error("Store file '{path}' is malformed: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// The temporary file could not be moved over the store file.
    #[error("Could not replace store file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Whole-collection persistence.
pub trait Repository<T> {
    fn load(&self) -> Result<T, StoreError>;
    fn save(&self, value: &T) -> Result<(), StoreError>;
}

/// A pretty-printed JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    /// A repository backed by the JSON file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl<T> Repository<T> for JsonFileRepository
where
    T: Serialize + DeserializeOwned + Default,
{
    fn load(&self) -> Result<T, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(self.io_error(e)),
        };
        if content.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Json {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn save(&self, value: &T) -> Result<(), StoreError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        serde_json::to_writer_pretty(&mut tmp, value).map_err(|source| StoreError::Json {
            path: self.path.display().to_string(),
            source,
        })?;
        tmp.write_all(b"\n").map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path)?;

        log::debug!("Saved store to '{}'", self.path.display());
        Ok(())
    }
}

/// Keeps the collection in memory only.
#[derive(Debug, Default)]
pub struct MemoryRepository<T> {
    value: RefCell<T>,
}

impl<T: Clone> Repository<T> for MemoryRepository<T> {
    fn load(&self) -> Result<T, StoreError> {
        Ok(self.value.borrow().clone())
    }

    fn save(&self, value: &T) -> Result<(), StoreError> {
        *self.value.borrow_mut() = value.clone();
        Ok(())
    }
}

// --- Journaled store ---

enum StoreState<T> {
    /// Nothing was mutably accessed since the last load or flush.
    Pristine(T),
    /// Mutably accessed: `original` is the last persisted state.
    Dirty { original: T, current: T },
}

/// A case-insensitive map from user-defined names to stored values.
pub struct NamedStore<V> {
    state: StoreState<BTreeMap<String, V>>,
    repository: Box<dyn Repository<BTreeMap<String, V>>>,
}

/// Macro name -> ordered raw segment texts.
pub type MacroStore = NamedStore<Vec<String>>;

/// Alias name -> one raw segment text.
pub type AliasStore = NamedStore<String>;

impl<V> NamedStore<V>
where
    V: Clone + PartialEq + 'static,
{
    /// Loads the store from `repository`, lowercasing every key.
    pub fn open(repository: Box<dyn Repository<BTreeMap<String, V>>>) -> Result<Self, StoreError> {
        let loaded = repository.load()?;
        let entries = loaded
            .into_iter()
            .map(|(name, value)| (name.to_lowercase(), value))
            .collect();
        Ok(Self {
            state: StoreState::Pristine(entries),
            repository,
        })
    }

    /// An empty store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            state: StoreState::Pristine(BTreeMap::new()),
            repository: Box::new(MemoryRepository {
                value: RefCell::new(BTreeMap::new()),
            }),
        }
    }

    fn entries(&self) -> &BTreeMap<String, V> {
        match &self.state {
            StoreState::Pristine(entries) => entries,
            StoreState::Dirty { current, .. } => current,
        }
    }

    fn entries_mut(&mut self) -> &mut BTreeMap<String, V> {
        if let StoreState::Pristine(entries) = &mut self.state {
            let current = std::mem::take(entries);
            self.state = StoreState::Dirty {
                original: current.clone(),
                current,
            };
        }
        match &mut self.state {
            StoreState::Dirty { current, .. } => current,
            StoreState::Pristine(entries) => entries,
        }
    }

    /// Looks up `name` case-insensitively.
    pub fn get(&self, name: &str) -> Option<&V> {
        self.entries().get(&name.to_lowercase())
    }

    /// True when `name` is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.entries().contains_key(&name.to_lowercase())
    }

    /// Inserts or replaces `name`, returning the previous value.
    pub fn insert(&mut self, name: &str, value: V) -> Option<V> {
        self.entries_mut().insert(name.to_lowercase(), value)
    }

    /// Removes `name` and returns its value.
    pub fn remove(&mut self, name: &str) -> Option<V> {
        if !self.contains(name) {
            return None;
        }
        self.entries_mut().remove(&name.to_lowercase())
    }

    /// Removes every entry, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.len();
        if count > 0 {
            self.entries_mut().clear();
        }
        count
    }

    /// Entries sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.entries().iter()
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// True when nothing is defined.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// True when the in-memory state differs from what was last persisted.
    pub fn needs_saving(&self) -> bool {
        match &self.state {
            StoreState::Pristine(_) => false,
            StoreState::Dirty { original, current } => original != current,
        }
    }

    /// Writes the whole collection if it changed. Returns whether a write happened.
    pub fn flush(&mut self) -> Result<bool, StoreError> {
        let saved = if self.needs_saving() {
            self.repository.save(self.entries())?;
            true
        } else {
            false
        };
        if let StoreState::Dirty { current, .. } = &mut self.state {
            let current = std::mem::take(current);
            self.state = StoreState::Pristine(current);
        }
        Ok(saved)
    }
}

impl<V: fmt::Debug + Clone + PartialEq + 'static> fmt::Debug for NamedStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedStore")
            .field("entries", self.entries())
            .field("dirty", &self.needs_saving())
            .finish_non_exhaustive()
    }
}

/// Opens a JSON-backed store at `path`.
pub fn open_json_store<V>(path: impl Into<PathBuf>) -> Result<NamedStore<V>, StoreError>
where
    V: Clone + PartialEq + Serialize + DeserializeOwned + 'static,
{
    NamedStore::open(Box::new(JsonFileRepository::new(path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_macro_store_round_trips_losslessly() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let path = dir.path().join("macros.json");
        let mut store: MacroStore = open_json_store(&path).unwrap();
        store.insert(
            "Demo",
            vec![
                "create folder 'T' in '.'".to_string(),
                "create file 'f.txt' in 'T' with text=\"a;b\"".to_string(),
            ],
        );
        store.insert("stamp", vec!["echo %NOW%".to_string()]);

        // --- Execute ---
        assert!(store.flush().unwrap());
        let reloaded: MacroStore = open_json_store(&path).unwrap();

        // --- Assert ---
        let original: Vec<_> = store.iter().collect();
        let restored: Vec<_> = reloaded.iter().collect();
        assert_eq!(original, restored);
        assert_eq!(reloaded.get("DEMO").map(Vec::len), Some(2));
    }

    #[test]
    fn test_keys_are_lowercased_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aliases.json");
        fs::write(&path, r#"{ "LL": "list '.'" }"#).unwrap();

        let store: AliasStore = open_json_store(&path).unwrap();

        assert_eq!(store.get("ll").map(String::as_str), Some("list '.'"));
        assert!(store.contains("Ll"));
    }

    #[test]
    fn test_missing_file_is_an_empty_store() {
        let dir = tempdir().unwrap();
        let store: AliasStore = open_json_store(dir.path().join("nope.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_malformed_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aliases.json");
        fs::write(&path, "{ not json").unwrap();

        let result: Result<AliasStore, _> = open_json_store(&path);

        assert!(matches!(result, Err(StoreError::Json { .. })));
    }

    #[test]
    fn test_flush_skips_unchanged_state() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let path = dir.path().join("aliases.json");
        let mut store: AliasStore = open_json_store(&path).unwrap();

        // --- Execute & Assert ---
        store.insert("x", "pwd".to_string());
        store.remove("x");
        assert!(!store.needs_saving());
        assert!(!store.flush().unwrap());
        assert!(!path.exists());

        store.insert("x", "pwd".to_string());
        assert!(store.needs_saving());
        assert!(store.flush().unwrap());
        assert!(path.exists());
        assert!(!store.needs_saving());
    }

    #[test]
    fn test_clear_reports_count() {
        let mut store: AliasStore = NamedStore::in_memory();
        store.insert("a", "pwd".into());
        store.insert("b", "home".into());
        assert_eq!(store.clear(), 2);
        assert_eq!(store.clear(), 0);
        assert!(store.is_empty());
    }
}

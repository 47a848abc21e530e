// src/core/path_index.rs

//! The local path index: a persisted snapshot of scanned filesystem paths.
//!
//! ## Consistency
//!
//! Readers take an `Arc` of the current [`IndexSnapshot`] and never hold a lock
//! while they work. A rebuild scans its roots in parallel, then, under the
//! single writer lock, applies a purge-then-insert per root to a copy of the
//! snapshot, persists the copy and swaps it in. A query therefore sees either
//! the old or the new snapshot, never a mix.
//!
//! ## File format
//!
//! `MAGIC (8 bytes) | blake3(payload) (32 bytes) | payload`, where the payload
//! is the `bincode` encoding of the snapshot compressed with `lz4_flex`.

use crate::core::path_query::{self, QueryResult};
use crate::core::paths::{is_under, normalize_path};
use crate::dev_utils::BlockTimer;
use crate::models::IndexEntry;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant, UNIX_EPOCH};
use thiserror::Error;
use walkdir::WalkDir;

const SNAPSHOT_MAGIC: &[u8; 8] = b"CMCIDX01";
const DIGEST_LEN: usize = 32;

/// Represents errors that can occur while building, loading or saving the index.
#[derive(Error, Debug)]
pub enum IndexError {
    /// A filesystem I/O error occurred.
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    /// A root directory could not be opened.
    #[error("Cannot scan '{root}': {source}")]
    RootUnavailable {
        /// The root as given by the user.
        root: String,
        #[source]
        source: std::io::Error,
    },
    /// A root exists but is not a directory.
    #[error("Cannot scan '{root}': not a directory")]
    NotADirectory {
        /// The root as given by the user.
        root: String,
    },
    /// The snapshot file does not start with the expected header.
    #[error("Index file is not a cmc path index")]
    BadHeader,
    /// The snapshot payload does not match its recorded digest.
    #[error("Index file is corrupt (expected digest {expected}, found {actual})")]
    Corrupt {
        /// Digest prefix stored in the file.
        expected: String,
        /// Digest prefix of the payload actually read.
        actual: String,
    },
    /// The payload could not be decompressed.
    #[error("Failed to decompress index: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),
    /// An error occurred while deserializing data from `bincode` binary format.
    #[error("Failed to decode from binary format: {0}")]
    BincodeDecode(#[from] bincode::error::DecodeError),
    /// An error occurred while serializing data to `bincode` binary format.
    #[error("Failed to encode to binary format: {0}")]
    BincodeEncode(#[from] bincode::error::EncodeError),
    /// The temporary snapshot file could not replace the index file.
    #[error("Could not replace index file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Result alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

// --- SNAPSHOT ---

/// Every indexed entry keyed by normalized path, plus the roots they came from.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSnapshot {
    /// Normalized roots that were scanned.
    pub roots: BTreeSet<String>,
    /// Entries keyed by normalized path.
    pub entries: BTreeMap<String, IndexEntry>,
}

impl IndexSnapshot {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes everything under `root`, then inserts `fresh`.
    /// Returns how many entries were purged.
    fn replace_root(&mut self, root: &str, fresh: Vec<IndexEntry>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| !is_under(path, root));
        let purged = before - self.entries.len();

        for entry in fresh {
            self.entries.insert(entry.path.clone(), entry);
        }

        if !self.roots.iter().any(|known| is_under(root, known)) {
            self.roots.retain(|known| !is_under(known, root));
            self.roots.insert(root.to_string());
        }
        purged
    }
}

// --- REBUILD REPORTS ---

/// Outcome of scanning one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootScan {
    /// Normalized root path.
    pub root: String,
    /// Entries now indexed under the root.
    pub entries: usize,
    /// Entries from an earlier scan that were removed.
    pub purged: usize,
    /// Entries skipped because they could not be read.
    pub unreadable: usize,
}

/// A root that could not be scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootFailure {
    /// The root as given.
    pub root: String,
    /// Why the scan failed.
    pub reason: String,
}

/// Summary of one `qbuild`.
#[derive(Debug, Clone, Default)]
pub struct RebuildReport {
    /// Roots scanned successfully.
    pub scanned: Vec<RootScan>,
    /// Roots that failed.
    pub failures: Vec<RootFailure>,
    /// Entry count after the rebuild.
    pub total_entries: usize,
    /// Wall time of the whole rebuild.
    pub elapsed: Duration,
}

// --- INDEX ---

/// The path index: an immutable snapshot behind a lock, swapped whole after each rebuild.
#[derive(Debug)]
pub struct PathIndex {
    current: RwLock<Arc<IndexSnapshot>>,
    writer: Mutex<()>,
    store: Option<PathBuf>,
}

impl PathIndex {
    /// An empty index that is never persisted.
    pub fn in_memory() -> Self {
        Self {
            current: RwLock::new(Arc::new(IndexSnapshot::default())),
            writer: Mutex::new(()),
            store: None,
        }
    }

    /// Opens the index persisted at `store`. A missing file is an empty index.
    ///
    /// # Errors
    /// Fails when the file exists but cannot be read or verified.
    pub fn open(store: impl Into<PathBuf>) -> IndexResult<Self> {
        let store = store.into();
        let snapshot = match fs::read(&store) {
            Ok(bytes) => decode_snapshot(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => IndexSnapshot::default(),
            Err(e) => return Err(e.into()),
        };
        log::debug!(
            "Loaded path index '{}' with {} entries",
            store.display(),
            snapshot.len()
        );
        Ok(Self {
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
            store: Some(store),
        })
    }

    /// Like [`PathIndex::open`], but starts empty (keeping the same file)
    /// when the existing file is unusable.
    pub fn open_or_reset(store: impl Into<PathBuf>) -> Self {
        let store = store.into();
        match Self::open(store.clone()) {
            Ok(index) => index,
            Err(e) => {
                log::warn!("Ignoring unusable path index '{}': {}", store.display(), e);
                Self {
                    store: Some(store),
                    ..Self::in_memory()
                }
            }
        }
    }

    /// The snapshot currently visible to readers.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Number of indexed entries.
    pub fn count(&self) -> usize {
        self.snapshot().len()
    }

    /// Indexed roots, sorted.
    pub fn roots(&self) -> Vec<String> {
        self.snapshot().roots.iter().cloned().collect()
    }

    /// Fuzzy multi-term lookup. See [`path_query::run_query`].
    pub fn query(&self, text: &str, limit: usize) -> QueryResult {
        path_query::run_query(&self.snapshot(), text, limit)
    }

    /// Rescans `roots` and replaces their entries.
    ///
    /// Roots are scanned in parallel. A root that cannot be scanned is
    /// reported in [`RebuildReport::failures`] and keeps its previous entries.
    ///
    /// # Errors
    /// Fails only when the new snapshot cannot be persisted; the visible
    /// snapshot is unchanged in that case.
    pub fn rebuild(&self, roots: &[PathBuf]) -> IndexResult<RebuildReport> {
        let started = Instant::now();
        let _timer = BlockTimer::new("path index rebuild");

        let results: Vec<(String, IndexResult<ScannedRoot>)> = roots
            .par_iter()
            .map(|root| (root.display().to_string(), scan_root(root)))
            .collect();

        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = IndexSnapshot::clone(&self.snapshot());
        let mut report = RebuildReport::default();

        for (label, result) in results {
            match result {
                Ok(scanned) => {
                    let entries = scanned.entries.len();
                    let purged = next.replace_root(&scanned.root, scanned.entries);
                    log::info!(
                        "Indexed '{}': {} entries ({} replaced, {} unreadable)",
                        scanned.root,
                        entries,
                        purged,
                        scanned.unreadable
                    );
                    report.scanned.push(RootScan {
                        root: scanned.root,
                        entries,
                        purged,
                        unreadable: scanned.unreadable,
                    });
                }
                Err(e) => {
                    log::warn!("Skipping root '{}': {}", label, e);
                    report.failures.push(RootFailure {
                        root: label,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !report.scanned.is_empty() {
            if let Some(store) = &self.store {
                write_snapshot(store, &next)?;
            }
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            *current = Arc::new(next);
        }

        report.total_entries = self.count();
        report.elapsed = started.elapsed();
        Ok(report)
    }
}

// --- SCANNING ---

struct ScannedRoot {
    root: String,
    entries: Vec<IndexEntry>,
    unreadable: usize,
}

fn scan_root(root: &Path) -> IndexResult<ScannedRoot> {
    let label = root.display().to_string();
    let canonical = dunce::canonicalize(root).map_err(|source| IndexError::RootUnavailable {
        root: label.clone(),
        source,
    })?;
    if !canonical.is_dir() {
        return Err(IndexError::NotADirectory { root: label });
    }

    let root_key = normalize_path(&canonical);
    let mut entries = Vec::new();
    let mut unreadable = 0;

    for item in WalkDir::new(&canonical).min_depth(1).follow_links(false) {
        match item {
            Ok(entry) => entries.push(index_entry(&entry)),
            Err(e) => {
                unreadable += 1;
                log::debug!("Unreadable entry under '{}': {}", root_key, e);
            }
        }
    }

    Ok(ScannedRoot {
        root: root_key,
        entries,
        unreadable,
    })
}

fn index_entry(entry: &walkdir::DirEntry) -> IndexEntry {
    let metadata = entry.metadata().ok();
    IndexEntry {
        path: normalize_path(entry.path()),
        is_dir: entry.file_type().is_dir(),
        size: metadata.as_ref().filter(|m| m.is_file()).map(|m| m.len()),
        modified: metadata
            .and_then(|m| m.modified().ok())
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|elapsed| elapsed.as_secs()),
    }
}

// --- PERSISTENCE ---

fn encode_snapshot(snapshot: &IndexSnapshot) -> IndexResult<Vec<u8>> {
    let encoded = bincode::serde::encode_to_vec(snapshot, bincode::config::standard())?;
    let payload = lz4_flex::compress_prepend_size(&encoded);
    let digest = blake3::hash(&payload);

    let mut bytes = Vec::with_capacity(SNAPSHOT_MAGIC.len() + DIGEST_LEN + payload.len());
    bytes.extend_from_slice(SNAPSHOT_MAGIC);
    bytes.extend_from_slice(digest.as_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

fn decode_snapshot(bytes: &[u8]) -> IndexResult<IndexSnapshot> {
    let header_len = SNAPSHOT_MAGIC.len();
    if bytes.get(..header_len) != Some(SNAPSHOT_MAGIC.as_slice()) {
        return Err(IndexError::BadHeader);
    }
    let stored_digest = bytes
        .get(header_len..header_len + DIGEST_LEN)
        .ok_or(IndexError::BadHeader)?;
    let payload = bytes.get(header_len + DIGEST_LEN..).unwrap_or_default();

    let actual = blake3::hash(payload);
    if actual.as_bytes().as_slice() != stored_digest {
        return Err(IndexError::Corrupt {
            expected: short_hex(stored_digest),
            actual: short_hex(actual.as_bytes()),
        });
    }

    let encoded = lz4_flex::decompress_size_prepended(payload)?;
    let (snapshot, _) =
        bincode::serde::decode_from_slice(&encoded, bincode::config::standard())?;
    Ok(snapshot)
}

fn short_hex(digest: &[u8]) -> String {
    hex::encode(digest.get(..8).unwrap_or(digest))
}

fn write_snapshot(path: &Path, snapshot: &IndexSnapshot) -> IndexResult<()> {
    let bytes = encode_snapshot(snapshot)?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    log::debug!("Saved path index ({} bytes) to '{}'", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_rebuild_records_one_entry_per_object() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        touch(&dir.path().join("server/logs/today.log"));
        touch(&dir.path().join("notes.txt"));
        let index = PathIndex::in_memory();

        // --- Execute ---
        let report = index.rebuild(&[dir.path().to_path_buf()]).unwrap();

        // --- Assert ---
        // server, server/logs, server/logs/today.log, notes.txt
        assert_eq!(index.count(), 4);
        assert_eq!(report.total_entries, 4);
        assert!(report.failures.is_empty());
        let snapshot = index.snapshot();
        let file = snapshot
            .entries
            .values()
            .find(|e| e.path.ends_with("/notes.txt"))
            .unwrap();
        assert!(!file.is_dir);
        assert_eq!(file.size, Some(1));
        assert!(file.modified.is_some());
        assert!(!file.path.contains('\\'));
    }

    #[test]
    fn test_rebuild_purges_entries_deleted_from_disk() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let doomed = dir.path().join("old/report-2019.txt");
        touch(&doomed);
        touch(&dir.path().join("keep.txt"));
        let index = PathIndex::in_memory();
        index.rebuild(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(index.query("report-2019", 10).hits.len(), 1);

        // --- Execute ---
        fs::remove_file(&doomed).unwrap();
        let report = index.rebuild(&[dir.path().to_path_buf()]).unwrap();

        // --- Assert ---
        assert!(index.query("report-2019", 10).hits.is_empty());
        assert_eq!(report.scanned.first().map(|s| s.purged), Some(3));
        assert_eq!(index.count(), 2);
    }

    #[test]
    fn test_failing_root_does_not_stop_the_others() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("a.txt"));
        let missing = dir.path().join("no-such-drive");
        let index = PathIndex::in_memory();

        let report = index
            .rebuild(&[missing.clone(), dir.path().to_path_buf()])
            .unwrap();

        assert_eq!(report.scanned.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.failures.first().map(|f| f.root.clone()),
            Some(missing.display().to_string())
        );
        assert_eq!(index.count(), 1);
    }

    #[test]
    fn test_rebuilding_one_root_keeps_other_roots() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        touch(&first.path().join("one.txt"));
        touch(&second.path().join("two.txt"));
        let index = PathIndex::in_memory();
        index
            .rebuild(&[first.path().to_path_buf(), second.path().to_path_buf()])
            .unwrap();

        fs::remove_file(first.path().join("one.txt")).unwrap();
        index.rebuild(&[first.path().to_path_buf()]).unwrap();

        assert!(index.query("one.txt", 5).hits.is_empty());
        assert_eq!(index.query("two.txt", 5).hits.len(), 1);
        assert_eq!(index.roots().len(), 2);
    }

    #[test]
    fn test_snapshot_survives_reopen() {
        // --- Setup ---
        let data = tempdir().unwrap();
        touch(&data.path().join("world/level.dat"));
        let store_dir = tempdir().unwrap();
        let store = store_dir.path().join("paths.idx");

        // --- Execute ---
        let index = PathIndex::open(&store).unwrap();
        index.rebuild(&[data.path().to_path_buf()]).unwrap();
        let reopened = PathIndex::open(&store).unwrap();

        // --- Assert ---
        assert_eq!(*reopened.snapshot(), *index.snapshot());
        assert_eq!(reopened.count(), 2);
    }

    #[test]
    fn test_corrupt_snapshot_is_detected() {
        let store_dir = tempdir().unwrap();
        let store = store_dir.path().join("paths.idx");
        let mut snapshot = IndexSnapshot::default();
        snapshot.replace_root(
            "/r",
            vec![IndexEntry {
                path: "/r/a".into(),
                is_dir: false,
                size: Some(3),
                modified: None,
            }],
        );
        let mut bytes = encode_snapshot(&snapshot).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&store, &bytes).unwrap();

        assert!(matches!(PathIndex::open(&store), Err(IndexError::Corrupt { .. })));
        assert_eq!(PathIndex::open_or_reset(&store).count(), 0);

        fs::write(&store, b"garbage").unwrap();
        assert!(matches!(PathIndex::open(&store), Err(IndexError::BadHeader)));
    }

    #[test]
    fn test_queries_run_while_rebuilding() {
        let dir = tempdir().unwrap();
        for i in 0..50 {
            touch(&dir.path().join(format!("dir{}/file{}.txt", i % 5, i)));
        }
        let index = PathIndex::in_memory();
        index.rebuild(&[dir.path().to_path_buf()]).unwrap();
        let expected = index.count();

        std::thread::scope(|scope| {
            scope.spawn(|| index.rebuild(&[dir.path().to_path_buf()]).unwrap());
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..20 {
                        // Either the old or the new snapshot: both are complete.
                        assert_eq!(index.count(), expected);
                        assert_eq!(index.query("file7.txt", 5).hits.len(), 1);
                    }
                });
            }
        });
    }
}

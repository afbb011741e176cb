//! Per-scan memoization of file indexes.
//!
//! One `ScanCache` lives for one scan and is passed by reference into every
//! lookup. Entries are keyed by `(revision, path, language)` so the base and
//! target snapshots of a path never collide.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, trace};

use crate::analysis::{get_indexer_for_path, FileIndex, LanguageIndexer};
use crate::errors::{IndexError, RepoError};
use crate::repo::Repository;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub revision: String,
    pub path: String,
    pub language: String,
}

/// Counters for tests and debug logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

#[derive(Default)]
pub struct ScanCache {
    indexes: RwLock<HashMap<CacheKey, Arc<FileIndex>>>,
    files: RwLock<HashMap<String, Arc<Vec<String>>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl ScanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `path` at `revision`, or `Ok(None)` when no indexer handles
    /// the path. A file absent at `revision` is `IndexError::Repo(NotFound)`.
    pub fn file_index(
        &self,
        repo: &dyn Repository,
        revision: &str,
        path: &str,
    ) -> Result<Option<Arc<FileIndex>>, IndexError> {
        match get_indexer_for_path(path) {
            Some(indexer) => self.index_with(repo, indexer, revision, path).map(Some),
            None => Ok(None),
        }
    }

    /// Index of `path` at `revision` using a specific indexer.
    pub fn index_with(
        &self,
        repo: &dyn Repository,
        indexer: &dyn LanguageIndexer,
        revision: &str,
        path: &str,
    ) -> Result<Arc<FileIndex>, IndexError> {
        let key = CacheKey {
            revision: revision.to_string(),
            path: path.to_string(),
            language: indexer.language_id().to_string(),
        };

        if let Some(index) = read(&self.indexes).get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(revision, path, "index cache hit");
            return Ok(Arc::clone(index));
        }

        let lines = repo.show_file(revision, path)?;
        let mut source = lines.join("\n");
        source.push('\n');
        let index = indexer
            .analyze(&source, path)
            .map_err(|e| IndexError::analyze(path, e.to_string()))?;

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(
            revision,
            path,
            constructs = index.constructs.len(),
            "indexed file"
        );

        // Two workers may race on the same key; the first stored entry wins.
        let mut indexes = write(&self.indexes);
        let entry = indexes.entry(key).or_insert_with(|| Arc::new(index));
        Ok(Arc::clone(entry))
    }

    /// Sorted file list at `revision`.
    pub fn list_files(
        &self,
        repo: &dyn Repository,
        revision: &str,
    ) -> Result<Arc<Vec<String>>, RepoError> {
        if let Some(files) = read(&self.files).get(revision) {
            return Ok(Arc::clone(files));
        }
        let files = Arc::new(repo.list_files(revision)?);
        debug!(revision, count = files.len(), "listed files");
        let mut cache = write(&self.files);
        Ok(Arc::clone(
            cache.entry(revision.to_string()).or_insert(files),
        ))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: read(&self.indexes).len(),
        }
    }
}

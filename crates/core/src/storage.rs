//! Byte-level storage for the syllabus document.
//!
//! The store only ever reads the whole document and writes the whole document,
//! so the collaborator contract is two calls: `read` and `write`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::StorageError;

/// A document store keyed by a single location.
pub trait DocumentStorage: Send {
    /// Returns the full stored document.
    fn read(&self) -> Result<Vec<u8>, StorageError>;

    /// Replaces the stored document with `bytes`.
    fn write(&mut self, bytes: &[u8]) -> Result<(), StorageError>;

    /// Human-readable location, used in errors and logs.
    fn location(&self) -> String;
}

impl DocumentStorage for Box<dyn DocumentStorage> {
    fn read(&self) -> Result<Vec<u8>, StorageError> {
        (**self).read()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        (**self).write(bytes)
    }

    fn location(&self) -> String {
        (**self).location()
    }
}

/// Stores the document in a single JSON file.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so readers never observe a half-written document.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentStorage for FileStorage {
    fn read(&self) -> Result<Vec<u8>, StorageError> {
        std::fs::read(&self.path).map_err(|e| StorageError::from_path_io(&self.path, e))
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| StorageError::from_path_io(&self.path, e))?;
        tmp.write_all(bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| StorageError::from_path_io(&self.path, e))?;
        tmp.persist(&self.path)
            .map_err(|e| StorageError::from_path_io(&self.path, e.error))?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Keeps the document in memory and counts writes.
///
/// Clones share the same buffer, so a handle kept outside a store observes
/// everything the store writes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    bytes: Option<Vec<u8>>,
    writes: usize,
    fail_writes: bool,
}

impl InMemoryStorage {
    /// An empty storage; reading it fails with `NotFound` until written.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let storage = Self::new();
        storage.lock().bytes = Some(bytes.into());
        storage
    }

    /// Number of successful writes so far.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    pub fn contents(&self) -> Option<Vec<u8>> {
        self.lock().bytes.clone()
    }

    /// Makes every following write fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A poisoned buffer is still a consistent snapshot.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DocumentStorage for InMemoryStorage {
    fn read(&self) -> Result<Vec<u8>, StorageError> {
        self.lock()
            .bytes
            .clone()
            .ok_or_else(|| StorageError::NotFound {
                location: self.location(),
            })
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(StorageError::io(
                "memory",
                std::io::Error::other("simulated write failure"),
            ));
        }
        state.bytes = Some(bytes.to_vec());
        state.writes += 1;
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

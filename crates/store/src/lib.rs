//! Content-addressed byte storage for analysis artifacts.
//!
//! Every artifact the driver caches (unlinked summaries, linked summaries,
//! diagnostic lists) is stored as an opaque blob under a content-derived key.
//! Because keys are content-addressed, two writers racing on the same key are
//! by construction writing semantically equivalent bytes, so the only
//! consistency rule an implementation must provide is "last put wins".

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use foldhash::HashMap;
use foldhash::HashMapExt;

/// A content-addressed key/value store for analysis artifacts.
///
/// The core assumes that a `put` followed by a `get` within the same process
/// succeeds; nothing else is guaranteed. Implementations may evict at will and
/// may be shared between multiple drivers, so they must tolerate concurrent
/// access.
pub trait ByteStore: Send + Sync {
    /// Looks up the blob stored under `key`, if any.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Stores `bytes` under `key`, replacing any previous value.
    fn put(&self, key: &str, bytes: Vec<u8>);
}

impl<S: ByteStore + ?Sized> ByteStore for Arc<S> {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, bytes: Vec<u8>) {
        (**self).put(key, bytes);
    }
}

/// An in-process byte store backed by a hash map.
///
/// Cloning the store clones a handle, not the contents: all clones share one
/// map, so a store can be handed to several drivers within a process.
#[derive(Debug, Clone, Default)]
pub struct MemoryByteStore {
    blobs: Arc<Mutex<HashMap<String, Arc<[u8]>>>>,
}

impl MemoryByteStore {
    pub fn new() -> Self {
        Self { blobs: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Returns the number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.lock().expect("byte store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the stored keys, unordered.
    pub fn keys(&self) -> Vec<String> {
        self.blobs.lock().expect("byte store lock poisoned").keys().cloned().collect()
    }
}

impl ByteStore for MemoryByteStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.lock().expect("byte store lock poisoned").get(key).map(|blob| blob.to_vec())
    }

    fn put(&self, key: &str, bytes: Vec<u8>) {
        self.blobs.lock().expect("byte store lock poisoned").insert(key.to_string(), bytes.into());
    }
}

/// An on-disk byte store: one file per key under a cache directory.
///
/// Writes go through a temporary sibling file and a rename, so a concurrent
/// reader never observes a half-written blob. Unreadable or missing entries
/// are reported as absent, and write failures are logged and swallowed: a
/// broken cache degrades to recomputation, never to a failed analysis.
#[derive(Debug, Clone)]
pub struct FileByteStore {
    directory: PathBuf,
}

impl FileByteStore {
    /// Opens the store at `directory`, creating it if needed.
    pub fn new(directory: impl Into<PathBuf>) -> std::io::Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;

        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.directory.join(key)
    }
}

impl ByteStore for FileByteStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        std::fs::read(self.entry_path(key)).ok()
    }

    fn put(&self, key: &str, bytes: Vec<u8>) {
        let path = self.entry_path(key);
        let staging = self.directory.join(format!(".{key}.tmp"));

        if let Err(error) = std::fs::write(&staging, &bytes) {
            tracing::warn!("Failed to stage cache entry '{}': {error}", staging.display());
            return;
        }

        if let Err(error) = std::fs::rename(&staging, &path) {
            tracing::warn!("Failed to publish cache entry '{}': {error}", path.display());
            let _ = std::fs::remove_file(&staging);
        }
    }
}

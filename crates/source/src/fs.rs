//! File-system and content-overlay collaborators.

use std::sync::Arc;
use std::sync::Mutex;

use foldhash::HashMap;
use foldhash::HashMapExt;

use crate::SourcePath;

/// Read access to file contents by absolute path.
///
/// This is the only way the driver touches the disk. Failures are surfaced as
/// `io::Error` here; the file tracker coerces them to empty content (a
/// documented compromise of the driver, not of this trait).
pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &SourcePath) -> std::io::Result<String>;
}

/// The real file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read_to_string(&self, path: &SourcePath) -> std::io::Result<String> {
        std::fs::read_to_string(path.as_str())
    }
}

/// An in-process file system for hermetic drivers and tests.
///
/// Clones share contents, so a test can keep a handle and mutate files while
/// a driver holds the same instance.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<Mutex<HashMap<SourcePath, String>>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self { files: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Creates or replaces the file at `path`.
    pub fn write(&self, path: impl Into<SourcePath>, content: impl Into<String>) {
        self.files.lock().expect("file map lock poisoned").insert(path.into(), content.into());
    }

    /// Deletes the file at `path`, if present.
    pub fn remove(&self, path: &SourcePath) {
        self.files.lock().expect("file map lock poisoned").remove(path);
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_to_string(&self, path: &SourcePath) -> std::io::Result<String> {
        self.files
            .lock()
            .expect("file map lock poisoned")
            .get(path)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, format!("no such file: {path}")))
    }
}

/// Per-path content overrides consulted before the file system.
///
/// This is how an editor supplies unsaved buffer contents: the overlay wins
/// over the disk for as long as an entry is present.
pub trait ContentOverlay: Send + Sync {
    fn get(&self, path: &SourcePath) -> Option<String>;
}

/// An overlay with no entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOverlay;

impl ContentOverlay for NoOverlay {
    fn get(&self, _path: &SourcePath) -> Option<String> {
        None
    }
}

/// A mutable in-process overlay; clones share entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryOverlay {
    entries: Arc<Mutex<HashMap<SourcePath, String>>>,
}

impl MemoryOverlay {
    pub fn new() -> Self {
        Self { entries: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn set(&self, path: impl Into<SourcePath>, content: impl Into<String>) {
        self.entries.lock().expect("overlay lock poisoned").insert(path.into(), content.into());
    }

    pub fn clear(&self, path: &SourcePath) {
        self.entries.lock().expect("overlay lock poisoned").remove(path);
    }
}

impl ContentOverlay for MemoryOverlay {
    fn get(&self, path: &SourcePath) -> Option<String> {
        self.entries.lock().expect("overlay lock poisoned").get(path).cloned()
    }
}

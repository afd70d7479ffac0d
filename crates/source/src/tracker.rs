//! The file-state tracker and its ephemeral file handles.
//!
//! The tracker is worker-local state: it is owned by the analysis loop and
//! never crosses a thread boundary, so its maps use plain interior mutability
//! instead of locks. Handles borrow the tracker and therefore cannot outlive
//! the analysis step that created them, which is exactly the lifecycle the
//! driver requires of them.

use std::cell::OnceCell;
use std::cell::RefCell;
use std::sync::Arc;
use std::sync::Mutex;

use foldhash::HashMap;
use foldhash::HashMapExt;
use foldhash::HashSet;

use crate::ContentHash;
use crate::ContentOverlay;
use crate::FileSystem;
use crate::ResolvedSource;
use crate::SourceFactory;
use crate::SourcePath;
use crate::SourceUri;
use crate::SyntaxParser;

/// Tracks the driver's view of the file system: the authoritative
/// path-to-content-hash map and the two-level URI resolution cache.
pub struct FileTracker<P> {
    file_system: Arc<dyn FileSystem>,
    overlay: Arc<dyn ContentOverlay>,
    source_factory: Arc<dyn SourceFactory>,
    parser: P,
    strong_mode: bool,
    hashes: RefCell<HashMap<SourcePath, ContentHash>>,
    uri_resolutions: RefCell<HashMap<SourceUri, HashMap<String, Option<ResolvedSource>>>>,
    known_files: KnownFiles,
}

/// A shareable, read-mostly registry of every path the tracker has ever
/// materialized a handle for: explicit files and files discovered through
/// imports alike. Clones share one set.
#[derive(Debug, Clone, Default)]
pub struct KnownFiles(Arc<Mutex<HashSet<SourcePath>>>);

impl KnownFiles {
    pub fn snapshot(&self) -> Vec<SourcePath> {
        self.0.lock().expect("known-files lock poisoned").iter().cloned().collect()
    }

    pub fn contains(&self, path: &SourcePath) -> bool {
        self.0.lock().expect("known-files lock poisoned").contains(path)
    }

    fn record(&self, path: SourcePath) {
        self.0.lock().expect("known-files lock poisoned").insert(path);
    }
}

impl<P: SyntaxParser> FileTracker<P> {
    pub fn new(
        file_system: Arc<dyn FileSystem>,
        overlay: Arc<dyn ContentOverlay>,
        source_factory: Arc<dyn SourceFactory>,
        parser: P,
        strong_mode: bool,
    ) -> Self {
        Self {
            file_system,
            overlay,
            source_factory,
            parser,
            strong_mode,
            hashes: RefCell::new(HashMap::new()),
            uri_resolutions: RefCell::new(HashMap::new()),
            known_files: KnownFiles::default(),
        }
    }

    /// Materializes a handle for `path`, restoring its canonical URI through
    /// the source factory (falling back to a `file:` URI).
    pub fn handle(&self, path: SourcePath) -> FileHandle<'_, P> {
        let uri = self
            .source_factory
            .restore_uri(&path)
            .unwrap_or_else(|| SourceUri::new(format!("file://{path}")));

        self.handle_with_uri(path, uri)
    }

    fn handle_with_uri(&self, path: SourcePath, uri: SourceUri) -> FileHandle<'_, P> {
        self.known_files.record(path.clone());

        FileHandle { tracker: self, path, uri, content: OnceCell::new() }
    }

    /// The cached content hash for `path`, without reading content.
    pub fn cached_hash(&self, path: &SourcePath) -> Option<ContentHash> {
        self.hashes.borrow().get(path).cloned()
    }

    /// Drops the cached hash for `path`, forcing the next content access to
    /// re-read and re-hash. Used when a path is scheduled for re-verification.
    pub fn forget_hash(&self, path: &SourcePath) {
        self.hashes.borrow_mut().remove(path);
    }

    /// Every path a handle has ever been materialized for, explicit or
    /// discovered through imports.
    pub fn known_files(&self) -> Vec<SourcePath> {
        self.known_files.snapshot()
    }

    /// A shareable handle onto the known-files registry.
    pub fn known_files_handle(&self) -> KnownFiles {
        self.known_files.clone()
    }
}

/// A lazy, ephemeral view over one source file.
///
/// Handles are created inside a single analysis step and dropped with it.
/// `content` is read at most once per handle; `unit` re-parses on every
/// access, so callers keep the tree only as long as they are using it.
pub struct FileHandle<'t, P> {
    tracker: &'t FileTracker<P>,
    path: SourcePath,
    uri: SourceUri,
    content: OnceCell<Arc<str>>,
}

impl<'t, P: SyntaxParser> FileHandle<'t, P> {
    pub fn path(&self) -> &SourcePath {
        &self.path
    }

    pub fn uri(&self) -> &SourceUri {
        &self.uri
    }

    /// The current content of the file: the overlay entry if one exists,
    /// otherwise the file-system contents, otherwise the empty string.
    ///
    /// Unreadable files are silently coerced to empty content; no
    /// missing-file diagnostic is produced at this layer. Reading also
    /// recomputes the content hash and writes it through to the tracker, so
    /// `content` followed by `content_hash` always observes a coherent pair.
    pub fn content(&self) -> Arc<str> {
        self.content
            .get_or_init(|| {
                let text = match self.tracker.overlay.get(&self.path) {
                    Some(text) => text,
                    None => self.tracker.file_system.read_to_string(&self.path).unwrap_or_else(|error| {
                        tracing::trace!("Treating unreadable file '{}' as empty: {error}", self.path);
                        String::new()
                    }),
                };

                let hash = ContentHash::of(&text);
                self.tracker.hashes.borrow_mut().insert(self.path.clone(), hash);

                Arc::from(text)
            })
            .clone()
    }

    /// The content hash for this file. Returns the tracker's cached hash if
    /// one exists, which may be stale relative to the disk until `content`
    /// has been touched on this handle.
    pub fn content_hash(&self) -> ContentHash {
        if let Some(hash) = self.tracker.cached_hash(&self.path) {
            return hash;
        }

        self.content();
        self.tracker.cached_hash(&self.path).expect("content() populates the hash map")
    }

    /// Parses the current content into the unresolved syntax tree. Parsed
    /// fresh on every access; the tree is never cached across steps.
    pub fn unit(&self) -> P::Unit {
        self.tracker.parser.parse(&self.uri, &self.content(), self.tracker.strong_mode)
    }

    /// Resolves a directive text relative to this file, yielding a handle for
    /// the referenced source. Resolutions (including failures) are cached per
    /// `(containing uri, directive text)` pair.
    pub fn resolve_uri(&self, text: &str) -> Option<FileHandle<'t, P>> {
        let cached = self.tracker.uri_resolutions.borrow().get(&self.uri).and_then(|inner| inner.get(text).cloned());

        let resolved = match cached {
            Some(resolved) => resolved,
            None => {
                let resolved = self.tracker.source_factory.resolve_uri(Some(&self.uri), text);
                self.tracker
                    .uri_resolutions
                    .borrow_mut()
                    .entry(self.uri.clone())
                    .or_default()
                    .insert(text.to_string(), resolved.clone());

                resolved
            }
        };

        resolved.map(|source| self.tracker.handle_with_uri(source.path, source.uri))
    }
}

//! Source identity and file state for the analysis driver.
//!
//! A file has two external identifiers: its absolute [`SourcePath`] on disk
//! and its canonical [`SourceUri`] (a `package:`-style or `file:` URI). The
//! semantic identifier of its *content* is the [`ContentHash`]. This crate
//! owns those newtypes, the collaborator traits through which the driver
//! touches the outside world ([`FileSystem`], [`ContentOverlay`],
//! [`SourceFactory`], [`SyntaxParser`]), and the [`FileTracker`] that hands
//! out ephemeral [`FileHandle`]s over the current file-system snapshot.

use std::fmt;
use std::sync::Arc;

pub mod fs;
pub mod tracker;

pub use fs::ContentOverlay;
pub use fs::FileSystem;
pub use fs::MemoryFileSystem;
pub use fs::MemoryOverlay;
pub use fs::NoOverlay;
pub use fs::OsFileSystem;
pub use tracker::FileHandle;
pub use tracker::FileTracker;
pub use tracker::KnownFiles;

/// The pseudo-scheme under which the platform's core libraries live.
///
/// URIs with this scheme are served by the pre-linked SDK bundle and never
/// produce library-graph nodes of their own.
pub const PLATFORM_SCHEME: &str = "platform";

macro_rules! shared_str_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(value: impl Into<Arc<str>>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

shared_str_newtype! {
    /// An absolute, normalized file path. The primary external identifier of
    /// a file; cheap to clone and usable as a map key.
    SourcePath
}

shared_str_newtype! {
    /// The canonical URI of a file. Resolved through the external
    /// [`SourceFactory`]; the path-to-URI mapping is not assumed stable over
    /// time.
    SourceUri
}

impl SourceUri {
    /// Whether this URI is served by the platform SDK bundle.
    pub fn is_platform(&self) -> bool {
        self.0.split_once(':').is_some_and(|(scheme, _)| scheme == PLATFORM_SCHEME)
    }
}

/// Lowercase MD5 hex of a file's UTF-8 content. The semantic identifier of
/// file content: equal content means equal hash, across paths and processes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(Arc<str>);

impl ContentHash {
    /// Hashes `text` as UTF-8 bytes.
    pub fn of(text: &str) -> Self {
        Self(digest::md5_hex([text.as_bytes()]).into())
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Digest helpers shared by every signature computation in the workspace.
pub mod digest {
    use std::fmt::Write;

    use md5::Digest;
    use md5::Md5;

    /// Lowercase hex MD5 over a sequence of byte chunks, fed in order.
    pub fn md5_hex<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> String {
        let mut hasher = Md5::new();
        for chunk in chunks {
            hasher.update(chunk);
        }

        let mut hex = String::with_capacity(32);
        for byte in hasher.finalize() {
            write!(hex, "{byte:02x}").expect("writing to a String cannot fail");
        }

        hex
    }
}

/// A resolved reference: the pairing of a path and its canonical URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedSource {
    pub path: SourcePath,
    pub uri: SourceUri,
}

/// The external URI resolver.
///
/// `resolve_uri` turns a directive text (`"lib/b.x"`, `"package:foo/foo.x"`)
/// into a concrete source, relative to the containing library's URI when one
/// is given. `restore_uri` recovers the canonical URI of a path. Neither
/// mapping is assumed stable across calls; the driver caches resolutions per
/// analysis epoch, not the factory.
pub trait SourceFactory: Send + Sync {
    fn resolve_uri(&self, containing: Option<&SourceUri>, text: &str) -> Option<ResolvedSource>;

    fn restore_uri(&self, path: &SourcePath) -> Option<SourceUri>;
}

/// The external scanner/parser pair.
///
/// One call scans and parses `content` into the unresolved syntax tree with
/// line info attached. Scan and parse errors are discarded at this layer (a
/// null listener); real diagnostics come from the analysis engine.
pub trait SyntaxParser {
    /// The unresolved syntax tree of one compilation unit.
    type Unit;

    fn parse(&self, uri: &SourceUri, content: &str, strong_mode: bool) -> Self::Unit;
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn content_hash_is_lowercase_md5_hex() {
        // Well-known digest of the empty string.
        assert_eq!(ContentHash::of("").as_hex(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(ContentHash::of("abc").as_hex(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn equal_content_hashes_equal_across_instances() {
        assert_eq!(ContentHash::of("class A {}"), ContentHash::of("class A {}"));
        assert_ne!(ContentHash::of("class A {}"), ContentHash::of("class B {}"));
    }

    #[test]
    fn platform_scheme_detection() {
        assert!(SourceUri::new("platform:core").is_platform());
        assert!(!SourceUri::new("package:foo/foo.x").is_platform());
        assert!(!SourceUri::new("platformish:core").is_platform());
        assert!(!SourceUri::new("file:///a.x").is_platform());
    }

    #[test]
    fn md5_hex_is_chunking_invariant() {
        let whole = digest::md5_hex([b"abcdef".as_slice()]);
        let split = digest::md5_hex([b"abc".as_slice(), b"def".as_slice()]);
        assert_eq!(whole, split);
    }
}

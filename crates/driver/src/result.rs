//! The analysis result delivered to clients.

use std::fmt;
use std::sync::Arc;

use kiln_source::ContentHash;
use kiln_source::SourcePath;
use kiln_source::SourceUri;

/// A self-consistent analysis of one file.
///
/// Self-consistent means: `content_hash` hashes `content`, the resolved unit
/// (when present) was produced from that content, and every external
/// reference was linked against the same snapshot. The resolved unit is
/// absent when the diagnostics came from the errors cache: nothing was
/// resolved on that path.
pub struct AnalysisResult<R> {
    pub path: SourcePath,
    pub uri: SourceUri,
    pub content: Arc<str>,
    pub content_hash: ContentHash,
    pub unit: Option<Arc<R>>,
    /// Rendered diagnostics, TODO-category entries already filtered.
    pub errors: Vec<String>,
}

impl<R> Clone for AnalysisResult<R> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            uri: self.uri.clone(),
            content: Arc::clone(&self.content),
            content_hash: self.content_hash.clone(),
            unit: self.unit.clone(),
            errors: self.errors.clone(),
        }
    }
}

impl<R> fmt::Debug for AnalysisResult<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisResult")
            .field("path", &self.path)
            .field("uri", &self.uri)
            .field("content_hash", &self.content_hash)
            .field("resolved", &self.unit.is_some())
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

//! The byte-store-backed unlinked summary cache.

use std::sync::Arc;

use kiln_source::ContentHash;
use kiln_source::FileHandle;
use kiln_source::SyntaxParser;
use kiln_store::ByteStore;

use crate::SummarySerializer;
use crate::UnlinkedSummary;
use crate::decode_unlinked;
use crate::encode_unlinked;
use crate::keys;

/// Derives unlinked summaries, reading through the byte store.
///
/// The cache key is the file's content hash, so any two files with equal
/// content share one stored blob, and a blob once stored is never rewritten
/// with different semantics. A blob that fails to decode is treated as a
/// cache miss and overwritten with a freshly computed one.
pub struct SummaryCache<S, Z> {
    store: S,
    serializer: Z,
}

impl<S: ByteStore, Z> SummaryCache<S, Z> {
    pub fn new(store: S, serializer: Z) -> Self {
        Self { store, serializer }
    }

    /// The unlinked summary for `file`'s current content, computing and
    /// storing it on a miss.
    ///
    /// Touches `file.content()` first, so the content hash used for the key
    /// is fresh rather than the tracker's cached one.
    pub fn get_unlinked<P>(&self, file: &FileHandle<'_, P>) -> Arc<UnlinkedSummary>
    where
        P: SyntaxParser,
        Z: SummarySerializer<P>,
    {
        file.content();
        let key = keys::unlinked_key(&file.content_hash());

        if let Some(bytes) = self.store.get(&key) {
            match decode_unlinked(&bytes) {
                Ok(summary) => return Arc::new(summary),
                Err(error) => {
                    tracing::warn!("Malformed unlinked summary under '{key}', recomputing: {error}");
                }
            }
        }

        let summary = self.serializer.serialize_unlinked(&file.unit());
        match encode_unlinked(&summary) {
            Ok(bytes) => self.store.put(&key, bytes),
            Err(error) => {
                tracing::warn!("Failed to encode unlinked summary under '{key}': {error}");
            }
        }

        Arc::new(summary)
    }

    /// The unlinked summary currently stored for `hash`, if any.
    ///
    /// Never reads file content and never computes on a miss. This is how the
    /// driver retrieves the *old* api signature of a changed file: by looking
    /// up the summary of the content hash it knew before the change.
    pub fn get_current_unlinked(&self, hash: &ContentHash) -> Option<UnlinkedSummary> {
        let key = keys::unlinked_key(hash);
        let bytes = self.store.get(&key)?;

        decode_unlinked(&bytes).ok()
    }
}

//! The in-memory summary store consulted during linking and analysis.

use std::sync::Arc;

use foldhash::HashMap;
use foldhash::HashMapExt;

use kiln_source::SourceUri;

use crate::LinkedSummary;
use crate::SdkBundle;
use crate::UnlinkedSummary;

/// Summaries gathered for one analysis step, keyed by URI.
///
/// Populated by the library-graph traversal: the traversal resolves each unit
/// for a specific URI and registers it under that URI, so twin-content files
/// at different URIs are both present and correctly addressed. The store
/// lives exactly as long as the library context that built it.
#[derive(Debug, Default)]
pub struct SummaryStore {
    unlinked: HashMap<SourceUri, Arc<UnlinkedSummary>>,
    linked: HashMap<SourceUri, Arc<LinkedSummary>>,
}

impl SummaryStore {
    pub fn new() -> Self {
        Self { unlinked: HashMap::new(), linked: HashMap::new() }
    }

    /// Seeds the store with the platform libraries of `sdk`.
    pub fn with_sdk(sdk: &SdkBundle) -> Self {
        let mut store = Self::new();
        for (uri, linked) in sdk.libraries() {
            store.add_linked(uri.clone(), Arc::new(linked.clone()));
        }

        store
    }

    pub fn add_unlinked(&mut self, uri: SourceUri, summary: Arc<UnlinkedSummary>) {
        self.unlinked.insert(uri, summary);
    }

    pub fn add_linked(&mut self, uri: SourceUri, summary: Arc<LinkedSummary>) {
        self.linked.insert(uri, summary);
    }

    pub fn unlinked(&self, uri: &SourceUri) -> Option<&Arc<UnlinkedSummary>> {
        self.unlinked.get(uri)
    }

    pub fn linked(&self, uri: &SourceUri) -> Option<&Arc<LinkedSummary>> {
        self.linked.get(uri)
    }

    pub fn has_linked(&self, uri: &SourceUri) -> bool {
        self.linked.contains_key(uri)
    }

    /// URIs with an unlinked summary, unordered.
    pub fn unlinked_uris(&self) -> impl Iterator<Item = &SourceUri> {
        self.unlinked.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_miss_until_registered() {
        let mut store = SummaryStore::new();
        let uri = SourceUri::new("pkg:a.x");
        assert!(store.unlinked(&uri).is_none());
        assert!(!store.has_linked(&uri));

        store.add_linked(uri.clone(), Arc::new(LinkedSummary { payload: vec![] }));
        assert!(store.has_linked(&uri));
    }

    #[test]
    fn sdk_libraries_are_preloaded_as_linked() {
        let sdk = SdkBundle::new(
            "sdk-sig",
            vec![(SourceUri::new("platform:core"), LinkedSummary { payload: b"core".to_vec() })],
        );

        let store = SummaryStore::with_sdk(&sdk);
        let core = store.linked(&SourceUri::new("platform:core")).expect("platform library missing");
        assert_eq!(core.payload, b"core");
    }
}

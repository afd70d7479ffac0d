//! Library context creation: the per-step pairing of a populated in-memory
//! summary store with the target library's dependency signature.

use std::sync::Arc;

use foldhash::HashMap;

use kiln_graph::LibraryGraph;
use kiln_perf::PerfLog;
use kiln_source::FileHandle;
use kiln_source::SourceUri;
use kiln_source::SyntaxParser;
use kiln_store::ByteStore;
use kiln_summary::LinkError;
use kiln_summary::Linker;
use kiln_summary::SdkBundle;
use kiln_summary::SummaryCache;
use kiln_summary::SummarySerializer;
use kiln_summary::SummaryStore;
use kiln_summary::decode_linked;
use kiln_summary::encode_linked;
use kiln_summary::keys;

/// Everything one analysis step needs from the summary layer. Dropped with
/// the step, releasing every summary the traversal pulled in.
pub(crate) struct LibraryContext {
    pub store: SummaryStore,
    pub dependency_signature: String,
}

/// Builds the library context for `file`.
///
/// Walks the library graph (populating `store` with unlinked summaries),
/// resolves each node's linked summary from the byte store under its
/// dependency-signature key, and hands the set of misses to the linker in a
/// single batch. Newly linked summaries are written back under their keys.
///
/// `memo` is the driver's process-wide dependency-signature cache; it is only
/// ever cleared by API-signature invalidation.
pub(crate) fn create_library_context<P, S, Z, L>(
    file: &FileHandle<'_, P>,
    summaries: &SummaryCache<S, Z>,
    byte_store: &S,
    linker: &L,
    sdk: &SdkBundle,
    memo: &mut HashMap<SourceUri, String>,
    strong_mode: bool,
    log: &PerfLog,
) -> Result<LibraryContext, LinkError>
where
    P: SyntaxParser,
    S: ByteStore,
    Z: SummarySerializer<P>,
    L: Linker,
{
    let mut store = SummaryStore::with_sdk(sdk);
    let graph = log.run("build library graph", || LibraryGraph::build(file, summaries, &mut store));

    let mut missing: Vec<(SourceUri, String)> = Vec::new();
    for uri in graph.uris() {
        let signature = graph.dependency_signature(uri, sdk.api_signature(), memo);
        let key = keys::linked_key(&signature);

        match byte_store.get(&key).and_then(|bytes| decode_linked(&bytes).ok()) {
            Some(linked) => store.add_linked(uri.clone(), Arc::new(linked)),
            None => missing.push((uri.clone(), signature)),
        }
    }

    if !missing.is_empty() {
        let roots: Vec<SourceUri> = missing.iter().map(|(uri, _)| uri.clone()).collect();
        tracing::debug!("Linking {} librar{} for '{}'", roots.len(), if roots.len() == 1 { "y" } else { "ies" }, file.uri());

        let produced = log.run("link libraries", || linker.link(&roots, &store, sdk, strong_mode))?;

        let signatures: HashMap<&SourceUri, &String> = missing.iter().map(|(uri, sig)| (uri, sig)).collect();
        for (uri, linked) in produced {
            if let Some(signature) = signatures.get(&uri) {
                match encode_linked(&linked) {
                    Ok(bytes) => byte_store.put(&keys::linked_key(signature), bytes),
                    Err(error) => {
                        tracing::warn!("Failed to encode linked summary for '{uri}': {error}");
                    }
                }
            }

            store.add_linked(uri, Arc::new(linked));
        }
    }

    let dependency_signature = graph.dependency_signature(file.uri(), sdk.api_signature(), memo);

    Ok(LibraryContext { store, dependency_signature })
}

//! The library dependency graph.
//!
//! Starting from one library file, the graph walks import, export, and part
//! references until the transitive closure is covered, resolving each unit's
//! unlinked summary through the [`SummaryCache`] and registering it in the
//! step's in-memory [`SummaryStore`] under the URI the traversal resolved it
//! for.
//!
//! The graph is an arena: nodes live in one `uri → node` map and refer to
//! their dependencies by URI key, never by owning link. Import cycles
//! terminate because a node is inserted into the map *before* its
//! dependencies are explored, and libraries are equated by URI alone.

use std::sync::Arc;

use foldhash::HashMap;
use foldhash::HashMapExt;
use foldhash::HashSet;
use foldhash::HashSetExt;

use kiln_source::FileHandle;
use kiln_source::SourceUri;
use kiln_source::SyntaxParser;
use kiln_source::digest;
use kiln_store::ByteStore;
use kiln_summary::SummaryCache;
use kiln_summary::SummarySerializer;
use kiln_summary::SummaryStore;
use kiln_summary::UnlinkedSummary;

/// One library in the graph: its units (the defining unit plus its parts)
/// and its direct dependencies, held as URI keys into the owning graph.
#[derive(Debug)]
pub struct LibraryNode {
    pub uri: SourceUri,
    /// Unlinked summaries of the defining unit and every part, in source
    /// order.
    pub units: Vec<Arc<UnlinkedSummary>>,
    pub imports: Vec<SourceUri>,
    pub exports: Vec<SourceUri>,
}

impl LibraryNode {
    /// Direct dependencies: imports then exports.
    fn dependencies(&self) -> impl Iterator<Item = &SourceUri> {
        self.imports.iter().chain(self.exports.iter())
    }
}

/// The node arena for one analysis step.
#[derive(Debug, Default)]
pub struct LibraryGraph {
    nodes: HashMap<SourceUri, LibraryNode>,
}

impl LibraryGraph {
    /// Builds the graph reachable from `root`, populating `store` with the
    /// unlinked summary of every unit encountered (libraries and parts).
    ///
    /// Directive texts under the platform pseudo-scheme are served by the SDK
    /// bundle and produce no nodes; directives the source factory cannot
    /// resolve are skipped (the engine reports those, not the graph).
    pub fn build<P, S, Z>(
        root: &FileHandle<'_, P>,
        cache: &SummaryCache<S, Z>,
        store: &mut SummaryStore,
    ) -> Self
    where
        P: SyntaxParser,
        S: ByteStore,
        Z: SummarySerializer<P>,
    {
        let mut graph = Self { nodes: HashMap::new() };
        graph.add_library(root, cache, store);

        graph
    }

    fn add_library<P, S, Z>(
        &mut self,
        file: &FileHandle<'_, P>,
        cache: &SummaryCache<S, Z>,
        store: &mut SummaryStore,
    ) where
        P: SyntaxParser,
        S: ByteStore,
        Z: SummarySerializer<P>,
    {
        if self.nodes.contains_key(file.uri()) {
            return;
        }

        let defining = cache.get_unlinked(file);
        store.add_unlinked(file.uri().clone(), Arc::clone(&defining));

        let mut units = vec![Arc::clone(&defining)];
        for part_text in &defining.parts {
            let Some(part) = file.resolve_uri(part_text) else {
                tracing::trace!("Unresolvable part '{part_text}' in '{}'", file.uri());
                continue;
            };

            let part_summary = cache.get_unlinked(&part);
            store.add_unlinked(part.uri().clone(), Arc::clone(&part_summary));
            units.push(part_summary);
        }

        let mut imports = Vec::new();
        let mut exports = Vec::new();
        let mut children = Vec::new();
        for (texts, referenced) in [(&defining.imports, &mut imports), (&defining.exports, &mut exports)] {
            for text in texts {
                if is_platform_reference(text) {
                    continue;
                }

                let Some(child) = file.resolve_uri(text) else {
                    tracing::trace!("Unresolvable reference '{text}' in '{}'", file.uri());
                    continue;
                };

                if child.uri().is_platform() {
                    continue;
                }

                referenced.push(child.uri().clone());
                children.push(child);
            }
        }

        // Insert before walking children so that cycles find this node and
        // stop.
        self.nodes.insert(
            file.uri().clone(),
            LibraryNode { uri: file.uri().clone(), units, imports, exports },
        );

        for child in &children {
            self.add_library(child, cache, store);
        }
    }

    pub fn node(&self, uri: &SourceUri) -> Option<&LibraryNode> {
        self.nodes.get(uri)
    }

    pub fn uris(&self) -> impl Iterator<Item = &SourceUri> {
        self.nodes.keys()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The transitive dependency closure of `uri`, itself included.
    fn closure(&self, uri: &SourceUri) -> Vec<&LibraryNode> {
        let mut seen: HashSet<&SourceUri> = HashSet::new();
        let mut pending = vec![uri];
        let mut members = Vec::new();

        while let Some(next) = pending.pop() {
            let Some(node) = self.nodes.get(next) else {
                continue;
            };
            if !seen.insert(&node.uri) {
                continue;
            }

            members.push(node);
            pending.extend(node.dependencies());
        }

        members
    }

    /// The dependency signature of the library at `uri`.
    ///
    /// Digest over the library's own URI followed by the *sorted* api
    /// signatures of every unit in the transitive closure plus the SDK
    /// bundle's api signature. Sorting makes the digest independent of
    /// traversal order, so it is reproducible across runs; memoization is the
    /// caller's (the driver keeps the process-wide memo and clears it on
    /// API-signature mismatches).
    pub fn dependency_signature(
        &self,
        uri: &SourceUri,
        sdk_api_signature: &str,
        memo: &mut HashMap<SourceUri, String>,
    ) -> String {
        if let Some(signature) = memo.get(uri) {
            return signature.clone();
        }

        let mut api_signatures: Vec<&str> = self
            .closure(uri)
            .iter()
            .flat_map(|node| node.units.iter().map(|unit| unit.api_signature.as_str()))
            .collect();
        api_signatures.push(sdk_api_signature);
        api_signatures.sort_unstable();

        let signature = digest::md5_hex(
            std::iter::once(uri.as_str().as_bytes()).chain(api_signatures.iter().map(|sig| sig.as_bytes())),
        );

        memo.insert(uri.clone(), signature.clone());
        signature
    }
}

fn is_platform_reference(text: &str) -> bool {
    text.split_once(':').is_some_and(|(scheme, _)| scheme == kiln_source::PLATFORM_SCHEME)
}

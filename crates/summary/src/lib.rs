//! Compact compilation-unit summaries and their caches.
//!
//! An *unlinked* summary describes one compilation unit in isolation: the
//! digest of its externally visible shape (the api signature), the raw
//! directive texts it references partitioned into imports, exports, and
//! parts, and an opaque declaration payload produced by the external
//! serializer. A *linked* summary resolves one library against its
//! dependencies' unlinked summaries.
//!
//! Unlinked summaries are a pure function of file content. They deliberately
//! carry no URI: two files with identical bytes produce identical summary
//! blobs under the same content-hash key, and it is the library-graph
//! traversal (which knows which URI it resolved a unit for) that registers
//! units under URIs in the in-memory [`SummaryStore`].

use serde::Deserialize;
use serde::Serialize;

use kiln_source::SourceUri;
use kiln_source::SyntaxParser;

pub mod cache;
pub mod keys;
pub mod link;
pub mod store;

pub use cache::SummaryCache;
pub use link::LinkError;
pub use link::Linker;
pub use store::SummaryStore;

/// The unlinked summary of one compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlinkedSummary {
    /// Digest over the externally visible declaration shape only; edits that
    /// cannot affect downstream libraries leave it unchanged.
    pub api_signature: String,

    /// Raw `import` directive texts, in source order. Implicit platform core
    /// imports are not recorded; the SDK bundle supplies those.
    pub imports: Vec<String>,

    /// Raw `export` directive texts, in source order.
    pub exports: Vec<String>,

    /// Raw `part` directive texts, in source order.
    pub parts: Vec<String>,

    /// Opaque declaration payload, as produced by the external serializer.
    pub declarations: Vec<u8>,
}

/// The linked summary of one library: its units resolved against the
/// unlinked summaries of every dependency. Opaque to the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedSummary {
    pub payload: Vec<u8>,
}

/// Encodes a summary for byte-store storage. Deterministic: equal summaries
/// encode to equal bytes.
pub fn encode_unlinked(summary: &UnlinkedSummary) -> Result<Vec<u8>, bincode::error::EncodeError> {
    bincode::serde::encode_to_vec(summary, bincode::config::standard())
}

pub fn decode_unlinked(bytes: &[u8]) -> Result<UnlinkedSummary, bincode::error::DecodeError> {
    let (summary, _len) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
    Ok(summary)
}

pub fn encode_linked(summary: &LinkedSummary) -> Result<Vec<u8>, bincode::error::EncodeError> {
    bincode::serde::encode_to_vec(summary, bincode::config::standard())
}

pub fn decode_linked(bytes: &[u8]) -> Result<LinkedSummary, bincode::error::DecodeError> {
    let (summary, _len) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
    Ok(summary)
}

/// Encodes a diagnostic list for storage under an `.errors` key.
pub fn encode_errors(errors: &[String]) -> Result<Vec<u8>, bincode::error::EncodeError> {
    bincode::serde::encode_to_vec(errors, bincode::config::standard())
}

pub fn decode_errors(bytes: &[u8]) -> Result<Vec<String>, bincode::error::DecodeError> {
    let (errors, _len) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
    Ok(errors)
}

/// The external summary serializer: turns an unresolved syntax tree into an
/// [`UnlinkedSummary`], computing the api signature from declaration shape
/// (never from bodies) and partitioning the referenced URI texts.
pub trait SummarySerializer<P: SyntaxParser> {
    fn serialize_unlinked(&self, unit: &P::Unit) -> UnlinkedSummary;
}

/// The pre-linked summary bundle for the platform's core libraries, supplied
/// to the driver at construction. `platform:` URIs are served from here and
/// never become library-graph nodes.
#[derive(Debug, Clone)]
pub struct SdkBundle {
    api_signature: String,
    libraries: Vec<(SourceUri, LinkedSummary)>,
}

impl SdkBundle {
    pub fn new(api_signature: impl Into<String>, libraries: Vec<(SourceUri, LinkedSummary)>) -> Self {
        Self { api_signature: api_signature.into(), libraries }
    }

    /// The digest of the whole platform API surface. Participates in every
    /// dependency signature, so swapping the SDK invalidates linked caches.
    pub fn api_signature(&self) -> &str {
        &self.api_signature
    }

    pub fn libraries(&self) -> &[(SourceUri, LinkedSummary)] {
        &self.libraries
    }
}

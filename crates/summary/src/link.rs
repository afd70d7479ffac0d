//! The external linker seam.

use kiln_source::SourceUri;

use crate::LinkedSummary;
use crate::SdkBundle;
use crate::SummaryStore;

/// Errors out of a link batch.
///
/// A missing summary is an internal-consistency failure: the traversal that
/// requested the batch is responsible for having populated the store first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    MissingUnlinked(SourceUri),
    MissingLinked(SourceUri),
    Internal(String),
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkError::MissingUnlinked(uri) => {
                write!(f, "no unlinked summary for '{uri}' in the in-memory store")
            }
            LinkError::MissingLinked(uri) => {
                write!(f, "no linked summary for '{uri}' in the in-memory store")
            }
            LinkError::Internal(message) => write!(f, "linker failure: {message}"),
        }
    }
}

impl std::error::Error for LinkError {}

/// The external semantic linker.
///
/// Invoked once per batch of libraries whose linked summaries were absent
/// from the byte store. The linker resolves cross-library references by
/// consulting `store` for the unlinked summaries of the batch's transitive
/// closure (and the already-linked summaries of anything outside the batch,
/// including the SDK's platform libraries), and returns one linked summary
/// per root URI.
pub trait Linker {
    fn link(
        &self,
        roots: &[SourceUri],
        store: &SummaryStore,
        sdk: &SdkBundle,
        strong_mode: bool,
    ) -> Result<Vec<(SourceUri, LinkedSummary)>, LinkError>;
}

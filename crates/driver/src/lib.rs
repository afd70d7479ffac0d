//! The incremental analysis driver.
//!
//! The driver maintains an eventually consistent view of analysis results
//! (diagnostics and an addressable resolved syntax tree) for a dynamically
//! changing set of source files, against a content-addressed byte store, so
//! that unchanged work is never redone across process restarts or editor
//! sessions.
//!
//! Clients drive it through a cloneable [`DriverClient`]: add and remove
//! explicit files, deliver change notifications, request per-file results,
//! and consume the hot results stream. The driver never watches the file
//! system and never parses on its own; scanning, parsing, summarization,
//! linking, and diagnostics computation are external collaborators bundled
//! into an [`AnalysisHost`].
//!
//! Consistency is anchored on two digests: the *content hash* identifying
//! what a file says, and the *dependency signature* identifying what a
//! library's transitive dependency closure looks like. Diagnostics are cached
//! under the pair of them, so any analysis whose inputs are unchanged is a
//! byte-store lookup.

mod context;

pub mod diagnostic;
pub mod driver;
pub mod error;
pub mod options;
pub mod result;

pub use diagnostic::Diagnostic;
pub use diagnostic::DiagnosticCategory;
pub use diagnostic::DiagnosticsEngine;
pub use diagnostic::EngineOutput;
pub use driver::AnalysisDriver;
pub use driver::AnalysisHost;
pub use driver::AnalysisStatus;
pub use driver::DriverClient;
pub use error::DriverError;
pub use options::AnalysisOptions;
pub use result::AnalysisResult;

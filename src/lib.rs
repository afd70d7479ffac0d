//! Kiln: an incremental-analysis driver for statically-typed modular
//! languages.
//!
//! Kiln maintains an eventually consistent view of analysis results
//! (diagnostics plus an addressable resolved syntax tree) for a dynamically
//! changing set of source files, backed by a content-addressed byte store so
//! that unchanged work is never redone across process restarts or editor
//! sessions. The language frontend (scanner/parser, summary serializer,
//! linker, diagnostics engine) plugs in through traits; kiln orchestrates,
//! it never parses.
//!
//! This crate is a façade re-exporting the workspace members under one
//! namespace:
//!
//! - [`store`]: the content-addressed [`store::ByteStore`] and its
//!   in-memory and on-disk implementations.
//! - [`source`]: path/URI/content-hash identity and the lazy file tracker.
//! - [`summary`]: unlinked and linked compilation-unit summaries, their
//!   wire codec, and the in-memory summary store.
//! - [`graph`]: the library dependency graph and its order-independent
//!   dependency signatures.
//! - [`perf`]: nested, timed phase logging.
//! - [`driver`]: the [`driver::AnalysisDriver`] itself: request queues, the
//!   cooperative work loop, API-signature invalidation, and the results
//!   stream.
//!
//! The commonly needed types are additionally re-exported at the crate root.

pub use kiln_driver as driver;
pub use kiln_graph as graph;
pub use kiln_perf as perf;
pub use kiln_source as source;
pub use kiln_store as store;
pub use kiln_summary as summary;

pub use kiln_driver::AnalysisDriver;
pub use kiln_driver::AnalysisHost;
pub use kiln_driver::AnalysisOptions;
pub use kiln_driver::AnalysisResult;
pub use kiln_driver::AnalysisStatus;
pub use kiln_driver::Diagnostic;
pub use kiln_driver::DiagnosticCategory;
pub use kiln_driver::DiagnosticsEngine;
pub use kiln_driver::DriverClient;
pub use kiln_driver::DriverError;
pub use kiln_driver::EngineOutput;
pub use kiln_perf::PerfLog;
pub use kiln_source::ContentHash;
pub use kiln_source::SourcePath;
pub use kiln_source::SourceUri;
pub use kiln_store::ByteStore;
pub use kiln_store::FileByteStore;
pub use kiln_store::MemoryByteStore;
pub use kiln_summary::LinkedSummary;
pub use kiln_summary::SdkBundle;
pub use kiln_summary::SummaryStore;
pub use kiln_summary::UnlinkedSummary;

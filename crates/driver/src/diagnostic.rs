//! Diagnostics and the external analysis engine seam.

use std::fmt;

use kiln_source::FileHandle;
use kiln_source::SyntaxParser;
use kiln_summary::SdkBundle;
use kiln_summary::SummaryStore;

use crate::AnalysisOptions;

/// The coarse category of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCategory {
    Error,
    Warning,
    Hint,
    /// Work-tracking markers. Never reported: the driver filters these out
    /// before caching or emitting diagnostics.
    Todo,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiagnosticCategory::Error => "error",
            DiagnosticCategory::Warning => "warning",
            DiagnosticCategory::Hint => "hint",
            DiagnosticCategory::Todo => "todo",
        };

        f.write_str(label)
    }
}

/// One diagnostic produced by the analysis engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub code: String,
    pub message: String,
    /// Byte offset of the primary location in the analyzed file.
    pub offset: u32,
}

impl Diagnostic {
    pub fn new(category: DiagnosticCategory, code: impl Into<String>, message: impl Into<String>, offset: u32) -> Self {
        Self { category, code: code.into(), message: message.into(), offset }
    }

    pub fn is_todo(&self) -> bool {
        self.category == DiagnosticCategory::Todo
    }

    /// The stable string form under which diagnostics are cached and
    /// reported.
    pub fn render(&self) -> String {
        format!("{}[{}] @{}: {}", self.category, self.code, self.offset, self.message)
    }
}

/// What one engine run produced: the resolved syntax tree and the
/// diagnostics for the analyzed file.
#[derive(Debug)]
pub struct EngineOutput<R> {
    pub resolved: R,
    pub diagnostics: Vec<Diagnostic>,
}

/// The external compute-errors engine.
///
/// Seeded with the in-memory summary store of the current library context,
/// the engine resolves the file and computes its diagnostics. Whatever
/// context the engine builds internally must be released when the returned
/// output is dropped; the driver keeps neither the file handle nor the output
/// beyond result delivery.
pub trait DiagnosticsEngine<P: SyntaxParser> {
    /// The resolved (fully linked) syntax tree of one compilation unit.
    type Resolved;

    fn analyze(
        &self,
        file: &FileHandle<'_, P>,
        store: &SummaryStore,
        sdk: &SdkBundle,
        options: &AnalysisOptions,
    ) -> EngineOutput<Self::Resolved>;
}

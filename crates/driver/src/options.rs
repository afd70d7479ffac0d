//! Driver configuration.

use serde::Deserialize;

/// Options applied to every analysis the driver performs.
///
/// Options are part of the driver's identity, not of a single request:
/// changing them means constructing a new driver (cached artifacts keyed by
/// content remain valid either way).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Enables strict typing in the parser and the linker.
    pub strong_mode: bool,
}

impl AnalysisOptions {
    /// Parses options from a TOML document, e.g. an `analysis_options` table
    /// read from a project configuration file.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

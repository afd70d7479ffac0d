//! Driver error types.

use std::fmt;

/// Why a `get_result` future failed instead of yielding a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The driver's work loop has stopped (the results subscription was
    /// dropped, or the driver was torn down) with the request still pending.
    ShutDown,
    /// An internal-consistency failure while producing the result, e.g. a
    /// summary missing from a store the driver itself populated.
    Internal(String),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::ShutDown => write!(f, "the analysis driver was shut down"),
            DriverError::Internal(message) => write!(f, "internal consistency failure: {message}"),
        }
    }
}

impl std::error::Error for DriverError {}

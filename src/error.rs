//! Error types for qex
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// qex error types
#[derive(Error, Debug)]
pub enum Error {
    /// Experiment builder rejected the parameter mapping
    #[error("Invalid parameter '{key}': {reason}")]
    InvalidParameter {
        /// Offending parameter key
        key: String,
        /// What was wrong with it
        reason: String,
    },

    /// Backend could not execute the circuit
    #[error("Execution error: {0}")]
    Execution(String),

    /// Density matrix failed the Hermitian / trace / PSD checks
    #[error("Invalid density matrix: {0}\nThis indicates a backend defect. Please report this issue.")]
    InvalidDensityMatrix(String),

    /// Non-finite Bloch coordinate handed to an artifact renderer
    #[error("Invalid Bloch coordinate: {axis} = {value}")]
    InvalidCoordinate {
        /// Axis name (x, y or z)
        axis: char,
        /// Offending value
        value: f64,
    },

    /// Catalog already holds a run with this id
    #[error("Duplicate run: run_id '{0}' already exists in the catalog")]
    DuplicateRun(String),

    /// Underlying storage failure (catalog or persisted files)
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Store was used after `close()`
    #[error("Result store is closed")]
    StoreClosed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`].
    pub fn invalid_parameter(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence(format!("catalog column encoding: {err}"))
    }
}

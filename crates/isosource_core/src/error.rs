//! Error taxonomy shared by configuration, table loading, and the command surface.

use std::path::PathBuf;

use thiserror::Error;

use crate::Scalar;

#[derive(Error, Debug)]
pub enum SourceError {
    /// A configuration scalar was read before anything set it.
    #[error("configuration value '{0}' is not set")]
    Unset(&'static str),

    #[error("invalid value {value} for '{name}': {reason}")]
    InvalidValue {
        name: &'static str,
        value: Scalar,
        reason: &'static str,
    },

    #[error("failed to open source table {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read source table")]
    Read(#[from] std::io::Error),

    /// The whole table is rejected; partial tables are never kept.
    #[error("malformed source table at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("invalid energy spectrum: {0}")]
    Spectrum(&'static str),

    #[error("failed to read macro at line {line}")]
    MacroRead {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("command rejected at line {line}: {reason}")]
    Command { line: usize, reason: String },
}

pub type Result<T, E = SourceError> = std::result::Result<T, E>;

impl SourceError {
    /// Returns true for failures that mean a setup step is missing or wrong, as opposed to
    /// unreadable input data.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SourceError::Unset(_) | SourceError::InvalidValue { .. } | SourceError::Open { .. }
        )
    }
}

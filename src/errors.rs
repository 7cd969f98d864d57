// src/errors.rs

//! Crate-wide error type and the process exit codes derived from it.

use thiserror::Error;

/// Exit code for a malformed or empty case list.
pub const EXIT_NO_VALID_CASES: i32 = 4;

/// Exit code when the run is interrupted with Ctrl-C.
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Error, Debug)]
pub enum PerfrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No valid cases: {0}")]
    NoValidCases(String),

    #[error("Invalid case descriptor '{case}': {reason}")]
    InvalidCase { case: String, reason: String },

    #[error("Invalid token range {start}..={end} for a command of {tokens} tokens")]
    InvalidTokenRange {
        start: usize,
        end: usize,
        tokens: usize,
    },

    #[error("Cannot rewrite command: {0}")]
    Rewrite(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Run interrupted")]
    Interrupted,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PerfrunError {
    /// Process exit code reported by the `perfrun` binary for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            PerfrunError::NoValidCases(_) | PerfrunError::InvalidCase { .. } => {
                EXIT_NO_VALID_CASES
            }
            PerfrunError::Interrupted => EXIT_INTERRUPTED,
            _ => 1,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PerfrunError>;

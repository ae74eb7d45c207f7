//! Shared error types for scenario and test-suite loading

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Scenario configuration not found: {path}")]
    ScenarioNotFound { path: PathBuf },

    #[error("Test case file not found: {path}")]
    TestSuiteNotFound { path: PathBuf },

    #[error("Failed to parse {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SharedError {
    pub fn parse(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::ParseError {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// True for the "file is absent" variants
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ScenarioNotFound { .. } | Self::TestSuiteNotFound { .. }
        )
    }
}

pub type SharedResult<T> = Result<T, SharedError>;

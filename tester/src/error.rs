//! Harness error types

use shared::SharedError;
use std::fmt;
use thiserror::Error;

/// Which end of the replication link an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => write!(f, "source"),
            Side::Target => write!(f, "target"),
        }
    }
}

#[derive(Error, Debug)]
pub enum TesterError {
    #[error("Unsupported scenario type: {scenario_type} (available: {available})")]
    UnknownScenarioType {
        scenario_type: String,
        available: String,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to connect to {side} ({endpoint}): {message}")]
    Connection {
        side: Side,
        endpoint: String,
        message: String,
    },

    #[error("{side} is not connected")]
    NotConnected { side: Side },

    #[error("SQL error on {side}: {message}")]
    Sql { side: Side, message: String },

    #[error("Replication setup failed: {message}")]
    ReplicationSetup { message: String },

    #[error("Process {name} failed: {message}")]
    Process { name: String, message: String },

    #[error("{message}")]
    Assertion { message: String },

    #[error(transparent)]
    Shared(#[from] SharedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TesterError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn sql(side: Side, err: impl fmt::Display) -> Self {
        Self::Sql {
            side,
            message: err.to_string(),
        }
    }

    pub fn setup(message: impl Into<String>) -> Self {
        Self::ReplicationSetup {
            message: message.into(),
        }
    }

    pub fn process(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Process {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion {
            message: message.into(),
        }
    }

    /// Errors that mean the scenario itself is mis-declared
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::UnknownScenarioType { .. } | Self::Configuration { .. } => true,
            Self::Shared(_) => true,
            _ => false,
        }
    }
}

pub type TesterResult<T> = Result<T, TesterError>;

//! Shared model for the CDC test harness
//!
//! Contains the scenario and test-suite documents, the loader that reads them
//! from the configuration directory, and the logging setup used by the
//! `cdc-tester` binary.

pub mod config;
pub mod errors;
pub mod logging;

pub use config::{
    CaseSelection, ConfigLoader, ConnectionConfig, ReplicationParams, ScenarioConfig,
    ScenarioSummary, Step, SuiteInfo, TestCase, TestSuite, ValidationConfig,
};
pub use errors::*;

//! Scenario and test-suite configuration documents

pub mod loader;
pub mod scenario;
pub mod testsuite;

pub use loader::{ConfigLoader, ScenarioSummary};
pub use scenario::{ConnectionConfig, ReplicationParams, ScenarioConfig, ValidationConfig};
pub use testsuite::{CaseSelection, Step, SuiteInfo, TestCase, TestSuite};

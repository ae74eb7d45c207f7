//! CDC replication test harness
//!
//! Runs declarative test suites against a replication link between two
//! database clusters and reports PASS/FAIL per case.
//!
//! ## Main Interface
//!
//! [`TestRunner`] loads a scenario, builds the matching
//! [`ReplicationAdapter`] from the registry and drives it through
//! connect, configure, cases, teardown and disconnect.
//!
//! ```rust,no_run
//! use cdc_tester::TestRunner;
//! use shared::ConfigLoader;
//!
//! # async fn run() -> cdc_tester::TesterResult<()> {
//! let runner = TestRunner::new("mo_to_mo", ConfigLoader::new("config"))?;
//! let summary = runner.run_tests("common_tests.yaml", "basic").await?;
//! assert!(summary.all_passed());
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod engine;
pub mod error;
pub mod report;
pub mod runtime;
pub mod session;
pub mod testing;
pub mod traits;
pub mod types;

pub use adapters::{AdapterKind, create_adapter, registered_keys};
pub use engine::{INDEX_QUERY_SETTLE_DELAY, TestRunner};
pub use error::{Side, TesterError, TesterResult};
pub use report::{CaseStatus, RunSummary, TestResult};
pub use session::MySqlConnector;
pub use traits::{ReplicationAdapter, SessionConnector, SqlSession};
pub use types::{AdapterState, Row, SqlValue};

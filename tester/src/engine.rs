//! Test execution engine
//!
//! Drives one adapter through a fixed lifecycle: connect, configure
//! replication, run the selected cases in file order, tear replication down
//! and disconnect. Teardown and disconnect run whatever happened before
//! them, and the summary is logged after both.

use shared::{ConfigLoader, ScenarioConfig, Step, TestCase};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use crate::adapters::create_adapter;
use crate::error::{TesterError, TesterResult};
use crate::report::{RunSummary, TestResult};
use crate::session::MySqlConnector;
use crate::traits::{ReplicationAdapter, SessionConnector};

/// Wait between the source and target halves of an index query
pub const INDEX_QUERY_SETTLE_DELAY: Duration = Duration::from_secs(5);

const SQL_PREVIEW_CHARS: usize = 50;

pub struct TestRunner {
    config: ScenarioConfig,
    loader: ConfigLoader,
    adapter: Box<dyn ReplicationAdapter>,
}

impl TestRunner {
    /// Load `scenario` and build its adapter over real MySQL-protocol sessions
    pub fn new(scenario: &str, loader: ConfigLoader) -> TesterResult<Self> {
        Self::with_connector(scenario, loader, Arc::new(MySqlConnector::new()))
    }

    /// Like [`TestRunner::new`] with an injected session connector
    pub fn with_connector(
        scenario: &str,
        loader: ConfigLoader,
        connector: Arc<dyn SessionConnector>,
    ) -> TesterResult<Self> {
        let config = loader.load_scenario(scenario)?;
        let adapter = create_adapter(config.clone(), connector)?;
        info!(
            "📋 Scenario {} ({}) loaded",
            config.scenario_name, config.scenario_type
        );
        Ok(Self::from_parts(config, loader, adapter))
    }

    /// Assemble a runner around a prepared adapter
    pub fn from_parts(config: ScenarioConfig, loader: ConfigLoader, adapter: Box<dyn ReplicationAdapter>) -> Self {
        Self {
            config,
            loader,
            adapter,
        }
    }

    pub fn scenario(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Run the `group` cases of `testsuite_file` against this scenario.
    ///
    /// Consumes the runner so an adapter is never reused. Setup errors are
    /// returned after teardown and disconnect have run; case failures are
    /// reported in the summary.
    pub async fn run_tests(mut self, testsuite_file: &str, group: &str) -> TesterResult<RunSummary> {
        let suite = self.loader.load_testsuite(testsuite_file)?;
        let selection = suite.select_cases(group);
        if selection.fell_back {
            warn!(
                "⚠️ Test group '{}' not found or empty, running all {} test cases",
                group,
                selection.cases.len()
            );
        } else if selection.cases.is_empty() {
            warn!(
                "⚠️ Test group '{}' selects no test case (groups: {})",
                group,
                suite.group_names().join(", ")
            );
        }
        for id in &selection.unknown_ids {
            warn!("⚠️ Test group '{}' references unknown case {}", group, id);
        }

        info!("{}", "=".repeat(60));
        info!("🧪 Scenario: {}", self.config.scenario_name);
        info!("   suite: {} [{}], {} cases", suite.name(), group, selection.cases.len());
        info!("{}", "=".repeat(60));

        let mut results = Vec::with_capacity(selection.cases.len());
        let outcome = self.execute(&selection.cases, &mut results).await;

        info!("🧹 Cleaning up");
        self.adapter.teardown_replication().await;
        self.adapter.disconnect().await;

        let summary = RunSummary::new(&self.config.scenario_name, suite.name(), group, results);
        info!("\n{}", summary);

        if let Err(e) = &outcome {
            error!("❌ Scenario aborted: {}", e);
        }
        outcome.map(|()| summary)
    }

    async fn execute(&mut self, cases: &[&TestCase], results: &mut Vec<TestResult>) -> TesterResult<()> {
        self.adapter.connect().await?;
        debug!("adapter state: {}", self.adapter.state());
        self.adapter.configure_replication().await?;
        debug!("adapter state: {}", self.adapter.state());

        for (index, case) in cases.iter().enumerate() {
            info!("\n[{}/{}] {}: {}", index + 1, cases.len(), case.id, case.name);
            let result = self.run_case(case).await;
            results.push(result);
        }
        Ok(())
    }

    async fn run_case(&mut self, case: &TestCase) -> TestResult {
        let started = Instant::now();
        let table = case.table.as_deref();

        for (index, step) in case.steps.iter().enumerate() {
            if let Err(e) = self.run_step(step, table).await {
                let elapsed = started.elapsed();
                error!(
                    "✗ [{}] FAIL at step {} ({}): {} ({:.2}s)",
                    case.id,
                    index + 1,
                    step.action(),
                    e,
                    elapsed.as_secs_f64()
                );
                return TestResult::fail(case, elapsed, e.to_string());
            }
        }

        let elapsed = started.elapsed();
        info!("✓ [{}] PASS ({:.2}s)", case.id, elapsed.as_secs_f64());
        TestResult::pass(case, elapsed)
    }

    async fn run_step(&mut self, step: &Step, table: Option<&str>) -> TesterResult<()> {
        match step {
            Step::Update { sql } | Step::Delete { sql } => {
                info!("   {}: {}", step.action(), preview(sql));
                self.adapter.execute_on_source(sql, &[]).await?;
            }
            Step::ValidateSync { timeout } => {
                let table = require_table(step, table)?;
                let timeout = Duration::from_secs(*timeout);
                if !self.adapter.validate_sync(table, timeout).await {
                    return Err(TesterError::assertion(format!(
                        "data sync timed out after {}s",
                        timeout.as_secs()
                    )));
                }
            }
            Step::ValidateIndexQuery { sql } => {
                let source = self.adapter.execute_on_source(sql, &[]).await?;
                sleep(INDEX_QUERY_SETTLE_DELAY).await;
                let target = self.adapter.execute_on_target(sql, &[]).await?;
                if source != target {
                    return Err(TesterError::assertion(format!(
                        "result mismatch: source returned {} rows, target returned {} rows",
                        source.len(),
                        target.len()
                    )));
                }
                info!("   index query results match ({} rows)", source.len());
            }
            Step::ValidateData { where_clause } => {
                let table = require_table(step, table)?;
                if !self.adapter.compare_data(table, where_clause.clone()).await? {
                    return Err(TesterError::assertion(format!(
                        "result mismatch: {table} differs between source and target"
                    )));
                }
                info!("   {} matches on both sides", table);
            }
        }
        Ok(())
    }
}

fn require_table<'a>(step: &Step, table: Option<&'a str>) -> TesterResult<&'a str> {
    table.ok_or_else(|| TesterError::config(format!("{} requires the case to name a table", step.action())))
}

fn preview(sql: &str) -> String {
    let trimmed = sql.trim();
    match trimmed.char_indices().nth(SQL_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::AdapterKind;
    use crate::error::Side;
    use crate::testing::fixtures;
    use crate::traits::MockReplicationAdapter;
    use crate::types::{AdapterState, SqlValue};
    use mockall::Sequence;
    use tempfile::TempDir;

    fn loader_with_suite(yaml: &str) -> (TempDir, ConfigLoader) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("testcases")).unwrap();
        std::fs::write(dir.path().join("testcases/suite.yaml"), yaml).unwrap();
        let loader = ConfigLoader::new(dir.path());
        (dir, loader)
    }

    const SUITE: &str = r#"
test_suite:
  name: engine suite
test_groups:
  basic: [tc_001]
test_cases:
  - id: tc_001
    name: insert one row
    table: t
    steps:
      - action: update
        sql: INSERT INTO t VALUES (1)
      - action: validate_sync
        timeout: 10
"#;

    fn quiet(mock: &mut MockReplicationAdapter) {
        mock.expect_state().return_const(AdapterState::Connected);
        mock.expect_kind().return_const(AdapterKind::SameEngine);
    }

    #[tokio::test]
    async fn test_lifecycle_order() {
        let (_dir, loader) = loader_with_suite(SUITE);
        let mut mock = MockReplicationAdapter::new();
        let mut seq = Sequence::new();
        quiet(&mut mock);

        mock.expect_connect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        mock.expect_configure_replication()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        mock.expect_execute_on_source()
            .withf(|sql, _| sql == "INSERT INTO t VALUES (1)")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(vec![]));
        mock.expect_validate_sync()
            .withf(|table, timeout| table == "t" && *timeout == Duration::from_secs(10))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| true);
        mock.expect_teardown_replication()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| ());
        mock.expect_disconnect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| ());

        let runner = TestRunner::from_parts(fixtures::scenario("mo_to_mo"), loader, Box::new(mock));
        let summary = runner.run_tests("suite.yaml", "basic").await.unwrap();
        assert_eq!(summary.passed, 1);
        assert!(summary.all_passed());
    }

    #[tokio::test]
    async fn test_configure_failure_still_cleans_up() {
        let (_dir, loader) = loader_with_suite(SUITE);
        let mut mock = MockReplicationAdapter::new();
        quiet(&mut mock);

        mock.expect_connect().times(1).returning(|| Ok(()));
        mock.expect_configure_replication()
            .times(1)
            .returning(|| Err(TesterError::setup("publication exists")));
        mock.expect_execute_on_source().never();
        mock.expect_teardown_replication().times(1).returning(|| ());
        mock.expect_disconnect().times(1).returning(|| ());

        let runner = TestRunner::from_parts(fixtures::scenario("mo_to_mo"), loader, Box::new(mock));
        let err = runner.run_tests("suite.yaml", "basic").await.unwrap_err();
        assert!(err.to_string().contains("publication exists"));
    }

    #[tokio::test]
    async fn test_sync_timeout_fails_case() {
        let (_dir, loader) = loader_with_suite(SUITE);
        let mut mock = MockReplicationAdapter::new();
        quiet(&mut mock);
        mock.expect_connect().returning(|| Ok(()));
        mock.expect_configure_replication().returning(|| Ok(()));
        mock.expect_execute_on_source().returning(|_, _| Ok(vec![]));
        mock.expect_validate_sync().returning(|_, _| false);
        mock.expect_teardown_replication().returning(|| ());
        mock.expect_disconnect().returning(|| ());

        let runner = TestRunner::from_parts(fixtures::scenario("mo_to_mo"), loader, Box::new(mock));
        let summary = runner.run_tests("suite.yaml", "basic").await.unwrap();
        assert_eq!(summary.failed, 1);
        let error = summary.results[0].error.as_deref().unwrap();
        assert!(error.contains("timed out after 10s"), "{error}");
    }

    #[tokio::test]
    async fn test_rejected_update_fails_case_before_validation() {
        let (_dir, loader) = loader_with_suite(SUITE);
        let mut mock = MockReplicationAdapter::new();
        quiet(&mut mock);
        mock.expect_connect().returning(|| Ok(()));
        mock.expect_configure_replication().returning(|| Ok(()));
        mock.expect_execute_on_source()
            .times(1)
            .returning(|_, _| Err(TesterError::sql(Side::Source, "Duplicate entry '1' for key 'PRIMARY'")));
        mock.expect_validate_sync().never();
        mock.expect_teardown_replication().times(1).returning(|| ());
        mock.expect_disconnect().times(1).returning(|| ());

        let runner = TestRunner::from_parts(fixtures::scenario("mo_to_mo"), loader, Box::new(mock));
        let summary = runner.run_tests("suite.yaml", "basic").await.unwrap();
        assert_eq!(summary.failed, 1);
        let error = summary.results[0].error.as_deref().unwrap();
        assert!(error.contains("Duplicate entry"), "{error}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_index_query_waits_before_target() {
        let suite = r#"
test_suite:
  name: index suite
test_cases:
  - id: tc_010
    name: fulltext match
    steps:
      - action: validate_index_query
        sql: SELECT id FROM t WHERE MATCH(body) AGAINST('rust')
"#;
        let (_dir, loader) = loader_with_suite(suite);
        let started = Instant::now();
        let mut mock = MockReplicationAdapter::new();
        quiet(&mut mock);
        mock.expect_connect().returning(|| Ok(()));
        mock.expect_configure_replication().returning(|| Ok(()));
        mock.expect_execute_on_source()
            .returning(|_, _| Ok(vec![vec![SqlValue::Int(1)]]));
        mock.expect_execute_on_target().returning(move |_, _| {
            assert!(started.elapsed() >= INDEX_QUERY_SETTLE_DELAY);
            Ok(vec![vec![SqlValue::Int(1)]])
        });
        mock.expect_teardown_replication().returning(|| ());
        mock.expect_disconnect().returning(|| ());

        let runner = TestRunner::from_parts(fixtures::scenario("mo_to_mo"), loader, Box::new(mock));
        let summary = runner.run_tests("suite.yaml", "missing_group").await.unwrap();
        assert!(summary.all_passed());
        assert_eq!(summary.total, 1);
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("  SELECT 1  "), "SELECT 1");
        let long = "é".repeat(60);
        assert_eq!(preview(&long), format!("{}...", "é".repeat(50)));
    }

    #[test]
    fn test_require_table() {
        let step = Step::ValidateSync { timeout: 5 };
        assert_eq!(require_table(&step, Some("t")).unwrap(), "t");
        assert!(require_table(&step, None).unwrap_err().is_configuration());
    }
}

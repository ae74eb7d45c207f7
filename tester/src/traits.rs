//! Capability traits with mockall annotations for testing
//!
//! [`ReplicationAdapter`] is the contract every replication topology
//! implements. [`SqlSession`] and [`SessionConnector`] sit underneath it so
//! the adapters can run against the real driver or against in-memory
//! sessions in tests.

use async_trait::async_trait;
use shared::ConnectionConfig;
use std::time::Duration;

use crate::adapters::AdapterKind;
use crate::error::{Side, TesterResult};
use crate::types::{AdapterState, Row, SqlValue};

/// One live database session owned by an adapter
#[async_trait]
pub trait SqlSession: Send {
    /// Execute one statement inside its own transaction and return every row.
    /// The transaction is committed when the statement succeeds.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> TesterResult<Vec<Row>>;

    /// Close the session. Errors are swallowed; closing twice is a no-op.
    async fn close(&mut self);
}

/// Opens sessions for either side of a scenario
#[mockall::automock]
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Open a session described by `config`
    ///
    /// # Parameters
    /// - `side`: which end of the link is being opened, used in errors
    /// - `config`: connection descriptor from the scenario
    async fn open(&self, side: Side, config: &ConnectionConfig) -> TesterResult<Box<dyn SqlSession>>;
}

/// Replication topology abstraction
///
/// Implementations own exactly two sessions between `connect` and
/// `disconnect`, plus whatever `configure_replication` creates. The engine
/// enforces call order; adapters only track their [`AdapterState`].
#[mockall::automock]
#[async_trait]
pub trait ReplicationAdapter: Send {
    /// Registry key of this adapter
    fn kind(&self) -> AdapterKind;

    /// Current lifecycle state
    fn state(&self) -> AdapterState;

    /// Open the source and target sessions. Any failure is fatal.
    async fn connect(&mut self) -> TesterResult<()>;

    /// Close both sessions if open. Safe to call repeatedly, never fails.
    async fn disconnect(&mut self);

    /// Establish the replication link for this topology
    async fn configure_replication(&mut self) -> TesterResult<()>;

    /// Remove whatever `configure_replication` created.
    ///
    /// Best-effort: individual failures are logged and the remaining cleanup
    /// still runs. A no-op when nothing was configured.
    async fn teardown_replication(&mut self);

    /// Execute one statement on the source inside an implicit transaction
    ///
    /// # Returns
    /// All result rows of the statement
    async fn execute_on_source(&mut self, sql: &str, params: &[SqlValue]) -> TesterResult<Vec<Row>>;

    /// Execute one statement on the target inside an implicit transaction
    async fn execute_on_target(&mut self, sql: &str, params: &[SqlValue]) -> TesterResult<Vec<Row>>;

    /// Poll row counts on both sides until they are equal and non-zero
    ///
    /// # Parameters
    /// - `table`: table to count on both sides
    /// - `timeout`: ceiling after which the check gives up
    ///
    /// # Returns
    /// `true` on convergence, `false` once `timeout` has elapsed. Never
    /// blocks longer than `timeout` plus one poll interval.
    async fn validate_sync(&mut self, table: &str, timeout: Duration) -> bool;

    /// `SELECT COUNT(*)` on the source
    async fn source_row_count(&mut self, table: &str) -> TesterResult<i64> {
        let rows = self.execute_on_source(&count_sql(table), &[]).await?;
        Ok(first_count(&rows))
    }

    /// `SELECT COUNT(*)` on the target
    async fn target_row_count(&mut self, table: &str) -> TesterResult<i64> {
        let rows = self.execute_on_target(&count_sql(table), &[]).await?;
        Ok(first_count(&rows))
    }

    /// Compare every row of `table` (ordered by `id`) between both sides
    ///
    /// # Parameters
    /// - `table`: table to compare
    /// - `where_clause`: optional filter applied on both sides
    async fn compare_data(&mut self, table: &str, where_clause: Option<String>) -> TesterResult<bool> {
        let sql = full_scan_sql(table, where_clause.as_deref());
        let source = self.execute_on_source(&sql, &[]).await?;
        let target = self.execute_on_target(&sql, &[]).await?;
        Ok(source == target)
    }
}

pub(crate) fn count_sql(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {table}")
}

pub(crate) fn full_scan_sql(table: &str, where_clause: Option<&str>) -> String {
    match where_clause {
        Some(filter) if !filter.trim().is_empty() => {
            format!("SELECT * FROM {table} WHERE {filter} ORDER BY id")
        }
        _ => format!("SELECT * FROM {table} ORDER BY id"),
    }
}

/// First column of the first row, 0 for an empty result
pub(crate) fn first_count(rows: &[Row]) -> i64 {
    rows.first()
        .and_then(|row| row.first())
        .and_then(|cell| cell.as_i64())
        .unwrap_or(0)
}

use async_trait::async_trait;
use shared::ConnectionConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{Side, TesterError, TesterResult};
use crate::traits::{SessionConnector, SqlSession};
use crate::types::{Row, SqlValue};

const COUNT_PREFIX: &str = "SELECT COUNT(*) FROM ";

/// Scriptable database shared by every session opened against it
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<Mutex<DatabaseState>>,
}

#[derive(Default)]
struct DatabaseState {
    /// table -> (effective from, count), in insertion order
    counts: HashMap<String, Vec<(Instant, i64)>>,
    results: HashMap<String, Vec<Row>>,
    failures: Vec<(String, String)>,
    delay: Duration,
    executed: Vec<String>,
    opened: usize,
    closed: usize,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DatabaseState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Row count reported for `table` from now on
    pub fn set_count(&self, table: &str, count: i64) {
        self.state()
            .counts
            .insert(table.to_string(), vec![(Instant::now(), count)]);
    }

    /// Row count reported for `table` once `delay` has elapsed
    pub fn set_count_after(&self, table: &str, count: i64, delay: Duration) {
        self.state()
            .counts
            .entry(table.to_string())
            .or_default()
            .push((Instant::now() + delay, count));
    }

    /// Rows returned for an exact statement
    pub fn respond(&self, sql: &str, rows: Vec<Row>) {
        self.state().results.insert(sql.to_string(), rows);
    }

    /// Statements starting with `prefix` fail with `message`
    pub fn fail_on(&self, prefix: &str, message: &str) {
        self.state()
            .failures
            .push((prefix.to_string(), message.to_string()));
    }

    /// Every statement takes `delay` before it answers
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = delay;
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Every statement seen so far, failed ones included
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    pub fn executed_matching(&self, prefix: &str) -> Vec<String> {
        self.state()
            .executed
            .iter()
            .filter(|sql| sql.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.state().opened
    }

    pub fn close_count(&self) -> usize {
        self.state().closed
    }

    fn run(&self, side: Side, sql: &str) -> TesterResult<Vec<Row>> {
        let mut state = self.state();
        state.executed.push(sql.to_string());

        if let Some((_, message)) = state
            .failures
            .iter()
            .find(|(prefix, _)| sql.starts_with(prefix.as_str()))
        {
            return Err(TesterError::sql(side, message));
        }

        if let Some(rows) = state.results.get(sql) {
            return Ok(rows.clone());
        }

        if let Some(table) = sql.strip_prefix(COUNT_PREFIX) {
            let now = Instant::now();
            let count = state
                .counts
                .get(table.trim())
                .and_then(|schedule| {
                    schedule
                        .iter()
                        .filter(|(from, _)| *from <= now)
                        .max_by_key(|(from, _)| *from)
                        .map(|(_, count)| *count)
                })
                .unwrap_or(0);
            return Ok(vec![vec![SqlValue::Int(count)]]);
        }

        Ok(Vec::new())
    }
}

/// Session over a [`MemoryDatabase`]
pub struct MemorySession {
    side: Side,
    database: MemoryDatabase,
    open: bool,
}

#[async_trait]
impl SqlSession for MemorySession {
    async fn execute(&mut self, sql: &str, _params: &[SqlValue]) -> TesterResult<Vec<Row>> {
        if !self.open {
            return Err(TesterError::NotConnected { side: self.side });
        }
        let delay = self.database.state().delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.database.run(self.side, sql)
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            self.database.state().closed += 1;
        }
    }
}

/// Connector over one in-memory database per side
#[derive(Clone, Default)]
pub struct MemoryConnector {
    source: MemoryDatabase,
    target: MemoryDatabase,
    failing: Option<Side>,
    opens: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse connections to `side`
    pub fn failing_on(mut self, side: Side) -> Self {
        self.failing = Some(side);
        self
    }

    pub fn source(&self) -> MemoryDatabase {
        self.source.clone()
    }

    pub fn target(&self) -> MemoryDatabase {
        self.target.clone()
    }

    /// Connection attempts on either side, refused ones included
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn shared(&self) -> Arc<dyn SessionConnector> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl SessionConnector for MemoryConnector {
    async fn open(&self, side: Side, config: &ConnectionConfig) -> TesterResult<Box<dyn SqlSession>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.failing == Some(side) {
            return Err(TesterError::Connection {
                side,
                endpoint: config.endpoint(),
                message: "connection refused".to_string(),
            });
        }

        let database = match side {
            Side::Source => self.source.clone(),
            Side::Target => self.target.clone(),
        };
        database.state().opened += 1;

        Ok(Box::new(MemorySession {
            side,
            database,
            open: true,
        }))
    }
}

//! Replication adapters, one per topology, and the registry that builds them

pub mod cross_cluster;
pub mod cross_engine;
pub mod queue_mediated;
pub mod same_engine;
pub mod task;

use shared::{ConnectionConfig, ScenarioConfig};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{Side, TesterError, TesterResult};
use crate::runtime::Poller;
use crate::runtime::poll::MIN_POLL_INTERVAL;
use crate::traits::{ReplicationAdapter, SessionConnector, SqlSession, count_sql, first_count};
use crate::types::{Row, SqlValue};

pub use cross_cluster::{CrossClusterAdapter, SyncLevel};
pub use cross_engine::CrossEngineAdapter;
pub use queue_mediated::{QueueMediatedAdapter, QueueSettings};
pub use same_engine::SameEngineAdapter;
pub use task::ReplicationTask;

/// Registered replication topologies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    /// MatrixOne to MatrixOne through a CDC task
    SameEngine,
    /// MatrixOne to MySQL through a CDC task with type mapping
    CrossEngine,
    /// Publication on one cluster, subscription on another
    CrossCluster,
    /// MySQL to MatrixOne through a producer, a broker topic and a consumer
    QueueMediated,
}

impl AdapterKind {
    /// `scenario_type` value selecting this adapter
    pub fn key(&self) -> &'static str {
        match self {
            AdapterKind::SameEngine => "mo_to_mo",
            AdapterKind::CrossEngine => "mo_to_mysql",
            AdapterKind::CrossCluster => "cross_cluster",
            AdapterKind::QueueMediated => "flink_cdc",
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for AdapterKind {
    type Err = TesterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        REGISTRY
            .iter()
            .map(|(kind, _)| *kind)
            .find(|kind| kind.key() == s)
            .ok_or_else(|| TesterError::UnknownScenarioType {
                scenario_type: s.to_string(),
                available: registered_keys().join(", "),
            })
    }
}

type AdapterConstructor = fn(ScenarioConfig, Arc<dyn SessionConnector>) -> Box<dyn ReplicationAdapter>;

fn build_same_engine(config: ScenarioConfig, connector: Arc<dyn SessionConnector>) -> Box<dyn ReplicationAdapter> {
    Box::new(SameEngineAdapter::new(config, connector))
}

fn build_cross_engine(config: ScenarioConfig, connector: Arc<dyn SessionConnector>) -> Box<dyn ReplicationAdapter> {
    Box::new(CrossEngineAdapter::new(config, connector))
}

fn build_cross_cluster(config: ScenarioConfig, connector: Arc<dyn SessionConnector>) -> Box<dyn ReplicationAdapter> {
    Box::new(CrossClusterAdapter::new(config, connector))
}

fn build_queue_mediated(config: ScenarioConfig, connector: Arc<dyn SessionConnector>) -> Box<dyn ReplicationAdapter> {
    Box::new(QueueMediatedAdapter::new(config, connector))
}

/// Static, exhaustive `scenario_type` -> constructor table
static REGISTRY: [(AdapterKind, AdapterConstructor); 4] = [
    (AdapterKind::SameEngine, build_same_engine),
    (AdapterKind::CrossEngine, build_cross_engine),
    (AdapterKind::CrossCluster, build_cross_cluster),
    (AdapterKind::QueueMediated, build_queue_mediated),
];

/// Every registered `scenario_type` key
pub fn registered_keys() -> Vec<&'static str> {
    REGISTRY.iter().map(|(kind, _)| kind.key()).collect()
}

/// Build the adapter declared by `config.scenario_type`.
///
/// Unknown types fail here, before any connection is attempted.
pub fn create_adapter(
    config: ScenarioConfig,
    connector: Arc<dyn SessionConnector>,
) -> TesterResult<Box<dyn ReplicationAdapter>> {
    let kind: AdapterKind = config.scenario_type.parse()?;
    let (_, constructor) = REGISTRY
        .iter()
        .find(|(registered, _)| *registered == kind)
        .ok_or_else(|| TesterError::config(format!("no constructor registered for {kind}")))?;

    Ok(constructor(config, connector))
}

/// The two sessions every adapter owns between `connect` and `disconnect`
pub struct SessionPair {
    source_config: ConnectionConfig,
    target_config: ConnectionConfig,
    connector: Arc<dyn SessionConnector>,
    source: Option<Box<dyn SqlSession>>,
    target: Option<Box<dyn SqlSession>>,
}

impl SessionPair {
    pub fn new(config: &ScenarioConfig, connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            source_config: config.source.clone(),
            target_config: config.target.clone(),
            connector,
            source: None,
            target: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.source.is_some() && self.target.is_some()
    }

    /// Open both sessions; if the target fails the source is closed again
    pub async fn connect(&mut self) -> TesterResult<()> {
        let mut source = self
            .connector
            .open(Side::Source, &self.source_config)
            .await?;

        let target = match self.connector.open(Side::Target, &self.target_config).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };

        self.source = Some(source);
        self.target = Some(target);
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close().await;
        }
        if let Some(mut target) = self.target.take() {
            target.close().await;
        }
    }

    pub async fn execute(&mut self, side: Side, sql: &str, params: &[SqlValue]) -> TesterResult<Vec<Row>> {
        let session = match side {
            Side::Source => self.source.as_mut(),
            Side::Target => self.target.as_mut(),
        }
        .ok_or(TesterError::NotConnected { side })?;

        session.execute(sql, params).await
    }

    pub async fn row_count(&mut self, side: Side, table: &str) -> TesterResult<i64> {
        let rows = self.execute(side, &count_sql(table), &[]).await?;
        Ok(first_count(&rows))
    }

    /// Poll row counts every `interval` until both sides hold the same
    /// non-zero count or `timeout` elapses. Errors while polling count as
    /// "not converged yet". Each poll is cut off at the deadline, so a
    /// stalled count query cannot hold the check past `timeout`.
    pub async fn converge(&mut self, table: &str, timeout: Duration, interval: Duration) -> bool {
        let mut poller = Poller::new(interval, timeout);
        info!(
            "⏳ Waiting for {} to converge (timeout: {}s)",
            table,
            timeout.as_secs()
        );

        loop {
            let budget = poller.remaining().max(MIN_POLL_INTERVAL);
            match tokio::time::timeout(budget, self.counts(table)).await {
                Ok(Ok((source, target))) => {
                    info!(
                        "   source: {} rows, target: {} rows ({}s)",
                        source,
                        target,
                        poller.elapsed().as_secs()
                    );
                    if source == target && source > 0 {
                        info!("✓ {} converged", table);
                        return true;
                    }
                }
                Ok(Err(e)) => warn!("⚠️ Error checking sync state of {}: {}", table, e),
                Err(_) => warn!(
                    "⚠️ Row counts of {} not returned within {:.1}s",
                    table,
                    budget.as_secs_f64()
                ),
            }

            if !poller.wait_next().await {
                warn!(
                    "⏰ {} did not converge within {}s ({} checks)",
                    table,
                    timeout.as_secs(),
                    poller.attempts()
                );
                return false;
            }
        }
    }

    async fn counts(&mut self, table: &str) -> TesterResult<(i64, i64)> {
        let source = self.row_count(Side::Source, table).await?;
        let target = self.row_count(Side::Target, table).await?;
        Ok((source, target))
    }
}

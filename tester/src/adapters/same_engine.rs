//! MatrixOne to MatrixOne replication through a CDC task

use async_trait::async_trait;
use shared::ScenarioConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::task::{ReplicationTask, TaskTarget};
use super::{AdapterKind, SessionPair};
use crate::error::{Side, TesterResult};
use crate::traits::{ReplicationAdapter, SessionConnector};
use crate::types::{AdapterState, Row, SqlValue};

pub struct SameEngineAdapter {
    config: ScenarioConfig,
    sessions: SessionPair,
    state: AdapterState,
    task: Option<ReplicationTask>,
}

impl SameEngineAdapter {
    pub fn new(config: ScenarioConfig, connector: Arc<dyn SessionConnector>) -> Self {
        let sessions = SessionPair::new(&config, connector);
        Self {
            config,
            sessions,
            state: AdapterState::Unconnected,
            task: None,
        }
    }

    /// The task created by `configure_replication`, if any
    pub fn task(&self) -> Option<&ReplicationTask> {
        self.task.as_ref()
    }
}

#[async_trait]
impl ReplicationAdapter for SameEngineAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::SameEngine
    }

    fn state(&self) -> AdapterState {
        self.state
    }

    async fn connect(&mut self) -> TesterResult<()> {
        info!(
            "🔌 Connecting to source {} and target {}",
            self.config.source.endpoint(),
            self.config.target.endpoint()
        );
        self.sessions.connect().await?;
        self.state = AdapterState::Connected;
        info!("✓ Connected to both MatrixOne instances");
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.state == AdapterState::Unconnected {
            return;
        }
        self.sessions.disconnect().await;
        self.state = AdapterState::Unconnected;
        info!("🔌 Disconnected");
    }

    async fn configure_replication(&mut self) -> TesterResult<()> {
        let task = ReplicationTask::from_scenario(&self.config, TaskTarget::SameEngine)?;
        task.create(&mut self.sessions).await?;
        self.task = Some(task);
        self.state = AdapterState::ReplicationActive;
        Ok(())
    }

    async fn teardown_replication(&mut self) {
        if let Some(task) = self.task.take() {
            match task.remove(&mut self.sessions).await {
                Ok(()) => info!("🗑️ CDC task {} removed", task.name()),
                Err(e) => warn!("⚠️ Failed to drop CDC task {}: {}", task.name(), e),
            }
        }
        if self.state == AdapterState::ReplicationActive {
            self.state = AdapterState::Connected;
        }
    }

    async fn execute_on_source(&mut self, sql: &str, params: &[SqlValue]) -> TesterResult<Vec<Row>> {
        self.sessions.execute(Side::Source, sql, params).await
    }

    async fn execute_on_target(&mut self, sql: &str, params: &[SqlValue]) -> TesterResult<Vec<Row>> {
        self.sessions.execute(Side::Target, sql, params).await
    }

    async fn validate_sync(&mut self, table: &str, timeout: Duration) -> bool {
        let interval = self.config.validation.check_interval();
        self.sessions.converge(table, timeout, interval).await
    }
}

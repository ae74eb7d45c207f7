//! Cross-cluster replication: a publication on the source cluster and a
//! subscription on the target cluster
//!
//! Object names carry the Unix timestamp of the run (`pub_test_<ts>`,
//! `sub_test_<ts>`). The subscription is materialised as the subscribed
//! database or table, which is also what gets dropped on teardown.

use async_trait::async_trait;
use chrono::Utc;
use shared::ScenarioConfig;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{AdapterKind, SessionPair};
use crate::error::{Side, TesterError, TesterResult};
use crate::traits::{ReplicationAdapter, SessionConnector};
use crate::types::{AdapterState, Row, SqlValue};

pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_TABLE: &str = "cdc_test_base";

/// Publication scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncLevel {
    Account,
    Database,
    Table,
}

impl FromStr for SyncLevel {
    type Err = TesterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "account" => Ok(SyncLevel::Account),
            "database" => Ok(SyncLevel::Database),
            "table" => Ok(SyncLevel::Table),
            other => Err(TesterError::config(format!(
                "unknown sync_level '{other}' (expected account, database or table)"
            ))),
        }
    }
}

impl fmt::Display for SyncLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncLevel::Account => write!(f, "account"),
            SyncLevel::Database => write!(f, "database"),
            SyncLevel::Table => write!(f, "table"),
        }
    }
}

/// Statements for one publication/subscription pair
#[derive(Debug, Clone, PartialEq)]
pub struct LinkPlan {
    pub level: SyncLevel,
    pub publication: String,
    pub subscription: String,
    pub create_publication: String,
    /// `(statement, name dropped on teardown)`; `None` at account level
    pub create_subscription: Option<(String, String)>,
}

impl LinkPlan {
    pub fn new(config: &ScenarioConfig, timestamp: i64) -> TesterResult<Self> {
        let params = &config.replication_config;
        let level: SyncLevel = params
            .get_str("sync_level")
            .unwrap_or_else(|| "database".to_string())
            .parse()?;
        let interval = params
            .get_u64("sync_interval")
            .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS);

        let publication = format!("pub_test_{timestamp}");
        let subscription = format!("sub_test_{timestamp}");
        let source = &config.source;
        let target = &config.target;
        let source_table = source.table.as_deref().unwrap_or(DEFAULT_TABLE);
        let target_table = target.table.as_deref().unwrap_or(source_table);

        let create_publication = match level {
            SyncLevel::Account => format!(
                "CREATE PUBLICATION {publication} ACCOUNT {}",
                target.account_or_default()
            ),
            SyncLevel::Database => format!(
                "CREATE PUBLICATION {publication} DATABASE {} ACCOUNT {}",
                source.database,
                target.account_or_default()
            ),
            SyncLevel::Table => format!(
                "CREATE PUBLICATION {publication} DATABASE {} TABLE {source_table} ACCOUNT {}",
                source.database,
                target.account_or_default()
            ),
        };

        let conn = format!(
            "mysql://{}#{}:{}@{}:{}",
            source.account_or_default(),
            source.user,
            source.password,
            source.host,
            source.port
        );
        let create_subscription = match level {
            SyncLevel::Account => None,
            SyncLevel::Database => Some((
                format!(
                    "CREATE DATABASE IF NOT EXISTS {} FROM '{conn}' PUBLICATION {publication} SYNC INTERVAL {interval}",
                    target.database
                ),
                target.database.clone(),
            )),
            SyncLevel::Table => {
                let name = format!("{}.{target_table}", target.database);
                Some((
                    format!(
                        "CREATE TABLE IF NOT EXISTS {name} FROM '{conn}' PUBLICATION {publication} SYNC INTERVAL {interval}"
                    ),
                    name,
                ))
            }
        };

        Ok(Self {
            level,
            publication,
            subscription,
            create_publication,
            create_subscription,
        })
    }
}

pub struct CrossClusterAdapter {
    config: ScenarioConfig,
    sessions: SessionPair,
    state: AdapterState,
    publication: Option<String>,
    subscription: Option<String>,
}

impl CrossClusterAdapter {
    pub fn new(config: ScenarioConfig, connector: Arc<dyn SessionConnector>) -> Self {
        let sessions = SessionPair::new(&config, connector);
        Self {
            config,
            sessions,
            state: AdapterState::Unconnected,
            publication: None,
            subscription: None,
        }
    }

    pub fn publication(&self) -> Option<&str> {
        self.publication.as_deref()
    }

    /// Database or `db.table` created by the subscription
    pub fn subscription(&self) -> Option<&str> {
        self.subscription.as_deref()
    }

    /// First row of `SHOW CCPR SUBSCRIPTION`, `None` when nothing is subscribed
    pub async fn subscription_status(&mut self) -> TesterResult<Option<Row>> {
        let Some(name) = self.subscription.clone() else {
            return Ok(None);
        };
        let rows = self
            .sessions
            .execute(Side::Target, &format!("SHOW CCPR SUBSCRIPTION {name}"), &[])
            .await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl ReplicationAdapter for CrossClusterAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::CrossCluster
    }

    fn state(&self) -> AdapterState {
        self.state
    }

    async fn connect(&mut self) -> TesterResult<()> {
        info!(
            "🔌 Connecting to source cluster {} and target cluster {}",
            self.config.source.endpoint(),
            self.config.target.endpoint()
        );
        self.sessions.connect().await?;
        self.state = AdapterState::Connected;
        info!("✓ Connected to both clusters");
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
        let plan = LinkPlan::new(&self.config, Utc::now().timestamp())?;
        info!("🔧 Configuring {}-level cross-cluster replication", plan.level);

        self.sessions
            .execute(Side::Source, &plan.create_publication, &[])
            .await
            .map_err(|e| TesterError::setup(format!("creating publication {}: {e}", plan.publication)))?;
        info!("✓ Publication {} created on source", plan.publication);
        self.publication = Some(plan.publication.clone());

        match plan.create_subscription {
            Some((sql, name)) => {
                self.sessions
                    .execute(Side::Target, &sql, &[])
                    .await
                    .map_err(|e| TesterError::setup(format!("creating subscription {}: {e}", plan.subscription)))?;
                info!("✓ Subscription {} created on target as {}", plan.subscription, name);
                self.subscription = Some(name);
            }
            None => info!(
                "   account-level publication {} needs a manual subscription on the target",
                plan.publication
            ),
        }

        self.state = AdapterState::ReplicationActive;
        Ok(())
    }

    async fn teardown_replication(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            let sql = format!("DROP CCPR SUBSCRIPTION {subscription}");
            match self.sessions.execute(Side::Target, &sql, &[]).await {
                Ok(_) => info!("🗑️ Subscription {} dropped", subscription),
                Err(e) => warn!(
                    "⚠️ Failed to drop subscription {}: {} (left orphaned on target)",
                    subscription, e
                ),
            }
        }

        if let Some(publication) = self.publication.take() {
            let sql = format!("DROP PUBLICATION {publication}");
            match self.sessions.execute(Side::Source, &sql, &[]).await {
                Ok(_) => info!("🗑️ Publication {} dropped", publication),
                Err(e) => warn!(
                    "⚠️ Failed to drop publication {}: {} (left orphaned on source)",
                    publication, e
                ),
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

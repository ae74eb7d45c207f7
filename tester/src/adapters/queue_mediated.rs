//! MySQL to MatrixOne replication through an external change-data pipeline
//!
//! A producer script streams source changes into a broker topic and a
//! consumer script applies them to the target. Both run as background
//! processes owned by the adapter; the broker itself lives in a
//! docker-compose stack next to the scripts.

use async_trait::async_trait;
use shared::ScenarioConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use super::{AdapterKind, SessionPair};
use crate::error::{Side, TesterError, TesterResult};
use crate::runtime::{BrokerStack, ManagedProcess};
use crate::traits::{ReplicationAdapter, SessionConnector};
use crate::types::{AdapterState, Row, SqlValue};

pub const DEFAULT_TOOL_DIR: &str = "../flink-cdc";
pub const DEFAULT_TABLE: &str = "cdc_test_base";
pub const DEFAULT_TOPIC: &str = "cdc_test_topic";
pub const DEFAULT_GROUP: &str = "cdc_test_group";
pub const DEFAULT_CONSUMER_BATCH_SIZE: u64 = 2000;
pub const DEFAULT_PRODUCER_SCRIPT: &str = "scripts/producer-realtime.sh";
pub const DEFAULT_CONSUMER_SCRIPT: &str = "scripts/consumer.sh";

const PRODUCER: &str = "producer";
const CONSUMER: &str = "consumer";

/// Pipeline settings read from `replication_config`
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSettings {
    pub tool_dir: PathBuf,
    pub database: String,
    pub tables: Vec<String>,
    pub topic: String,
    pub group: String,
    pub consumer_batch_size: u64,
    pub producer_script: PathBuf,
    pub consumer_script: PathBuf,
    pub log_dir: PathBuf,
    pub manage_broker: bool,
    pub stop_broker_on_teardown: bool,
    pub compose_program: Option<String>,
    pub broker_service: Option<String>,
    pub broker_start_wait: Option<Duration>,
    pub startup_grace: Duration,
    pub settle: Duration,
    pub stop_timeout: Duration,
}

impl QueueSettings {
    pub fn from_scenario(config: &ScenarioConfig) -> TesterResult<Self> {
        let params = &config.replication_config;
        let secs = |key: &str, default: u64| Duration::from_secs(params.get_u64(key).unwrap_or(default));

        let tables = params
            .get_str_list("tables")
            .unwrap_or_else(|| vec![DEFAULT_TABLE.to_string()]);
        if tables.is_empty() {
            return Err(TesterError::config("replication_config.tables must name at least one table"));
        }

        let consumer_batch_size = params
            .get_u64("consumer_batch_size")
            .unwrap_or(DEFAULT_CONSUMER_BATCH_SIZE);
        if consumer_batch_size == 0 {
            return Err(TesterError::config("replication_config.consumer_batch_size must be positive"));
        }

        Ok(Self {
            tool_dir: PathBuf::from(params.get_str("path").unwrap_or_else(|| DEFAULT_TOOL_DIR.to_string())),
            database: config.source.database.clone(),
            tables,
            topic: params.get_str("topic").unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
            group: params.get_str("group").unwrap_or_else(|| DEFAULT_GROUP.to_string()),
            consumer_batch_size,
            producer_script: PathBuf::from(
                params
                    .get_str("producer_script")
                    .unwrap_or_else(|| DEFAULT_PRODUCER_SCRIPT.to_string()),
            ),
            consumer_script: PathBuf::from(
                params
                    .get_str("consumer_script")
                    .unwrap_or_else(|| DEFAULT_CONSUMER_SCRIPT.to_string()),
            ),
            log_dir: params
                .get_str("log_dir")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            manage_broker: params.get_bool("manage_broker").unwrap_or(true),
            stop_broker_on_teardown: params
                .get_bool("stop_broker_on_teardown")
                .or_else(|| params.get_bool("stop_kafka_on_teardown"))
                .unwrap_or(false),
            compose_program: params.get_str("compose_program"),
            broker_service: params.get_str("broker_service"),
            broker_start_wait: params.get_u64("broker_start_wait_secs").map(Duration::from_secs),
            startup_grace: secs("startup_grace_secs", 5),
            settle: secs("settle_secs", 10),
            stop_timeout: secs("stop_timeout_secs", 10),
        })
    }

    pub fn producer_args(&self) -> Vec<String> {
        vec![
            "--db".to_string(),
            self.database.clone(),
            "--tables".to_string(),
            self.tables.join(","),
            "--topic".to_string(),
            self.topic.clone(),
        ]
    }

    pub fn consumer_args(&self) -> Vec<String> {
        vec![
            "--db".to_string(),
            self.database.clone(),
            "--consumer-batch-size".to_string(),
            self.consumer_batch_size.to_string(),
            "--topic".to_string(),
            self.topic.clone(),
            "--group".to_string(),
            self.group.clone(),
        ]
    }

    pub fn producer_log(&self) -> PathBuf {
        self.log_dir.join("flink_cdc_producer.log")
    }

    pub fn consumer_log(&self) -> PathBuf {
        self.log_dir.join("flink_cdc_consumer.log")
    }

    pub fn broker(&self) -> BrokerStack {
        let mut broker = BrokerStack::new(&self.tool_dir);
        if let Some(program) = &self.compose_program {
            broker = broker.with_compose_program(program);
        }
        if let Some(service) = &self.broker_service {
            broker = broker.with_service(service);
        }
        if let Some(wait) = self.broker_start_wait {
            broker = broker.with_start_wait(wait);
        }
        broker
    }
}

pub struct QueueMediatedAdapter {
    config: ScenarioConfig,
    sessions: SessionPair,
    state: AdapterState,
    settings: Option<QueueSettings>,
    producer: Option<ManagedProcess>,
    consumer: Option<ManagedProcess>,
}

impl QueueMediatedAdapter {
    pub fn new(config: ScenarioConfig, connector: Arc<dyn SessionConnector>) -> Self {
        let sessions = SessionPair::new(&config, connector);
        Self {
            config,
            sessions,
            state: AdapterState::Unconnected,
            settings: None,
            producer: None,
            consumer: None,
        }
    }

    pub fn producer_alive(&mut self) -> bool {
        self.producer.as_mut().is_some_and(ManagedProcess::is_alive)
    }

    pub fn consumer_alive(&mut self) -> bool {
        self.consumer.as_mut().is_some_and(ManagedProcess::is_alive)
    }

    /// Last `lines` lines of the producer log, `None` before it was launched
    pub fn producer_log(&self, lines: usize) -> Option<String> {
        self.producer.as_ref().map(|p| p.log_tail(lines))
    }

    pub fn consumer_log(&self, lines: usize) -> Option<String> {
        self.consumer.as_ref().map(|p| p.log_tail(lines))
    }

    async fn launch(
        name: &str,
        tool_dir: &Path,
        script: &Path,
        args: Vec<String>,
        log_path: &Path,
        grace: Duration,
    ) -> TesterResult<ManagedProcess> {
        info!("🚀 Starting {} ({})", name, args.join(" "));
        let mut process = ManagedProcess::spawn(name, tool_dir.join(script), args, tool_dir, log_path)?;
        process.verify_started(grace).await?;
        Ok(process)
    }
}

#[async_trait]
impl ReplicationAdapter for QueueMediatedAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::QueueMediated
    }

    fn state(&self) -> AdapterState {
        self.state
    }

    async fn connect(&mut self) -> TesterResult<()> {
        info!(
            "🔌 Connecting to MySQL source {} and MatrixOne target {}",
            self.config.source.endpoint(),
            self.config.target.endpoint()
        );
        self.sessions.connect().await?;
        self.state = AdapterState::Connected;
        info!("✓ Connected");
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
        let mut settings = QueueSettings::from_scenario(&self.config)?;
        settings.tool_dir = settings.tool_dir.canonicalize().map_err(|e| {
            TesterError::setup(format!("pipeline directory {}: {e}", settings.tool_dir.display()))
        })?;

        info!("🔧 Configuring queue-mediated replication");
        info!("   database: {}", settings.database);
        info!("   tables: {}", settings.tables.join(", "));
        info!("   topic: {} (group {})", settings.topic, settings.group);
        info!("   consumer batch size: {}", settings.consumer_batch_size);
        self.settings = Some(settings.clone());

        if settings.manage_broker {
            settings.broker().ensure_running().await?;
        }

        let producer = Self::launch(
            PRODUCER,
            &settings.tool_dir,
            &settings.producer_script,
            settings.producer_args(),
            &settings.producer_log(),
            settings.startup_grace,
        )
        .await?;
        self.producer = Some(producer);

        let consumer = Self::launch(
            CONSUMER,
            &settings.tool_dir,
            &settings.consumer_script,
            settings.consumer_args(),
            &settings.consumer_log(),
            settings.startup_grace,
        )
        .await?;
        self.consumer = Some(consumer);

        info!("⏳ Waiting {}s for the pipeline to settle", settings.settle.as_secs());
        sleep(settings.settle).await;

        self.state = AdapterState::ReplicationActive;
        info!("✓ Queue-mediated replication configured");
        Ok(())
    }

    async fn teardown_replication(&mut self) {
        let Some(settings) = self.settings.take() else {
            return;
        };

        for mut process in [self.producer.take(), self.consumer.take()].into_iter().flatten() {
            info!("🛑 Stopping {} (log: {})", process.name(), process.log_path().display());
            process.stop(settings.stop_timeout).await;
        }

        if settings.stop_broker_on_teardown {
            match settings.broker().stop().await {
                Ok(()) => info!("✓ Broker stack stopped"),
                Err(e) => warn!("⚠️ Failed to stop broker stack: {}", e),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryConnector, fixtures};
    use shared::ReplicationParams;
    use tempfile::TempDir;

    #[test]
    fn test_settings_defaults() {
        let config = fixtures::scenario("flink_cdc");
        let settings = QueueSettings::from_scenario(&config).unwrap();

        assert_eq!(settings.tool_dir, PathBuf::from("../flink-cdc"));
        assert_eq!(settings.tables, vec!["cdc_test_base"]);
        assert_eq!(
            settings.producer_args(),
            vec!["--db", "src_db", "--tables", "cdc_test_base", "--topic", "cdc_test_topic"]
        );
        assert_eq!(
            settings.consumer_args(),
            vec![
                "--db",
                "src_db",
                "--consumer-batch-size",
                "2000",
                "--topic",
                "cdc_test_topic",
                "--group",
                "cdc_test_group"
            ]
        );
        assert!(settings.manage_broker);
        assert!(!settings.stop_broker_on_teardown);
        assert_eq!(settings.broker_service, None);
        assert_eq!(settings.startup_grace, Duration::from_secs(5));
        assert_eq!(settings.settle, Duration::from_secs(10));
        assert_eq!(settings.stop_timeout, Duration::from_secs(10));
        assert!(settings.producer_log().ends_with("flink_cdc_producer.log"));
    }

    #[test]
    fn test_settings_overrides() {
        let mut config = fixtures::scenario("flink_cdc");
        config.replication_config = ReplicationParams::new()
            .with("tables", "orders, customers")
            .with("topic", "orders_topic")
            .with("consumer_batch_size", 50u64)
            .with("stop_kafka_on_teardown", true)
            .with("broker_service", "redpanda")
            .with("manage_broker", false);

        let settings = QueueSettings::from_scenario(&config).unwrap();
        assert_eq!(settings.tables, vec!["orders", "customers"]);
        assert_eq!(settings.producer_args()[3], "orders,customers");
        assert_eq!(settings.consumer_args()[3], "50");
        assert!(settings.stop_broker_on_teardown);
        assert!(!settings.manage_broker);
        assert_eq!(settings.broker_service.as_deref(), Some("redpanda"));
        assert!(format!("{:?}", settings.broker()).contains("service: \"redpanda\""));

        config.replication_config = ReplicationParams::new().with("consumer_batch_size", 0u64);
        assert!(QueueSettings::from_scenario(&config).unwrap_err().is_configuration());
    }

    #[tokio::test]
    async fn test_teardown_without_configure_is_noop() {
        let connector = MemoryConnector::new();
        let mut adapter = QueueMediatedAdapter::new(fixtures::scenario("flink_cdc"), connector.shared());
        adapter.teardown_replication().await;
        assert!(!adapter.producer_alive());
        assert!(adapter.producer_log(10).is_none());
    }

    #[cfg(unix)]
    mod pipeline {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, relative: &str, body: &str) {
            let path = dir.join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        fn scenario(tool_dir: &TempDir) -> ScenarioConfig {
            let mut config = fixtures::scenario("flink_cdc");
            config.replication_config = ReplicationParams::new()
                .with("path", tool_dir.path().to_string_lossy().to_string())
                .with("log_dir", tool_dir.path().to_string_lossy().to_string())
                .with("manage_broker", false)
                .with("startup_grace_secs", 1u64)
                .with("settle_secs", 0u64)
                .with("stop_timeout_secs", 2u64);
            config
        }

        #[tokio::test]
        async fn test_pipeline_starts_and_stops() {
            let dir = TempDir::new().unwrap();
            script(dir.path(), DEFAULT_PRODUCER_SCRIPT, "echo \"producer $*\"\nexec sleep 30");
            script(dir.path(), DEFAULT_CONSUMER_SCRIPT, "echo \"consumer $*\"\nexec sleep 30");

            let connector = MemoryConnector::new();
            let mut adapter = QueueMediatedAdapter::new(scenario(&dir), connector.shared());
            adapter.connect().await.unwrap();
            adapter.configure_replication().await.unwrap();

            assert_eq!(adapter.state(), AdapterState::ReplicationActive);
            assert!(adapter.producer_alive());
            assert!(adapter.consumer_alive());
            let log = adapter.producer_log(5).unwrap();
            assert!(log.contains("producer --db src_db --tables cdc_test_base --topic cdc_test_topic"));
            assert!(adapter.consumer_log(5).unwrap().contains("--group cdc_test_group"));

            adapter.teardown_replication().await;
            assert!(!adapter.producer_alive());
            assert!(!adapter.consumer_alive());
            assert_eq!(adapter.state(), AdapterState::Connected);
            adapter.disconnect().await;
        }

        #[tokio::test]
        async fn test_consumer_crash_aborts_setup_and_producer_is_stopped() {
            let dir = TempDir::new().unwrap();
            script(dir.path(), DEFAULT_PRODUCER_SCRIPT, "exec sleep 30");
            script(dir.path(), DEFAULT_CONSUMER_SCRIPT, "echo 'no broker at localhost:9092'\nexit 1");

            let connector = MemoryConnector::new();
            let mut adapter = QueueMediatedAdapter::new(scenario(&dir), connector.shared());
            adapter.connect().await.unwrap();

            let err = adapter.configure_replication().await.unwrap_err();
            let message = err.to_string();
            assert!(message.contains("consumer"));
            assert!(message.contains("no broker"));
            assert_eq!(adapter.state(), AdapterState::Connected);
            assert!(adapter.producer_alive());

            adapter.teardown_replication().await;
            assert!(!adapter.producer_alive());
        }

        #[tokio::test]
        async fn test_missing_tool_dir_is_setup_error() {
            let mut config = fixtures::scenario("flink_cdc");
            config.replication_config = ReplicationParams::new()
                .with("path", "/nonexistent/flink-cdc")
                .with("manage_broker", false);
            let mut adapter = QueueMediatedAdapter::new(config, MemoryConnector::new().shared());

            let err = adapter.configure_replication().await.unwrap_err();
            assert!(matches!(err, TesterError::ReplicationSetup { .. }));
        }
    }
}

//! Message-broker stack managed through docker-compose

use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::sleep;
use tracing::info;

use crate::error::{TesterError, TesterResult};

pub const DEFAULT_COMPOSE_PROGRAM: &str = "docker-compose";
pub const DEFAULT_BROKER_SERVICE: &str = "kafka";
pub const DEFAULT_BROKER_START_WAIT: Duration = Duration::from_secs(15);

/// The compose stack hosting the broker, started on demand
#[derive(Debug, Clone)]
pub struct BrokerStack {
    compose_dir: PathBuf,
    compose_program: String,
    service: String,
    start_wait: Duration,
}

impl BrokerStack {
    pub fn new(compose_dir: impl Into<PathBuf>) -> Self {
        Self {
            compose_dir: compose_dir.into(),
            compose_program: DEFAULT_COMPOSE_PROGRAM.to_string(),
            service: DEFAULT_BROKER_SERVICE.to_string(),
            start_wait: DEFAULT_BROKER_START_WAIT,
        }
    }

    /// Program invoked for `ps`, `up -d` and `down` (fluent API)
    pub fn with_compose_program(mut self, program: impl Into<String>) -> Self {
        self.compose_program = program.into();
        self
    }

    /// Service name looked for in `ps` output (fluent API)
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Time given to the broker after `up -d` (fluent API)
    pub fn with_start_wait(mut self, wait: Duration) -> Self {
        self.start_wait = wait;
        self
    }

    /// True when `ps` lists the broker service as `Up`
    pub async fn is_running(&self) -> TesterResult<bool> {
        let output = self
            .compose()
            .arg("ps")
            .output()
            .await
            .map_err(|e| TesterError::setup(format!("{} ps failed: {e}", self.compose_program)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .any(|line| line.contains(&self.service) && line.contains("Up")))
    }

    /// Start the stack unless the broker is already up.
    ///
    /// # Returns
    /// `true` when this call started the stack
    pub async fn ensure_running(&self) -> TesterResult<bool> {
        if self.is_running().await? {
            info!("✓ {} already running", self.service);
            return Ok(false);
        }

        info!("🚀 Starting {} stack in {}", self.service, self.compose_dir.display());
        let status = self
            .compose()
            .args(["up", "-d"])
            .status()
            .await
            .map_err(|e| TesterError::setup(format!("{} up failed: {e}", self.compose_program)))?;

        if !status.success() {
            return Err(TesterError::setup(format!(
                "{} up -d exited with {status}",
                self.compose_program
            )));
        }

        sleep(self.start_wait).await;
        info!("✓ {} started", self.service);
        Ok(true)
    }

    /// Bring the whole stack down
    pub async fn stop(&self) -> TesterResult<()> {
        let status = self
            .compose()
            .arg("down")
            .status()
            .await
            .map_err(|e| TesterError::setup(format!("{} down failed: {e}", self.compose_program)))?;

        if !status.success() {
            return Err(TesterError::setup(format!(
                "{} down exited with {status}",
                self.compose_program
            )));
        }
        Ok(())
    }

    fn compose(&self) -> Command {
        let mut cmd = Command::new(&self.compose_program);
        cmd.current_dir(&self.compose_dir);
        cmd
    }
}

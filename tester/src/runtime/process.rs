//! Owned handle for externally spawned background processes
//!
//! Output goes to a log file so failures can be diagnosed after the fact.
//! The child is killed when the handle is dropped.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{TesterError, TesterResult};

/// Lines of log output attached to startup failures
const STARTUP_FAILURE_LOG_LINES: usize = 20;

#[derive(Debug)]
pub struct ManagedProcess {
    name: String,
    child: Child,
    log_path: PathBuf,
}

impl ManagedProcess {
    /// Launch `program` in `cwd` with stdout and stderr redirected to `log_path`
    pub fn spawn<I, S>(
        name: &str,
        program: impl AsRef<OsStr>,
        args: I,
        cwd: &Path,
        log_path: &Path,
    ) -> TesterResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = program.as_ref();
        let log = File::create(log_path).map_err(|e| {
            TesterError::process(name, format!("cannot create log {}: {e}", log_path.display()))
        })?;
        let log_err = log.try_clone()?;

        let child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TesterError::process(name, format!("failed to launch {}: {e}", program.to_string_lossy()))
            })?;

        debug!(
            "Spawned {} (PID: {:?}), output -> {}",
            name,
            child.id(),
            log_path.display()
        );

        Ok(Self {
            name: name.to_string(),
            child,
            log_path: log_path.to_path_buf(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process id, `None` once the process has been reaped
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Wait `grace`, then fail if the process has already exited
    pub async fn verify_started(&mut self, grace: Duration) -> TesterResult<()> {
        sleep(grace).await;

        match self.child.try_wait() {
            Ok(None) => {
                info!("✓ {} running (PID: {:?})", self.name, self.pid());
                Ok(())
            }
            Ok(Some(status)) => Err(TesterError::process(
                &self.name,
                format!(
                    "exited immediately after launch ({status}); last output:\n{}",
                    self.log_tail(STARTUP_FAILURE_LOG_LINES)
                ),
            )),
            Err(e) => Err(TesterError::process(
                &self.name,
                format!("cannot query process status: {e}"),
            )),
        }
    }

    /// Ask the process to exit and wait up to `timeout` for it
    pub async fn request_stop(&mut self, timeout: Duration) -> TesterResult<()> {
        if !self.is_alive() {
            return Ok(());
        }

        self.send_terminate()?;

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!("{} exited with {}", self.name, status);
                Ok(())
            }
            Ok(Err(e)) => Err(TesterError::process(&self.name, format!("wait failed: {e}"))),
            Err(_) => Err(TesterError::process(
                &self.name,
                format!("did not exit within {timeout:?}"),
            )),
        }
    }

    /// Kill the process and reap it
    pub async fn force_stop(&mut self) -> TesterResult<()> {
        if !self.is_alive() {
            return Ok(());
        }

        self.child
            .kill()
            .await
            .map_err(|e| TesterError::process(&self.name, format!("kill failed: {e}")))
    }

    /// Graceful stop with a bounded wait, escalating to a kill. Never fails.
    pub async fn stop(&mut self, timeout: Duration) {
        match self.request_stop(timeout).await {
            Ok(()) => info!("✓ {} stopped", self.name),
            Err(e) => {
                warn!("⚠️ Graceful stop failed: {}; killing", e);
                match self.force_stop().await {
                    Ok(()) => info!("🔨 {} killed", self.name),
                    Err(e) => warn!("⚠️ {}", e),
                }
            }
        }
    }

    /// Last `lines` lines of the process log
    pub fn log_tail(&self, lines: usize) -> String {
        match fs::read_to_string(&self.log_path) {
            Ok(contents) => tail_lines(&contents, lines),
            Err(e) => format!("unable to read {}: {e}", self.log_path.display()),
        }
    }

    #[cfg(unix)]
    fn send_terminate(&mut self) -> TesterResult<()> {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id() else {
            return Ok(());
        };

        match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => {
                debug!("📤 Sent SIGTERM to {} ({})", self.name, pid);
                Ok(())
            }
            // Already gone
            Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(e) => Err(TesterError::process(
                &self.name,
                format!("failed to signal PID {pid}: {e}"),
            )),
        }
    }

    #[cfg(not(unix))]
    fn send_terminate(&mut self) -> TesterResult<()> {
        self.child
            .start_kill()
            .map_err(|e| TesterError::process(&self.name, format!("kill failed: {e}")))
    }
}

fn tail_lines(contents: &str, lines: usize) -> String {
    let all: Vec<&str> = contents.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

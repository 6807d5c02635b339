//! Local child-process implementation of the controller traits.

use std::time::Duration;

use super::spawn::spawn_subprocess;
use super::{VmmController, VmmHandler};
use crate::util::{is_process_alive, terminate_process};
use crate::vmm::CommandLine;
use tokio::process::Child;
use xqemu_shared::XqemuResult;
use xqemu_shared::constants::process::STOP_GRACE_PERIOD;

/// Spawns the emulator as a direct child of this process.
#[derive(Debug, Clone)]
pub struct ProcessController {
    grace_period: Duration,
}

impl ProcessController {
    pub fn new() -> Self {
        Self::with_grace_period(STOP_GRACE_PERIOD)
    }

    /// How long `stop()` waits after SIGTERM before killing outright.
    pub fn with_grace_period(grace_period: Duration) -> Self {
        Self { grace_period }
    }
}

impl Default for ProcessController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl VmmController for ProcessController {
    async fn start(&self, command: &CommandLine) -> XqemuResult<Box<dyn VmmHandler>> {
        tracing::info!("Running: {}", command);

        let (child, pid) = spawn_subprocess(command)?;
        tracing::debug!(pid = pid, "Emulator process spawned");

        Ok(Box::new(ProcessHandler {
            child,
            pid,
            grace_period: self.grace_period,
            exited: false,
        }))
    }
}

/// Owns one spawned emulator process.
#[derive(Debug)]
pub struct ProcessHandler {
    child: Child,
    pid: u32,
    grace_period: Duration,
    exited: bool,
}

#[async_trait::async_trait]
impl VmmHandler for ProcessHandler {
    async fn stop(&mut self) -> XqemuResult<()> {
        if !self.is_running() {
            return Ok(());
        }

        if !terminate_process(self.pid) {
            tracing::debug!(pid = self.pid, "SIGTERM not delivered, killing");
            self.child.start_kill()?;
        }

        match tokio::time::timeout(self.grace_period, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                tracing::info!(pid = self.pid, %status, "Emulator process exited");
            }
            Err(_) => {
                tracing::warn!(
                    pid = self.pid,
                    grace_ms = self.grace_period.as_millis() as u64,
                    "Emulator ignored SIGTERM, killing"
                );
                self.child.kill().await?;
            }
        }

        self.exited = true;
        Ok(())
    }

    fn is_running(&mut self) -> bool {
        if self.exited {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(pid = self.pid, %status, "Emulator process has exited");
                self.exited = true;
                false
            }
            Ok(None) => true,
            Err(e) => {
                tracing::debug!(pid = self.pid, error = %e, "try_wait failed, probing PID");
                is_process_alive(self.pid)
            }
        }
    }

    fn pid(&self) -> u32 {
        self.pid
    }
}

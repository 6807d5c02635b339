//! Emulator lifecycle state machine.
//!
//! [`EmulatorSupervisor`] owns at most one emulator process and the QMP
//! connection to it. All operations take `&mut self`; a caller that needs to
//! share the supervisor wraps it in its own lock or hands it to a task.

mod guard;
mod options;
mod state;

use std::path::Path;
use std::sync::Arc;

use crate::config::RawLaunchConfig;
use crate::qmp::{QmpClient, Sleeper, TokioSleeper};
use crate::vmm::CommandLine;
use crate::vmm::controller::{ProcessController, VmmController, VmmHandler};
use guard::StartingGuard;
use xqemu_shared::errors::{ProtocolError, XqemuError, XqemuResult};

pub use options::SupervisorOptions;
pub use state::EmulatorStatus;

pub struct EmulatorSupervisor {
    options: SupervisorOptions,
    controller: Box<dyn VmmController>,
    sleeper: Arc<dyn Sleeper>,
    status: EmulatorStatus,
    handler: Option<Box<dyn VmmHandler>>,
    qmp: Option<QmpClient>,
}

impl std::fmt::Debug for EmulatorSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmulatorSupervisor")
            .field("status", &self.status)
            .field("pid", &self.pid())
            .field("qmp", &self.qmp)
            .finish()
    }
}

impl EmulatorSupervisor {
    /// Supervisor that spawns real processes and sleeps on the tokio timer.
    pub fn new(options: SupervisorOptions) -> Self {
        let controller = ProcessController::with_grace_period(options.stop_grace_period);
        Self::with_controller(options, Box::new(controller), Arc::new(TokioSleeper))
    }

    pub fn with_controller(
        options: SupervisorOptions,
        controller: Box<dyn VmmController>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            options,
            controller,
            sleeper,
            status: EmulatorStatus::Stopped,
            handler: None,
            qmp: None,
        }
    }

    pub fn options(&self) -> &SupervisorOptions {
        &self.options
    }

    pub fn status(&self) -> EmulatorStatus {
        self.status
    }

    /// Validate `config`, launch the emulator and connect to its QMP port.
    ///
    /// On any failure the status returns to `Stopped` and a process spawned
    /// by this call is stopped before the error is returned.
    pub async fn start(&mut self, config: &RawLaunchConfig) -> XqemuResult<()> {
        if !self.status.can_start() {
            return Err(XqemuError::InvalidState(format!(
                "emulator is already {}",
                self.status
            )));
        }

        let guard = StartingGuard::new(&mut self.status);

        let config = config.validate()?;
        let command = CommandLine::build(&config, self.options.qmp.port);
        let mut handler = self.controller.start(&command).await?;
        let pid = handler.pid();

        let qmp = match QmpClient::connect(&self.options.qmp, self.sleeper.as_ref()).await {
            Ok(qmp) => qmp,
            Err(e) => {
                tracing::warn!(pid = pid, error = %e, "QMP unreachable, stopping emulator");
                if let Err(stop_err) = handler.stop().await {
                    tracing::warn!(pid = pid, error = %stop_err, "Failed to stop emulator");
                }
                return Err(e);
            }
        };

        guard.commit(EmulatorStatus::Running);
        self.handler = Some(handler);
        self.qmp = Some(qmp);
        tracing::info!(pid = pid, "Emulator running");
        Ok(())
    }

    /// Disconnect and terminate the emulator. No-op while stopped.
    ///
    /// Teardown errors are logged, never returned.
    pub async fn stop(&mut self) {
        if self.status == EmulatorStatus::Stopped && self.handler.is_none() {
            return;
        }

        if let Some(mut qmp) = self.qmp.take() {
            qmp.disconnect().await;
        }
        if let Some(mut handler) = self.handler.take() {
            let pid = handler.pid();
            match handler.stop().await {
                Ok(()) => tracing::info!(pid = pid, "Emulator stopped"),
                Err(e) => tracing::warn!(pid = pid, error = %e, "Failed to stop emulator"),
            }
        }
        self.status = EmulatorStatus::Stopped;
    }

    /// Pause if running, resume if paused. No-op while stopped.
    ///
    /// The current state is read back from the emulator, not from the local
    /// status, so a pause issued by another QMP client is honoured.
    pub async fn toggle_pause(&mut self) -> XqemuResult<()> {
        let Some(qmp) = self.live_client()? else {
            return Ok(());
        };

        let next = if qmp.is_paused().await? {
            qmp.resume_emulation().await?;
            EmulatorStatus::Running
        } else {
            qmp.pause_emulation().await?;
            EmulatorStatus::Paused
        };
        tracing::info!(from = %self.status, to = %next, "Emulation toggled");
        self.status = next;
        Ok(())
    }

    /// Reset the emulated machine. The process keeps running.
    pub async fn restart(&mut self) -> XqemuResult<()> {
        let Some(qmp) = self.live_client()? else {
            return Ok(());
        };
        qmp.system_reset().await?;
        tracing::info!("Emulated machine reset");
        Ok(())
    }

    /// Save the current frame as a PPM image at `path`.
    ///
    /// Relative paths resolve against the emulator's working directory.
    pub async fn screenshot(&mut self, path: &Path) -> XqemuResult<()> {
        let Some(qmp) = self.live_client()? else {
            return Ok(());
        };
        qmp.screendump(path).await?;
        tracing::info!(path = %path.display(), "Screenshot requested");
        Ok(())
    }

    /// Ask the emulator whether it is paused. `false` while stopped.
    pub async fn is_paused(&mut self) -> XqemuResult<bool> {
        match self.live_client()? {
            Some(qmp) => Ok(qmp.is_paused().await?),
            None => Ok(false),
        }
    }

    /// A process was spawned and has not been explicitly stopped.
    ///
    /// This does not notice a process that exited on its own; see
    /// [`is_alive`](Self::is_alive).
    pub fn is_running(&self) -> bool {
        self.handler.is_some()
    }

    /// The owned process is still running.
    pub fn is_alive(&mut self) -> bool {
        self.handler
            .as_mut()
            .is_some_and(|handler| handler.is_running())
    }

    pub fn pid(&self) -> Option<u32> {
        self.handler.as_ref().map(|handler| handler.pid())
    }

    /// The control client to use for a lifecycle command.
    ///
    /// `None` means there is nothing to command. A process that exited on its
    /// own yields `Disconnected` without touching the wire.
    fn live_client(&mut self) -> XqemuResult<Option<&mut QmpClient>> {
        if !self.status.is_active() {
            return Ok(None);
        }

        let alive = self
            .handler
            .as_mut()
            .is_some_and(|handler| handler.is_running());
        if !alive {
            tracing::warn!(pid = ?self.pid(), "Emulator process is gone");
            return Err(ProtocolError::Disconnected.into());
        }

        self.qmp
            .as_mut()
            .map(Some)
            .ok_or_else(|| ProtocolError::Disconnected.into())
    }
}

use std::time::Duration;

use crate::qmp::QmpOptions;
use xqemu_shared::constants::process::STOP_GRACE_PERIOD;

/// Tunables for one supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorOptions {
    /// Control endpoint. The port is also passed to the emulator's `-qmp`
    /// argument so both sides agree.
    pub qmp: QmpOptions,
    /// How long `stop()` waits for the emulator to exit before killing it.
    pub stop_grace_period: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            qmp: QmpOptions::default(),
            stop_grace_period: STOP_GRACE_PERIOD,
        }
    }
}

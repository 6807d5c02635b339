use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of the supervised emulator.
///
/// ```text
/// Stopped --start--> Starting --connected--> Running <--pause toggle--> Paused
///    ^                   |                      |                         |
///    +---- failure ------+                      +---------- stop ---------+
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmulatorStatus {
    #[default]
    Stopped,
    /// Spawned or spawning, control connection not yet established.
    Starting,
    Running,
    /// Process alive, emulation halted via the control channel.
    Paused,
}

impl EmulatorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Paused => "paused",
        }
    }

    /// A process and control connection are owned.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    pub fn can_start(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for EmulatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

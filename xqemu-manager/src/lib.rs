//! xqemu-manager: launch and control an xqemu emulator process.
//!
//! The crate validates a launch configuration, spawns the emulator with a
//! QMP listener on a loopback port, connects to it with bounded retry and
//! exposes the lifecycle (start, stop, pause toggle, reset, screenshot)
//! through [`EmulatorSupervisor`].

pub mod config;
pub mod logging;
pub mod qmp;
pub mod supervisor;
pub mod util;
pub mod vmm;

pub use config::{LaunchConfig, RawLaunchConfig, load_settings};
pub use logging::init_logging;
pub use qmp::{QmpClient, QmpOptions, RetryPolicy, Sleeper, TokioSleeper};
pub use supervisor::{EmulatorStatus, EmulatorSupervisor, SupervisorOptions};
pub use vmm::CommandLine;
pub use vmm::controller::{ProcessController, VmmController, VmmHandler};
pub use xqemu_shared::{ProtocolError, XqemuError, XqemuResult};

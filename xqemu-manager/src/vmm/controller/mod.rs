//! Emulator process management.
//!
//! ## Architecture
//!
//! - **VmmController**: Spawning operations (creates VmmHandler)
//! - **VmmHandler**: Runtime operations on the running emulator (stop, liveness)
//!
//! The supervisor only talks to these traits, so tests can swap in a
//! controller that never launches a real process.

mod handler;
mod process;
mod spawn;

use crate::vmm::CommandLine;
use xqemu_shared::XqemuResult;

pub use handler::VmmHandler;
pub use process::{ProcessController, ProcessHandler};

/// Trait for spawning emulator processes.
#[async_trait::async_trait]
pub trait VmmController: Send + Sync {
    /// Launch the emulator and return a handler that owns the process.
    async fn start(&self, command: &CommandLine) -> XqemuResult<Box<dyn VmmHandler>>;
}

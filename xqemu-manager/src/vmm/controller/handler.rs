//! VmmHandler - Runtime operations on a running emulator.

use xqemu_shared::XqemuResult;

/// Trait for runtime operations on a spawned emulator process.
///
/// A handler owns exactly one process. Dropping it kills the process.
#[async_trait::async_trait]
pub trait VmmHandler: Send {
    /// Terminate the process gracefully and reap it.
    ///
    /// Idempotent: stopping a process that already exited is a no-op.
    async fn stop(&mut self) -> XqemuResult<()>;

    /// Check whether the process is still running by polling its exit status.
    fn is_running(&mut self) -> bool;

    /// Get the process ID of the emulator.
    fn pid(&self) -> u32;
}

use super::EmulatorStatus;

/// Holds the status at `Starting` while a start is in flight.
///
/// If the start fails, or its future is dropped, the status falls back to
/// `Stopped` when the guard goes out of scope. A spawned child is reaped
/// separately by its own kill-on-drop.
pub(super) struct StartingGuard<'a> {
    status: &'a mut EmulatorStatus,
    armed: bool,
}

impl<'a> StartingGuard<'a> {
    pub(super) fn new(status: &'a mut EmulatorStatus) -> Self {
        *status = EmulatorStatus::Starting;
        Self {
            status,
            armed: true,
        }
    }

    /// Record the successful outcome and disarm.
    pub(super) fn commit(mut self, next: EmulatorStatus) {
        *self.status = next;
        self.armed = false;
    }
}

impl Drop for StartingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!("Emulator start did not complete, resetting to stopped");
        *self.status = EmulatorStatus::Stopped;
    }
}

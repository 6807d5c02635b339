//! Signal helpers for PID-level process checks.

/// Ask a process to terminate with SIGTERM.
///
/// # Returns
/// * `true` - Signal delivered
/// * `false` - Delivery failed, or the platform has no signals
#[cfg(unix)]
pub fn terminate_process(pid: u32) -> bool {
    unsafe { libc::kill(pid as i32, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
pub fn terminate_process(_pid: u32) -> bool {
    false
}

/// Check if a process with the given PID exists.
///
/// Uses `libc::kill(pid, 0)` which sends a null signal to check existence.
/// A zombie still counts as existing until it is reaped.
///
/// # Returns
/// * `true` - Process exists
/// * `false` - Process does not exist or permission denied
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

/// Without a null signal the PID cannot be probed; assume it is alive.
#[cfg(not(unix))]
pub fn is_process_alive(_pid: u32) -> bool {
    true
}

//! Subprocess spawning for the emulator binary.

use std::io;
use std::process::Stdio;

use crate::vmm::CommandLine;
use tokio::process::{Child, Command};
use xqemu_shared::errors::{XqemuError, XqemuResult};

/// Spawns the emulator with inherited stdout and stderr.
///
/// Each argument is passed as a discrete element; nothing goes through a
/// shell. The child is killed if its handle is dropped.
///
/// # Returns
/// * `Ok((Child, pid))` - Successfully spawned subprocess
/// * `Err(XqemuError::Spawn)` - Executable missing or not launchable
pub(crate) fn spawn_subprocess(command: &CommandLine) -> XqemuResult<(Child, u32)> {
    let mut cmd = Command::new(command.program());
    cmd.args(command.args());

    // The emulator has no interactive console; keep it off our stdin.
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::inherit());
    cmd.stderr(Stdio::inherit());
    cmd.kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| XqemuError::Spawn {
        program: command.program().to_path_buf(),
        source: e,
    })?;

    let pid = child.id().ok_or_else(|| XqemuError::Spawn {
        program: command.program().to_path_buf(),
        source: io::Error::other("process exited before its id could be read"),
    })?;

    Ok((child, pid))
}

//! Emulator process layer.
//!
//! - `CommandLine`: validated configuration → argument vector
//! - `controller`: spawning (`VmmController`) and owning (`VmmHandler`) the
//!   emulator process. Nothing here knows about QMP.

mod command_line;
pub mod controller;

pub use command_line::CommandLine;

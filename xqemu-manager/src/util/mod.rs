//! Small platform helpers.

mod process;

pub use process::{is_process_alive, terminate_process};

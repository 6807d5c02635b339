//! Types shared between xqemu-manager components.

pub mod constants;
pub mod errors;
pub mod qmp;

pub use errors::{ProtocolError, XqemuError, XqemuResult};

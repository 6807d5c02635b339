//! Error types shared by the supervisor and its consumers.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across xqemu-manager.
pub type XqemuResult<T> = Result<T, XqemuError>;

/// Failures surfaced by the supervisor.
///
/// Variants map one-to-one onto the lifecycle phases that can fail:
/// validation, spawning, reaching the control endpoint and talking to it.
#[derive(Debug, Error)]
pub enum XqemuError {
    /// A required path is missing or points at a directory.
    #[error("File {} could not be found! ({field})", path.display())]
    Validation { field: &'static str, path: PathBuf },

    /// The emulator executable could not be launched.
    #[error("failed to spawn emulator {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The control endpoint never became reachable within the retry budget.
    #[error("control endpoint {addr} unreachable after {attempts} attempt(s): {source}")]
    Connection {
        addr: String,
        attempts: u32,
        #[source]
        source: Box<XqemuError>,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failures on an established control connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The peer closed the stream or sent something that is not a response.
    #[error("disconnected")]
    Disconnected,

    #[error("timed out waiting for a response")]
    Timeout,

    /// Greeting or capability negotiation failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The emulator answered with an error object.
    #[error("command failed ({class}): {desc}")]
    Command { class: String, desc: String },

    /// A request could not be encoded or a result did not have the expected shape.
    #[error("invalid QMP payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl XqemuError {
    /// Returns the protocol error if this is one.
    pub fn as_protocol(&self) -> Option<&ProtocolError> {
        match self {
            Self::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

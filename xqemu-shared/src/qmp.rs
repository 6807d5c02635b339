//! QMP wire definitions.
//!
//! Every message is one JSON object terminated by a newline. The client sends
//! `{"execute": <command>, "arguments": {...}}`; the server answers with
//! `{"return": ...}` or `{"error": {"class": ..., "desc": ...}}` and may
//! interleave asynchronous `{"event": ...}` objects at any time. The first
//! line of every connection is the `{"QMP": ...}` greeting.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Command names used by the supervisor.
pub mod commands {
    /// Leaves capability negotiation mode. Must be the first command sent.
    pub const QMP_CAPABILITIES: &str = "qmp_capabilities";
    /// Pauses emulation. Does not stop the emulator process.
    pub const STOP: &str = "stop";
    pub const CONT: &str = "cont";
    pub const SYSTEM_RESET: &str = "system_reset";
    pub const SCREENDUMP: &str = "screendump";
    pub const QUERY_STATUS: &str = "query-status";
}

/// A single command request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QmpRequest {
    pub execute: String,
    pub arguments: Map<String, Value>,
}

impl QmpRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            execute: command.into(),
            arguments: Map::new(),
        }
    }

    pub fn with_arguments(command: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            execute: command.into(),
            arguments,
        }
    }

    /// Serialize as one newline-terminated frame.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Error object carried by a failed command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QmpErrorBody {
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub desc: String,
}

/// Outcome of a command as reported by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum QmpResponse {
    Return(Value),
    Error(QmpErrorBody),
}

/// Any object the server may send.
#[derive(Debug, Clone, PartialEq)]
pub enum QmpMessage {
    Greeting(QmpGreeting),
    Response(QmpResponse),
    Event(String),
}

impl QmpMessage {
    /// Classify one received line. Returns `None` for anything that is not
    /// a recognisable QMP object.
    pub fn parse(line: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(line.trim()).ok()?;
        let obj = value.as_object()?;

        if let Some(ret) = obj.get("return") {
            return Some(Self::Response(QmpResponse::Return(ret.clone())));
        }
        if let Some(err) = obj.get("error") {
            let body = serde_json::from_value(err.clone()).ok()?;
            return Some(Self::Response(QmpResponse::Error(body)));
        }
        if let Some(event) = obj.get("event") {
            return Some(Self::Event(event.as_str().unwrap_or_default().to_string()));
        }
        if obj.contains_key("QMP") {
            return serde_json::from_value(value).ok().map(Self::Greeting);
        }
        None
    }
}

/// Server greeting sent on connect.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QmpGreeting {
    #[serde(rename = "QMP")]
    pub qmp: QmpServerInfo,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QmpServerInfo {
    pub version: QmpVersion,
    #[serde(default)]
    pub capabilities: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QmpVersion {
    pub qemu: QemuVersion,
    #[serde(default)]
    pub package: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct QemuVersion {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
}

impl fmt::Display for QemuVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

/// Result of `query-status`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusInfo {
    pub running: bool,
    pub status: String,
    #[serde(default)]
    pub singlestep: bool,
}

impl StatusInfo {
    pub fn is_paused(&self) -> bool {
        self.status == "paused"
    }
}

//! In-process QMP server for unit tests.

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct ServerState {
    log: Vec<(String, Value)>,
    paused: bool,
    hang_up_on: Option<String>,
    stall_on: Option<String>,
}

/// Speaks enough QMP to drive the client: greeting, capability negotiation,
/// the lifecycle commands and `query-status`. Unknown commands get a
/// `CommandNotFound` error.
pub(crate) struct FakeQmpServer {
    port: u16,
    state: Arc<Mutex<ServerState>>,
    task: JoinHandle<()>,
}

impl FakeQmpServer {
    pub(crate) const GREETING: &'static str = "{\"QMP\": {\"version\": {\"qemu\": {\"micro\": 0, \"minor\": 0, \"major\": 2}, \"package\": \"\"}, \"capabilities\": []}}\n";

    pub(crate) async fn start() -> Self {
        Self::serve(TcpListener::bind("127.0.0.1:0").await.unwrap())
    }

    pub(crate) async fn start_on(port: u16) -> Self {
        Self::serve(TcpListener::bind(("127.0.0.1", port)).await.unwrap())
    }

    fn serve(listener: TcpListener) -> Self {
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(ServerState::default()));
        let accept_state = state.clone();
        let task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(handle_connection(socket, accept_state.clone()));
            }
        });
        Self { port, state, task }
    }

    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    /// Names of all commands received so far, in order.
    pub(crate) fn commands(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.log.iter().map(|(name, _)| name.clone()).collect()
    }

    pub(crate) fn last_arguments(&self, command: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state
            .log
            .iter()
            .rev()
            .find(|(name, _)| name == command)
            .map(|(_, args)| args.clone())
    }

    /// Close the connection instead of answering `command`.
    pub(crate) fn hang_up_on(&self, command: &str) {
        self.state.lock().unwrap().hang_up_on = Some(command.to_string());
    }

    /// Never answer `command`.
    pub(crate) fn stall_on(&self, command: &str) {
        self.state.lock().unwrap().stall_on = Some(command.to_string());
    }
}

impl Drop for FakeQmpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle_connection(socket: TcpStream, state: Arc<Mutex<ServerState>>) {
    let (read, mut write) = socket.into_split();
    let mut reader = BufReader::new(read);
    if write
        .write_all(FakeQmpServer::GREETING.as_bytes())
        .await
        .is_err()
    {
        return;
    }

    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let Ok(request) = serde_json::from_str::<Value>(&line) else {
            return;
        };
        let command = request["execute"].as_str().unwrap_or_default().to_string();
        let arguments = request
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| json!({}));

        let mut replies = Vec::new();
        let stall = {
            let mut state = state.lock().unwrap();
            state.log.push((command.clone(), arguments));
            if state.hang_up_on.as_deref() == Some(command.as_str()) {
                return;
            }
            let stall = state.stall_on.as_deref() == Some(command.as_str());
            match command.as_str() {
                "qmp_capabilities" | "system_reset" | "screendump" => {
                    replies.push(json!({"return": {}}));
                }
                "stop" => {
                    state.paused = true;
                    replies.push(json!({"event": "STOP", "timestamp": {"seconds": 0, "microseconds": 0}}));
                    replies.push(json!({"return": {}}));
                }
                "cont" => {
                    state.paused = false;
                    replies.push(json!({"return": {}}));
                    replies.push(json!({"event": "RESUME", "timestamp": {"seconds": 0, "microseconds": 0}}));
                }
                "query-status" => {
                    let (running, status) = if state.paused {
                        (false, "paused")
                    } else {
                        (true, "running")
                    };
                    replies.push(json!({"return": {"running": running, "singlestep": false, "status": status}}));
                }
                other => {
                    replies.push(json!({"error": {
                        "class": "CommandNotFound",
                        "desc": format!("The command {} has not been found", other),
                    }}));
                }
            }
            stall
        };
        if stall {
            std::future::pending::<()>().await;
        }

        for reply in replies {
            let mut out = reply.to_string();
            out.push('\n');
            if write.write_all(out.as_bytes()).await.is_err() {
                return;
            }
        }
    }
}

/// A loopback port with nothing listening on it.
pub(crate) async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

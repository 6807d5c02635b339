//! QMP client over a loopback TCP connection.

use std::path::Path;
use std::time::Duration;

use super::retry::{RetryPolicy, Sleeper, retry};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use xqemu_shared::constants::qmp as qmp_defaults;
use xqemu_shared::errors::{ProtocolError, XqemuError, XqemuResult};
use xqemu_shared::qmp::{
    QemuVersion, QmpGreeting, QmpMessage, QmpRequest, QmpResponse, StatusInfo, commands,
};

/// Where and how to reach the QMP endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QmpOptions {
    pub host: String,
    pub port: u16,
    pub retry: RetryPolicy,
    /// Upper bound for the handshake and for each command round trip.
    pub response_timeout: Duration,
}

impl QmpOptions {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for QmpOptions {
    fn default() -> Self {
        Self {
            host: qmp_defaults::HOST.to_string(),
            port: qmp_defaults::PORT,
            retry: RetryPolicy::default(),
            response_timeout: qmp_defaults::RESPONSE_TIMEOUT,
        }
    }
}

/// One framed, bidirectional QMP stream.
struct QmpStream {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl QmpStream {
    fn new(stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer: write,
        }
    }

    /// Read the next non-empty line as a QMP object.
    ///
    /// EOF, read failures and unrecognisable lines all count as a lost peer.
    async fn read_message(&mut self) -> Result<QmpMessage, ProtocolError> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self.reader.read_line(&mut line).await.map_err(|e| {
                tracing::debug!(error = %e, "QMP read failed");
                ProtocolError::Disconnected
            })?;
            if n == 0 {
                return Err(ProtocolError::Disconnected);
            }
            if line.trim().is_empty() {
                continue;
            }
            return QmpMessage::parse(&line).ok_or_else(|| {
                tracing::debug!(line = %line.trim(), "Malformed QMP message");
                ProtocolError::Disconnected
            });
        }
    }

    /// Read until a command response arrives, discarding events.
    async fn read_response(&mut self) -> Result<QmpResponse, ProtocolError> {
        loop {
            match self.read_message().await? {
                QmpMessage::Response(response) => return Ok(response),
                QmpMessage::Event(name) => {
                    tracing::trace!(event = %name, "Discarding QMP event");
                }
                QmpMessage::Greeting(_) => {
                    tracing::debug!("Unexpected QMP greeting mid-session");
                    return Err(ProtocolError::Disconnected);
                }
            }
        }
    }

    async fn round_trip(&mut self, line: &str) -> Result<QmpResponse, ProtocolError> {
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|_| ProtocolError::Disconnected)?;
        self.writer
            .flush()
            .await
            .map_err(|_| ProtocolError::Disconnected)?;
        self.read_response().await
    }

    async fn handshake(&mut self) -> Result<QmpGreeting, ProtocolError> {
        let greeting = match self.read_message().await {
            Ok(QmpMessage::Greeting(greeting)) => greeting,
            Ok(other) => {
                return Err(ProtocolError::Handshake(format!(
                    "expected greeting, got {:?}",
                    other
                )));
            }
            Err(e) => return Err(ProtocolError::Handshake(e.to_string())),
        };

        let line = QmpRequest::new(commands::QMP_CAPABILITIES).to_line()?;
        match self.round_trip(&line).await {
            Ok(QmpResponse::Return(_)) => Ok(greeting),
            Ok(QmpResponse::Error(body)) => Err(ProtocolError::Handshake(format!(
                "capability negotiation rejected: {}",
                body.desc
            ))),
            Err(e) => Err(ProtocolError::Handshake(e.to_string())),
        }
    }
}

/// Client side of one QMP connection.
///
/// Commands are strictly request/response; the client never has more than
/// one command in flight. After any transport failure the stream is dropped
/// and every later command fails with `ProtocolError::Disconnected`.
pub struct QmpClient {
    addr: String,
    stream: Option<QmpStream>,
    greeting: QmpGreeting,
    response_timeout: Duration,
}

impl std::fmt::Debug for QmpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QmpClient")
            .field("addr", &self.addr)
            .field("connected", &self.stream.is_some())
            .finish()
    }
}

impl QmpClient {
    /// Connect and negotiate capabilities, retrying per `options.retry`.
    ///
    /// Each attempt covers both the TCP connect and the handshake. When
    /// every attempt fails the last failure is wrapped in
    /// `XqemuError::Connection`.
    pub async fn connect(options: &QmpOptions, sleeper: &dyn Sleeper) -> XqemuResult<Self> {
        let addr = options.addr();
        let timeout = options.response_timeout;

        let result = retry(&options.retry, sleeper, |attempt| {
            let addr = addr.clone();
            async move {
                tracing::debug!(attempt = attempt, addr = %addr, "Trying to connect");
                Self::connect_once(addr, timeout).await
            }
        })
        .await;

        match result {
            Ok(client) => {
                tracing::info!(
                    addr = %client.addr,
                    version = %client.server_version(),
                    "Connected to QMP"
                );
                Ok(client)
            }
            Err(e) => Err(XqemuError::Connection {
                addr,
                attempts: e.attempts,
                source: Box::new(e.last),
            }),
        }
    }

    async fn connect_once(addr: String, timeout: Duration) -> XqemuResult<Self> {
        let stream = TcpStream::connect(addr.as_str()).await?;
        stream.set_nodelay(true)?;
        let mut stream = QmpStream::new(stream);

        let greeting = tokio::time::timeout(timeout, stream.handshake())
            .await
            .map_err(|_| ProtocolError::Handshake("timed out".into()))??;

        Ok(Self {
            addr,
            stream: Some(stream),
            greeting,
            response_timeout: timeout,
        })
    }

    pub fn greeting(&self) -> &QmpGreeting {
        &self.greeting
    }

    pub fn server_version(&self) -> QemuVersion {
        self.greeting.qmp.version.qemu
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Send one command and return the server's response object.
    ///
    /// An error-shaped response is returned as `Ok(QmpResponse::Error)`; only
    /// transport and framing problems are `Err`.
    pub async fn execute(
        &mut self,
        command: &str,
        arguments: Map<String, Value>,
    ) -> Result<QmpResponse, ProtocolError> {
        let line = QmpRequest::with_arguments(command, arguments).to_line()?;
        let stream = self.stream.as_mut().ok_or(ProtocolError::Disconnected)?;

        tracing::debug!(command = command, "Sending QMP command");
        let result = match tokio::time::timeout(self.response_timeout, stream.round_trip(&line)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProtocolError::Timeout),
        };

        if let Err(ref e) = result {
            // The stream position is unknown now; a late reply would be
            // taken as the answer to the next command.
            tracing::debug!(command = command, error = %e, "Dropping QMP connection");
            self.stream = None;
        }
        result
    }

    /// Like `execute`, but an error-shaped response becomes
    /// `ProtocolError::Command`.
    pub async fn execute_ok(
        &mut self,
        command: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, ProtocolError> {
        match self.execute(command, arguments).await? {
            QmpResponse::Return(value) => Ok(value),
            QmpResponse::Error(body) => Err(ProtocolError::Command {
                class: body.class,
                desc: body.desc,
            }),
        }
    }

    /// Pause emulation. The process keeps running.
    pub async fn pause_emulation(&mut self) -> Result<(), ProtocolError> {
        self.execute_ok(commands::STOP, Map::new()).await.map(drop)
    }

    pub async fn resume_emulation(&mut self) -> Result<(), ProtocolError> {
        self.execute_ok(commands::CONT, Map::new()).await.map(drop)
    }

    /// Reset the emulated machine. The process is not restarted.
    pub async fn system_reset(&mut self) -> Result<(), ProtocolError> {
        self.execute_ok(commands::SYSTEM_RESET, Map::new())
            .await
            .map(drop)
    }

    /// Write the current frame to `path`, resolved by the emulator relative
    /// to its own working directory.
    pub async fn screendump(&mut self, path: &Path) -> Result<(), ProtocolError> {
        let mut arguments = Map::new();
        arguments.insert(
            "filename".to_string(),
            Value::String(path.to_string_lossy().into_owned()),
        );
        self.execute_ok(commands::SCREENDUMP, arguments)
            .await
            .map(drop)
    }

    pub async fn query_status(&mut self) -> Result<StatusInfo, ProtocolError> {
        let value = self.execute_ok(commands::QUERY_STATUS, Map::new()).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn is_paused(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.query_status().await?.is_paused())
    }

    /// Close the connection. Idempotent.
    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.writer.shutdown().await {
                tracing::debug!(error = %e, "QMP shutdown failed");
            }
            tracing::debug!(addr = %self.addr, "Disconnected from QMP");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qmp::retry::test_support::RecordingSleeper;
    use crate::qmp::testing::{FakeQmpServer, unused_port};
    use serde_json::json;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn options(port: u16) -> QmpOptions {
        QmpOptions {
            host: "127.0.0.1".into(),
            port,
            retry: RetryPolicy::new(5, Duration::from_millis(10)),
            response_timeout: Duration::from_secs(2),
        }
    }

    async fn connected(server: &FakeQmpServer) -> QmpClient {
        QmpClient::connect(&options(server.port()), &RecordingSleeper::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_connect_negotiates_capabilities() {
        let server = FakeQmpServer::start().await;
        let client = connected(&server).await;

        assert!(client.is_connected());
        assert_eq!(client.server_version().to_string(), "2.0.0");
        assert_eq!(server.commands(), vec!["qmp_capabilities".to_string()]);
    }

    #[tokio::test]
    async fn test_connect_never_reachable_uses_all_attempts() {
        let port = unused_port().await;
        let sleeper = RecordingSleeper::default();

        let err = QmpClient::connect(&options(port), &sleeper).await.unwrap_err();
        match err {
            XqemuError::Connection { attempts, source, .. } => {
                assert_eq!(attempts, 5);
                assert!(matches!(*source, XqemuError::Io(_)));
            }
            other => panic!("expected connection error, got {other}"),
        }
        assert_eq!(sleeper.count(), 4);
    }

    /// Starts the listener during the (n-1)th pause so the nth attempt is
    /// the first that can succeed.
    struct ListenerOnNthAttempt {
        port: u16,
        n: usize,
        inner: RecordingSleeper,
        server: std::sync::Mutex<Option<FakeQmpServer>>,
    }

    #[async_trait::async_trait]
    impl Sleeper for ListenerOnNthAttempt {
        async fn sleep(&self, duration: Duration) {
            self.inner.sleep(duration).await;
            if self.inner.count() == self.n - 1 {
                let server = FakeQmpServer::start_on(self.port).await;
                *self.server.lock().unwrap() = Some(server);
            }
        }
    }

    #[tokio::test]
    async fn test_connect_succeeds_on_nth_attempt() {
        let port = unused_port().await;
        let sleeper = ListenerOnNthAttempt {
            port,
            n: 3,
            inner: RecordingSleeper::default(),
            server: std::sync::Mutex::new(None),
        };

        let client = QmpClient::connect(&options(port), &sleeper).await.unwrap();
        assert!(client.is_connected());
        assert_eq!(sleeper.inner.count(), 2);
    }

    #[tokio::test]
    async fn test_bad_greeting_is_handshake_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                let _ = socket.write_all(b"{\"return\": {}}\n").await;
            }
        });

        let mut opts = options(port);
        opts.retry = RetryPolicy::new(1, Duration::ZERO);
        let err = QmpClient::connect(&opts, &RecordingSleeper::default())
            .await
            .unwrap_err();
        match err {
            XqemuError::Connection { source, .. } => assert!(matches!(
                *source,
                XqemuError::Protocol(ProtocolError::Handshake(_))
            )),
            other => panic!("expected connection error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_lifecycle_commands() {
        let server = FakeQmpServer::start().await;
        let mut client = connected(&server).await;

        assert!(!client.is_paused().await.unwrap());
        client.pause_emulation().await.unwrap();
        assert!(client.is_paused().await.unwrap());
        client.resume_emulation().await.unwrap();
        assert!(!client.is_paused().await.unwrap());
        client.system_reset().await.unwrap();
        client.screendump(Path::new("shot.ppm")).await.unwrap();

        assert_eq!(
            server.commands(),
            vec![
                "qmp_capabilities",
                "query-status",
                "stop",
                "query-status",
                "cont",
                "query-status",
                "system_reset",
                "screendump",
            ]
        );
        assert_eq!(
            server.last_arguments("screendump"),
            Some(json!({"filename": "shot.ppm"}))
        );
        assert_eq!(server.last_arguments("stop"), Some(json!({})));
    }

    #[tokio::test]
    async fn test_events_are_skipped() {
        let server = FakeQmpServer::start().await;
        let mut client = connected(&server).await;

        // The fake server emits a STOP event ahead of the reply to `stop`.
        client.pause_emulation().await.unwrap();
        let status = client.query_status().await.unwrap();
        assert_eq!(status.status, "paused");
        assert!(!status.running);
    }

    #[tokio::test]
    async fn test_error_response_is_command_error() {
        let server = FakeQmpServer::start().await;
        let mut client = connected(&server).await;

        let response = client.execute("no-such-command", Map::new()).await.unwrap();
        assert!(matches!(response, QmpResponse::Error(_)));

        let err = client
            .execute_ok("no-such-command", Map::new())
            .await
            .unwrap_err();
        match err {
            ProtocolError::Command { class, .. } => assert_eq!(class, "CommandNotFound"),
            other => panic!("unexpected: {other}"),
        }
        // Still usable afterwards.
        assert!(client.is_connected());
        client.system_reset().await.unwrap();
    }

    #[tokio::test]
    async fn test_peer_closing_before_reply_is_disconnected() {
        let server = FakeQmpServer::start().await;
        let mut client = connected(&server).await;
        server.hang_up_on("system_reset");

        let err = client.system_reset().await.unwrap_err();
        assert!(matches!(err, ProtocolError::Disconnected));
        assert!(!client.is_connected());

        // Fails fast without touching the wire.
        let err = client.query_status().await.unwrap_err();
        assert!(matches!(err, ProtocolError::Disconnected));
        assert!(!server.commands().contains(&"query-status".to_string()));
    }

    #[tokio::test]
    async fn test_malformed_reply_is_disconnected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut reader = BufReader::new(read);
            let mut line = String::new();
            write
                .write_all(FakeQmpServer::GREETING.as_bytes())
                .await
                .unwrap();
            reader.read_line(&mut line).await.unwrap();
            write.write_all(b"{\"return\": {}}\n").await.unwrap();
            line.clear();
            reader.read_line(&mut line).await.unwrap();
            write.write_all(b"{\"retu").await.unwrap();
            write.write_all(b"rn\": tru\n").await.unwrap();
            let mut rest = Vec::new();
            let _ = reader.read_to_end(&mut rest).await;
        });

        let mut client = QmpClient::connect(&options(port), &RecordingSleeper::default())
            .await
            .unwrap();
        let err = client.query_status().await.unwrap_err();
        assert!(matches!(err, ProtocolError::Disconnected));
    }

    #[tokio::test]
    async fn test_slow_reply_times_out() {
        let server = FakeQmpServer::start().await;
        let mut opts = options(server.port());
        opts.response_timeout = Duration::from_millis(100);
        let mut client = QmpClient::connect(&opts, &RecordingSleeper::default())
            .await
            .unwrap();
        server.stall_on("screendump");

        let err = client.screendump(Path::new("a.ppm")).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Timeout));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let server = FakeQmpServer::start().await;
        let mut client = connected(&server).await;

        client.disconnect().await;
        client.disconnect().await;
        assert!(!client.is_connected());
        assert!(matches!(
            client.resume_emulation().await,
            Err(ProtocolError::Disconnected)
        ));
    }
}

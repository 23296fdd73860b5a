//! NATS publisher
//!
//! Minimal client for the NATS text protocol, covering what a publisher
//! needs: the `INFO`/`CONNECT` handshake, `PUB`, and answering server `PING`s.
//!
//! # Protocol
//!
//! ```text
//! S: INFO {"server_id":...,"max_payload":1048576}
//! C: CONNECT {"verbose":false,"pedantic":false,...}
//! C: PING
//! S: PONG
//! C: PUB <subject> <size>\r\n<payload>\r\n
//! ```
//!
//! # Reconnection
//!
//! A connection that fails a write, times out, or is closed by the server is
//! dropped. A background task then reconnects, retrying every
//! `reconnect_interval` with no limit on attempts. Publishes made while no
//! connection is up fail immediately with [`BusError::NotConnected`] and the
//! caller decides what to do with the message.

use std::io::{self, ErrorKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::{BusError, Publisher, validate_subject};

/// Default NATS client port
const DEFAULT_PORT: u16 = 4222;

/// Default connect + handshake timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default timeout for writing one message
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default wait between reconnect attempts
const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(1);

/// Write buffer size (one PUB is flushed per publish)
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Parsed NATS server address
///
/// Accepts `nats://[user[:pass]@]host[:port]`. The scheme is optional and
/// `tcp://` is treated like `nats://`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<String>,
}

impl ServerAddress {
    /// Parse an address string
    pub fn parse(address: &str) -> Result<Self, BusError> {
        let invalid = || BusError::InvalidAddress(address.to_string());

        let rest = address.trim();
        let rest = match rest.split_once("://") {
            Some(("nats" | "tcp", rest)) => rest,
            Some(_) => return Err(invalid()),
            None => rest,
        };
        let rest = rest.trim_end_matches('/');

        let (userinfo, hostport) = match rest.rsplit_once('@') {
            Some((info, hostport)) => (Some(info), hostport),
            None => (None, rest),
        };
        let (user, pass) = match userinfo {
            Some(info) => match info.split_once(':') {
                Some((user, pass)) => (Some(user.to_string()), Some(pass.to_string())),
                None => (Some(info.to_string()), None),
            },
            None => (None, None),
        };

        let (host, port) = if let Some(bracketed) = hostport.strip_prefix('[') {
            // IPv6 literal: [::1]:4222
            let (host, after) = bracketed.split_once(']').ok_or_else(invalid)?;
            let port = match after.strip_prefix(':') {
                Some(port) => port.parse().map_err(|_| invalid())?,
                None if after.is_empty() => DEFAULT_PORT,
                None => return Err(invalid()),
            };
            (host, port)
        } else {
            match hostport.rsplit_once(':') {
                Some((host, port)) => (host, port.parse().map_err(|_| invalid())?),
                None => (hostport, DEFAULT_PORT),
            }
        };

        if host.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            host: host.to_string(),
            port,
            user,
            pass,
        })
    }

    /// `host:port` form suitable for `TcpStream::connect`
    pub fn host_port(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// NATS client configuration
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// Server address (e.g. `nats://localhost:4222`)
    pub address: String,

    /// Client name reported to the server
    pub name: String,

    /// Timeout for TCP connect plus handshake
    pub connect_timeout: Duration,

    /// Timeout for writing one message
    pub write_timeout: Duration,

    /// Wait time between failed reconnect attempts
    pub reconnect_interval: Duration,
}

impl NatsConfig {
    /// Create config for the given server address
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: "spout".into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
        }
    }

    /// Set client name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set write timeout
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set reconnect interval
    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }
}

/// Fields of the server `INFO` we care about
#[derive(Debug, Default, Deserialize)]
struct ServerInfo {
    #[serde(default)]
    max_payload: Option<usize>,
}

/// One established server connection
struct Connection {
    writer: Arc<Mutex<BufWriter<OwnedWriteHalf>>>,
    /// Cancelled when the reader sees the connection die, or on drop
    alive: CancellationToken,
    max_payload: Option<usize>,
}

impl Connection {
    #[inline]
    fn is_alive(&self) -> bool {
        !self.alive.is_cancelled()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.alive.cancel();
    }
}

/// State shared by the client and its reconnect task
struct Shared {
    config: NatsConfig,
    server: ServerAddress,
    connection: Mutex<Option<Connection>>,
    /// Parent of every connection's reader token
    shutdown: CancellationToken,
    closed: AtomicBool,
    reconnects: AtomicU64,
}

/// NATS publisher
pub struct NatsClient {
    shared: Arc<Shared>,
}

impl NatsClient {
    /// Connect to the server
    ///
    /// Fails if the address is invalid or the first connection cannot be
    /// established. Later connection losses are repaired in the background.
    pub async fn connect(config: NatsConfig) -> Result<Self, BusError> {
        let server = ServerAddress::parse(&config.address)?;
        let shared = Arc::new(Shared {
            config,
            server,
            connection: Mutex::new(None),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
            reconnects: AtomicU64::new(0),
        });

        let conn = shared.open().await?;
        let alive = conn.alive.clone();
        *shared.connection.lock().await = Some(conn);

        tracing::info!(
            address = %shared.server.host_port(),
            name = %shared.config.name,
            "connected to NATS"
        );

        tokio::spawn(maintain_connection(Arc::clone(&shared), alive));

        Ok(Self { shared })
    }

    /// Server this client publishes to
    pub fn server(&self) -> &ServerAddress {
        &self.shared.server
    }

    /// Number of times a dropped connection was re-established
    pub fn reconnect_count(&self) -> u64 {
        self.shared.reconnects.load(Ordering::Relaxed)
    }

    /// Whether a live connection is currently installed
    pub async fn is_connected(&self) -> bool {
        self.shared
            .connection
            .lock()
            .await
            .as_ref()
            .is_some_and(Connection::is_alive)
    }
}

impl Shared {
    /// Open a connection and complete the handshake
    async fn open(&self) -> Result<Connection, BusError> {
        let target = self.server.host_port();

        let stream = match timeout(self.config.connect_timeout, TcpStream::connect(&target)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(BusError::Connect {
                    address: target,
                    source: e,
                });
            }
            Err(_) => {
                return Err(BusError::Connect {
                    address: target,
                    source: io::Error::new(ErrorKind::TimedOut, "connection timed out"),
                });
            }
        };

        // Non-fatal if it fails
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY");
        }

        let (read, write) = stream.into_split();
        let mut reader = BufReader::new(read);
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, write);

        let info = timeout(
            self.config.connect_timeout,
            self.handshake(&mut reader, &mut writer),
        )
        .await
        .map_err(|_| BusError::Timeout("handshake"))??;

        let writer = Arc::new(Mutex::new(writer));
        let alive = self.shutdown.child_token();

        tokio::spawn(read_loop(
            reader,
            Arc::clone(&writer),
            alive.clone(),
            target,
        ));

        Ok(Connection {
            writer,
            alive,
            max_payload: info.max_payload,
        })
    }

    async fn handshake(
        &self,
        reader: &mut BufReader<OwnedReadHalf>,
        writer: &mut BufWriter<OwnedWriteHalf>,
    ) -> Result<ServerInfo, BusError> {
        let mut line = String::new();

        read_op(reader, &mut line).await?;
        let Some(info_json) = line.strip_prefix("INFO") else {
            return Err(BusError::Protocol(format!("expected INFO, got '{line}'")));
        };
        let info: ServerInfo = serde_json::from_str(info_json.trim()).unwrap_or_default();

        writer.write_all(b"CONNECT ").await?;
        writer.write_all(self.connect_options().as_bytes()).await?;
        writer.write_all(b"\r\nPING\r\n").await?;
        writer.flush().await?;

        loop {
            read_op(reader, &mut line).await?;
            match line.as_str() {
                "PONG" => return Ok(info),
                "PING" => {
                    writer.write_all(b"PONG\r\n").await?;
                    writer.flush().await?;
                }
                op if op.starts_with("-ERR") => {
                    return Err(BusError::Server(server_error_message(op)));
                }
                // +OK and INFO updates need no reply
                _ => {}
            }
        }
    }

    fn connect_options(&self) -> String {
        let mut options = serde_json::json!({
            "verbose": false,
            "pedantic": false,
            "lang": "rust",
            "version": env!("CARGO_PKG_VERSION"),
            "protocol": 1,
            "name": self.config.name,
        });
        if let Some(user) = &self.server.user {
            options["user"] = user.clone().into();
        }
        if let Some(pass) = &self.server.pass {
            options["pass"] = pass.clone().into();
        }
        options.to_string()
    }
}

#[async_trait]
impl Publisher for NatsClient {
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), BusError> {
        validate_subject(subject)?;
        let shared = &self.shared;
        if shared.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }

        let mut slot = shared.connection.lock().await;

        // The reconnect task installs a new connection; never block on it here
        let conn = match slot.take() {
            Some(conn) if conn.is_alive() => conn,
            _ => return Err(BusError::NotConnected),
        };

        if let Some(max) = conn.max_payload
            && payload.len() > max
        {
            *slot = Some(conn);
            return Err(BusError::Rejected(format!(
                "payload of {} bytes exceeds server maximum {}",
                payload.len(),
                max
            )));
        }

        let write_result = timeout(shared.config.write_timeout, async {
            let mut writer = conn.writer.lock().await;
            write_pub(&mut writer, subject, payload).await
        })
        .await;

        match write_result {
            Ok(Ok(())) => {
                *slot = Some(conn);
                Ok(())
            }
            // Dropping the connection wakes the reconnect task
            Ok(Err(e)) => Err(BusError::Io(e)),
            Err(_) => Err(BusError::Timeout("publish")),
        }
    }

    async fn close(&self) -> Result<(), BusError> {
        let shared = &self.shared;
        if shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let conn = shared.connection.lock().await.take();
        let result = match conn {
            Some(conn) => {
                let mut writer = conn.writer.lock().await;
                writer.shutdown().await
            }
            None => Ok(()),
        };
        shared.shutdown.cancel();

        tracing::debug!(address = %shared.server.host_port(), "NATS connection closed");
        result.map_err(BusError::Io)
    }

    fn kind(&self) -> &'static str {
        "nats"
    }
}

impl Drop for NatsClient {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

/// Reconnect whenever the installed connection dies
///
/// Runs until the client is closed or dropped. `alive` belongs to the
/// connection currently in the slot.
async fn maintain_connection(shared: Arc<Shared>, mut alive: CancellationToken) {
    let address = shared.server.host_port();

    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => return,
            _ = alive.cancelled() => {}
        }
        if shared.shutdown.is_cancelled() {
            return;
        }
        tracing::warn!(address = %address, "NATS connection lost, reconnecting");

        loop {
            let opened = tokio::select! {
                _ = shared.shutdown.cancelled() => return,
                opened = shared.open() => opened,
            };

            match opened {
                Ok(conn) => {
                    let mut slot = shared.connection.lock().await;
                    if shared.closed.load(Ordering::Acquire) {
                        return;
                    }
                    alive = conn.alive.clone();
                    *slot = Some(conn);
                    shared.reconnects.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(address = %address, "reconnected to NATS");
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        address = %address,
                        error = %e,
                        retry_in = ?shared.config.reconnect_interval,
                        "NATS reconnect failed"
                    );
                    tokio::select! {
                        _ = shared.shutdown.cancelled() => return,
                        _ = tokio::time::sleep(shared.config.reconnect_interval) => {}
                    }
                }
            }
        }
    }
}

/// Write one `PUB` and flush
async fn write_pub(
    writer: &mut BufWriter<OwnedWriteHalf>,
    subject: &str,
    payload: &[u8],
) -> io::Result<()> {
    let header = format!("PUB {} {}\r\n", subject, payload.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(payload).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await
}

/// Read one protocol line, without the trailing CRLF
async fn read_op(reader: &mut BufReader<OwnedReadHalf>, line: &mut String) -> Result<(), BusError> {
    line.clear();
    if reader.read_line(line).await? == 0 {
        return Err(BusError::Io(io::Error::new(
            ErrorKind::UnexpectedEof,
            "server closed connection",
        )));
    }
    let len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(len);
    Ok(())
}

/// Extract the message from `-ERR 'message'`
fn server_error_message(op: &str) -> String {
    op.trim_start_matches("-ERR")
        .trim()
        .trim_matches('\'')
        .to_string()
}

/// Answer server PINGs and watch for the connection going away
///
/// Cancels `alive` on exit so the next publish reconnects.
async fn read_loop(
    mut reader: BufReader<OwnedReadHalf>,
    writer: Arc<Mutex<BufWriter<OwnedWriteHalf>>>,
    alive: CancellationToken,
    target: String,
) {
    let mut line = String::new();

    loop {
        let op = tokio::select! {
            _ = alive.cancelled() => break,
            op = read_op(&mut reader, &mut line) => op,
        };

        if let Err(e) = op {
            tracing::debug!(address = %target, error = %e, "NATS connection lost");
            break;
        }

        if line == "PING" {
            let mut writer = writer.lock().await;
            let pong = async {
                writer.write_all(b"PONG\r\n").await?;
                writer.flush().await
            };
            if let Err(e) = pong.await {
                tracing::debug!(address = %target, error = %e, "failed to answer PING");
                break;
            }
        } else if line.starts_with("-ERR") {
            tracing::warn!(
                address = %target,
                error = %server_error_message(&line),
                "NATS server error"
            );
        }
    }

    alive.cancel();
}

#[cfg(test)]
#[path = "nats_test.rs"]
mod nats_test;

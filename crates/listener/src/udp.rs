//! UDP acquisition loop
//!
//! The loop owns its batch buffer outright. Each iteration performs one
//! receive bounded by [`READ_TIMEOUT`] and checks for shutdown afterwards,
//! so a stop request is seen within about one timeout.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::batch::BatchBuffer;
use crate::listener::{Core, STAT_READ_ERRORS};
use crate::{ListenerConfig, ListenerError, round_up_to_page_size};

/// Upper bound on one receive
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Bind the ingest socket
pub(crate) fn bind(config: &ListenerConfig) -> Result<UdpSocket, ListenerError> {
    let address = config.bind_address();
    let socket_addr: SocketAddr = match address.parse() {
        Ok(addr) => addr,
        Err(_) => {
            return Err(ListenerError::Bind {
                address,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "invalid socket address",
                ),
            });
        }
    };

    let socket = create_socket(socket_addr, config.read_buffer_bytes)
        .map_err(|source| ListenerError::Bind {
            address: address.clone(),
            source,
        })?;

    tracing::info!(
        listener = %config.name,
        address = ?socket.local_addr().ok(),
        "listener bound to UDP socket"
    );

    Ok(socket)
}

/// Create the UDP socket with SO_REUSEADDR and a page-rounded SO_RCVBUF
fn create_socket(addr: SocketAddr, read_buffer_bytes: usize) -> std::io::Result<UdpSocket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;

    let buffer_size = round_up_to_page_size(read_buffer_bytes);
    if buffer_size != read_buffer_bytes {
        tracing::info!(
            requested = read_buffer_bytes,
            size = buffer_size,
            "rounded receive buffer up to page size"
        );
    }
    socket.set_recv_buffer_size(buffer_size)?;

    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

/// Receive datagrams until cancelled
pub(crate) async fn run(
    socket: UdpSocket,
    mut batch: BatchBuffer,
    core: Arc<Core>,
    cancel: CancellationToken,
) {
    tracing::debug!(listener = %core.config.name, "UDP acquisition started");

    loop {
        match timeout(READ_TIMEOUT, batch.read_once_from(&socket)).await {
            // Deadline passed with nothing to read
            Err(_) => {}
            Ok(Err(e)) => {
                core.stats.inc(STAT_READ_ERRORS);
                tracing::debug!(listener = %core.config.name, error = %e, "UDP read error");
            }
            Ok(Ok(0)) => {}
            Ok(Ok(n)) => {
                if core.config.debug {
                    tracing::info!(listener = %core.config.name, bytes = n, "listener read");
                }
                core.process_read(&mut batch).await;
            }
        }

        if cancel.is_cancelled() {
            break;
        }
    }

    tracing::debug!(listener = %core.config.name, "UDP acquisition stopped");
}

//! Spout - Probes
//!
//! Liveness and readiness endpoints for orchestrators.
//!
//! # Endpoints
//!
//! - `GET /healthz` - 200 while the process is alive, 503 otherwise
//! - `GET /readyz` - 200 once the component is serving, 503 otherwise
//!
//! A component starts alive but not ready. It flips ready once its socket is
//! bound and clears both flags when it begins shutting down.
//!
//! # Example
//!
//! ```ignore
//! use spout_probes::Probes;
//!
//! let probes = Probes::listen(8080).await?;
//! probes.set_ready(true);
//! // ...
//! probes.close().await;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Probe server errors
#[derive(Debug, thiserror::Error)]
pub enum ProbesError {
    /// Failed to bind the probe port
    #[error("failed to bind probe server to {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Shared probe flags
#[derive(Debug)]
struct ProbeState {
    alive: AtomicBool,
    ready: AtomicBool,
}

/// Handle to the probe flags and, when enabled, the server serving them
#[derive(Debug)]
pub struct Probes {
    state: Arc<ProbeState>,
    cancel: CancellationToken,
    server: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl Probes {
    /// Serve probes on `port` on all interfaces
    ///
    /// Port 0 disables the server; the returned handle still tracks state.
    pub async fn listen(port: u16) -> Result<Self, ProbesError> {
        if port == 0 {
            return Ok(Self::disabled());
        }
        Self::bind(SocketAddr::from(([0, 0, 0, 0], port))).await
    }

    /// Serve probes on a specific address
    pub async fn bind(address: SocketAddr) -> Result<Self, ProbesError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| ProbesError::Bind { address, source })?;
        let local_addr = listener.local_addr().ok();

        let state = Arc::new(ProbeState::new());
        let cancel = CancellationToken::new();
        let app = router(Arc::clone(&state));

        let shutdown = cancel.clone();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "probe server failed");
            }
        });

        tracing::info!(address = ?local_addr, "probe server listening");

        Ok(Self {
            state,
            cancel,
            server: Some(server),
            local_addr,
        })
    }

    /// Handle with no server behind it
    pub fn disabled() -> Self {
        Self {
            state: Arc::new(ProbeState::new()),
            cancel: CancellationToken::new(),
            server: None,
            local_addr: None,
        }
    }

    /// Address the server is bound to, if enabled
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.ready.store(ready, Ordering::Release);
    }

    pub fn set_alive(&self, alive: bool) {
        self.state.alive.store(alive, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.state.ready.load(Ordering::Acquire)
    }

    pub fn is_alive(&self) -> bool {
        self.state.alive.load(Ordering::Acquire)
    }

    /// Stop the server and wait for it to exit
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(server) = self.server.take()
            && let Err(e) = server.await
        {
            tracing::warn!(error = %e, "probe server task failed");
        }
    }
}

impl ProbeState {
    fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }
}

/// Build the probe router
fn router(state: Arc<ProbeState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<ProbeState>>) -> StatusCode {
    flag_status(&state.alive)
}

async fn readyz(State(state): State<Arc<ProbeState>>) -> StatusCode {
    flag_status(&state.ready)
}

fn flag_status(flag: &AtomicBool) -> StatusCode {
    if flag.load(Ordering::Acquire) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

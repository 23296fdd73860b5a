//! HTTP acquisition
//!
//! # Endpoint
//!
//! ```text
//! POST /write
//!
//! cpu,host=a usage=0.5 1465839830100400200
//! mem,host=a used=1024 1465839830100400200
//! ```
//!
//! Returns `204 No Content`, or `500` if reading the body failed. Handlers
//! share one batch buffer behind an async mutex that is held for the whole
//! read-and-maybe-publish step.
//!
//! Bodies are always read to the end. When the buffer fills first, the
//! complete lines in it are published and reading continues.

use std::io;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use futures_util::TryStreamExt;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use crate::batch::BatchBuffer;
use crate::listener::{Core, STAT_READ_ERRORS};
use crate::{ListenerConfig, ListenerError};

/// Handler state
#[derive(Clone)]
pub(crate) struct HttpState {
    batch: Arc<Mutex<BatchBuffer>>,
    core: Arc<Core>,
}

/// Bind the ingest port
pub(crate) async fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ListenerError::Bind {
            address: address.clone(),
            source,
        })?;

    tracing::info!(
        listener = %config.name,
        address = ?listener.local_addr().ok(),
        "HTTP listener bound"
    );

    Ok(listener)
}

/// Serve `POST /write` until cancelled
///
/// In-flight requests finish before this returns.
pub(crate) async fn serve(
    listener: TcpListener,
    batch: Arc<Mutex<BatchBuffer>>,
    core: Arc<Core>,
    cancel: CancellationToken,
) {
    let name = core.config.name.clone();
    let app = router(batch, core);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await;

    match result {
        Ok(()) => tracing::debug!(listener = %name, "HTTP server stopped"),
        Err(e) => tracing::error!(listener = %name, error = %e, "HTTP server failed"),
    }
}

/// Build the axum router
pub(crate) fn router(batch: Arc<Mutex<BatchBuffer>>, core: Arc<Core>) -> Router {
    Router::new()
        .route("/write", post(write))
        .with_state(HttpState { batch, core })
}

/// POST /write
async fn write(State(state): State<HttpState>, body: Body) -> StatusCode {
    let stream = body.into_data_stream().map_err(io::Error::other);
    let reader = StreamReader::new(stream);
    tokio::pin!(reader);

    let mut batch = state.batch.lock().await;
    let mut bytes_read = 0;

    let result = loop {
        let (n, result) = batch.read_from(&mut reader).await;
        bytes_read += n;
        if result.is_err() || !batch.is_full() {
            break result;
        }
        state.core.flush_complete_lines(&mut batch).await;
    };

    if let Err(e) = &result {
        state.core.stats.inc(STAT_READ_ERRORS);
        tracing::debug!(listener = %state.core.config.name, error = %e, "HTTP body read error");
    }

    if bytes_read > 0 {
        if state.core.config.debug {
            tracing::info!(
                listener = %state.core.config.name,
                bytes = bytes_read,
                "HTTP listener read"
            );
        }
        state.core.process_read(&mut batch).await;
    }

    match result {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod http_test;

//! Listener lifecycle and publish trigger
//!
//! A listener is created by one of the start routines, runs its background
//! tasks until [`Listener::stop`], and then releases the bus and probes.

use std::net::SocketAddr;
use std::sync::Arc;

use spout_bus::{NatsClient, NatsConfig, Publisher};
use spout_config::{Config, Mode};
use spout_metrics::Stats;
use spout_probes::Probes;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::batch::BatchBuffer;
use crate::{ListenerConfig, ListenerError, http, statistician, udp};

/// Successful non-empty reads
pub const STAT_RECEIVED: &str = "received";

/// Publish attempts
pub const STAT_SENT: &str = "sent";

/// Socket or request body read failures
pub const STAT_READ_ERRORS: &str = "read_errors";

/// Publishes the bus rejected
pub const STAT_FAILED_NATS_PUBLISH: &str = "failed_nats_publish";

/// Largest possible UDP datagram
///
/// A batch within this many bytes of capacity is published before the next
/// read.
pub const MAX_UDP_DATAGRAM_SIZE: usize = 65536;

/// State shared by the acquisition loop, HTTP handlers and statistician
pub(crate) struct Core {
    pub(crate) config: ListenerConfig,
    pub(crate) bus: Arc<dyn Publisher>,
    pub(crate) stats: Arc<Stats>,
}

impl Core {
    pub(crate) fn new(config: ListenerConfig, bus: Arc<dyn Publisher>) -> Self {
        Self {
            config,
            bus,
            stats: Arc::new(Stats::new(&[
                STAT_RECEIVED,
                STAT_SENT,
                STAT_READ_ERRORS,
                STAT_FAILED_NATS_PUBLISH,
            ])),
        }
    }

    /// Count a read and publish the batch if a threshold is reached
    ///
    /// The batch is reset after every publish attempt, successful or not.
    /// `config.batch_messages` is non-zero once `ListenerConfig::validate`
    /// has passed.
    pub(crate) async fn process_read(&self, batch: &mut BatchBuffer) {
        let count_reached = self
            .stats
            .inc(STAT_RECEIVED)
            .is_some_and(|received| received % self.config.batch_messages as u64 == 0);

        let nearly_full =
            self.config.batch_bytes.saturating_sub(batch.size()) <= MAX_UDP_DATAGRAM_SIZE;

        // Empty when a large HTTP body was already flushed line by line
        if batch.is_empty() {
            return;
        }

        if count_reached || nearly_full {
            self.publish(batch.bytes()).await;
            batch.reset();
        }
    }

    /// Publish the complete lines of a full batch to make room for more
    ///
    /// A trailing partial line moves to the front of the batch. A batch with
    /// no line break at all is one over-long line and is published whole.
    pub(crate) async fn flush_complete_lines(&self, batch: &mut BatchBuffer) {
        let end = match batch.bytes().iter().rposition(|&b| b == b'\n') {
            Some(newline) => newline + 1,
            None => {
                tracing::warn!(
                    listener = %self.config.name,
                    bytes = batch.size(),
                    "line longer than batch buffer, publishing it split"
                );
                batch.size()
            }
        };

        self.publish(&batch.bytes()[..end]).await;
        batch.consume(end);
    }

    /// One publish attempt on the primary subject
    async fn publish(&self, payload: &[u8]) {
        self.stats.inc(STAT_SENT);
        if let Err(e) = self.bus.publish(&self.config.subject, payload).await {
            self.stats.inc(STAT_FAILED_NATS_PUBLISH);
            tracing::warn!(
                listener = %self.config.name,
                subject = %self.config.subject,
                bytes = payload.len(),
                error = %e,
                "batch publish failed, dropping batch"
            );
        }
    }
}

/// Running line-protocol listener
///
/// Accepts line protocol over UDP or HTTP, batches it and publishes each
/// batch as one bus message.
pub struct Listener {
    core: Arc<Core>,
    probes: Probes,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl Listener {
    /// Start the listener selected by `config.mode`
    ///
    /// Checks the listener settings, then starts the probe server and
    /// connects to NATS before binding.
    pub async fn start(config: &Config) -> Result<Self, ListenerError> {
        let listener_config = ListenerConfig::from(config);
        listener_config.validate()?;

        let probes = Probes::listen(config.probe_port).await?;

        let nats = NatsConfig::new(&config.nats_address).with_name(&config.name);
        let bus: Arc<dyn Publisher> = match NatsClient::connect(nats).await {
            Ok(client) => Arc::new(client),
            Err(e) => {
                probes.close().await;
                return Err(e.into());
            }
        };

        let listener = match config.mode {
            Mode::Listener => Self::start_udp(listener_config, bus, probes).await?,
            Mode::ListenerHttp => Self::start_http(listener_config, bus, probes).await?,
        };

        tracing::info!(
            listener = %listener.name(),
            mode = %config.mode,
            subject = %listener.core.config.subject,
            nats_address = %config.nats_address,
            "listener publishing"
        );

        Ok(listener)
    }

    /// Start a UDP listener publishing to `bus`
    ///
    /// On failure the bus and probes are closed before the error is returned.
    pub async fn start_udp(
        config: ListenerConfig,
        bus: Arc<dyn Publisher>,
        probes: Probes,
    ) -> Result<Self, ListenerError> {
        let mut listener = Self::new(config, bus, probes);

        if let Err(e) = listener.core.config.validate() {
            listener.stop().await;
            return Err(e);
        }
        let socket = match udp::bind(&listener.core.config) {
            Ok(socket) => socket,
            Err(e) => {
                listener.stop().await;
                return Err(e);
            }
        };
        listener.local_addr = socket.local_addr().ok();

        listener.spawn_statistician();

        let batch = BatchBuffer::new(listener.core.config.batch_bytes);
        listener.tasks.push(tokio::spawn(udp::run(
            socket,
            batch,
            Arc::clone(&listener.core),
            listener.cancel.clone(),
        )));
        listener.probes.set_ready(true);

        Ok(listener)
    }

    /// Start an HTTP listener publishing to `bus`
    ///
    /// On failure the bus and probes are closed before the error is returned.
    pub async fn start_http(
        config: ListenerConfig,
        bus: Arc<dyn Publisher>,
        probes: Probes,
    ) -> Result<Self, ListenerError> {
        let mut listener = Self::new(config, bus, probes);

        if let Err(e) = listener.core.config.validate() {
            listener.stop().await;
            return Err(e);
        }
        let tcp = match http::bind(&listener.core.config).await {
            Ok(tcp) => tcp,
            Err(e) => {
                listener.stop().await;
                return Err(e);
            }
        };
        listener.local_addr = tcp.local_addr().ok();

        listener.spawn_statistician();

        let batch = Arc::new(Mutex::new(BatchBuffer::new(
            listener.core.config.batch_bytes,
        )));
        listener.tasks.push(tokio::spawn(http::serve(
            tcp,
            batch,
            Arc::clone(&listener.core),
            listener.cancel.clone(),
        )));
        listener.probes.set_ready(true);

        Ok(listener)
    }

    fn new(config: ListenerConfig, bus: Arc<dyn Publisher>, probes: Probes) -> Self {
        Self {
            core: Arc::new(Core::new(config, bus)),
            probes,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            local_addr: None,
        }
    }

    fn spawn_statistician(&mut self) {
        self.tasks.push(tokio::spawn(statistician::run(
            Arc::clone(&self.core),
            self.cancel.clone(),
        )));
    }

    /// Instance name
    pub fn name(&self) -> &str {
        &self.core.config.name
    }

    /// Address the ingest socket is bound to
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Listener counters
    pub fn stats(&self) -> &Arc<Stats> {
        &self.core.stats
    }

    pub fn probes(&self) -> &Probes {
        &self.probes
    }

    /// Shut the listener down
    ///
    /// Marks probes down, signals every task to stop and waits for them,
    /// then closes the bus and the probe server. No publishes happen after
    /// this returns.
    pub async fn stop(self) {
        self.probes.set_ready(false);
        self.probes.set_alive(false);

        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(listener = %self.core.config.name, error = %e, "listener task failed");
            }
        }

        if let Err(e) = self.core.bus.close().await {
            tracing::warn!(
                listener = %self.core.config.name,
                bus = self.core.bus.kind(),
                error = %e,
                "failed to close bus"
            );
        }
        self.probes.close().await;

        tracing::info!(listener = %self.core.config.name, "listener stopped");
    }
}

#[cfg(test)]
#[path = "listener_test.rs"]
mod listener_test;

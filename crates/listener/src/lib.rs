//! Spout - Listener
//!
//! Accepts InfluxDB line protocol over UDP or HTTP, batches it and publishes
//! each batch to a message bus.
//!
//! # Variants
//!
//! - **UDP** (`Listener::start_udp`) - One datagram per read, read loop owns
//!   the batch buffer
//! - **HTTP** (`Listener::start_http`) - `POST /write` request bodies,
//!   handlers share the batch buffer behind a mutex
//!
//! # Batching
//!
//! After every non-empty read the `received` counter is bumped and the batch
//! is published when either:
//!
//! - `received` is a multiple of `batch_messages`, or
//! - the batch is within one maximum-size UDP datagram of `batch_bytes`
//!
//! The batch is reset after every publish attempt. A failed publish is
//! counted in `failed_nats_publish` and its data dropped.
//!
//! # Counters
//!
//! `received`, `sent`, `read_errors` and `failed_nats_publish` are published
//! in Prometheus text format on the monitor subject every `stats_interval`.
//!
//! # Example
//!
//! ```ignore
//! use spout_bus::MemoryBus;
//! use spout_listener::{Listener, ListenerConfig};
//! use spout_probes::Probes;
//!
//! let bus = Arc::new(MemoryBus::new());
//! let listener = Listener::start_udp(ListenerConfig::default(), bus, Probes::disabled()).await?;
//! // ...
//! listener.stop().await;
//! ```

mod batch;
mod config;
mod error;
mod http;
mod listener;
mod statistician;
mod udp;

pub use batch::BatchBuffer;
pub use config::{ListenerConfig, page_size, round_up_to_page_size};
pub use error::ListenerError;
pub use listener::{
    Listener, MAX_UDP_DATAGRAM_SIZE, STAT_FAILED_NATS_PUBLISH, STAT_READ_ERRORS, STAT_RECEIVED,
    STAT_SENT,
};
pub use udp::READ_TIMEOUT;

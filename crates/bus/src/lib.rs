//! Spout - Bus
//!
//! Publish side of the message bus that batches are handed to.
//!
//! # Publishers
//!
//! - **NATS** (`NatsClient`) - Text-protocol NATS client with automatic
//!   reconnection
//! - **Memory** (`MemoryBus`) - In-process recorder used by tests and local
//!   runs
//!
//! # Design
//!
//! Components hold an `Arc<dyn Publisher>`. A publisher must be safe to use
//! from several tasks at once: the listener's acquisition loop and its
//! statistician publish through the same handle.
//!
//! # Example
//!
//! ```ignore
//! use spout_bus::{NatsClient, NatsConfig, Publisher};
//!
//! let bus = NatsClient::connect(NatsConfig::new("nats://localhost:4222")).await?;
//! bus.publish("influx-spout", b"cpu,host=a usage=0.5\n").await?;
//! bus.close().await?;
//! ```

mod error;
mod memory;
mod nats;

pub use error::BusError;
pub use memory::{MemoryBus, Message};
pub use nats::{NatsClient, NatsConfig, ServerAddress};

use async_trait::async_trait;

/// Publish side of a message bus
///
/// Implemented by the NATS client and the in-memory bus.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish one message on `subject`
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), BusError>;

    /// Flush pending writes and release the connection
    ///
    /// Publishing after `close` fails with [`BusError::Closed`].
    async fn close(&self) -> Result<(), BusError>;

    /// Publisher type for logging
    fn kind(&self) -> &'static str;
}

/// Check that a subject can be sent on the wire
///
/// Subjects are non-empty and contain no whitespace.
pub fn validate_subject(subject: &str) -> Result<(), BusError> {
    if subject.is_empty() || subject.bytes().any(|b| b.is_ascii_whitespace()) {
        return Err(BusError::InvalidSubject(subject.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_subject() {
        assert!(validate_subject("influx-spout").is_ok());
        assert!(validate_subject("a.b.c").is_ok());
        assert!(matches!(
            validate_subject(""),
            Err(BusError::InvalidSubject(_))
        ));
        assert!(validate_subject("has space").is_err());
        assert!(validate_subject("tab\tsubject").is_err());
        assert!(validate_subject("line\r\n").is_err());
    }
}

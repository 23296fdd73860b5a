//! Listener error types

use spout_bus::BusError;
use spout_probes::ProbesError;

/// Errors that stop a listener from starting
///
/// Errors after startup (reads, publishes) are counted and logged instead.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind the ingest socket
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to connect to the bus
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// Failed to start the probe server
    #[error("probe error: {0}")]
    Probes(#[from] ProbesError),

    /// I/O error during setup
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings the listener cannot run with
    #[error("invalid listener config: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ListenerError::Bind {
            address: "0.0.0.0:10001".into(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("0.0.0.0:10001"));

        let err = ListenerError::from(BusError::Closed);
        assert!(err.to_string().contains("closed"));

        let err = ListenerError::InvalidConfig("batch_messages must be at least 1".into());
        assert!(err.to_string().contains("batch_messages"));
    }
}

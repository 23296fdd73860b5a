//! Bus error types

/// Errors from bus publishers
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Server address could not be parsed
    #[error("invalid bus address '{0}'")]
    InvalidAddress(String),

    /// Connecting to the server failed
    #[error("connection failed to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// An operation did not finish in time
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// I/O error on an established connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Server sent something unexpected
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Server reported an error
    #[error("server error: {0}")]
    Server(String),

    /// Subject is empty or contains whitespace
    #[error("invalid subject '{0}'")]
    InvalidSubject(String),

    /// Publisher rejected the message
    #[error("publish rejected: {0}")]
    Rejected(String),

    /// No connection is up; a reconnect is in progress
    #[error("not connected")]
    NotConnected,

    /// Publisher has been closed
    #[error("publisher is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BusError::Connect {
            address: "localhost:4222".into(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(err.to_string().contains("localhost:4222"));

        assert!(BusError::Timeout("handshake").to_string().contains("handshake"));
        assert!(BusError::InvalidSubject("a b".into()).to_string().contains("a b"));
        assert!(BusError::Closed.to_string().contains("closed"));
        assert_eq!(BusError::NotConnected.to_string(), "not connected");
    }
}

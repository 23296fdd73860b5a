//! Protocol error types
//!
//! Errors that can occur when decomposing line protocol.

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Tag section is malformed (missing `=` or empty value)
    #[error("invalid tag")]
    InvalidTag,
}

//! Metrics output formatters
//!
//! Formats counter snapshots for publishing to a monitoring subject.

pub mod prometheus;

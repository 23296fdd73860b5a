//! Spout - Metrics
//!
//! Internal counters for observability.
//!
//! # Overview
//!
//! This crate provides:
//! - `Counter` - a single lock-free monotonic counter
//! - `Stats` - a fixed set of named counters with point-in-time snapshots
//! - `format::prometheus` - Prometheus text exposition of a snapshot
//!
//! # Design Principles
//!
//! - **Lock-free**: All counters use atomic operations
//! - **Low overhead**: No allocations during counter updates
//! - **Explicit sharing**: `Stats` is passed around as `Arc<Stats>`, there is
//!   no global registry
//!
//! # Example
//!
//! ```
//! use spout_metrics::Stats;
//!
//! let stats = Stats::new(&["received", "sent"]);
//! assert_eq!(stats.inc("received"), Some(1));
//! assert_eq!(stats.inc("received"), Some(2));
//!
//! let snapshot = stats.snapshot();
//! assert_eq!(snapshot.get("received"), Some(2));
//! assert_eq!(snapshot.get("sent"), Some(0));
//! ```

pub mod format;
mod stats;

pub use format::prometheus::to_prometheus;
pub use stats::{CounterValue, Snapshot, Stats};

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter wrapper for convenient metric operations
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Create a new counter initialized to 0
    #[inline]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increment the counter by `val` and return the new value
    #[inline]
    pub fn add(&self, val: u64) -> u64 {
        self.0.fetch_add(val, Ordering::Relaxed) + val
    }

    /// Increment the counter by 1 and return the new value
    #[inline]
    pub fn inc(&self) -> u64 {
        self.add(1)
    }

    /// Get the current value (relaxed ordering)
    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

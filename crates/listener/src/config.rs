//! Listener configuration

use std::time::Duration;

use spout_config::{
    Config, DEFAULT_LISTENER_BATCH_BYTES, DEFAULT_NATS_SUBJECT, DEFAULT_NATS_SUBJECT_MONITOR,
    DEFAULT_READ_BUFFER_BYTES, DEFAULT_STATS_INTERVAL,
};

use crate::ListenerError;

/// Page size assumed when the OS cannot report one
const FALLBACK_PAGE_SIZE: usize = 4096;

/// Settings for one listener instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Instance name, used in metrics labels
    pub name: String,

    /// Bind address (e.g., "0.0.0.0")
    pub address: String,

    /// Listen port
    pub port: u16,

    /// Subject batches are published on
    pub subject: String,

    /// Subject metrics are published on
    pub monitor_subject: String,

    /// Publish after this many reads
    pub batch_messages: usize,

    /// Batch buffer capacity
    pub batch_bytes: usize,

    /// Requested UDP receive buffer size (rounded up to a page)
    pub read_buffer_bytes: usize,

    /// Interval between metrics publishes
    pub stats_interval: Duration,

    /// Log every read
    pub debug: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            name: "listener".into(),
            address: "0.0.0.0".into(),
            port: 10001,
            subject: DEFAULT_NATS_SUBJECT.into(),
            monitor_subject: DEFAULT_NATS_SUBJECT_MONITOR.into(),
            batch_messages: 1,
            batch_bytes: DEFAULT_LISTENER_BATCH_BYTES,
            read_buffer_bytes: DEFAULT_READ_BUFFER_BYTES,
            stats_interval: DEFAULT_STATS_INTERVAL,
            debug: false,
        }
    }
}

impl From<&Config> for ListenerConfig {
    fn from(config: &Config) -> Self {
        Self {
            name: config.name.clone(),
            address: config.bind_address.clone(),
            port: config.port,
            subject: config.primary_subject().to_string(),
            monitor_subject: config.nats_subject_monitor.clone(),
            batch_messages: config.batch_messages,
            batch_bytes: config.listener_batch_bytes,
            read_buffer_bytes: config.read_buffer_bytes,
            stats_interval: config.stats_interval,
            debug: config.debug,
        }
    }
}

impl ListenerConfig {
    /// Get the socket address to bind to
    pub fn bind_address(&self) -> String {
        if self.address.contains(':') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }

    /// Check the settings the trigger policy depends on
    pub fn validate(&self) -> Result<(), ListenerError> {
        if self.batch_messages == 0 {
            return Err(ListenerError::InvalidConfig(
                "batch_messages must be at least 1".into(),
            ));
        }
        if self.batch_bytes == 0 {
            return Err(ListenerError::InvalidConfig(
                "batch_bytes must be greater than 0".into(),
            ));
        }
        if self.stats_interval.is_zero() {
            return Err(ListenerError::InvalidConfig(
                "stats_interval must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Round `n` up to a whole number of pages
///
/// Zero rounds up to one page.
pub fn round_up_to_page_size(n: usize) -> usize {
    let page = page_size();
    if n == 0 {
        return page;
    }
    n.div_ceil(page).saturating_mul(page)
}

/// OS memory page size
pub fn page_size() -> usize {
    #[cfg(unix)]
    {
        // SAFETY: sysconf has no preconditions
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            return size as usize;
        }
    }
    FALLBACK_PAGE_SIZE
}

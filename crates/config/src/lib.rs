//! Spout Configuration
//!
//! TOML configuration with defaults for everything except `mode`.
//!
//! # Parsing
//!
//! ```
//! use spout_config::{Config, Mode};
//! use std::str::FromStr;
//!
//! let config = Config::from_str("mode = \"listener\"").unwrap();
//! assert_eq!(config.mode, Mode::Listener);
//! assert_eq!(config.port, 10001);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! mode = "listener_http"
//! name = "http-ingest"
//! nats_address = "nats://nats.internal:4222"
//! nats_subject = ["influx-spout"]
//! batch_messages = 100
//! listener_batch_bytes = 1048576
//! probe_port = 8080
//!
//! [log]
//! level = "debug"
//! ```

mod error;
mod logging;
mod validation;

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};

use serde::Deserialize;

/// Default NATS server
pub const DEFAULT_NATS_ADDRESS: &str = "nats://localhost:4222";

/// Default subject batches are published on
pub const DEFAULT_NATS_SUBJECT: &str = "influx-spout";

/// Default subject metrics are published on
pub const DEFAULT_NATS_SUBJECT_MONITOR: &str = "influx-spout-monitor";

/// Default batch buffer capacity (1 MiB)
pub const DEFAULT_LISTENER_BATCH_BYTES: usize = 1024 * 1024;

/// Default socket receive buffer (4 MiB)
pub const DEFAULT_READ_BUFFER_BYTES: usize = 4 * 1024 * 1024;

/// Default interval between metrics publishes
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(3);

/// Which ingest variant to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Line protocol over UDP
    Listener,
    /// Line protocol over HTTP `POST /write`
    ListenerHttp,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listener => "listener",
            Self::ListenerHttp => "listener_http",
        }
    }

    /// Port used when the config does not set one
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Listener => 10001,
            Self::ListenerHttp => 13009,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub mode: Mode,

    /// Instance name, used in metrics labels (defaults to the mode)
    pub name: String,

    pub nats_address: String,

    /// Batches go to the first subject
    pub nats_subject: Vec<String>,

    pub nats_subject_monitor: String,

    pub bind_address: String,

    /// Listen port (defaults per mode)
    pub port: u16,

    /// Publish after this many reads
    pub batch_messages: usize,

    /// Batch buffer capacity
    pub listener_batch_bytes: usize,

    /// Requested socket receive buffer size
    pub read_buffer_bytes: usize,

    /// Probe server port, 0 disables it
    pub probe_port: u16,

    pub stats_interval: Duration,

    /// Log every read
    pub debug: bool,

    pub log: LogConfig,
}

/// On-disk form, before mode-dependent defaults are applied
#[derive(Debug, Deserialize)]
struct RawConfig {
    mode: Option<Mode>,
    name: Option<String>,
    #[serde(default = "default_nats_address")]
    nats_address: String,
    #[serde(default = "default_nats_subject")]
    nats_subject: Vec<String>,
    #[serde(default = "default_nats_subject_monitor")]
    nats_subject_monitor: String,
    #[serde(default = "default_bind_address")]
    bind_address: String,
    port: Option<u16>,
    #[serde(default = "default_batch_messages")]
    batch_messages: usize,
    #[serde(default = "default_listener_batch_bytes")]
    listener_batch_bytes: usize,
    #[serde(default = "default_read_buffer_bytes")]
    read_buffer_bytes: usize,
    #[serde(default)]
    probe_port: u16,
    #[serde(default = "default_stats_interval", with = "humantime_serde")]
    stats_interval: Duration,
    #[serde(default)]
    debug: bool,
    #[serde(default)]
    log: LogConfig,
}

fn default_nats_address() -> String {
    DEFAULT_NATS_ADDRESS.into()
}

fn default_nats_subject() -> Vec<String> {
    vec![DEFAULT_NATS_SUBJECT.into()]
}

fn default_nats_subject_monitor() -> String {
    DEFAULT_NATS_SUBJECT_MONITOR.into()
}

fn default_bind_address() -> String {
    "0.0.0.0".into()
}

fn default_batch_messages() -> usize {
    1
}

fn default_listener_batch_bytes() -> usize {
    DEFAULT_LISTENER_BATCH_BYTES
}

fn default_read_buffer_bytes() -> usize {
    DEFAULT_READ_BUFFER_BYTES
}

fn default_stats_interval() -> Duration {
    DEFAULT_STATS_INTERVAL
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, is not valid TOML, or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Configuration for `mode` with every other field at its default
    pub fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            name: mode.as_str().into(),
            nats_address: default_nats_address(),
            nats_subject: default_nats_subject(),
            nats_subject_monitor: default_nats_subject_monitor(),
            bind_address: default_bind_address(),
            port: mode.default_port(),
            batch_messages: default_batch_messages(),
            listener_batch_bytes: default_listener_batch_bytes(),
            read_buffer_bytes: default_read_buffer_bytes(),
            probe_port: 0,
            stats_interval: default_stats_interval(),
            debug: false,
            log: LogConfig::default(),
        }
    }

    /// Subject batches are published on
    pub fn primary_subject(&self) -> &str {
        self.nats_subject
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_NATS_SUBJECT)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    fn parse(s: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(s)?;
        let mode = raw.mode.ok_or(ConfigError::MissingField { field: "mode" })?;

        let config = Self {
            mode,
            name: raw.name.unwrap_or_else(|| mode.as_str().into()),
            nats_address: raw.nats_address,
            nats_subject: raw.nats_subject,
            nats_subject_monitor: raw.nats_subject_monitor,
            bind_address: raw.bind_address,
            port: raw.port.unwrap_or_else(|| mode.default_port()),
            batch_messages: raw.batch_messages,
            listener_batch_bytes: raw.listener_batch_bytes,
            read_buffer_bytes: raw.read_buffer_bytes,
            probe_port: raw.probe_port,
            stats_interval: raw.stats_interval,
            debug: raw.debug,
            log: raw.log,
        };
        config.validate()?;
        Ok(config)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_udp_config_uses_defaults() {
        let config = Config::from_str("mode = \"listener\"").unwrap();

        assert_eq!(config.mode, Mode::Listener);
        assert_eq!(config.name, "listener");
        assert_eq!(config.nats_address, "nats://localhost:4222");
        assert_eq!(config.nats_subject, vec!["influx-spout"]);
        assert_eq!(config.nats_subject_monitor, "influx-spout-monitor");
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 10001);
        assert_eq!(config.batch_messages, 1);
        assert_eq!(config.listener_batch_bytes, 1024 * 1024);
        assert_eq!(config.read_buffer_bytes, 4 * 1024 * 1024);
        assert_eq!(config.probe_port, 0);
        assert_eq!(config.stats_interval, Duration::from_secs(3));
        assert!(!config.debug);
        assert_eq!(config.log, LogConfig::default());
        assert_eq!(config, Config::with_mode(Mode::Listener));
    }

    #[test]
    fn test_http_mode_default_port() {
        let config = Config::from_str("mode = \"listener_http\"").unwrap();
        assert_eq!(config.mode, Mode::ListenerHttp);
        assert_eq!(config.name, "listener_http");
        assert_eq!(config.port, 13009);
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
mode = "listener"
name = "udp-edge"
nats_address = "nats://nats.internal:4333"
nats_subject = ["lines", "ignored"]
nats_subject_monitor = "monitor"
bind_address = "127.0.0.1"
port = 9999
batch_messages = 50
listener_batch_bytes = 2097152
read_buffer_bytes = 1000
probe_port = 8080
stats_interval = "500ms"
debug = true

[log]
level = "debug"
format = "json"
"#;
        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.name, "udp-edge");
        assert_eq!(config.nats_address, "nats://nats.internal:4333");
        assert_eq!(config.primary_subject(), "lines");
        assert_eq!(config.nats_subject_monitor, "monitor");
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 9999);
        assert_eq!(config.batch_messages, 50);
        assert_eq!(config.listener_batch_bytes, 2 * 1024 * 1024);
        assert_eq!(config.read_buffer_bytes, 1000);
        assert_eq!(config.probe_port, 8080);
        assert_eq!(config.stats_interval, Duration::from_millis(500));
        assert!(config.debug);
        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_missing_mode() {
        let result = Config::from_str("name = \"x\"");
        assert!(matches!(
            result,
            Err(ConfigError::MissingField { field: "mode" })
        ));
    }

    #[test]
    fn test_unknown_mode() {
        let result = Config::from_str("mode = \"filter\"");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_str("invalid { toml");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_batch_sizing_not_checked_here() {
        let config =
            Config::from_str("mode = \"listener\"\nbatch_messages = 0\nlistener_batch_bytes = 0")
                .unwrap();
        assert_eq!(config.batch_messages, 0);
        assert_eq!(config.listener_batch_bytes, 0);
    }

    #[test]
    fn test_empty_subject_list_rejected() {
        let result = Config::from_str("mode = \"listener\"\nnats_subject = []");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                field: "nats_subject",
                ..
            })
        ));
    }

    #[test]
    fn test_subject_with_space_rejected() {
        let result = Config::from_str("mode = \"listener\"\nnats_subject_monitor = \"a b\"");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                field: "nats_subject_monitor",
                ..
            })
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        let result = Config::from_str("mode = \"listener\"\nname = \" \"");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field: "name", .. })
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mode = \"listener_http\"\nport = 8086").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.mode, Mode::ListenerHttp);
        assert_eq!(config.port, 8086);
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let result = Config::from_file(&path);
        match result {
            Err(ConfigError::IoError { path: p, .. }) => assert!(p.ends_with("absent.toml")),
            other => panic!("expected IoError, got {other:?}"),
        }
    }

    #[test]
    fn test_shipped_configs_parse() {
        let udp = Config::from_str(include_str!("../../../configs/listener.toml")).unwrap();
        assert_eq!(udp.mode, Mode::Listener);
        assert_eq!(udp.batch_messages, 50);

        let http = Config::from_str(include_str!("../../../configs/listener_http.toml")).unwrap();
        assert_eq!(http.mode, Mode::ListenerHttp);
        assert_eq!(http.nats_subject_monitor, "influx-spout-monitor");
        assert_eq!(http.log.format, LogFormat::Json);
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Listener.to_string(), "listener");
        assert_eq!(Mode::ListenerHttp.to_string(), "listener_http");
    }
}

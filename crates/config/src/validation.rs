//! Configuration validation
//!
//! Rejects values the listener cannot run with:
//! - Empty name, subject list or NATS address
//! - Subjects the bus would reject (empty or containing whitespace)
//!
//! Batch sizing is checked by the listener's own config when it starts.

use crate::Config;
use crate::error::{ConfigError, Result};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.name.trim().is_empty() {
        return Err(ConfigError::invalid_value("name", "must not be empty"));
    }

    if config.nats_subject.is_empty() {
        return Err(ConfigError::invalid_value(
            "nats_subject",
            "at least one subject is required",
        ));
    }
    for subject in &config.nats_subject {
        validate_subject("nats_subject", subject)?;
    }
    validate_subject("nats_subject_monitor", &config.nats_subject_monitor)?;

    if config.nats_address.trim().is_empty() {
        return Err(ConfigError::invalid_value("nats_address", "must not be empty"));
    }

    Ok(())
}

fn validate_subject(field: &'static str, subject: &str) -> Result<()> {
    if subject.is_empty() || subject.bytes().any(|b| b.is_ascii_whitespace()) {
        return Err(ConfigError::invalid_value(
            field,
            format!("'{subject}' is not a valid subject"),
        ));
    }
    Ok(())
}

//! Tracing bootstrap and PHI redaction for the eligibility engine
//!
//! Alert text and payer lookups carry patient names and policy identifiers.
//! Anything that can contain them goes through [`redact`] (or the
//! `redacted_*!` macros) before it reaches a log line.
//!
//! # Example
//!
//! ```rust,no_run
//! use logger_redacted::{init_tracing, LoggerConfig, redacted_info};
//!
//! init_tracing(&LoggerConfig::default()).ok();
//! redacted_info!("Insurance expired for patient {} {}.", "John", "Doe");
//! // Output: "Insurance expired for patient NAME[...]."
//! ```

pub mod redactor;
pub mod macros;
pub mod config;

pub use redactor::*;
pub use config::*;

#[doc(hidden)]
pub use tracing as __private_tracing;

use std::sync::atomic::{AtomicBool, Ordering};

use lazy_static::lazy_static;
use thiserror::Error;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

lazy_static! {
    static ref DEFAULT_REDACTOR: PiiRedactor = PiiRedactor::default();
}

// Only ever switched off for local debugging against synthetic data
static REDACTION_ENABLED: AtomicBool = AtomicBool::new(true);

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// Redact text with the default redaction rules
pub fn redact(text: &str) -> String {
    if REDACTION_ENABLED.load(Ordering::Relaxed) {
        DEFAULT_REDACTOR.redact(text)
    } else {
        text.to_string()
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level when it is set.
pub fn init_tracing(config: &LoggerConfig) -> Result<(), LoggerError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.default_directive())
            .map_err(|e| LoggerError::Filter(e.to_string()))?,
    };
    REDACTION_ENABLED.store(config.redaction_enabled, Ordering::Relaxed);

    match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_level(true),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .try_init(),
    }
    .map_err(|e| LoggerError::AlreadyInitialized(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_redactor_masks_patient_names() {
        let redacted = redact("Insurance needs review for patient Ann Lee. Manual re-check requested.");
        assert!(!redacted.contains("Ann Lee"));
        assert!(redacted.ends_with("Manual re-check requested."));
    }

    #[test]
    fn test_default_directive_uses_level() {
        let config = LoggerConfig { log_level: "debug".into(), ..Default::default() };
        assert!(config.default_directive().contains("insurance_service=debug"));
    }
}

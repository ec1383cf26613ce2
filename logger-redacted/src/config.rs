// Logger configuration
use serde::{Deserialize, Serialize};

/// Output format for the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines for local development
    Pretty,
    /// One JSON object per event for log shipping
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub redaction_enabled: bool,
    pub log_level: String,
    pub format: LogFormat,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            redaction_enabled: true,
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggerConfig {
    /// Default directive handed to `EnvFilter` when `RUST_LOG` is unset
    pub fn default_directive(&self) -> String {
        format!(
            "eligibility_server={level},insurance_service={level},events_bus={level},tower_http=info,sqlx=warn",
            level = self.log_level
        )
    }
}

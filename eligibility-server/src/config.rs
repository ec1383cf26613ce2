use std::path::PathBuf;

use clap::Parser;
use logger_redacted::{LogFormat, LoggerConfig};

/// Insurance eligibility verification daemon
#[derive(Parser, Debug, Clone)]
#[command(name = "eligibility-server")]
#[command(about = "Scheduled insurance verification with live alert push")]
pub struct ServerConfig {
    /// Server bind address
    #[arg(long, env = "ELIGIBILITY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "ELIGIBILITY_PORT", default_value_t = 8080)]
    pub port: u16,

    /// PostgreSQL connection string; the in-memory store is used when unset
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Engine configuration file (toml, yaml or json)
    #[arg(short, long, env = "ELIGIBILITY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Events buffered per alert socket before it is dropped as lagging
    #[arg(long, env = "ELIGIBILITY_OBSERVER_BUFFER", default_value_t = 64)]
    pub observer_buffer: usize,

    /// Emit JSON log lines
    #[arg(long, env = "ELIGIBILITY_JSON_LOGS")]
    pub json_logs: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn logger_config(&self) -> LoggerConfig {
        LoggerConfig {
            log_level: if self.verbose { "debug" } else { "info" }.to_string(),
            format: if self.json_logs { LogFormat::Json } else { LogFormat::Pretty },
            ..Default::default()
        }
    }
}

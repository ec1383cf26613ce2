// Engine configuration: optional file, then ELIGIBILITY__* environment
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{InsuranceError, InsuranceResult};

pub const ENV_PREFIX: &str = "ELIGIBILITY";

/// Upper bound for `sweep_interval_hours` (one year)
pub const MAX_SWEEP_INTERVAL_HOURS: u64 = 24 * 365;
/// Upper bound for `lookahead_days` and `log_retention_days`
pub const MAX_WINDOW_DAYS: i64 = 3650;

pub fn default_provider_names() -> Vec<String> {
    ["Blue Cross", "Aetna", "Cigna", "UnitedHealth", "Humana"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Known payer names; the first is used when an appointment has none
    pub provider_names: Vec<String>,
    pub sweep_interval_hours: u64,
    /// Sweep window is `[now, now + lookahead_days]`
    pub lookahead_days: i64,
    pub bulk_simulation_limit: usize,
    /// Appointments verified in parallel during one sweep
    pub sweep_concurrency: usize,
    /// Verification logs older than this are pruned after each sweep;
    /// unset keeps the full audit trail
    pub log_retention_days: Option<i64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider_names: default_provider_names(),
            sweep_interval_hours: 24,
            lookahead_days: 2,
            bulk_simulation_limit: 5,
            sweep_concurrency: 4,
            log_retention_days: None,
        }
    }
}

impl EngineConfig {
    /// Load `.env`, the optional config file, then `ELIGIBILITY__*` variables
    ///
    /// `ELIGIBILITY__PROVIDER_NAMES` takes a comma separated list.
    pub fn load(path: Option<&Path>) -> InsuranceResult<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("provider_names")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> InsuranceResult<()> {
        if self.provider_names.iter().all(|name| name.trim().is_empty()) {
            return Err(InsuranceError::Config(
                "provider_names must contain at least one provider".into(),
            ));
        }
        if self.sweep_interval_hours == 0 || self.sweep_interval_hours > MAX_SWEEP_INTERVAL_HOURS {
            return Err(InsuranceError::Config(format!(
                "sweep_interval_hours must be between 1 and {MAX_SWEEP_INTERVAL_HOURS}"
            )));
        }
        if self.lookahead_days <= 0 || self.lookahead_days > MAX_WINDOW_DAYS {
            return Err(InsuranceError::Config(format!(
                "lookahead_days must be between 1 and {MAX_WINDOW_DAYS}"
            )));
        }
        if self.bulk_simulation_limit == 0 {
            return Err(InsuranceError::Config("bulk_simulation_limit must be positive".into()));
        }
        if self.sweep_concurrency == 0 {
            return Err(InsuranceError::Config("sweep_concurrency must be positive".into()));
        }
        if matches!(self.log_retention_days, Some(days) if days <= 0 || days > MAX_WINDOW_DAYS) {
            return Err(InsuranceError::Config(format!(
                "log_retention_days must be between 1 and {MAX_WINDOW_DAYS} when set"
            )));
        }
        Ok(())
    }

    pub fn default_provider(&self) -> &str {
        self.provider_names
            .iter()
            .map(|name| name.trim())
            .find(|name| !name.is_empty())
            .unwrap_or("Blue Cross")
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_hours.min(MAX_SWEEP_INTERVAL_HOURS) * 3600)
    }

    pub fn lookahead(&self) -> chrono::Duration {
        chrono::Duration::days(self.lookahead_days.clamp(0, MAX_WINDOW_DAYS))
    }

    pub fn log_retention(&self) -> Option<chrono::Duration> {
        self.log_retention_days
            .map(|days| chrono::Duration::days(days.clamp(0, MAX_WINDOW_DAYS)))
    }
}

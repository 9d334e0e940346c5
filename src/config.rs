use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::AlertCondition;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_data_dir() -> String {
    "./data".into()
}

fn default_tick_interval_ms() -> u64 {
    5000
}

fn default_start_price() -> f64 {
    100.0
}

fn default_volatility() -> f64 {
    0.02
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub watch: WatchConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub alerts: Vec<AlertSeedConfig>,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

/// Which symbol the scheduler observes, and how often.
#[derive(Debug, Deserialize)]
pub struct WatchConfig {
    pub symbol: String,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Starting point of the simulated walk for the watched symbol.
    #[serde(default = "default_start_price")]
    pub start_price: f64,
}

#[derive(Debug, Deserialize)]
pub struct FeedConfig {
    /// Maximum per-tick move as a fraction (0.02 = ±2%).
    #[serde(default = "default_volatility")]
    pub volatility: f64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            volatility: default_volatility(),
        }
    }
}

/// Alert rule created at startup if no identical rule is already stored.
#[derive(Debug, Deserialize)]
pub struct AlertSeedConfig {
    pub symbol: String,
    pub target_price: f64,
    pub condition: AlertCondition,
    pub note: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_watch(config)?;
    validate_feed(config)?;
    validate_alert_seeds(config)?;
    Ok(())
}

fn validate_watch(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if config.watch.symbol.trim().is_empty() {
        return Err(Report::new(ConfigError::Validation {
            field: "watch.symbol must not be empty".into(),
        }));
    }
    if config.watch.tick_interval_ms == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "watch.tick_interval_ms must be > 0".into(),
        }));
    }
    if !config.watch.start_price.is_finite() || config.watch.start_price <= 0.0 {
        return Err(Report::new(ConfigError::Validation {
            field: format!(
                "watch.start_price must be a finite positive number, got {}",
                config.watch.start_price
            ),
        }));
    }
    Ok(())
}

fn validate_feed(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let v = config.feed.volatility;
    if !v.is_finite() || v <= 0.0 || v >= 1.0 {
        return Err(Report::new(ConfigError::Validation {
            field: format!("feed.volatility must be in (0, 1), got {v}"),
        }));
    }
    Ok(())
}

fn validate_alert_seeds(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    for (i, alert) in config.alerts.iter().enumerate() {
        if alert.symbol.trim().is_empty() {
            return Err(Report::new(ConfigError::Validation {
                field: format!("alerts[{i}].symbol must not be empty"),
            }));
        }
        if !alert.target_price.is_finite() || alert.target_price <= 0.0 {
            return Err(Report::new(ConfigError::Validation {
                field: format!(
                    "alerts[{i}].target_price must be a finite positive number, got {}",
                    alert.target_price
                ),
            }));
        }
    }
    Ok(())
}

//! Advisor configuration.
//!
//! Loaded from a TOML file named by `FIELD_ADVISOR_CONFIG`; every section
//! and field falls back to its default when omitted.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::OPEN_METEO_API_BASE;
use crate::error::ConfigError;
use crate::weather::Location;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "FIELD_ADVISOR_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub forecast: ForecastConfig,
    pub allocator: AllocatorConfig,
}

impl Config {
    /// Load from `FIELD_ADVISOR_CONFIG` if set, otherwise use defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_validated(path),
            None => Ok(Self::default()),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every section and reports all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.engine.validate());
        errors.extend(self.forecast.validate());
        errors.extend(self.allocator.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long the water pump runs on a critical reading.
    pub irrigation_duration_secs: u32,
    /// How long the fertilizer pump runs on a low-nutrient reading.
    pub fertilizer_duration_secs: u32,
    /// Apply the debounce window to the water channel as well.
    pub debounce_irrigation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            irrigation_duration_secs: 420,
            fertilizer_duration_secs: 180,
            debounce_irrigation: true,
        }
    }
}

impl EngineConfig {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.irrigation_duration_secs == 0 {
            errors.push("engine.irrigation_duration_secs must be greater than 0".to_string());
        }
        if self.fertilizer_duration_secs == 0 {
            errors.push("engine.fertilizer_duration_secs must be greater than 0".to_string());
        }
        errors
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub cache_ttl_secs: u64,
    /// Used when a request carries no coordinates.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            base_url: OPEN_METEO_API_BASE.to_string(),
            timeout_secs: 5,
            cache_ttl_secs: 30 * 60,
            latitude: None,
            longitude: None,
        }
    }
}

impl ForecastConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn default_location(&self) -> Option<Location> {
        Some(Location::new(self.latitude?, self.longitude?))
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            errors.push(format!(
                "forecast.base_url must be an http(s) URL, got '{}'",
                self.base_url
            ));
        }
        if self.timeout_secs == 0 || self.timeout_secs > 60 {
            errors.push(format!(
                "forecast.timeout_secs must be between 1 and 60, got {}",
                self.timeout_secs
            ));
        }
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    errors.push(format!("forecast.latitude out of range: {}", lat));
                }
                if !(-180.0..=180.0).contains(&lon) {
                    errors.push(format!("forecast.longitude out of range: {}", lon));
                }
            }
            (None, None) => {}
            _ => errors.push(
                "forecast.latitude and forecast.longitude must be set together".to_string(),
            ),
        }
        errors
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    pub default_budget_liters: f64,
    pub flow_rate_liters_per_minute: f64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            default_budget_liters: 1000.0,
            flow_rate_liters_per_minute: 5.0,
        }
    }
}

impl AllocatorConfig {
    pub fn flow_rate_liters_per_second(&self) -> f64 {
        self.flow_rate_liters_per_minute / 60.0
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(self.default_budget_liters.is_finite() && self.default_budget_liters > 0.0) {
            errors.push(format!(
                "allocator.default_budget_liters must be positive, got {}",
                self.default_budget_liters
            ));
        }
        if !(self.flow_rate_liters_per_minute.is_finite() && self.flow_rate_liters_per_minute > 0.0)
        {
            errors.push(format!(
                "allocator.flow_rate_liters_per_minute must be positive, got {}",
                self.flow_rate_liters_per_minute
            ));
        }
        errors
    }
}

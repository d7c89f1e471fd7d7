//! Error types for the field advisor.
//!
//! Sensor sanitation never fails and forecast failures degrade to a neutral
//! outcome, so the only errors that reach a caller are evaluation faults,
//! invalid allocation requests, and configuration problems.

use std::path::PathBuf;

/// A fault that aborted a Decision Engine evaluation.
///
/// When this is returned no alerts or commands were emitted and the
/// debounce store was left untouched.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    /// The reading was submitted without a device id.
    #[error("device id must not be empty")]
    EmptyDeviceId,

    /// An intermediate metric came out as NaN or infinite.
    #[error("computed {metric} is not a finite number")]
    NonFinite { metric: &'static str },
}

/// An allocation request that cannot produce a consistent plan.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    /// The water budget is zero, negative, or not finite.
    #[error("water budget must be a positive number of liters, got {0}")]
    InvalidBudget(f64),

    /// The pump flow rate is zero, negative, or not finite.
    #[error("flow rate must be a positive number of liters per second, got {0}")]
    InvalidFlowRate(f64),

    /// A zone descriptor carries an unusable value.
    #[error("zone '{zone_id}': {reason}")]
    InvalidZone { zone_id: String, reason: String },
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the config file.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// One or more fields failed validation.
    #[error("invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),
}

/// Why a forecast fetch did not produce a usable probability.
///
/// Kept inside the weather module; callers only ever see the reason text.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ForecastError {
    #[error("forecast request timed out")]
    Timeout,

    #[error("forecast request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("forecast service returned status {0}")]
    Status(u16),

    #[error("forecast response is missing {0}")]
    Malformed(&'static str),
}

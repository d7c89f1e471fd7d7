//! Smart-farm field advisor.
//!
//! Turns soil sensor telemetry and a next-day rain forecast into a graded
//! assessment, alerts, and idempotent irrigation/fertilizer pump commands,
//! and splits a fixed water budget across competing zones.

pub mod allocator;
pub mod config;
pub mod constants;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod formatters;
pub mod models;
pub mod sanitizer;
pub mod scoring;
pub mod service;
pub mod weather;

pub use allocator::ZoneAllocator;
pub use config::Config;
pub use debounce::{DebounceKey, DebounceStore, InMemoryDebounceStore};
pub use engine::{DecisionEngine, Evaluation};
pub use error::{AllocationError, ConfigError, EvaluationError};
pub use models::{
    ActuatorCommand, Alert, AlertKind, AllocationPlan, Channel, PumpStatus, ReasonCode,
    SensorReading, Severity, SoilHealth, ZoneAllocationResult, ZoneDescriptor,
};
pub use sanitizer::{sanitize, RawValue};
pub use scoring::{OptimalRanges, Scorer};
pub use service::FieldAdvisor;
pub use weather::{
    fetch_bounded, CachedForecastProvider, Forecast, ForecastOutcome, ForecastProvider, Location,
    OpenMeteoProvider, WeatherGate,
};

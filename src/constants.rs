/// User agent string for HTTP requests
pub const USER_AGENT: &str = "mcp-field-advisor/0.1.0";

/// Open-Meteo API base URL
pub const OPEN_METEO_API_BASE: &str = "https://api.open-meteo.com/v1";

// ============================================================================
// Decision thresholds
// ============================================================================

/// Moisture (%) below which irrigation is critical
pub const MOISTURE_CRITICAL: f64 = 45.0;

/// Moisture (%) below which irrigation is imminent
pub const MOISTURE_LOW: f64 = 50.0;

/// Moisture (%) above which the water pump is held off
pub const MOISTURE_HIGH: f64 = 80.0;

/// Stress level above which irrigation is critical regardless of moisture
pub const STRESS_CRITICAL: f64 = 80.0;

/// Acceptable soil pH window for alerting
pub const PH_ALERT_MIN: f64 = 5.8;
pub const PH_ALERT_MAX: f64 = 7.2;

/// EC (µS/cm) above which salinity is critical
pub const EC_SALINITY_MAX: f64 = 2000.0;

/// EC (µS/cm) below which the soil is considered nutrient-poor
pub const EC_LOW_NUTRIENT: f64 = 1000.0;

/// Nutrient floors (mg/kg) used to name deficient nutrients
pub const NITROGEN_FLOOR: f64 = 130.0;
pub const PHOSPHORUS_FLOOR: f64 = 30.0;
pub const POTASSIUM_FLOOR: f64 = 150.0;

// ============================================================================
// Weather gate thresholds
// ============================================================================

/// Rain sensor intensity (0-100) above which rain is falling now
pub const RAIN_IMMEDIATE: f64 = 20.0;

/// Rain sensor intensity (0-100) above which the rain is heavy
pub const RAIN_HEAVY: f64 = 80.0;

/// Next-day rain probability (%) above which irrigation is suppressed
pub const RAIN_SUPPRESS_PROBABILITY: f64 = 50.0;

/// Next-day rain probability (%) above which an advisory is surfaced
pub const RAIN_ADVISORY_PROBABILITY: f64 = 30.0;

/// Next-day rain probability (%) at or above which fertilizing is deferred
pub const RAIN_DEFER_FERTILIZER_PROBABILITY: f64 = 70.0;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================================
// Open-Meteo API Models
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct OpenMeteoResponse {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub timezone: Option<String>,
    pub daily: DailyPrecipitation,
}

#[derive(Debug, Deserialize)]
pub struct DailyPrecipitation {
    pub time: Vec<String>,
    #[serde(rename = "precipitation_probability_max")]
    pub rain_probability_max: Vec<Option<f64>>,
}

// ============================================================================
// Telemetry Models
// ============================================================================

/// One sanitized sensor sample. Every field is optional; an absent field is
/// skipped by every computation that would need it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SensorReading {
    pub moisture: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    /// Rain sensor intensity, 0-100.
    pub rain: Option<f64>,
    pub nitrogen: Option<f64>,
    pub phosphorus: Option<f64>,
    pub potassium: Option<f64>,
    #[serde(rename = "pH")]
    pub ph: Option<f64>,
    /// µS/cm
    pub electrical_conductivity: Option<f64>,
    pub light_intensity: Option<f64>,
}

/// Graded soil condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoilHealth {
    Excellent,
    Good,
    Fair,
    Poor,
    Unknown,
}

impl std::fmt::Display for SoilHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SoilHealth::Excellent => "excellent",
            SoilHealth::Good => "good",
            SoilHealth::Fair => "fair",
            SoilHealth::Poor => "poor",
            SoilHealth::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Alert Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

/// Machine-readable alert tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    RainDetected,
    HeavyRain,
    MoistureCritical,
    MoistureLow,
    MoistureHigh,
    IrrigationWithheld,
    RainForecast,
    PhWarning,
    SalinityCritical,
    FertilizerWithheld,
    FertilizerDeferred,
    NutrientLow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: Severity,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(
        severity: Severity,
        kind: AlertKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind,
            title: title.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Actuation Models
// ============================================================================

/// One of the two independently controlled pumps on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Water,
    Fertilizer,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Water => f.write_str("WATER"),
            Channel::Fertilizer => f.write_str("FERTILIZER"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PumpStatus {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    MoistureCritical,
    RainDetected,
    NutrientLow,
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ReasonCode::MoistureCritical => "MOISTURE_CRITICAL",
            ReasonCode::RainDetected => "RAIN_DETECTED",
            ReasonCode::NutrientLow => "NUTRIENT_LOW",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuatorCommand {
    pub channel: Channel,
    pub status: PumpStatus,
    pub duration_seconds: u32,
    pub reason_code: ReasonCode,
}

impl ActuatorCommand {
    pub fn on(channel: Channel, duration_seconds: u32, reason_code: ReasonCode) -> Self {
        Self {
            channel,
            status: PumpStatus::On,
            duration_seconds,
            reason_code,
        }
    }

    pub fn off(channel: Channel, reason_code: ReasonCode) -> Self {
        Self {
            channel,
            status: PumpStatus::Off,
            duration_seconds: 0,
            reason_code,
        }
    }

    pub fn is_on(&self) -> bool {
        self.status == PumpStatus::On
    }
}

// ============================================================================
// Zone Allocation Models
// ============================================================================

fn default_current_moisture() -> f64 {
    50.0
}

fn default_target_moisture() -> f64 {
    60.0
}

fn default_area() -> f64 {
    100.0
}

fn default_crop_priority() -> f64 {
    5.0
}

fn default_drying_rate() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ZoneDescriptor {
    pub zone_id: String,
    #[serde(default = "default_current_moisture")]
    pub current_moisture: f64,
    #[serde(default = "default_target_moisture")]
    pub target_moisture: f64,
    #[serde(default = "default_area", alias = "area")]
    pub area_square_meters: f64,
    /// Crop importance, 1-10.
    #[serde(default = "default_crop_priority", alias = "cropPriority")]
    pub crop_priority_weight: f64,
    #[serde(default = "default_drying_rate")]
    pub drying_rate: f64,
}

impl ZoneDescriptor {
    pub fn new(zone_id: impl Into<String>) -> Self {
        Self {
            zone_id: zone_id.into(),
            current_moisture: default_current_moisture(),
            target_moisture: default_target_moisture(),
            area_square_meters: default_area(),
            crop_priority_weight: default_crop_priority(),
            drying_rate: default_drying_rate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneAllocationResult {
    pub zone_id: String,
    pub water_liters: f64,
    pub water_needed_liters: f64,
    pub deficit: f64,
    pub duration_seconds: u64,
    pub priority_score: f64,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationPlan {
    /// Per-zone results, highest priority first.
    pub allocations: Vec<ZoneAllocationResult>,
    pub water_budget_liters: f64,
    pub total_water_used: f64,
    /// `total_water_used / water_budget_liters`
    pub efficiency: f64,
}

// ============================================================================
// MCP Tool Request Models
// ============================================================================

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InterpretRequest {
    pub device_id: String,
    /// Raw sensor payload; values may be numbers, numeric strings, or "N/A".
    pub sensor_data: serde_json::Map<String, serde_json::Value>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllocateWaterRequest {
    pub zones: Vec<ZoneDescriptor>,
    pub water_budget_liters: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RainOutlookRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Current rain sensor intensity, 0-100.
    pub rain: Option<f64>,
}

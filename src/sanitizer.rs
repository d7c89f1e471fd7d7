//! Normalizes raw sensor payloads into typed readings.
//!
//! Collectors send whatever the firmware produced: numbers, numeric strings,
//! `"N/A"`, `null`, or nothing at all. Everything is resolved here so the rest
//! of the crate only sees `Option<f64>`.

use serde_json::{Map, Value};

use crate::models::SensorReading;

/// Markers firmware uses for "no value".
const ABSENT_MARKERS: [&str; 3] = ["N/A", "null", ""];

/// A single raw field after classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    Absent,
    Number(f64),
}

impl RawValue {
    pub fn into_option(self) -> Option<f64> {
        match self {
            RawValue::Absent => None,
            RawValue::Number(n) => Some(n),
        }
    }
}

impl From<&Value> for RawValue {
    fn from(value: &Value) -> Self {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_text(s),
            _ => None,
        };
        match parsed {
            Some(n) if n.is_finite() => RawValue::Number(n),
            _ => RawValue::Absent,
        }
    }
}

fn parse_text(text: &str) -> Option<f64> {
    let text = text.trim();
    if ABSENT_MARKERS.contains(&text) {
        return None;
    }
    text.parse::<f64>().ok()
}

fn field(raw: &Map<String, Value>, name: &str) -> Option<f64> {
    raw.get(name).map(RawValue::from).and_then(RawValue::into_option)
}

/// Canonical field first, then a short alias used by some firmware.
fn field_or_alias(raw: &Map<String, Value>, name: &str, alias: &str) -> Option<f64> {
    field(raw, name).or_else(|| field(raw, alias))
}

/// Builds a [`SensorReading`] from an arbitrary field map. Never fails.
pub fn sanitize(raw: &Map<String, Value>) -> SensorReading {
    SensorReading {
        moisture: field(raw, "moisture"),
        temperature: field_or_alias(raw, "temperature", "temp"),
        humidity: field(raw, "humidity"),
        rain: field(raw, "rain"),
        nitrogen: field(raw, "nitrogen"),
        phosphorus: field(raw, "phosphorus"),
        potassium: field(raw, "potassium"),
        ph: field(raw, "pH"),
        electrical_conductivity: field_or_alias(raw, "electricalConductivity", "ec"),
        light_intensity: field(raw, "lightIntensity"),
    }
}

//! The decision engine: one reading in, alerts and pump commands out.
//!
//! Evaluation order is fixed:
//!
//! 1. Sanitize and score the reading, build the weather gate.
//! 2. Immediate rain alert.
//! 3. Moisture/stress branch (critical, low, high; first match wins).
//! 4. Next-day rain advisory.
//! 5. Nutrient branch (pH, salinity, low EC), independent of step 3.
//!
//! Steps 2-5 only build a plan. Debounce windows are claimed after the plan
//! is complete, so a failed evaluation never touches the store, and a
//! window lost to a concurrent evaluation drops its alert and command
//! together. An OFF command closes its channel's window.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};

use crate::config::EngineConfig;
use crate::constants::{
    EC_LOW_NUTRIENT, EC_SALINITY_MAX, MOISTURE_CRITICAL, MOISTURE_HIGH, MOISTURE_LOW,
    NITROGEN_FLOOR, PHOSPHORUS_FLOOR, PH_ALERT_MAX, PH_ALERT_MIN, POTASSIUM_FLOOR,
    RAIN_ADVISORY_PROBABILITY, RAIN_DEFER_FERTILIZER_PROBABILITY, STRESS_CRITICAL,
};
use crate::debounce::{DebounceKey, DebounceStore};
use crate::error::EvaluationError;
use crate::models::{
    ActuatorCommand, Alert, AlertKind, Channel, ReasonCode, SensorReading, Severity, SoilHealth,
};
use crate::sanitizer::sanitize;
use crate::scoring::{recommendation, Scorer};
use crate::weather::{ForecastOutcome, WeatherGate};

/// Everything the engine decided for one reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub device_id: String,
    pub soil_health: SoilHealth,
    pub stress_level: f64,
    pub moisture_loss_rate: f64,
    pub recommendation: String,
    pub alerts: Vec<Alert>,
    pub recommend_action: bool,
    pub commands: Vec<ActuatorCommand>,
    /// First command, kept for consumers that expect a single action.
    pub action: Option<ActuatorCommand>,
    pub weather: WeatherGate,
    #[serde(with = "time::serde::rfc3339")]
    pub evaluated_at: OffsetDateTime,
}

enum Step {
    Alert(Alert),
    Command(ActuatorCommand),
    /// Emitted only if the channel's debounce window can be claimed.
    Guarded {
        alert: Alert,
        command: ActuatorCommand,
    },
}

pub struct DecisionEngine {
    config: EngineConfig,
    scorer: Scorer,
    store: Arc<dyn DebounceStore>,
}

impl DecisionEngine {
    pub fn new(config: EngineConfig, store: Arc<dyn DebounceStore>) -> Self {
        Self {
            config,
            scorer: Scorer::default(),
            store,
        }
    }

    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Evaluates a raw payload as received from a collector.
    pub fn evaluate(
        &self,
        device_id: &str,
        raw: &Map<String, Value>,
        forecast: &ForecastOutcome,
        now: OffsetDateTime,
    ) -> Result<Evaluation, EvaluationError> {
        let reading = sanitize(raw);
        self.evaluate_reading(device_id, &reading, forecast, now)
    }

    pub fn evaluate_reading(
        &self,
        device_id: &str,
        reading: &SensorReading,
        forecast: &ForecastOutcome,
        now: OffsetDateTime,
    ) -> Result<Evaluation, EvaluationError> {
        if device_id.trim().is_empty() {
            return Err(EvaluationError::EmptyDeviceId);
        }

        let scores = self.scorer.score(reading);
        ensure_finite("stress level", scores.stress_level)?;
        ensure_finite("moisture loss rate", scores.moisture_loss_rate)?;

        let gate = WeatherGate::evaluate(forecast, reading.rain);

        tracing::debug!(
            "{}: soil={} stress={:.1} loss={:.2}%/h rain_prob={:.0}% raining={}",
            device_id,
            scores.soil_health,
            scores.stress_level,
            scores.moisture_loss_rate,
            gate.next_day_rain_probability,
            gate.immediate_rain_detected
        );

        let mut steps = Vec::new();
        rain_alert(reading, &gate, &mut steps);
        self.moisture_branch(reading, scores.stress_level, &gate, &mut steps);
        forecast_advisory(&gate, &mut steps);
        self.nutrient_branch(reading, &gate, &mut steps);

        let (alerts, commands) = self.commit(device_id, steps, now);
        let recommend_action = commands.iter().any(ActuatorCommand::is_on);

        for command in &commands {
            tracing::info!(
                "{}: {} pump {:?} for {}s ({:?})",
                device_id,
                command.channel,
                command.status,
                command.duration_seconds,
                command.reason_code
            );
        }

        Ok(Evaluation {
            device_id: device_id.to_string(),
            soil_health: scores.soil_health,
            stress_level: scores.stress_level,
            moisture_loss_rate: scores.moisture_loss_rate,
            recommendation: recommendation(scores.soil_health, scores.stress_level).to_string(),
            action: commands.first().copied(),
            alerts,
            recommend_action,
            commands,
            weather: gate,
            evaluated_at: now,
        })
    }

    fn moisture_branch(
        &self,
        reading: &SensorReading,
        stress: f64,
        gate: &WeatherGate,
        steps: &mut Vec<Step>,
    ) {
        let moisture = reading.moisture;

        if moisture.is_some_and(|m| m < MOISTURE_CRITICAL) || stress > STRESS_CRITICAL {
            if gate.should_suppress_irrigation {
                steps.push(Step::Alert(Alert::new(
                    Severity::Info,
                    AlertKind::IrrigationWithheld,
                    "Irrigation Withheld",
                    format!(
                        "{} is critical but irrigation is withheld: {}.",
                        describe_moisture(moisture, stress),
                        suppression_reason(gate)
                    ),
                )));
                steps.push(Step::Command(ActuatorCommand::off(
                    Channel::Water,
                    ReasonCode::RainDetected,
                )));
                return;
            }

            let duration = self.config.irrigation_duration_secs;
            let alert = Alert::new(
                Severity::Critical,
                AlertKind::MoistureCritical,
                "Critical Soil Moisture",
                format!(
                    "{} is critical. Irrigating for {} seconds.",
                    describe_moisture(moisture, stress),
                    duration
                ),
            );
            let command = ActuatorCommand::on(Channel::Water, duration, ReasonCode::MoistureCritical);

            if self.config.debounce_irrigation {
                steps.push(Step::Guarded { alert, command });
            } else {
                steps.push(Step::Alert(alert));
                steps.push(Step::Command(command));
            }
            return;
        }

        let Some(m) = moisture else {
            return;
        };

        if m < MOISTURE_LOW {
            if gate.should_suppress_irrigation {
                steps.push(Step::Alert(Alert::new(
                    Severity::Info,
                    AlertKind::IrrigationWithheld,
                    "Irrigation Withheld",
                    format!(
                        "Soil moisture is low at {:.1}% but irrigation is withheld: {}.",
                        m,
                        suppression_reason(gate)
                    ),
                )));
            } else {
                steps.push(Step::Alert(Alert::new(
                    Severity::Warning,
                    AlertKind::MoistureLow,
                    "Low Soil Moisture",
                    format!("Soil moisture is low at {:.1}%. Irrigation is imminent.", m),
                )));
            }
        } else if m > MOISTURE_HIGH {
            steps.push(Step::Alert(Alert::new(
                Severity::Info,
                AlertKind::MoistureHigh,
                "High Soil Moisture",
                format!("Soil moisture is high at {:.1}%. Water pump held off.", m),
            )));
        }
    }

    fn nutrient_branch(&self, reading: &SensorReading, gate: &WeatherGate, steps: &mut Vec<Step>) {
        if let Some(ph) = reading.ph {
            if !(PH_ALERT_MIN..=PH_ALERT_MAX).contains(&ph) {
                steps.push(Step::Alert(Alert::new(
                    Severity::Warning,
                    AlertKind::PhWarning,
                    "pH Out of Range",
                    format!(
                        "Soil pH is {:.1}; acceptable range is {:.1}-{:.1}.",
                        ph, PH_ALERT_MIN, PH_ALERT_MAX
                    ),
                )));
            }
        }

        let Some(ec) = reading.electrical_conductivity else {
            return;
        };

        if ec > EC_SALINITY_MAX {
            steps.push(Step::Alert(Alert::new(
                Severity::Critical,
                AlertKind::SalinityCritical,
                "High Soil Salinity",
                format!(
                    "EC is {:.0} \u{00b5}S/cm, above {:.0}. Do not fertilize; flush with clean water.",
                    ec, EC_SALINITY_MAX
                ),
            )));
            return;
        }

        if ec >= EC_LOW_NUTRIENT {
            return;
        }

        if gate.immediate_rain_detected {
            steps.push(Step::Alert(Alert::new(
                Severity::Info,
                AlertKind::FertilizerWithheld,
                "Fertilizer Withheld",
                format!(
                    "EC is low at {:.0} \u{00b5}S/cm but it is raining; dosing would wash out.",
                    ec
                ),
            )));
            steps.push(Step::Command(ActuatorCommand::off(
                Channel::Fertilizer,
                ReasonCode::RainDetected,
            )));
            return;
        }

        if gate.next_day_rain_probability >= RAIN_DEFER_FERTILIZER_PROBABILITY {
            steps.push(Step::Alert(Alert::new(
                Severity::Info,
                AlertKind::FertilizerDeferred,
                "Fertilizer Deferred",
                format!(
                    "EC is low at {:.0} \u{00b5}S/cm. {:.0}% chance of rain tomorrow; dosing deferred.",
                    ec, gate.next_day_rain_probability
                ),
            )));
            return;
        }

        let duration = self.config.fertilizer_duration_secs;
        let deficient = deficient_nutrients(reading);
        let message = if deficient.is_empty() {
            format!(
                "EC is low at {:.0} \u{00b5}S/cm. Dosing fertilizer for {} seconds.",
                ec, duration
            )
        } else {
            format!(
                "EC is low at {:.0} \u{00b5}S/cm. Deficient: {}. Dosing fertilizer for {} seconds.",
                ec,
                deficient.join(", "),
                duration
            )
        };

        steps.push(Step::Guarded {
            alert: Alert::new(Severity::Warning, AlertKind::NutrientLow, "Low Nutrients", message),
            command: ActuatorCommand::on(Channel::Fertilizer, duration, ReasonCode::NutrientLow),
        });
    }

    fn commit(
        &self,
        device_id: &str,
        steps: Vec<Step>,
        now: OffsetDateTime,
    ) -> (Vec<Alert>, Vec<ActuatorCommand>) {
        let mut alerts = Vec::new();
        let mut commands = Vec::new();

        for step in steps {
            match step {
                Step::Alert(alert) => alerts.push(alert),
                Step::Command(command) => {
                    if !command.is_on() {
                        let key = DebounceKey::new(device_id, command.channel);
                        self.store.release(&key, now);
                    }
                    commands.push(command);
                }
                Step::Guarded { alert, command } => {
                    let key = DebounceKey::new(device_id, command.channel);
                    let window = Duration::seconds(i64::from(command.duration_seconds));
                    if self.store.try_activate(&key, now, window) {
                        alerts.push(alert);
                        commands.push(command);
                    } else {
                        tracing::debug!(
                            "{}: {} already running, suppressing duplicate",
                            device_id,
                            command.channel
                        );
                    }
                }
            }
        }

        (alerts, commands)
    }
}

fn rain_alert(reading: &SensorReading, gate: &WeatherGate, steps: &mut Vec<Step>) {
    if !gate.immediate_rain_detected {
        return;
    }
    let intensity = reading.rain.unwrap_or_default();
    let alert = if gate.is_heavy_rain {
        Alert::new(
            Severity::Warning,
            AlertKind::HeavyRain,
            "Heavy Rain Detected",
            format!(
                "Heavy rain (intensity {:.0}). All pumps are held off; check drainage.",
                intensity
            ),
        )
    } else {
        Alert::new(
            Severity::Warning,
            AlertKind::RainDetected,
            "Rain Detected",
            format!("Rain detected (intensity {:.0}). Pumps are held off.", intensity),
        )
    };
    steps.push(Step::Alert(alert));
}

fn forecast_advisory(gate: &WeatherGate, steps: &mut Vec<Step>) {
    if gate.next_day_rain_probability > RAIN_ADVISORY_PROBABILITY && !gate.immediate_rain_detected {
        steps.push(Step::Alert(Alert::new(
            Severity::Info,
            AlertKind::RainForecast,
            "Rain Forecast",
            format!(
                "{:.0}% chance of rain tomorrow.",
                gate.next_day_rain_probability
            ),
        )));
    }
}

fn deficient_nutrients(reading: &SensorReading) -> Vec<String> {
    [
        ("nitrogen", reading.nitrogen, NITROGEN_FLOOR),
        ("phosphorus", reading.phosphorus, PHOSPHORUS_FLOOR),
        ("potassium", reading.potassium, POTASSIUM_FLOOR),
    ]
    .into_iter()
    .filter_map(|(name, value, floor)| {
        value
            .filter(|v| *v < floor)
            .map(|v| format!("{} {:.0} mg/kg (min {:.0})", name, v, floor))
    })
    .collect()
}

fn describe_moisture(moisture: Option<f64>, stress: f64) -> String {
    match moisture {
        Some(m) => format!("Soil moisture at {:.1}% (stress {:.0})", m, stress),
        None => format!("Plant stress at {:.0}", stress),
    }
}

fn suppression_reason(gate: &WeatherGate) -> String {
    if gate.immediate_rain_detected {
        "rain detected".to_string()
    } else {
        format!(
            "{:.0}% chance of rain tomorrow",
            gate.next_day_rain_probability
        )
    }
}

fn ensure_finite(metric: &'static str, value: f64) -> Result<(), EvaluationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EvaluationError::NonFinite { metric })
    }
}

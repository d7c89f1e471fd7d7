//! End-to-end scenarios: raw payloads through the advisor.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use time::OffsetDateTime;

use mcp_field_advisor::config::EngineConfig;
use mcp_field_advisor::models::{AllocateWaterRequest, InterpretRequest};
use mcp_field_advisor::{
    ActuatorCommand, Channel, Config, DebounceKey, DebounceStore, DecisionEngine, FieldAdvisor,
    Forecast, ForecastOutcome, ForecastProvider, InMemoryDebounceStore, Location, ReasonCode,
    Severity, ZoneDescriptor,
};

struct FixedForecast(ForecastOutcome);

#[async_trait]
impl ForecastProvider for FixedForecast {
    async fn get_forecast(&self, _location: Location) -> ForecastOutcome {
        self.0.clone()
    }
}

struct HangingForecast;

#[async_trait]
impl ForecastProvider for HangingForecast {
    async fn get_forecast(&self, _location: Location) -> ForecastOutcome {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        ForecastOutcome::Available(Forecast::new(100.0))
    }
}

fn payload(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {}", other),
    }
}

fn t0() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_760_000_000).unwrap()
}

fn advisor(provider: impl ForecastProvider + 'static) -> FieldAdvisor {
    FieldAdvisor::with_provider(
        Config::default(),
        Arc::new(provider),
        Arc::new(InMemoryDebounceStore::new()),
    )
    .unwrap()
}

#[test]
fn messy_payload_still_produces_a_decision() {
    let engine = DecisionEngine::new(EngineConfig::default(), Arc::new(InMemoryDebounceStore::new()));
    let raw = payload(json!({
        "moisture": "30",
        "temp": "N/A",
        "humidity": "",
        "pH": "null",
        "ec": "n/a",
        "lightIntensity": { "nested": true },
    }));

    let eval = engine
        .evaluate("greenhouse-1", &raw, &ForecastOutcome::unavailable("offline"), t0())
        .unwrap();

    assert_eq!(eval.alerts[0].severity, Severity::Critical);
    assert_eq!(
        eval.action,
        Some(ActuatorCommand::on(Channel::Water, 420, ReasonCode::MoistureCritical))
    );
    assert!(!eval.weather.forecast_available);
}

#[test]
fn concurrent_readings_dose_once() {
    let store = Arc::new(InMemoryDebounceStore::new());
    let engine = DecisionEngine::new(EngineConfig::default(), store.clone());
    let raw = payload(json!({ "ec": 900, "nitrogen": 80 }));
    let forecast = ForecastOutcome::Available(Forecast::new(10.0));

    let doses: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    engine
                        .evaluate("bed-7", &raw, &forecast, t0())
                        .unwrap()
                        .commands
                        .iter()
                        .filter(|c| c.channel == Channel::Fertilizer && c.is_on())
                        .count()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(doses, 1);
    assert_eq!(
        store.active_until(&DebounceKey::new("bed-7", Channel::Fertilizer)),
        Some(t0() + time::Duration::seconds(180))
    );
}

#[test]
fn devices_do_not_share_windows() {
    let engine = DecisionEngine::new(EngineConfig::default(), Arc::new(InMemoryDebounceStore::new()));
    let raw = payload(json!({ "electricalConductivity": 700 }));
    let forecast = ForecastOutcome::Available(Forecast::new(0.0));

    let a = engine.evaluate("dev-a", &raw, &forecast, t0()).unwrap();
    let b = engine.evaluate("dev-b", &raw, &forecast, t0()).unwrap();
    assert!(a.recommend_action);
    assert!(b.recommend_action);
}

#[tokio::test]
async fn advisor_uses_forecast_to_withhold_irrigation() {
    let advisor = advisor(FixedForecast(ForecastOutcome::Available(Forecast::new(80.0))));
    let request = InterpretRequest {
        device_id: "field-3".to_string(),
        sensor_data: payload(json!({ "moisture": 30 })),
        latitude: Some(11.56),
        longitude: Some(104.92),
    };

    let eval = advisor.interpret(request).await.unwrap();

    assert_eq!(
        eval.commands,
        vec![ActuatorCommand::off(Channel::Water, ReasonCode::RainDetected)]
    );
    assert!(!eval.recommend_action);
    assert_eq!(eval.weather.next_day_rain_probability, 80.0);
}

#[tokio::test]
async fn advisor_without_location_assumes_dry() {
    let advisor = advisor(FixedForecast(ForecastOutcome::Available(Forecast::new(95.0))));
    let request = InterpretRequest {
        device_id: "field-3".to_string(),
        sensor_data: payload(json!({ "moisture": 30 })),
        latitude: None,
        longitude: None,
    };

    let eval = advisor.interpret(request).await.unwrap();

    assert!(!eval.weather.forecast_available);
    assert!(eval.recommend_action);
}

#[tokio::test(start_paused = true)]
async fn hanging_forecast_times_out_to_neutral() {
    let advisor = advisor(HangingForecast);
    let request = InterpretRequest {
        device_id: "field-9".to_string(),
        sensor_data: payload(json!({ "moisture": 30 })),
        latitude: Some(0.0),
        longitude: Some(0.0),
    };

    let eval = advisor.interpret(request).await.unwrap();

    assert_eq!(eval.weather.next_day_rain_probability, 0.0);
    assert!(eval.commands.iter().any(|c| c.channel == Channel::Water && c.is_on()));
}

#[tokio::test]
async fn advisor_rejects_blank_device() {
    let advisor = advisor(FixedForecast(ForecastOutcome::unavailable("unused")));
    let request = InterpretRequest {
        device_id: String::new(),
        sensor_data: payload(json!({ "moisture": 30 })),
        latitude: None,
        longitude: None,
    };

    assert!(advisor.interpret(request).await.is_err());
}

#[test]
fn advisor_allocates_with_configured_budget() {
    let advisor = advisor(FixedForecast(ForecastOutcome::unavailable("unused")));
    let mut north = ZoneDescriptor::new("north");
    north.current_moisture = 20.0;
    north.area_square_meters = 30.0;
    let mut south = ZoneDescriptor::new("south");
    south.current_moisture = 55.0;

    let plan = advisor
        .allocate(&AllocateWaterRequest {
            zones: vec![south, north],
            water_budget_liters: None,
        })
        .unwrap();

    // north: deficit 40, 1200 L needed, score 200; south: deficit 5, 500 L, score 25.
    assert_eq!(plan.water_budget_liters, 1000.0);
    assert_eq!(plan.allocations[0].zone_id, "north");
    assert_eq!(plan.allocations[0].water_liters, 1000.0);
    assert_eq!(plan.allocations[1].water_liters, 0.0);
    assert_eq!(plan.efficiency, 1.0);
}

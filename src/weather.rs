//! Rain forecast collaborator and the weather gate built on top of it.
//!
//! A forecast fetch can time out, return a non-2xx status, or send back a
//! body we cannot read. None of that is an error for the caller: the outcome
//! becomes [`ForecastOutcome::Unavailable`] and the gate treats it as a 0%
//! chance of rain.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::constants::{RAIN_HEAVY, RAIN_IMMEDIATE, RAIN_SUPPRESS_PROBABILITY, USER_AGENT};
use crate::error::ForecastError;
use crate::models::OpenMeteoResponse;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    fn cache_key(&self) -> String {
        format!("{:.3},{:.3}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    /// 0-100
    pub next_day_rain_probability: f64,
}

impl Forecast {
    pub fn new(next_day_rain_probability: f64) -> Self {
        let probability = if next_day_rain_probability.is_finite() {
            next_day_rain_probability.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            next_day_rain_probability: probability,
        }
    }
}

/// Result of asking the collaborator for a forecast.
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastOutcome {
    Available(Forecast),
    Unavailable(String),
}

impl ForecastOutcome {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        ForecastOutcome::Unavailable(reason.into())
    }

    pub fn rain_probability(&self) -> f64 {
        match self {
            ForecastOutcome::Available(f) => f.next_day_rain_probability,
            ForecastOutcome::Unavailable(_) => 0.0,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ForecastOutcome::Available(_))
    }
}

/// Anything that can answer "will it rain tomorrow here?".
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn get_forecast(&self, location: Location) -> ForecastOutcome;
}

/// Calls `provider` but gives up after `limit`.
pub async fn fetch_bounded(
    provider: &dyn ForecastProvider,
    location: Location,
    limit: Duration,
) -> ForecastOutcome {
    match tokio::time::timeout(limit, provider.get_forecast(location)).await {
        Ok(outcome) => {
            if let ForecastOutcome::Unavailable(reason) = &outcome {
                tracing::warn!("Forecast unavailable, assuming no rain: {}", reason);
            }
            outcome
        }
        Err(_) => {
            tracing::warn!(
                "Forecast for {:.3}, {:.3} timed out after {:?}, assuming no rain",
                location.latitude,
                location.longitude,
                limit
            );
            ForecastOutcome::unavailable(ForecastError::Timeout.to_string())
        }
    }
}

// ============================================================================
// Weather gate
// ============================================================================

/// Forecast and rain sensor fused into the signals the engine acts on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherGate {
    pub next_day_rain_probability: f64,
    pub forecast_available: bool,
    pub immediate_rain_detected: bool,
    pub is_heavy_rain: bool,
    pub should_suppress_irrigation: bool,
}

impl WeatherGate {
    pub fn evaluate(forecast: &ForecastOutcome, rain_intensity: Option<f64>) -> Self {
        let next_day_rain_probability = forecast.rain_probability();
        let immediate_rain_detected = rain_intensity.is_some_and(|r| r > RAIN_IMMEDIATE);
        let is_heavy_rain = rain_intensity.is_some_and(|r| r > RAIN_HEAVY);

        Self {
            next_day_rain_probability,
            forecast_available: forecast.is_available(),
            immediate_rain_detected,
            is_heavy_rain,
            should_suppress_irrigation: next_day_rain_probability > RAIN_SUPPRESS_PROBABILITY
                || immediate_rain_detected,
        }
    }
}

// ============================================================================
// Open-Meteo provider
// ============================================================================

/// Next-day rain probability from Open-Meteo's daily forecast.
#[derive(Clone)]
pub struct OpenMeteoProvider {
    client: Arc<Client>,
    base_url: String,
}

impl OpenMeteoProvider {
    /// Creates a provider against `base_url` (normally the public Open-Meteo API)
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Makes an HTTP GET request and deserializes the JSON response
    async fn make_request<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, ForecastError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(ForecastError::Status(response.status().as_u16()));
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    async fn fetch(&self, location: Location) -> Result<Forecast, ForecastError> {
        let url = format!(
            "{}/forecast?latitude={}&longitude={}&daily=precipitation_probability_max&timezone=auto&forecast_days=2",
            self.base_url, location.latitude, location.longitude
        );

        let response = self.make_request::<OpenMeteoResponse>(&url).await?;
        tomorrow_rain_probability(&response).map(Forecast::new)
    }
}

#[async_trait]
impl ForecastProvider for OpenMeteoProvider {
    async fn get_forecast(&self, location: Location) -> ForecastOutcome {
        tracing::debug!(
            "Fetching Open-Meteo forecast for {}, {}",
            location.latitude,
            location.longitude
        );

        match self.fetch(location).await {
            Ok(forecast) => ForecastOutcome::Available(forecast),
            Err(e) => ForecastOutcome::unavailable(e.to_string()),
        }
    }
}

/// Tomorrow is the second daily entry; today's is index 0.
fn tomorrow_rain_probability(response: &OpenMeteoResponse) -> Result<f64, ForecastError> {
    response
        .daily
        .rain_probability_max
        .get(1)
        .copied()
        .flatten()
        .ok_or(ForecastError::Malformed("tomorrow's precipitation probability"))
}

// ============================================================================
// Caching
// ============================================================================

/// Reuses an available forecast per location for `ttl`.
pub struct CachedForecastProvider<P> {
    inner: P,
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Forecast)>>,
}

impl<P: ForecastProvider> CachedForecastProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<P: ForecastProvider> ForecastProvider for CachedForecastProvider<P> {
    async fn get_forecast(&self, location: Location) -> ForecastOutcome {
        let key = location.cache_key();

        {
            let entries = self.entries.lock().await;
            if let Some((fetched_at, forecast)) = entries.get(&key) {
                if fetched_at.elapsed() < self.ttl {
                    tracing::debug!("Forecast cache hit for {}", key);
                    return ForecastOutcome::Available(*forecast);
                }
            }
        }

        let outcome = self.inner.get_forecast(location).await;
        if let ForecastOutcome::Available(forecast) = &outcome {
            self.entries
                .lock()
                .await
                .insert(key, (Instant::now(), *forecast));
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        outcome: ForecastOutcome,
    }

    #[async_trait]
    impl ForecastProvider for Counting {
        async fn get_forecast(&self, _location: Location) -> ForecastOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    struct Stalled;

    #[async_trait]
    impl ForecastProvider for Stalled {
        async fn get_forecast(&self, _location: Location) -> ForecastOutcome {
            tokio::time::sleep(Duration::from_secs(60)).await;
            ForecastOutcome::Available(Forecast::new(90.0))
        }
    }

    #[test]
    fn gate_suppresses_on_forecast_or_rain() {
        let dry = WeatherGate::evaluate(&ForecastOutcome::Available(Forecast::new(20.0)), Some(5.0));
        assert!(!dry.should_suppress_irrigation);
        assert!(!dry.immediate_rain_detected);

        let likely = WeatherGate::evaluate(&ForecastOutcome::Available(Forecast::new(51.0)), None);
        assert!(likely.should_suppress_irrigation);

        let raining = WeatherGate::evaluate(&ForecastOutcome::unavailable("down"), Some(85.0));
        assert!(raining.should_suppress_irrigation);
        assert!(raining.immediate_rain_detected);
        assert!(raining.is_heavy_rain);
        assert!(!raining.forecast_available);
        assert_eq!(raining.next_day_rain_probability, 0.0);
    }

    #[test]
    fn gate_boundaries_are_exclusive() {
        let gate = WeatherGate::evaluate(&ForecastOutcome::Available(Forecast::new(50.0)), Some(20.0));
        assert!(!gate.should_suppress_irrigation);
        assert!(!gate.immediate_rain_detected);
    }

    #[test]
    fn forecast_probability_is_clamped() {
        assert_eq!(Forecast::new(140.0).next_day_rain_probability, 100.0);
        assert_eq!(Forecast::new(f64::NAN).next_day_rain_probability, 0.0);
    }

    #[test]
    fn parses_tomorrow_from_open_meteo() {
        let body = r#"{
            "latitude": 11.56, "longitude": 104.92, "timezone": "Asia/Phnom_Penh",
            "daily": { "time": ["2026-10-18", "2026-10-19"],
                       "precipitation_probability_max": [10, 75] }
        }"#;
        let response: OpenMeteoResponse = serde_json::from_str(body).unwrap();
        assert_eq!(tomorrow_rain_probability(&response).unwrap(), 75.0);
    }

    #[test]
    fn missing_tomorrow_is_malformed() {
        let body = r#"{
            "latitude": 0.0, "longitude": 0.0,
            "daily": { "time": ["2026-10-18", "2026-10-19"],
                       "precipitation_probability_max": [10, null] }
        }"#;
        let response: OpenMeteoResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(
            tomorrow_rain_probability(&response),
            Err(ForecastError::Malformed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_provider_degrades_to_unavailable() {
        let outcome = fetch_bounded(&Stalled, Location::new(0.0, 0.0), Duration::from_secs(5)).await;
        assert!(!outcome.is_available());
        assert_eq!(outcome.rain_probability(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_reuses_available_forecast_until_ttl() {
        let cached = CachedForecastProvider::new(
            Counting {
                calls: AtomicUsize::new(0),
                outcome: ForecastOutcome::Available(Forecast::new(40.0)),
            },
            Duration::from_secs(1800),
        );
        let here = Location::new(11.5564, 104.9282);

        cached.get_forecast(here).await;
        cached.get_forecast(here).await;
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1801)).await;
        cached.get_forecast(here).await;
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cache_skips_unavailable() {
        let cached = CachedForecastProvider::new(
            Counting {
                calls: AtomicUsize::new(0),
                outcome: ForecastOutcome::unavailable("status 503"),
            },
            Duration::from_secs(1800),
        );
        let here = Location::new(1.0, 2.0);

        cached.get_forecast(here).await;
        cached.get_forecast(here).await;
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }
}

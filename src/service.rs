use anyhow::Result;
use rmcp::{
    handler::server::{wrapper::Parameters, ServerHandler, tool::ToolRouter},
    model::{CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    ErrorData as McpError,
};
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::allocator::ZoneAllocator;
use crate::config::Config;
use crate::debounce::DebounceStore;
use crate::engine::{DecisionEngine, Evaluation};
use crate::error::{AllocationError, EvaluationError};
use crate::formatters::{format_allocation, format_evaluation, format_rain_outlook};
use crate::models::{AllocateWaterRequest, AllocationPlan, InterpretRequest, RainOutlookRequest};
use crate::weather::{
    fetch_bounded, CachedForecastProvider, ForecastOutcome, ForecastProvider, Location,
    OpenMeteoProvider, WeatherGate,
};

/// MCP service exposing the decision engine and zone allocator
#[derive(Clone)]
pub struct FieldAdvisor {
    config: Arc<Config>,
    engine: Arc<DecisionEngine>,
    allocator: ZoneAllocator,
    forecast: Arc<dyn ForecastProvider>,
    tool_router: ToolRouter<Self>,
}

impl FieldAdvisor {
    /// Creates a service backed by a cached Open-Meteo provider
    pub fn new(config: Config, store: Arc<dyn DebounceStore>) -> Result<Self> {
        let provider =
            OpenMeteoProvider::with_base_url(&config.forecast.base_url, config.forecast.timeout())?;
        let cached = CachedForecastProvider::new(provider, config.forecast.cache_ttl());
        Self::with_provider(config, Arc::new(cached), store)
    }

    /// Creates a service with an arbitrary forecast provider
    pub fn with_provider(
        config: Config,
        forecast: Arc<dyn ForecastProvider>,
        store: Arc<dyn DebounceStore>,
    ) -> Result<Self> {
        let allocator = ZoneAllocator::new(config.allocator.flow_rate_liters_per_second())?;
        let engine = DecisionEngine::new(config.engine.clone(), store);

        Ok(Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
            allocator,
            forecast,
            tool_router: Self::tool_router(),
        })
    }

    /// Fetches the forecast for `location`, never failing
    async fn forecast_for(&self, location: Option<Location>) -> ForecastOutcome {
        match location.or_else(|| self.config.forecast.default_location()) {
            Some(location) => {
                fetch_bounded(self.forecast.as_ref(), location, self.config.forecast.timeout())
                    .await
            }
            None => ForecastOutcome::unavailable("no location configured"),
        }
    }

    /// Runs one reading through the decision engine
    pub async fn interpret(&self, request: InterpretRequest) -> Result<Evaluation, EvaluationError> {
        let location = request
            .latitude
            .zip(request.longitude)
            .map(|(lat, lon)| Location::new(lat, lon));
        let forecast = self.forecast_for(location).await;

        self.engine.evaluate(
            &request.device_id,
            &request.sensor_data,
            &forecast,
            OffsetDateTime::now_utc(),
        )
    }

    /// Distributes the requested (or configured) budget across zones
    pub fn allocate(&self, request: &AllocateWaterRequest) -> Result<AllocationPlan, AllocationError> {
        let budget = request
            .water_budget_liters
            .unwrap_or(self.config.allocator.default_budget_liters);
        self.allocator.allocate(&request.zones, budget)
    }

    /// Weather gate for a location and optional rain sensor value
    pub async fn rain_outlook(&self, request: &RainOutlookRequest) -> WeatherGate {
        let forecast = self
            .forecast_for(Some(Location::new(request.latitude, request.longitude)))
            .await;
        WeatherGate::evaluate(&forecast, request.rain)
    }
}

/// A bad request is the caller's fault; a non-finite metric is ours.
fn evaluation_error(e: EvaluationError) -> McpError {
    let message = format!("Evaluation failed: {}", e);
    match e {
        EvaluationError::EmptyDeviceId => McpError::invalid_params(message, None),
        EvaluationError::NonFinite { .. } => McpError::internal_error(message, None),
    }
}

fn report<T: Serialize>(text: String, value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        McpError::internal_error(format!("Failed to serialize result: {}", e), None)
    })?;

    Ok(CallToolResult::success(vec![
        Content::text(text),
        Content::text(json),
    ]))
}

#[tool_handler]
impl ServerHandler for FieldAdvisor {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "mcp-field-advisor".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                title: None,
                website_url: None,
            },
            instructions: Some(
                "A smart-farm advisor. Interprets soil sensor readings into alerts and \
                irrigation/fertilizer pump commands, gated by the next-day rain forecast, \
                and splits a water budget across zones by priority."
                    .to_string(),
            ),
        }
    }
}

#[tool_router]
impl FieldAdvisor {
    /// Interprets one sensor reading
    #[tool(description = "Interpret a soil sensor reading for a device. Provide deviceId and sensorData (moisture, temperature, humidity, rain, nitrogen, phosphorus, potassium, pH, electricalConductivity, lightIntensity; numbers or numeric strings). Optionally provide latitude and longitude for the rain forecast. Returns soil health, stress, alerts and pump commands.")]
    async fn interpret_reading(
        &self,
        Parameters(request): Parameters<InterpretRequest>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!("Interpreting reading for device: {}", request.device_id);

        let evaluation = self.interpret(request).await.map_err(evaluation_error)?;

        report(format_evaluation(&evaluation), &evaluation)
    }

    /// Allocates water across zones
    #[tool(description = "Distribute a water budget across irrigation zones by priority. Provide zones (zoneId, currentMoisture, targetMoisture, areaSquareMeters, cropPriorityWeight 1-10, dryingRate) and optionally waterBudgetLiters (defaults to the configured budget).")]
    async fn allocate_water(
        &self,
        Parameters(request): Parameters<AllocateWaterRequest>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!("Allocating water across {} zones", request.zones.len());

        let plan = self
            .allocate(&request)
            .map_err(|e| McpError::invalid_params(format!("Allocation failed: {}", e), None))?;

        report(format_allocation(&plan), &plan)
    }

    /// Gets the rain outlook for a location
    #[tool(description = "Get the rain outlook for a location: next-day rain probability and whether irrigation should be suppressed. Provide latitude and longitude, and optionally the current rain sensor intensity (0-100).")]
    async fn get_rain_outlook(
        &self,
        Parameters(request): Parameters<RainOutlookRequest>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(
            "Getting rain outlook for coordinates: {}, {}",
            request.latitude,
            request.longitude
        );

        let gate = self.rain_outlook(&request).await;

        report(format_rain_outlook(&gate), &gate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::ErrorCode;

    #[test]
    fn evaluation_errors_map_to_mcp_codes() {
        assert_eq!(
            evaluation_error(EvaluationError::EmptyDeviceId).code,
            ErrorCode::INVALID_PARAMS
        );

        let internal = evaluation_error(EvaluationError::NonFinite {
            metric: "stress level",
        });
        assert_eq!(internal.code, ErrorCode::INTERNAL_ERROR);
        assert!(internal.message.contains("stress level"));
    }
}

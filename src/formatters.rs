use crate::engine::Evaluation;
use crate::models::{AllocationPlan, PumpStatus};
use crate::weather::WeatherGate;

/// Formats an engine evaluation into a human-readable report
pub fn format_evaluation(evaluation: &Evaluation) -> String {
    let mut output = format!(
        "Field Report for {}\n\n  Soil Health: {}\n  Stress Level: {:.1}/100\n  Moisture Loss: {:.2}%/hour\n  Recommendation: {}\n\n",
        evaluation.device_id,
        evaluation.soil_health,
        evaluation.stress_level,
        evaluation.moisture_loss_rate,
        evaluation.recommendation
    );

    output.push_str(&format_rain_outlook(&evaluation.weather));
    output.push('\n');

    if evaluation.alerts.is_empty() {
        output.push_str("No alerts.\n");
    } else {
        output.push_str("Alerts:\n");
        for (i, alert) in evaluation.alerts.iter().enumerate() {
            output.push_str(&format!(
                "  {}. [{}] {}: {}\n",
                i + 1,
                alert.severity,
                alert.title,
                alert.message
            ));
        }
    }

    output.push('\n');
    if evaluation.commands.is_empty() {
        output.push_str("No pump commands.\n");
    } else {
        output.push_str("Pump Commands:\n");
        for command in &evaluation.commands {
            let status = match command.status {
                PumpStatus::On => format!("ON for {}s", command.duration_seconds),
                PumpStatus::Off => "OFF".to_string(),
            };
            output.push_str(&format!(
                "  {} {} ({})\n",
                command.channel, status, command.reason_code
            ));
        }
    }
    output
}

/// Formats the weather gate into a short outlook
pub fn format_rain_outlook(gate: &WeatherGate) -> String {
    let source = if gate.forecast_available {
        "forecast"
    } else {
        "forecast unavailable, assuming dry"
    };
    let raining = match (gate.immediate_rain_detected, gate.is_heavy_rain) {
        (true, true) => "heavy rain",
        (true, false) => "raining",
        _ => "dry",
    };
    format!(
        "Rain Outlook:\n  Tomorrow: {:.0}% ({})\n  Now: {}\n  Irrigation: {}\n",
        gate.next_day_rain_probability,
        source,
        raining,
        if gate.should_suppress_irrigation {
            "suppressed"
        } else {
            "allowed"
        }
    )
}

/// Formats a zone allocation plan into a human-readable string
pub fn format_allocation(plan: &AllocationPlan) -> String {
    let mut output = format!(
        "Water Allocation\nBudget: {:.1} L\nUsed: {:.1} L ({:.1}%)\n\n",
        plan.water_budget_liters,
        plan.total_water_used,
        plan.efficiency * 100.0
    );

    for result in &plan.allocations {
        output.push_str(&format!(
            "{}:\n  Water: {:.2} L of {:.2} L needed\n  Duration: {}s\n  Priority: {:.2}\n  Rationale: {}\n\n",
            result.zone_id,
            result.water_liters,
            result.water_needed_liters,
            result.duration_seconds,
            result.priority_score,
            result.rationale
        ));
    }
    output
}

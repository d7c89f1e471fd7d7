//! Splits a fixed water budget across competing zones.
//!
//! Zones are ranked by `deficit * drying_rate * crop_priority_weight` and
//! filled greedily in that order until the budget runs out. Equal scores
//! keep their input order.

use crate::error::AllocationError;
use crate::models::{AllocationPlan, ZoneAllocationResult, ZoneDescriptor};

const INSUFFICIENT_WATER: &str = "Insufficient water available - low priority";

#[derive(Debug, Clone)]
pub struct ZoneAllocator {
    flow_rate_liters_per_second: f64,
}

struct Ranked<'a> {
    zone: &'a ZoneDescriptor,
    deficit: f64,
    priority_score: f64,
    water_needed: f64,
}

impl ZoneAllocator {
    pub fn new(flow_rate_liters_per_second: f64) -> Result<Self, AllocationError> {
        if !(flow_rate_liters_per_second.is_finite() && flow_rate_liters_per_second > 0.0) {
            return Err(AllocationError::InvalidFlowRate(flow_rate_liters_per_second));
        }
        Ok(Self {
            flow_rate_liters_per_second,
        })
    }

    pub fn allocate(
        &self,
        zones: &[ZoneDescriptor],
        water_budget_liters: f64,
    ) -> Result<AllocationPlan, AllocationError> {
        if !(water_budget_liters.is_finite() && water_budget_liters > 0.0) {
            return Err(AllocationError::InvalidBudget(water_budget_liters));
        }

        let mut ranked = zones
            .iter()
            .map(rank)
            .collect::<Result<Vec<_>, _>>()?;
        // Stable: ties keep input order.
        ranked.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));

        let mut remaining = water_budget_liters;
        let mut allocations = Vec::with_capacity(ranked.len());

        for entry in ranked {
            if remaining <= 0.0 {
                allocations.push(ZoneAllocationResult {
                    zone_id: entry.zone.zone_id.clone(),
                    water_liters: 0.0,
                    water_needed_liters: entry.water_needed,
                    deficit: entry.deficit,
                    duration_seconds: 0,
                    priority_score: entry.priority_score,
                    rationale: INSUFFICIENT_WATER.to_string(),
                });
                continue;
            }

            let allocated = entry.water_needed.min(remaining);
            remaining -= allocated;

            allocations.push(ZoneAllocationResult {
                zone_id: entry.zone.zone_id.clone(),
                water_liters: allocated,
                water_needed_liters: entry.water_needed,
                deficit: entry.deficit,
                duration_seconds: self.duration_for(entry.zone, allocated)?,
                priority_score: entry.priority_score,
                rationale: rationale(entry.deficit, entry.priority_score),
            });
        }

        let total_water_used = water_budget_liters - remaining.max(0.0);
        tracing::info!(
            "Allocated {:.1} of {:.1} L across {} zones",
            total_water_used,
            water_budget_liters,
            allocations.len()
        );

        Ok(AllocationPlan {
            allocations,
            water_budget_liters,
            total_water_used,
            efficiency: total_water_used / water_budget_liters,
        })
    }

    fn duration_for(&self, zone: &ZoneDescriptor, liters: f64) -> Result<u64, AllocationError> {
        let seconds = (liters / self.flow_rate_liters_per_second).round();
        // u64::MAX rounds up to 2^64 as f64, so anything at or above it overflows.
        if seconds >= u64::MAX as f64 {
            return Err(AllocationError::InvalidZone {
                zone_id: zone.zone_id.clone(),
                reason: format!("{:.0} L cannot be delivered in a representable run time", liters),
            });
        }
        Ok(seconds as u64)
    }
}

fn rank(zone: &ZoneDescriptor) -> Result<Ranked<'_>, AllocationError> {
    validate(zone)?;

    let deficit = (zone.target_moisture - zone.current_moisture).max(0.0);
    let urgency = deficit * zone.drying_rate;
    let priority_score = urgency * zone.crop_priority_weight;
    // 1 L raises 1 m² by 1% moisture.
    let water_needed = deficit * zone.area_square_meters;

    let derived = [
        ("moisture deficit", deficit),
        ("priority score", priority_score),
        ("water needed", water_needed),
    ];
    for (name, value) in derived {
        if !value.is_finite() {
            return Err(AllocationError::InvalidZone {
                zone_id: zone.zone_id.clone(),
                reason: format!("{} is not a finite number", name),
            });
        }
    }

    Ok(Ranked {
        zone,
        deficit,
        priority_score,
        water_needed,
    })
}

fn validate(zone: &ZoneDescriptor) -> Result<(), AllocationError> {
    let invalid = |reason: String| AllocationError::InvalidZone {
        zone_id: zone.zone_id.clone(),
        reason,
    };

    if zone.zone_id.trim().is_empty() {
        return Err(invalid("zone id must not be empty".to_string()));
    }

    let fields = [
        ("currentMoisture", zone.current_moisture),
        ("targetMoisture", zone.target_moisture),
        ("areaSquareMeters", zone.area_square_meters),
        ("cropPriorityWeight", zone.crop_priority_weight),
        ("dryingRate", zone.drying_rate),
    ];
    for (name, value) in fields {
        if !value.is_finite() {
            return Err(invalid(format!("{} is not a finite number", name)));
        }
    }

    if zone.area_square_meters < 0.0 {
        return Err(invalid(format!(
            "areaSquareMeters must not be negative, got {}",
            zone.area_square_meters
        )));
    }
    if zone.drying_rate < 0.0 {
        return Err(invalid(format!(
            "dryingRate must not be negative, got {}",
            zone.drying_rate
        )));
    }
    if !(1.0..=10.0).contains(&zone.crop_priority_weight) {
        return Err(invalid(format!(
            "cropPriorityWeight must be between 1 and 10, got {}",
            zone.crop_priority_weight
        )));
    }
    Ok(())
}

fn rationale(deficit: f64, priority_score: f64) -> String {
    if deficit > 20.0 {
        format!("High moisture deficit ({:.1}%) - urgent irrigation needed", deficit)
    } else if deficit > 10.0 {
        format!("Moderate moisture deficit ({:.1}%) - irrigation recommended", deficit)
    } else if priority_score > 50.0 {
        "High priority crop - proactive irrigation".to_string()
    } else {
        "Maintenance irrigation".to_string()
    }
}

//! Soil health, plant stress, and moisture loss scoring.
//!
//! Every scorer takes optional inputs. A missing input is left out of the
//! calculation entirely; it is never replaced with a made-up default.

use serde::{Deserialize, Serialize};

use crate::models::{SensorReading, SoilHealth};

/// An inclusive optimal band for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub low: f64,
    pub high: f64,
}

impl Band {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }
}

/// Optimal growing ranges (tuned for leafy greens).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimalRanges {
    pub moisture: Band,
    pub temperature: Band,
    pub humidity: Band,
    pub ph: Band,
    pub nitrogen: Band,
    pub phosphorus: Band,
    pub potassium: Band,
}

impl Default for OptimalRanges {
    fn default() -> Self {
        Self {
            moisture: Band::new(60.0, 80.0),
            temperature: Band::new(15.0, 25.0),
            humidity: Band::new(50.0, 70.0),
            ph: Band::new(6.0, 7.0),
            nitrogen: Band::new(90.0, 150.0),
            phosphorus: Band::new(35.0, 70.0),
            potassium: Band::new(150.0, 280.0),
        }
    }
}

// Points lost per unit above the band.
const MOISTURE_EXCESS_PENALTY: f64 = 2.0;
const NUTRIENT_EXCESS_PENALTY: f64 = 0.5;
// Points lost per pH unit outside the band, either side.
const PH_PENALTY: f64 = 20.0;

const BASE_LOSS_RATE: f64 = 0.5;
const MAX_LOSS_RATE: f64 = 5.0;
const HIGH_LIGHT: f64 = 50.0;

/// Scores readings against a set of [`OptimalRanges`].
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    ranges: OptimalRanges,
}

impl Scorer {
    pub fn new(ranges: OptimalRanges) -> Self {
        Self { ranges }
    }

    /// Soil health from whichever of moisture, pH and NPK are present.
    pub fn assess_soil_health(
        &self,
        moisture: Option<f64>,
        ph: Option<f64>,
        nitrogen: Option<f64>,
        phosphorus: Option<f64>,
        potassium: Option<f64>,
    ) -> SoilHealth {
        let r = &self.ranges;
        let scores: Vec<f64> = [
            moisture.map(|v| band_score(v, r.moisture, MOISTURE_EXCESS_PENALTY)),
            ph.map(|v| ph_score(v, r.ph)),
            nitrogen.map(|v| band_score(v, r.nitrogen, NUTRIENT_EXCESS_PENALTY)),
            phosphorus.map(|v| band_score(v, r.phosphorus, NUTRIENT_EXCESS_PENALTY)),
            potassium.map(|v| band_score(v, r.potassium, NUTRIENT_EXCESS_PENALTY)),
        ]
        .into_iter()
        .flatten()
        .collect();

        if scores.is_empty() {
            return SoilHealth::Unknown;
        }

        let average = scores.iter().sum::<f64>() / scores.len() as f64;
        match average {
            a if a >= 85.0 => SoilHealth::Excellent,
            a if a >= 70.0 => SoilHealth::Good,
            a if a >= 50.0 => SoilHealth::Fair,
            _ => SoilHealth::Poor,
        }
    }

    /// Plant stress in `[0, 100]`; higher is worse.
    pub fn calculate_stress(
        &self,
        moisture: Option<f64>,
        temperature: Option<f64>,
        humidity: Option<f64>,
    ) -> f64 {
        let r = &self.ranges;
        let penalties: Vec<f64> = [
            moisture.map(|m| match m {
                m if m < 40.0 => 90.0,
                m if m < 50.0 => 60.0,
                m if m < r.moisture.low => 30.0,
                _ => 0.0,
            }),
            temperature.map(|t| {
                if !(10.0..=30.0).contains(&t) {
                    70.0
                } else if !r.temperature.contains(t) {
                    40.0
                } else {
                    0.0
                }
            }),
            humidity.map(|h| {
                if !(30.0..=90.0).contains(&h) {
                    60.0
                } else if !r.humidity.contains(h) {
                    30.0
                } else {
                    0.0
                }
            }),
        ]
        .into_iter()
        .flatten()
        .collect();

        if penalties.is_empty() {
            return 0.0;
        }

        let stress = penalties.iter().sum::<f64>() / penalties.len() as f64;
        stress.clamp(0.0, 100.0)
    }

    /// Estimated moisture loss in %/hour, clipped to `[0, 5]`.
    pub fn estimate_moisture_loss_rate(
        &self,
        temperature: Option<f64>,
        humidity: Option<f64>,
        light_intensity: Option<f64>,
    ) -> f64 {
        let r = &self.ranges;
        let mut rate = BASE_LOSS_RATE;

        if let Some(t) = temperature {
            if t > r.temperature.high {
                rate += (t - r.temperature.high) * 0.1;
            } else if t < r.temperature.low {
                rate -= (r.temperature.low - t) * 0.05;
            }
        }

        if let Some(h) = humidity {
            if h < 40.0 {
                rate += (40.0 - h) * 0.02;
            } else if h > 70.0 {
                rate -= (h - 70.0) * 0.01;
            }
        }

        if light_intensity.is_some_and(|l| l > HIGH_LIGHT) {
            rate += 0.3;
        }

        rate.clamp(0.0, MAX_LOSS_RATE)
    }

    /// Convenience wrapper scoring a full reading.
    pub fn score(&self, reading: &SensorReading) -> Scores {
        Scores {
            soil_health: self.assess_soil_health(
                reading.moisture,
                reading.ph,
                reading.nitrogen,
                reading.phosphorus,
                reading.potassium,
            ),
            stress_level: self.calculate_stress(
                reading.moisture,
                reading.temperature,
                reading.humidity,
            ),
            moisture_loss_rate: self.estimate_moisture_loss_rate(
                reading.temperature,
                reading.humidity,
                reading.light_intensity,
            ),
        }
    }
}

/// All three assessment outputs for one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scores {
    pub soil_health: SoilHealth,
    pub stress_level: f64,
    pub moisture_loss_rate: f64,
}

fn band_score(value: f64, band: Band, excess_penalty: f64) -> f64 {
    let score = if band.contains(value) {
        100.0
    } else if value < band.low {
        value / band.low * 100.0
    } else {
        100.0 - (value - band.high) * excess_penalty
    };
    score.clamp(0.0, 100.0)
}

fn ph_score(value: f64, band: Band) -> f64 {
    if band.contains(value) {
        return 100.0;
    }
    let distance = (value - band.low).abs().min((value - band.high).abs());
    (100.0 - distance * PH_PENALTY).clamp(0.0, 100.0)
}

/// Human-readable advice from the overall assessment.
pub fn recommendation(soil_health: SoilHealth, stress_level: f64) -> &'static str {
    if stress_level > 70.0 {
        return "Immediate action required: plant is under severe stress. Check moisture and temperature levels.";
    }
    if stress_level > 50.0 {
        return "Plant is experiencing moderate stress. Monitor conditions closely.";
    }
    match soil_health {
        SoilHealth::Excellent => "Soil conditions are optimal. Continue current maintenance routine.",
        SoilHealth::Good => "Soil conditions are good. Minor adjustments may improve yield.",
        SoilHealth::Fair => {
            "Soil conditions need improvement. Consider adjusting irrigation or fertilization."
        }
        SoilHealth::Poor => "Poor soil conditions detected. Multiple interventions recommended.",
        SoilHealth::Unknown => "Not enough soil data to assess. Check sensor connections.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scorer() -> Scorer {
        Scorer::default()
    }

    #[test]
    fn soil_health_unknown_without_inputs() {
        assert_eq!(
            scorer().assess_soil_health(None, None, None, None, None),
            SoilHealth::Unknown
        );
    }

    #[test]
    fn soil_health_grades() {
        let s = scorer();
        assert_eq!(
            s.assess_soil_health(Some(70.0), Some(6.5), Some(120.0), Some(50.0), Some(200.0)),
            SoilHealth::Excellent
        );
        // 45/60 = 75
        assert_eq!(s.assess_soil_health(Some(45.0), None, None, None, None), SoilHealth::Good);
        // pH 4.5 is 1.5 below band: 100 - 30 = 70
        assert_eq!(s.assess_soil_health(None, Some(4.5), None, None, None), SoilHealth::Good);
        // 30/60 = 50
        assert_eq!(s.assess_soil_health(Some(30.0), None, None, None, None), SoilHealth::Fair);
        assert_eq!(s.assess_soil_health(Some(10.0), None, None, None, None), SoilHealth::Poor);
    }

    #[test]
    fn ph_is_penalized_harder_than_moisture() {
        let s = scorer();
        // Two units above: moisture loses 4 points, pH loses 40.
        assert_eq!(s.assess_soil_health(Some(82.0), None, None, None, None), SoilHealth::Excellent);
        assert_eq!(s.assess_soil_health(None, Some(9.0), None, None, None), SoilHealth::Fair);
    }

    #[test]
    fn absent_factors_do_not_dilute_stress() {
        let s = scorer();
        assert_eq!(s.calculate_stress(Some(30.0), None, None), 90.0);
        assert_eq!(s.calculate_stress(Some(30.0), Some(20.0), None), 45.0);
        assert_eq!(s.calculate_stress(None, None, None), 0.0);
    }

    #[test]
    fn stress_ladders() {
        let s = scorer();
        assert_eq!(s.calculate_stress(Some(45.0), None, None), 60.0);
        assert_eq!(s.calculate_stress(Some(55.0), None, None), 30.0);
        assert_eq!(s.calculate_stress(Some(90.0), None, None), 0.0);
        assert_eq!(s.calculate_stress(None, Some(35.0), None), 70.0);
        assert_eq!(s.calculate_stress(None, Some(27.0), None), 40.0);
        assert_eq!(s.calculate_stress(None, None, Some(95.0)), 60.0);
        assert_eq!(s.calculate_stress(None, None, Some(45.0)), 30.0);
    }

    #[test]
    fn moisture_loss_rate_factors() {
        let s = scorer();
        assert!((s.estimate_moisture_loss_rate(None, None, None) - 0.5).abs() < 1e-9);
        // +1.0 for 10 degrees above 25, +0.4 for 20% below 40, +0.3 light
        let hot_dry_bright = s.estimate_moisture_loss_rate(Some(35.0), Some(20.0), Some(80.0));
        assert!((hot_dry_bright - 2.2).abs() < 1e-9);
        // Cold and humid pushes below zero, clipped.
        assert_eq!(s.estimate_moisture_loss_rate(Some(-20.0), Some(100.0), None), 0.0);
        assert_eq!(s.estimate_moisture_loss_rate(Some(90.0), Some(0.0), Some(1000.0)), 5.0);
    }

    #[test]
    fn recommendation_prefers_stress() {
        assert!(recommendation(SoilHealth::Excellent, 90.0).starts_with("Immediate"));
        assert!(recommendation(SoilHealth::Excellent, 60.0).contains("moderate"));
        assert!(recommendation(SoilHealth::Good, 10.0).contains("good"));
    }

    proptest! {
        #[test]
        fn stress_stays_in_bounds(
            m in proptest::option::of(-50.0f64..150.0),
            t in proptest::option::of(-40.0f64..60.0),
            h in proptest::option::of(0.0f64..100.0),
        ) {
            let stress = scorer().calculate_stress(m, t, h);
            prop_assert!((0.0..=100.0).contains(&stress));
        }

        #[test]
        fn loss_rate_stays_in_bounds(
            t in proptest::option::of(-40.0f64..60.0),
            h in proptest::option::of(0.0f64..100.0),
            l in proptest::option::of(0.0f64..100000.0),
        ) {
            let rate = scorer().estimate_moisture_loss_rate(t, h, l);
            prop_assert!((0.0..=5.0).contains(&rate));
        }
    }
}

//! Reefer energy optimization estimate
//!
//! ```text
//! baseline  = nominal_rate * 24                                  (L/day)
//! factor_i  = clamp(0.85 * stability_i * weather_opt(ambient_i)
//!                   * efficiency * maintenance, 0.7, 1.0)
//! optimized = mean(factor_i * nominal_rate) * 24
//! savings   = baseline - optimized, savings% = savings / baseline * 100
//! ```
//!
//! `stability_i` is 0.9 when the reading held within 1 °C of target, 0.95 otherwise.
//! Stateless: identical windows give identical results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{EnergyOptimizationResult, EquipmentProfile, Reading, VehicleId};

pub const HOURS_PER_DAY: f64 = 24.0;
pub const BASE_FACTOR: f64 = 0.85;
pub const FACTOR_MIN: f64 = 0.7;
pub const FACTOR_MAX: f64 = 1.0;

#[derive(Debug, Error, PartialEq)]
pub enum OptimizationError {
    #[error("no readings in window for vehicle {0}")]
    EmptyWindow(VehicleId),
    #[error("fuel consumption rate must be positive, got {0} L/h")]
    InvalidRate(f64),
}

/// Ambient-temperature multiplier
pub fn weather_opt(ambient_c: f64) -> f64 {
    if ambient_c < 10.0 {
        0.9
    } else if ambient_c < 20.0 {
        0.95
    } else if ambient_c < 30.0 {
        1.0
    } else {
        1.05
    }
}

/// Per-reading optimization factor, always within [0.7, 1.0]
pub fn optimization_factor(
    deviation_c: f64,
    ambient_c: f64,
    efficiency: f64,
    maintenance_condition: f64,
) -> f64 {
    let stability = if deviation_c.abs() < 1.0 { 0.9 } else { 0.95 };
    let raw = BASE_FACTOR * stability * weather_opt(ambient_c) * efficiency * maintenance_condition;
    if raw.is_nan() {
        return FACTOR_MAX;
    }
    raw.clamp(FACTOR_MIN, FACTOR_MAX)
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EnergyOptimizationEstimator;

impl EnergyOptimizationEstimator {
    pub fn new() -> Self {
        Self
    }

    pub fn baseline_daily(&self, fuel_rate_lph: f64) -> f64 {
        fuel_rate_lph * HOURS_PER_DAY
    }

    /// Estimate over `window`; `at` stamps the result
    pub fn estimate(
        &self,
        vehicle_id: &VehicleId,
        equipment: &EquipmentProfile,
        window: &[Reading],
        at: DateTime<Utc>,
    ) -> Result<EnergyOptimizationResult, OptimizationError> {
        let rate = equipment.fuel_rate_lph;
        if !(rate > 0.0) || !rate.is_finite() {
            return Err(OptimizationError::InvalidRate(rate));
        }
        if window.is_empty() {
            return Err(OptimizationError::EmptyWindow(vehicle_id.clone()));
        }

        let baseline = self.baseline_daily(rate);
        let hourly_sum: f64 = window
            .iter()
            .map(|r| {
                optimization_factor(
                    r.deviation_c(),
                    r.environment.temperature_c,
                    equipment.efficiency,
                    equipment.maintenance_condition,
                ) * rate
            })
            .sum();
        let optimized = hourly_sum / window.len() as f64 * HOURS_PER_DAY;
        let savings = baseline - optimized;

        Ok(EnergyOptimizationResult {
            vehicle_id: vehicle_id.clone(),
            baseline_consumption: baseline,
            optimized_consumption: optimized,
            savings,
            savings_percent: savings / baseline * 100.0,
            window_len: window.len(),
            timestamp: at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vehicle::fixtures::equipment;
    use crate::domain::{EnvironmentSample, Location};
    use proptest::prelude::*;
    use rstest::rstest;

    fn reading(temperature_c: f64, target_c: f64, ambient_c: f64) -> Reading {
        let at = Utc::now();
        let mut env = EnvironmentSample::mild(at);
        env.temperature_c = ambient_c;
        Reading {
            vehicle_id: VehicleId::new("TRK-0009"),
            timestamp: at,
            temperature_c,
            target_temperature_c: target_c,
            humidity_percent: 80.0,
            location: Location::new(39.0, -94.5),
            environment: env,
            anomaly: false,
            confidence: 0.95,
        }
    }

    #[rstest]
    #[case(-5.0, 0.9)]
    #[case(9.99, 0.9)]
    #[case(10.0, 0.95)]
    #[case(19.99, 0.95)]
    #[case(20.0, 1.0)]
    #[case(29.99, 1.0)]
    #[case(30.0, 1.05)]
    #[case(45.0, 1.05)]
    fn test_weather_opt_bands(#[case] ambient: f64, #[case] expected: f64) {
        assert_eq!(weather_opt(ambient), expected);
    }

    #[test]
    fn test_reference_scenario() {
        let eq = EquipmentProfile {
            fuel_rate_lph: 2.0,
            efficiency: 1.0,
            maintenance_condition: 1.0,
            ..equipment()
        };
        let id = VehicleId::new("TRK-0009");
        let result = EnergyOptimizationEstimator::new()
            .estimate(&id, &eq, &[reading(3.5, 3.0, 25.0)], Utc::now())
            .unwrap();

        assert!((result.baseline_consumption - 48.0).abs() < 1e-9);
        assert!((result.optimized_consumption - 36.72).abs() < 1e-9);
        assert!((result.savings - 11.28).abs() < 1e-9);
        assert!((result.savings_percent - 23.5).abs() < 1e-9);
        assert_eq!(result.window_len, 1);
    }

    #[test]
    fn test_unstable_reading_uses_higher_factor() {
        // |dev| = 1.0 is not < 1.0
        let f = optimization_factor(1.0, 25.0, 1.0, 1.0);
        assert!((f - 0.85 * 0.95).abs() < 1e-12);
        let f = optimization_factor(-0.99, 25.0, 1.0, 1.0);
        assert!((f - 0.85 * 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_worn_unit_clamps_to_floor() {
        // 0.85 * 0.9 * 0.9 * 0.7 * 0.6 < 0.7
        assert_eq!(optimization_factor(0.0, 0.0, 0.7, 0.6), 0.7);
    }

    #[test]
    fn test_window_mean() {
        let eq = EquipmentProfile {
            fuel_rate_lph: 3.0,
            ..equipment()
        };
        let window = vec![
            reading(3.0, 3.0, 25.0),  // 0.765
            reading(5.0, 3.0, 35.0),  // 0.85*0.95*1.05 = 0.847875
            reading(-21.5, -21.5, 5.0), // 0.85*0.9*0.9 = 0.6885 -> 0.7
        ];
        let result = EnergyOptimizationEstimator::new()
            .estimate(&"TRK-0009".into(), &eq, &window, Utc::now())
            .unwrap();

        let mean_factor = (0.765 + 0.847875 + 0.7) / 3.0;
        assert!((result.optimized_consumption - mean_factor * 3.0 * 24.0).abs() < 1e-9);
        assert!((result.baseline_consumption - 72.0).abs() < 1e-9);
    }

    #[test]
    fn test_idempotent() {
        let eq = equipment();
        let window: Vec<_> = (0..50)
            .map(|i| reading(3.0 + (i as f64 * 0.37).sin() * 4.0, 3.0, 5.0 + i as f64))
            .collect();
        let at = Utc::now();
        let est = EnergyOptimizationEstimator::new();

        let a = est.estimate(&"TRK-0009".into(), &eq, &window, at).unwrap();
        let b = est.estimate(&"TRK-0009".into(), &eq, &window, at).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_errors() {
        let est = EnergyOptimizationEstimator::new();
        let id = VehicleId::new("TRK-0009");
        assert_eq!(
            est.estimate(&id, &equipment(), &[], Utc::now()),
            Err(OptimizationError::EmptyWindow(id.clone()))
        );

        let eq = EquipmentProfile {
            fuel_rate_lph: 0.0,
            ..equipment()
        };
        assert_eq!(
            est.estimate(&id, &eq, &[reading(3.0, 3.0, 20.0)], Utc::now()),
            Err(OptimizationError::InvalidRate(0.0))
        );
    }

    proptest! {
        #[test]
        fn prop_factor_always_clamped(
            deviation in -100.0f64..100.0,
            ambient in -80.0f64..80.0,
            efficiency in -5.0f64..5.0,
            maintenance in -5.0f64..5.0,
        ) {
            let f = optimization_factor(deviation, ambient, efficiency, maintenance);
            prop_assert!((0.7..=1.0).contains(&f));
        }
    }
}

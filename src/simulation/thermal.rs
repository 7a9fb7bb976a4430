//! Reefer compartment temperature/humidity synthesis.
//!
//! ```text
//! measured = target + weather + equipment + maintenance + noise (+ failure spike)
//! weather     = (ambient - 20.0) * 0.1
//! equipment   = (1 - efficiency) * 5.0
//! maintenance = (1 - maintenance_condition) * 3.0
//! noise       ~ U[-1, 1]
//! ```
//!
//! A failure spike ~ U[-5, 5] is added with an age-dependent probability. It lasts one tick
//! and is never written back to the vehicle.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::anomaly::{AnomalyDetector, Classification};
use crate::domain::{CargoSpec, EnvironmentSample, Reading, Vehicle};

pub const REFERENCE_AMBIENT_C: f64 = 20.0;
pub const WEATHER_GAIN: f64 = 0.1;
pub const EQUIPMENT_GAIN: f64 = 5.0;
pub const MAINTENANCE_GAIN: f64 = 3.0;

pub const CONFIDENCE_NORMAL: f64 = 0.95;
pub const CONFIDENCE_FAILURE: f64 = 0.9;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalConfig {
    /// Half-width of the uniform sensor noise (°C)
    pub noise_amplitude_c: f64,
    /// Half-width of the uniform failure spike (°C)
    pub failure_amplitude_c: f64,
    /// Disable to suppress equipment failure spikes entirely
    pub failure_injection: bool,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            noise_amplitude_c: 1.0,
            failure_amplitude_c: 5.0,
            failure_injection: true,
        }
    }
}

impl ThermalConfig {
    /// No noise, no failures: output is the closed-form expectation
    pub fn deterministic() -> Self {
        Self {
            noise_amplitude_c: 0.0,
            failure_amplitude_c: 0.0,
            failure_injection: false,
        }
    }
}

/// Chance per tick that a reefer unit of this age glitches
pub fn failure_probability(age_years: f64) -> f64 {
    if age_years < 3.0 {
        0.01
    } else if age_years < 7.0 {
        0.03
    } else if age_years < 12.0 {
        0.08
    } else {
        0.15
    }
}

/// Closed-form measured temperature
pub fn measured_temperature_c(
    target_c: f64,
    ambient_c: f64,
    efficiency: f64,
    maintenance_condition: f64,
    noise_c: f64,
) -> f64 {
    let weather = (ambient_c - REFERENCE_AMBIENT_C) * WEATHER_GAIN;
    let equipment = (1.0 - efficiency) * EQUIPMENT_GAIN;
    let maintenance = (1.0 - maintenance_condition) * MAINTENANCE_GAIN;
    target_c + weather + equipment + maintenance + noise_c
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThermalSample {
    pub temperature_c: f64,
    pub target_temperature_c: f64,
    pub humidity_percent: f64,
    /// Spike applied this tick, if the unit glitched
    pub failure_offset_c: Option<f64>,
}

impl ThermalSample {
    pub fn confidence(&self) -> f64 {
        if self.failure_offset_c.is_some() {
            CONFIDENCE_FAILURE
        } else {
            CONFIDENCE_NORMAL
        }
    }

    pub fn deviation_c(&self) -> f64 {
        (self.temperature_c - self.target_temperature_c).abs()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ThermalModel {
    config: ThermalConfig,
}

impl ThermalModel {
    pub fn new(config: ThermalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ThermalConfig {
        &self.config
    }

    pub fn sample<R: Rng>(
        &self,
        vehicle: &Vehicle,
        environment: &EnvironmentSample,
        rng: &mut R,
    ) -> ThermalSample {
        let target = vehicle.target_temperature_c();
        let noise = symmetric(rng, self.config.noise_amplitude_c);

        let mut temperature_c = measured_temperature_c(
            target,
            environment.temperature_c,
            vehicle.equipment.efficiency,
            vehicle.equipment.maintenance_condition,
            noise,
        );

        let failure_offset_c = if self.config.failure_injection
            && rng.gen_bool(failure_probability(vehicle.equipment.age_years))
        {
            let spike = symmetric(rng, self.config.failure_amplitude_c);
            temperature_c += spike;
            Some(spike)
        } else {
            None
        };

        ThermalSample {
            temperature_c,
            target_temperature_c: target,
            humidity_percent: compartment_humidity(&vehicle.cargo, environment, rng),
            failure_offset_c,
        }
    }

    /// Sample, classify, and freeze into an immutable reading
    pub fn reading<R: Rng>(
        &self,
        vehicle: &Vehicle,
        environment: &EnvironmentSample,
        timestamp: DateTime<Utc>,
        detector: &AnomalyDetector,
        rng: &mut R,
    ) -> (Reading, Classification) {
        let sample = self.sample(vehicle, environment, rng);
        let classification = detector.classify(sample.temperature_c, sample.target_temperature_c);

        let reading = Reading {
            vehicle_id: vehicle.id.clone(),
            timestamp,
            temperature_c: sample.temperature_c,
            target_temperature_c: sample.target_temperature_c,
            humidity_percent: sample.humidity_percent,
            location: vehicle.location.clone(),
            environment: environment.clone(),
            anomaly: classification.is_anomalous(),
            confidence: sample.confidence(),
        };
        (reading, classification)
    }
}

fn symmetric<R: Rng>(rng: &mut R, amplitude: f64) -> f64 {
    if amplitude > 0.0 {
        rng.gen_range(-amplitude..=amplitude)
    } else {
        0.0
    }
}

/// Relative humidity inside the compartment; frozen and produce loads run humid,
/// pharmaceutical units are dehumidified
fn compartment_humidity<R: Rng>(
    cargo: &CargoSpec,
    environment: &EnvironmentSample,
    rng: &mut R,
) -> f64 {
    let base = match cargo {
        CargoSpec::Frozen { .. } => 75.0,
        CargoSpec::Refrigerated { .. } => 85.0,
        CargoSpec::Pharmaceutical { .. } => 45.0,
    };
    let ambient_bleed = (environment.humidity_percent - 50.0) * 0.1;
    (base + ambient_bleed + rng.gen_range(-5.0..=5.0)).clamp(0.0, 100.0)
}

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EnvironmentSample, Location, VehicleId};

/// One synthesized sensor reading for a vehicle at a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub vehicle_id: VehicleId,
    pub timestamp: DateTime<Utc>,
    pub temperature_c: f64,
    pub target_temperature_c: f64,
    pub humidity_percent: f64,
    pub location: Location,
    pub environment: EnvironmentSample,
    pub anomaly: bool,
    /// 0-1
    pub confidence: f64,
}

impl Reading {
    /// Signed deviation from target (°C)
    pub fn deviation_c(&self) -> f64 {
        self.temperature_c - self.target_temperature_c
    }
}

/// Alert severity
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

/// Temperature excursion alert raised from an anomalous reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub vehicle_id: VehicleId,
    /// Timestamp of the reading that raised the alert
    pub timestamp: DateTime<Utc>,
    /// Set by the dispatcher when the alert is handed to the channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub severity: Severity,
    pub message: String,
    pub temperature_c: f64,
    pub target_temperature_c: f64,
    pub location: Location,
    pub environment: EnvironmentSample,
}

impl Alert {
    /// Build the alert for `reading`. The id is drawn from `rng`, so a seeded run
    /// reproduces its alert ids too.
    pub fn from_reading<R: Rng>(reading: &Reading, severity: Severity, rng: &mut R) -> Self {
        let deviation = reading.deviation_c();
        let place = if reading.location.city.is_empty() {
            format!(
                "({:.4}, {:.4})",
                reading.location.latitude, reading.location.longitude
            )
        } else {
            reading.location.city.clone()
        };
        let message = format!(
            "{} temperature excursion on {} near {}: {:.1}°C vs target {:.1}°C ({:+.1}°C)",
            match severity {
                Severity::Warning => "Warning",
                Severity::Critical => "Critical",
            },
            reading.vehicle_id,
            place,
            reading.temperature_c,
            reading.target_temperature_c,
            deviation,
        );

        Self {
            id: uuid::Builder::from_random_bytes(rng.gen()).into_uuid(),
            vehicle_id: reading.vehicle_id.clone(),
            timestamp: reading.timestamp,
            created_at: None,
            severity,
            message,
            temperature_c: reading.temperature_c,
            target_temperature_c: reading.target_temperature_c,
            location: reading.location.clone(),
            environment: reading.environment.clone(),
        }
    }
}

/// Baseline vs optimized daily reefer fuel consumption for a vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyOptimizationResult {
    pub vehicle_id: VehicleId,
    /// L/day
    pub baseline_consumption: f64,
    /// L/day
    pub optimized_consumption: f64,
    pub savings: f64,
    pub savings_percent: f64,
    /// Number of readings the estimate was computed over
    pub window_len: usize,
    pub timestamp: DateTime<Utc>,
}

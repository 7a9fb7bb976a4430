use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Location, VehicleId};

/// Conditions that make a vehicle unprocessable
#[derive(Debug, Clone, Error, PartialEq)]
pub enum VehicleError {
    #[error("cargo range invalid: min {min}°C > max {max}°C")]
    InvalidCargoRange { min: f64, max: f64 },
    #[error("cargo range bounds must be finite")]
    NonFiniteCargoRange,
    #[error("efficiency factor {0} outside [0.7, 1.0]")]
    EfficiencyOutOfRange(f64),
    #[error("maintenance condition {0} outside [0, 1]")]
    MaintenanceOutOfRange(f64),
    #[error("fuel consumption rate must be positive, got {0} L/h")]
    NonPositiveFuelRate(f64),
    #[error("equipment age must be non-negative, got {0} years")]
    NegativeAge(f64),
    #[error("fuel level {0}% outside [0, 100]")]
    FuelOutOfRange(f64),
    #[error("location ({latitude}, {longitude}) out of range")]
    InvalidLocation { latitude: f64, longitude: f64 },
}

/// Vehicle operational status
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
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum VehicleStatus {
    InTransit,
    Loading,
    Unloading,
    Maintenance,
    Idle,
}

/// Cargo type with the temperature band it must be kept within (°C)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CargoSpec {
    Frozen { min_c: f64, max_c: f64 },
    Refrigerated { min_c: f64, max_c: f64 },
    Pharmaceutical { min_c: f64, max_c: f64 },
}

impl CargoSpec {
    pub fn frozen() -> Self {
        CargoSpec::Frozen { min_c: -25.0, max_c: -18.0 }
    }

    pub fn refrigerated() -> Self {
        CargoSpec::Refrigerated { min_c: 0.0, max_c: 4.0 }
    }

    pub fn pharmaceutical() -> Self {
        CargoSpec::Pharmaceutical { min_c: 2.0, max_c: 8.0 }
    }

    /// (min, max) in °C
    pub fn range(&self) -> (f64, f64) {
        match *self {
            CargoSpec::Frozen { min_c, max_c }
            | CargoSpec::Refrigerated { min_c, max_c }
            | CargoSpec::Pharmaceutical { min_c, max_c } => (min_c, max_c),
        }
    }

    /// Midpoint of the cargo range
    pub fn target_c(&self) -> f64 {
        let (min, max) = self.range();
        (min + max) / 2.0
    }

    pub fn label(&self) -> &'static str {
        match self {
            CargoSpec::Frozen { .. } => "frozen",
            CargoSpec::Refrigerated { .. } => "refrigerated",
            CargoSpec::Pharmaceutical { .. } => "pharmaceutical",
        }
    }

    pub fn validate(&self) -> Result<(), VehicleError> {
        let (min, max) = self.range();
        if !min.is_finite() || !max.is_finite() {
            return Err(VehicleError::NonFiniteCargoRange);
        }
        if min > max {
            return Err(VehicleError::InvalidCargoRange { min, max });
        }
        Ok(())
    }
}

/// Refrigeration unit characteristics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentProfile {
    pub manufacturer: String,
    pub model: String,
    pub age_years: f64,
    /// 0.7 (worn) to 1.0 (new)
    pub efficiency: f64,
    /// Nominal fuel consumption of the reefer unit, L/hour
    pub fuel_rate_lph: f64,
    /// 0 (failing) to 1 (fully serviced)
    pub maintenance_condition: f64,
}

impl EquipmentProfile {
    pub fn validate(&self) -> Result<(), VehicleError> {
        if !(self.age_years >= 0.0) {
            return Err(VehicleError::NegativeAge(self.age_years));
        }
        if !(0.7..=1.0).contains(&self.efficiency) {
            return Err(VehicleError::EfficiencyOutOfRange(self.efficiency));
        }
        if !(self.fuel_rate_lph > 0.0) || !self.fuel_rate_lph.is_finite() {
            return Err(VehicleError::NonPositiveFuelRate(self.fuel_rate_lph));
        }
        if !(0.0..=1.0).contains(&self.maintenance_condition) {
            return Err(VehicleError::MaintenanceOutOfRange(
                self.maintenance_condition,
            ));
        }
        Ok(())
    }
}

/// A simulated refrigerated vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub operator_id: String,
    pub location: Location,
    pub destination: Option<Location>,
    pub cargo: CargoSpec,
    pub equipment: EquipmentProfile,
    pub status: VehicleStatus,
    pub distance_km: f64,
    pub fuel_percent: f64,
    pub last_maintenance: DateTime<Utc>,
}

impl Vehicle {
    /// Target temperature for readings: midpoint of the cargo range
    pub fn target_temperature_c(&self) -> f64 {
        self.cargo.target_c()
    }

    pub fn validate(&self) -> Result<(), VehicleError> {
        self.cargo.validate()?;
        self.equipment.validate()?;
        if !(0.0..=100.0).contains(&self.fuel_percent) {
            return Err(VehicleError::FuelOutOfRange(self.fuel_percent));
        }
        if !self.location.is_valid() {
            return Err(VehicleError::InvalidLocation {
                latitude: self.location.latitude,
                longitude: self.location.longitude,
            });
        }
        Ok(())
    }
}

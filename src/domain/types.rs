use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Stable vehicle identifier (e.g. `TRK-0042`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VehicleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// Geography
// ============================================================================

/// Geographic position with descriptive place names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub city: String,
    pub region: String,
    pub country: String,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            city: String::new(),
            region: String::new(),
            country: String::new(),
        }
    }

    pub fn named(
        latitude: f64,
        longitude: f64,
        city: impl Into<String>,
        region: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            city: city.into(),
            region: region.into(),
            country: country.into(),
        }
    }

    /// Latitude within [-90, 90] and longitude within [-180, 180]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Coarse grid cell (0.1°) used as a cache key for environment lookups
    pub fn cell(&self) -> (i32, i32) {
        (
            (self.latitude * 10.0).round() as i32,
            (self.longitude * 10.0).round() as i32,
        )
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Ambient conditions at a location and point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSample {
    pub temperature_c: f64,
    /// Relative humidity, 0-100
    pub humidity_percent: f64,
    pub wind_speed_ms: f64,
    pub precipitation_mm: f64,
    /// 0-100
    pub cloud_cover_percent: f64,
    pub observed_at: DateTime<Utc>,
}

impl EnvironmentSample {
    /// Clamp every field into its documented range
    pub fn normalized(mut self) -> Self {
        self.humidity_percent = self.humidity_percent.clamp(0.0, 100.0);
        self.cloud_cover_percent = self.cloud_cover_percent.clamp(0.0, 100.0);
        self.wind_speed_ms = self.wind_speed_ms.max(0.0);
        self.precipitation_mm = self.precipitation_mm.max(0.0);
        self
    }

    /// Mild, dry conditions; handy as a neutral baseline
    pub fn mild(observed_at: DateTime<Utc>) -> Self {
        Self {
            temperature_c: 20.0,
            humidity_percent: 50.0,
            wind_speed_ms: 3.0,
            precipitation_mm: 0.0,
            cloud_cover_percent: 40.0,
            observed_at,
        }
    }
}

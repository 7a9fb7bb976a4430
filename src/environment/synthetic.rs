//! Synthetic weather: a smooth climatology curve plus seeded noise.
//!
//! Output is a pure function of (seed, 0.1° cell, UTC hour), so repeated lookups for the
//! same place and hour agree and runs are reproducible.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Utc};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

use super::{EnvironmentError, EnvironmentProvider};
use crate::domain::{EnvironmentSample, Location};

/// Standard deviation of the hourly temperature noise (°C)
const NOISE_STD_DEV_C: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct SyntheticEnvironment {
    seed: u64,
}

impl SyntheticEnvironment {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Noise-free temperature for a latitude/longitude at a given time
    ///
    /// Annual mean falls off with latitude; the seasonal swing grows with latitude and is
    /// mirrored in the southern hemisphere; the daily cycle peaks mid-afternoon local solar time.
    pub fn climatology_c(latitude: f64, longitude: f64, at: DateTime<Utc>) -> f64 {
        let abs_lat = latitude.abs();
        let annual_mean = 28.0 - 0.45 * abs_lat;

        let day_of_year = at.ordinal() as f64;
        let hemisphere = if latitude >= 0.0 { 1.0 } else { -1.0 };
        let seasonal_amplitude = 2.0 + 0.25 * abs_lat;
        // Peaks around day 200 (mid July) in the north
        let seasonal =
            hemisphere * seasonal_amplitude * (2.0 * PI * (day_of_year - 200.0) / 365.0).cos();

        let utc_hour = at.hour() as f64 + at.minute() as f64 / 60.0;
        let solar_hour = (utc_hour + longitude / 15.0).rem_euclid(24.0);
        // Peaks at 15:00 solar time
        let diurnal = 5.0 * (2.0 * PI * (solar_hour - 9.0) / 24.0).sin();

        annual_mean + seasonal + diurnal
    }

    fn rng_for(&self, location: &Location, at: DateTime<Utc>) -> rand::rngs::StdRng {
        let (lat_cell, lon_cell) = location.cell();
        let hour_index = at.timestamp().div_euclid(3600) as u64;
        let mixed = self
            .seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add((lat_cell as i64 as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9))
            .wrapping_add((lon_cell as i64 as u64).wrapping_mul(0x94D0_49BB_1331_11EB))
            .wrapping_add(hour_index);
        rand::rngs::StdRng::seed_from_u64(mixed)
    }

    pub fn sample(&self, location: &Location, at: DateTime<Utc>) -> EnvironmentSample {
        let mut rng = self.rng_for(location, at);

        let noise = Normal::new(0.0, NOISE_STD_DEV_C)
            .map(|n| n.sample(&mut rng))
            .unwrap_or(0.0);
        let temperature_c =
            Self::climatology_c(location.latitude, location.longitude, at) + noise;

        let cloud_cover_percent: f64 = rng.gen_range(0.0..100.0);
        let precipitation_mm = if cloud_cover_percent > 70.0 && rng.gen_bool(0.35) {
            rng.gen_range(0.1..6.0)
        } else {
            0.0
        };

        // Warmer air reads drier; rain pushes it up
        let humidity_base = 85.0 - 1.2 * (temperature_c - 10.0).max(0.0);
        let humidity_percent =
            humidity_base + rng.gen_range(-10.0..10.0) + precipitation_mm * 3.0;

        let wind_speed_ms = Normal::<f64>::new(4.0, 2.0)
            .map(|n| n.sample(&mut rng))
            .unwrap_or(4.0)
            .abs();

        EnvironmentSample {
            temperature_c,
            humidity_percent,
            wind_speed_ms,
            precipitation_mm,
            cloud_cover_percent,
            observed_at: at,
        }
        .normalized()
    }
}

#[async_trait]
impl EnvironmentProvider for SyntheticEnvironment {
    async fn get_environment(
        &self,
        location: &Location,
        at: DateTime<Utc>,
    ) -> Result<EnvironmentSample, EnvironmentError> {
        if !location.is_valid() {
            return Err(EnvironmentError::InvalidLocation {
                latitude: location.latitude,
                longitude: location.longitude,
            });
        }
        Ok(self.sample(location, at))
    }
}

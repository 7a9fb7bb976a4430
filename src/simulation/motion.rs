//! Flat-earth dead reckoning: pick a speed and heading, nudge lat/lon.
//!
//! Not a routed path. The only randomized inputs are speed and heading; `project` is a pure
//! function of them.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::Location;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    pub min_speed_kmh: f64,
    pub max_speed_kmh: f64,
    /// Degrees of lat/lon moved per km/h of speed each tick
    pub scale_deg_per_kmh: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            min_speed_kmh: 60.0,
            max_speed_kmh: 80.0,
            scale_deg_per_kmh: 0.0001,
        }
    }
}

/// Result of one motion step
#[derive(Debug, Clone, PartialEq)]
pub struct MotionStep {
    pub speed_kmh: f64,
    pub heading_deg: f64,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct MotionModel {
    config: MotionConfig,
}

impl MotionModel {
    pub fn new(config: MotionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// new_lat = lat + speed·cos(heading)·k, new_lon = lon + speed·sin(heading)·k
    pub fn project(&self, from: &Location, speed_kmh: f64, heading_deg: f64) -> Location {
        let heading = heading_deg.to_radians();
        let k = self.config.scale_deg_per_kmh;

        let latitude = (from.latitude + speed_kmh * heading.cos() * k).clamp(-90.0, 90.0);
        let longitude = wrap_longitude(from.longitude + speed_kmh * heading.sin() * k);

        Location {
            latitude,
            longitude,
            ..from.clone()
        }
    }

    pub fn advance<R: Rng>(&self, from: &Location, rng: &mut R) -> MotionStep {
        let speed_kmh = if self.config.max_speed_kmh > self.config.min_speed_kmh {
            rng.gen_range(self.config.min_speed_kmh..=self.config.max_speed_kmh)
        } else {
            self.config.min_speed_kmh
        };
        let heading_deg = rng.gen_range(0.0..360.0);

        MotionStep {
            speed_kmh,
            heading_deg,
            location: self.project(from, speed_kmh, heading_deg),
        }
    }
}

impl Default for MotionModel {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}

fn wrap_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        lon
    } else {
        (lon + 180.0).rem_euclid(360.0) - 180.0
    }
}

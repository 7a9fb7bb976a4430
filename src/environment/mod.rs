//! # Environment Providers
//!
//! Ambient conditions (temperature, humidity, wind, precipitation, cloud cover)
//! for a point on the map at a point in time.
//!
//! - **SyntheticEnvironment**: seeded latitude/season/time-of-day model, no network
//! - **OpenMeteoClient**: current conditions from the Open-Meteo HTTP API
//! - **FallbackEnvironment**: wraps any provider with a per-cell cache and serves the
//!   last good sample when the inner provider is unavailable

pub mod fallback;
pub mod open_meteo;
pub mod synthetic;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{EnvironmentSample, Location};

pub use fallback::FallbackEnvironment;
pub use open_meteo::OpenMeteoClient;
pub use synthetic::SyntheticEnvironment;

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("environment source unavailable: {0}")]
    Unavailable(String),
    #[error("environment response could not be decoded: {0}")]
    Decode(String),
    #[error("location ({latitude}, {longitude}) is out of range")]
    InvalidLocation { latitude: f64, longitude: f64 },
}

impl EnvironmentError {
    /// Whether a stale sample may stand in for this failure
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Decode(_))
    }
}

#[async_trait]
pub trait EnvironmentProvider: Send + Sync {
    async fn get_environment(
        &self,
        location: &Location,
        at: DateTime<Utc>,
    ) -> Result<EnvironmentSample, EnvironmentError>;
}

#[async_trait]
impl<P: EnvironmentProvider + ?Sized> EnvironmentProvider for Arc<P> {
    async fn get_environment(
        &self,
        location: &Location,
        at: DateTime<Utc>,
    ) -> Result<EnvironmentSample, EnvironmentError> {
        (**self).get_environment(location, at).await
    }
}

/// Fixed conditions everywhere; useful for scenario tests
#[derive(Debug, Clone)]
pub struct ConstantEnvironment {
    pub sample: EnvironmentSample,
}

impl ConstantEnvironment {
    pub fn new(sample: EnvironmentSample) -> Self {
        Self { sample }
    }

    pub fn at_temperature(temperature_c: f64) -> Self {
        let mut sample = EnvironmentSample::mild(Utc::now());
        sample.temperature_c = temperature_c;
        Self { sample }
    }
}

#[async_trait]
impl EnvironmentProvider for ConstantEnvironment {
    async fn get_environment(
        &self,
        _location: &Location,
        at: DateTime<Utc>,
    ) -> Result<EnvironmentSample, EnvironmentError> {
        Ok(EnvironmentSample {
            observed_at: at,
            ..self.sample.clone()
        })
    }
}

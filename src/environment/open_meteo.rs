//! Current-conditions client for the Open-Meteo forecast API

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{EnvironmentError, EnvironmentProvider};
use crate::domain::{EnvironmentSample, Location};

pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com";

const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,wind_speed_10m,precipitation,cloud_cover";

pub struct OpenMeteoClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl OpenMeteoClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, EnvironmentError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("reefer-fleet-sim/0.1")
            .build()
            .map_err(|e| EnvironmentError::Unavailable(e.to_string()))?;

        let policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(200), Duration::from_secs(5))
            .build_with_max_retries(max_retries);

        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(policy))
            .build();

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self) -> String {
        format!("{}/v1/forecast", self.base_url.trim_end_matches('/'))
    }

    fn parse(response: OpenMeteoResponse, at: DateTime<Utc>) -> EnvironmentSample {
        let current = response.current;
        let observed_at = current
            .time
            .as_deref()
            .and_then(|t| NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M").ok())
            .map(|naive| naive.and_utc())
            .unwrap_or(at);

        EnvironmentSample {
            temperature_c: current.temperature_2m,
            humidity_percent: current.relative_humidity_2m.unwrap_or(70.0),
            wind_speed_ms: current.wind_speed_10m.unwrap_or(3.0),
            precipitation_mm: current.precipitation.unwrap_or(0.0),
            cloud_cover_percent: current.cloud_cover.unwrap_or(50.0),
            observed_at,
        }
        .normalized()
    }
}

#[async_trait]
impl EnvironmentProvider for OpenMeteoClient {
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

        let latitude = format!("{:.4}", location.latitude);
        let longitude = format!("{:.4}", location.longitude);
        debug!(%latitude, %longitude, "fetching current conditions from Open-Meteo");

        let response = self
            .client
            .get(self.url())
            .query(&[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("current", CURRENT_FIELDS),
                ("wind_speed_unit", "ms"),
                ("timezone", "GMT"),
            ])
            .send()
            .await
            .map_err(|e| EnvironmentError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Open-Meteo returned error status");
            return Err(EnvironmentError::Unavailable(format!("HTTP {status}")));
        }

        let body: OpenMeteoResponse = response
            .json()
            .await
            .map_err(|e| EnvironmentError::Decode(e.to_string()))?;

        Ok(Self::parse(body, at))
    }
}

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    current: OpenMeteoCurrent,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoCurrent {
    time: Option<String>,
    temperature_2m: f64,
    relative_humidity_2m: Option<f64>,
    wind_speed_10m: Option<f64>,
    precipitation: Option<f64>,
    cloud_cover: Option<f64>,
}

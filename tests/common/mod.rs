#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

use reefer_fleet_sim::domain::{
    Alert, CargoSpec, EnvironmentSample, EquipmentProfile, Location, Reading, Vehicle, VehicleId,
    VehicleStatus,
};
use reefer_fleet_sim::environment::{EnvironmentError, EnvironmentProvider};
use reefer_fleet_sim::simulation::EngineConfig;
use reefer_fleet_sim::sinks::{AlertChannel, ReadingSink, SinkError};

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 14, 6, 0, 0).unwrap()
}

pub fn engine_config(seed: u64) -> EngineConfig {
    EngineConfig {
        tick_interval: Duration::from_secs(30),
        realtime: false,
        seed,
        max_ticks: None,
        max_concurrency: 8,
        optimization_every_ticks: 0,
        history_capacity: 64,
        environment_cache_ttl: Duration::from_secs(600),
        start_time: start_time(),
    }
}

/// New, fully serviced unit parked in Chicago
pub fn vehicle(id: &str, cargo: CargoSpec, status: VehicleStatus) -> Vehicle {
    Vehicle {
        id: VehicleId::new(id),
        operator_id: "OP-101".to_string(),
        location: Location::named(41.8781, -87.6298, "Chicago", "IL", "USA"),
        destination: None,
        cargo,
        equipment: EquipmentProfile {
            manufacturer: "Carrier Transicold".to_string(),
            model: "Vector 8600MT".to_string(),
            age_years: 1.0,
            efficiency: 1.0,
            fuel_rate_lph: 2.0,
            maintenance_condition: 1.0,
        },
        status,
        distance_km: 0.0,
        fuel_percent: 90.0,
        last_maintenance: start_time(),
    }
}

pub fn drain<T>(rx: &mut mpsc::Receiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        out.push(item);
    }
    out
}

/// Answers the first `healthy_calls` requests, then reports the source unavailable
pub struct FlakyEnvironment {
    healthy_calls: usize,
    calls: AtomicUsize,
}

impl FlakyEnvironment {
    pub fn new(healthy_calls: usize) -> Self {
        Self {
            healthy_calls,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnvironmentProvider for FlakyEnvironment {
    async fn get_environment(
        &self,
        _location: &Location,
        at: DateTime<Utc>,
    ) -> Result<EnvironmentSample, EnvironmentError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.healthy_calls {
            Ok(EnvironmentSample::mild(at))
        } else {
            Err(EnvironmentError::Unavailable("weather service timed out".into()))
        }
    }
}

/// Slow but healthy source, used to keep a tick in flight
pub struct SlowEnvironment(pub Duration);

#[async_trait]
impl EnvironmentProvider for SlowEnvironment {
    async fn get_environment(
        &self,
        _location: &Location,
        at: DateTime<Utc>,
    ) -> Result<EnvironmentSample, EnvironmentError> {
        tokio::time::sleep(self.0).await;
        Ok(EnvironmentSample::mild(at))
    }
}

pub struct DownChannel;

#[async_trait]
impl AlertChannel for DownChannel {
    async fn dispatch(&self, _alert: &Alert) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("pager gateway offline".into()))
    }
}

/// Reading sink whose broker is offline; counts attempts
#[derive(Default)]
pub struct DownReadingSink {
    attempts: AtomicUsize,
}

impl DownReadingSink {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadingSink for DownReadingSink {
    async fn emit(&self, _reading: &Reading) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Unavailable("telemetry broker offline".into()))
    }
}

/// Stationary unit parked in its own 0.1° cell, so environment lookups are not shared
pub fn parked(n: usize) -> Vehicle {
    let mut v = vehicle(&format!("TRK-{n:04}"), CargoSpec::frozen(), VehicleStatus::Idle);
    v.location = Location::new(30.0 + n as f64, -95.0);
    v
}

pub fn key(r: &Reading) -> (DateTime<Utc>, String) {
    (r.timestamp, r.vehicle_id.as_str().to_string())
}

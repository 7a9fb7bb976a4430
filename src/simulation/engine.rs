use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::anomaly::{AnomalyDetector, AnomalyThresholds, Classification};
use super::history::FleetHistory;
use super::motion::{MotionConfig, MotionModel};
use super::thermal::{ThermalConfig, ThermalModel};
use crate::dispatch::AlertDispatcher;
use crate::domain::{Severity, Vehicle, VehicleError, VehicleId, VehicleStatus};
use crate::environment::{EnvironmentProvider, FallbackEnvironment, SyntheticEnvironment};
use crate::fleet::{FleetRegistry, VehicleEntry};
use crate::optimizer::EnergyOptimizationEstimator;
use crate::sinks::{AlertChannel, LogSink, ReadingSink};

/// Usable reefer fuel tank (L); fuel level is tracked as a percentage of this.
pub const TANK_CAPACITY_L: f64 = 300.0;
/// Below this fuel level an in-transit vehicle pulls in for service.
pub const LOW_FUEL_PERCENT: f64 = 10.0;

const EVENT_BUFFER: usize = 1024;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    Config(String),
    #[error("fleet registry is empty")]
    EmptyFleet,
    #[error("no processable vehicles left after tick {tick}")]
    FleetExhausted { tick: u64 },
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Simulated time between ticks; also the wall-clock pacing when `realtime` is set
    pub tick_interval: Duration,
    pub realtime: bool,
    pub seed: u64,
    pub max_ticks: Option<u64>,
    /// Upper bound on vehicle pipelines in flight at once
    pub max_concurrency: usize,
    /// 0 disables the periodic estimate
    pub optimization_every_ticks: u64,
    pub history_capacity: usize,
    /// Fresh-hit window for the per-cell environment cache
    pub environment_cache_ttl: Duration,
    pub start_time: DateTime<Utc>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(30),
            realtime: true,
            seed: 42,
            max_ticks: None,
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get() * 4)
                .unwrap_or(16),
            optimization_every_ticks: 20,
            history_capacity: super::history::DEFAULT_READING_CAPACITY,
            environment_cache_ttl: Duration::from_secs(600),
            start_time: Utc::now(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.tick_interval.is_zero() {
            return Err(EngineError::Config("tick interval must be positive".into()));
        }
        self.tick_step()?;
        if self.max_concurrency == 0 {
            return Err(EngineError::Config("max_concurrency must be at least 1".into()));
        }
        if self.history_capacity == 0 {
            return Err(EngineError::Config("history_capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// Simulated clock advance per tick
    fn tick_step(&self) -> Result<chrono::Duration, EngineError> {
        chrono::Duration::from_std(self.tick_interval)
            .map_err(|e| EngineError::Config(format!("tick interval: {e}")))
    }

    fn tick_hours(&self) -> f64 {
        self.tick_interval.as_secs_f64() / 3600.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PipelineStage {
    Environment,
    AlertDispatch,
    ReadingEmit,
    Task,
}

/// A recoverable failure confined to one vehicle's tick
#[derive(Debug, Clone, Serialize)]
pub struct VehicleFailure {
    pub vehicle_id: VehicleId,
    pub stage: PipelineStage,
    pub error: String,
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    VehicleExcluded {
        tick: u64,
        vehicle_id: VehicleId,
        reason: VehicleError,
    },
    VehicleFailed {
        tick: u64,
        failure: VehicleFailure,
    },
    TickCompleted(TickReport),
}

#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    pub vehicles_processed: usize,
    pub readings: usize,
    pub warnings: usize,
    pub critical: usize,
    pub excluded: Vec<VehicleId>,
    pub failures: Vec<VehicleFailure>,
}

impl TickReport {
    fn new(tick: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            tick,
            timestamp,
            vehicles_processed: 0,
            readings: 0,
            warnings: 0,
            critical: 0,
            excluded: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn alerts(&self) -> usize {
        self.warnings + self.critical
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub readings: usize,
    pub alerts: usize,
    pub excluded: usize,
}

enum VehicleOutcome {
    Excluded(VehicleId, VehicleError),
    Skipped(VehicleFailure),
    Processed {
        classification: Classification,
        failures: Vec<VehicleFailure>,
    },
}

/// Collaborators shared by every pipeline task
struct Pipeline {
    config: EngineConfig,
    registry: Arc<FleetRegistry>,
    environment: Arc<dyn EnvironmentProvider>,
    motion: MotionModel,
    thermal: ThermalModel,
    detector: AnomalyDetector,
    dispatcher: AlertDispatcher,
    readings: Arc<dyn ReadingSink>,
    history: Arc<FleetHistory>,
}

pub struct SimulationEngineBuilder {
    config: EngineConfig,
    registry: Option<Arc<FleetRegistry>>,
    environment: Option<Arc<dyn EnvironmentProvider>>,
    readings: Option<Arc<dyn ReadingSink>>,
    alerts: Option<Arc<dyn AlertChannel>>,
    history: Option<Arc<FleetHistory>>,
    motion: MotionConfig,
    thermal: ThermalConfig,
    thresholds: AnomalyThresholds,
}

impl SimulationEngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            registry: None,
            environment: None,
            readings: None,
            alerts: None,
            history: None,
            motion: MotionConfig::default(),
            thermal: ThermalConfig::default(),
            thresholds: AnomalyThresholds::default(),
        }
    }

    pub fn registry(mut self, registry: Arc<FleetRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Raw source; the engine puts its own stale-fallback cache in front of it
    pub fn environment(mut self, provider: Arc<dyn EnvironmentProvider>) -> Self {
        self.environment = Some(provider);
        self
    }

    pub fn reading_sink(mut self, sink: Arc<dyn ReadingSink>) -> Self {
        self.readings = Some(sink);
        self
    }

    pub fn alert_channel(mut self, channel: Arc<dyn AlertChannel>) -> Self {
        self.alerts = Some(channel);
        self
    }

    pub fn history(mut self, history: Arc<FleetHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn motion(mut self, motion: MotionConfig) -> Self {
        self.motion = motion;
        self
    }

    pub fn thermal(mut self, thermal: ThermalConfig) -> Self {
        self.thermal = thermal;
        self
    }

    pub fn thresholds(mut self, thresholds: AnomalyThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn build(self) -> Result<SimulationEngine, EngineError> {
        self.config.validate()?;

        let m = &self.motion;
        if !(m.min_speed_kmh.is_finite() && m.max_speed_kmh.is_finite())
            || m.min_speed_kmh < 0.0
            || m.min_speed_kmh > m.max_speed_kmh
        {
            return Err(EngineError::Config(format!(
                "speed range {}..{} km/h is not valid",
                m.min_speed_kmh, m.max_speed_kmh
            )));
        }
        let t = &self.thresholds;
        if !(t.warning_c > 0.0 && t.warning_c < t.critical_c) {
            return Err(EngineError::Config(format!(
                "anomaly thresholds must satisfy 0 < warning ({}) < critical ({})",
                self.thresholds.warning_c, self.thresholds.critical_c
            )));
        }

        let tick_step = self.config.tick_step()?;
        let ttl = chrono::Duration::from_std(self.config.environment_cache_ttl)
            .map_err(|e| EngineError::Config(format!("environment cache ttl: {e}")))?;
        let source = self
            .environment
            .unwrap_or_else(|| {
                Arc::new(SyntheticEnvironment::new(self.config.seed))
                    as Arc<dyn EnvironmentProvider>
            });
        let environment: Arc<dyn EnvironmentProvider> =
            Arc::new(FallbackEnvironment::new(source, ttl));

        let history = self
            .history
            .unwrap_or_else(|| Arc::new(FleetHistory::new(self.config.history_capacity)));
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let clock = self.config.start_time;

        Ok(SimulationEngine {
            pipeline: Arc::new(Pipeline {
                registry: self.registry.unwrap_or_default(),
                environment,
                motion: MotionModel::new(self.motion),
                thermal: ThermalModel::new(self.thermal),
                detector: AnomalyDetector::new(self.thresholds),
                dispatcher: AlertDispatcher::new(
                    self.alerts
                        .unwrap_or_else(|| Arc::new(LogSink) as Arc<dyn AlertChannel>),
                ),
                readings: self
                    .readings
                    .unwrap_or_else(|| Arc::new(LogSink) as Arc<dyn ReadingSink>),
                history,
                config: self.config,
            }),
            estimator: EnergyOptimizationEstimator::new(),
            events,
            ticks: 0,
            clock,
            tick_step,
        })
    }
}

/// Drives the fleet one tick at a time.
///
/// Within a tick every active vehicle runs its own pipeline
/// (status → motion → environment → thermal → anomaly → dispatch → emit) as a separate task,
/// bounded by `max_concurrency`. A tick returns only after every pipeline it started has
/// finished, which is what gives cancellation its tick-granular stop boundary.
pub struct SimulationEngine {
    pipeline: Arc<Pipeline>,
    estimator: EnergyOptimizationEstimator,
    events: broadcast::Sender<EngineEvent>,
    ticks: u64,
    clock: DateTime<Utc>,
    tick_step: chrono::Duration,
}

impl SimulationEngine {
    pub fn builder(config: EngineConfig) -> SimulationEngineBuilder {
        SimulationEngineBuilder::new(config)
    }

    pub fn registry(&self) -> Arc<FleetRegistry> {
        self.pipeline.registry.clone()
    }

    pub fn history(&self) -> Arc<FleetHistory> {
        self.pipeline.history.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.pipeline.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Ticks completed so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Simulated time the next tick will be stamped with
    pub fn clock(&self) -> DateTime<Utc> {
        self.clock
    }

    /// Run one tick over every active vehicle.
    pub async fn tick(&mut self) -> Result<TickReport, EngineError> {
        let registry = &self.pipeline.registry;
        if registry.is_empty() {
            return Err(EngineError::EmptyFleet);
        }
        let active = registry.active();
        if active.is_empty() {
            return Err(EngineError::FleetExhausted { tick: self.ticks });
        }

        let tick = self.ticks + 1;
        let timestamp = self.clock;
        let mut report = TickReport::new(tick, timestamp);

        let semaphore = Arc::new(Semaphore::new(self.pipeline.config.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut in_flight: HashMap<task::Id, VehicleId> = HashMap::new();
        for entry in active {
            let pipeline = self.pipeline.clone();
            let semaphore = semaphore.clone();
            let vehicle_id = entry.id().clone();
            let handle = tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                pipeline.process(entry, tick, timestamp).await
            });
            in_flight.insert(handle.id(), vehicle_id);
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => self.absorb(&mut report, outcome),
                Err(e) => {
                    let vehicle_id = in_flight
                        .remove(&e.id())
                        .unwrap_or_else(|| VehicleId::new("unknown"));
                    error!(
                        tick,
                        vehicle_id = %vehicle_id,
                        error = %e,
                        "vehicle pipeline task failed"
                    );
                    self.push_failure(
                        &mut report,
                        VehicleFailure {
                            vehicle_id,
                            stage: PipelineStage::Task,
                            error: e.to_string(),
                        },
                    );
                }
            }
        }

        self.ticks = tick;
        self.clock = timestamp + self.tick_step;

        let every = self.pipeline.config.optimization_every_ticks;
        if every > 0 && tick % every == 0 {
            self.optimize(timestamp).await;
        }

        info!(
            tick,
            timestamp = %timestamp.to_rfc3339(),
            vehicles = report.vehicles_processed,
            readings = report.readings,
            warnings = report.warnings,
            critical = report.critical,
            excluded = report.excluded.len(),
            failures = report.failures.len(),
            "simulation tick"
        );
        let _ = self.events.send(EngineEvent::TickCompleted(report.clone()));
        Ok(report)
    }

    /// Tick until cancelled, `max_ticks` is reached, or no vehicle is left to process.
    ///
    /// The token is checked only between ticks; a tick in flight always completes.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<RunSummary, EngineError> {
        if self.pipeline.registry.is_empty() {
            return Err(EngineError::EmptyFleet);
        }

        let config = self.pipeline.config.clone();
        info!(
            vehicles = self.pipeline.registry.len(),
            tick_seconds = config.tick_interval.as_secs_f64(),
            realtime = config.realtime,
            max_ticks = ?config.max_ticks,
            "simulation engine starting"
        );

        let mut interval = tokio::time::interval(config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut summary = RunSummary::default();

        loop {
            if cancel.is_cancelled() {
                info!(ticks = self.ticks, "stop requested; engine halting");
                break;
            }
            if config.max_ticks.is_some_and(|max| self.ticks >= max) {
                info!(ticks = self.ticks, "tick limit reached");
                break;
            }

            if config.realtime {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!(ticks = self.ticks, "stop requested; engine halting");
                        break;
                    }
                    _ = interval.tick() => {}
                }
            } else {
                tokio::task::yield_now().await;
            }

            let report = self.tick().await?;
            summary.ticks = self.ticks;
            summary.readings += report.readings;
            summary.alerts += report.alerts();
            summary.excluded += report.excluded.len();

            if self.pipeline.registry.active_count() == 0 {
                error!(tick = self.ticks, "every vehicle has been excluded");
                return Err(EngineError::FleetExhausted { tick: self.ticks });
            }
        }

        Ok(summary)
    }

    fn absorb(&self, report: &mut TickReport, outcome: VehicleOutcome) {
        match outcome {
            VehicleOutcome::Excluded(vehicle_id, reason) => {
                let _ = self.events.send(EngineEvent::VehicleExcluded {
                    tick: report.tick,
                    vehicle_id: vehicle_id.clone(),
                    reason,
                });
                report.excluded.push(vehicle_id);
            }
            VehicleOutcome::Skipped(failure) => {
                report.vehicles_processed += 1;
                self.push_failure(report, failure);
            }
            VehicleOutcome::Processed {
                classification,
                failures,
            } => {
                report.vehicles_processed += 1;
                report.readings += 1;
                match classification.severity() {
                    Some(Severity::Warning) => report.warnings += 1,
                    Some(Severity::Critical) => report.critical += 1,
                    None => {}
                }
                for failure in failures {
                    self.push_failure(report, failure);
                }
            }
        }
    }

    fn push_failure(&self, report: &mut TickReport, failure: VehicleFailure) {
        let _ = self.events.send(EngineEvent::VehicleFailed {
            tick: report.tick,
            failure: failure.clone(),
        });
        report.failures.push(failure);
    }

    async fn optimize(&self, at: DateTime<Utc>) {
        let history = &self.pipeline.history;
        for entry in self.pipeline.registry.active() {
            let equipment = entry.lock().await.equipment.clone();
            let window = history.readings(entry.id());
            match self.estimator.estimate(entry.id(), &equipment, &window, at) {
                Ok(result) => {
                    info!(
                        vehicle_id = %result.vehicle_id,
                        baseline_l_day = result.baseline_consumption,
                        optimized_l_day = result.optimized_consumption,
                        savings_percent = result.savings_percent,
                        window = result.window_len,
                        "energy optimization estimate"
                    );
                    history.record_optimization(result);
                }
                Err(e) => debug!(vehicle_id = %entry.id(), error = %e, "optimization skipped"),
            }
        }
    }
}

impl Pipeline {
    async fn process(
        &self,
        entry: Arc<VehicleEntry>,
        tick: u64,
        timestamp: DateTime<Utc>,
    ) -> VehicleOutcome {
        let mut rng = StdRng::seed_from_u64(pipeline_seed(self.config.seed, tick, entry.index()));

        let vehicle = {
            let mut vehicle = entry.lock().await;
            if let Err(reason) = vehicle.validate() {
                drop(vehicle);
                if let Err(e) = self.registry.exclude(entry.id(), reason.clone()) {
                    error!(vehicle_id = %entry.id(), error = %e, "exclusion failed");
                }
                return VehicleOutcome::Excluded(entry.id().clone(), reason);
            }

            advance_status(&mut vehicle, timestamp, &mut rng);
            if vehicle.status == VehicleStatus::InTransit {
                let step = self.motion.advance(&vehicle.location, &mut rng);
                let hours = self.config.tick_hours();
                vehicle.location = step.location;
                vehicle.distance_km += step.speed_kmh * hours;
                let burned = vehicle.equipment.fuel_rate_lph * hours / TANK_CAPACITY_L * 100.0;
                vehicle.fuel_percent = (vehicle.fuel_percent - burned).clamp(0.0, 100.0);
            }
            vehicle.clone()
        };

        let environment = match self
            .environment
            .get_environment(&vehicle.location, timestamp)
            .await
        {
            Ok(sample) => sample,
            Err(e) => {
                warn!(
                    vehicle_id = %vehicle.id,
                    tick,
                    error = %e,
                    "no environment sample; skipping vehicle this tick"
                );
                return VehicleOutcome::Skipped(VehicleFailure {
                    vehicle_id: vehicle.id.clone(),
                    stage: PipelineStage::Environment,
                    error: e.to_string(),
                });
            }
        };

        let (reading, classification) =
            self.thermal
                .reading(&vehicle, &environment, timestamp, &self.detector, &mut rng);
        let mut failures = Vec::new();

        if let Some(mut alert) = self.detector.alert_for(&reading, &mut rng) {
            if let Err(e) = self.dispatcher.dispatch(&mut alert, timestamp).await {
                warn!(
                    vehicle_id = %vehicle.id,
                    alert_id = %alert.id,
                    tick,
                    error = %e,
                    "alert dispatch failed"
                );
                failures.push(VehicleFailure {
                    vehicle_id: vehicle.id.clone(),
                    stage: PipelineStage::AlertDispatch,
                    error: e.to_string(),
                });
            }
            self.history.record_alert(alert);
        }

        if let Err(e) = self.readings.emit(&reading).await {
            warn!(vehicle_id = %vehicle.id, tick, error = %e, "reading emit failed");
            failures.push(VehicleFailure {
                vehicle_id: vehicle.id.clone(),
                stage: PipelineStage::ReadingEmit,
                error: e.to_string(),
            });
        }
        self.history.record_reading(reading);

        VehicleOutcome::Processed {
            classification,
            failures,
        }
    }
}

/// One status step. Only in-transit vehicles move afterwards.
pub fn advance_status<R: Rng>(vehicle: &mut Vehicle, now: DateTime<Utc>, rng: &mut R) {
    let next = match vehicle.status {
        VehicleStatus::InTransit if vehicle.fuel_percent < LOW_FUEL_PERCENT => {
            Some(VehicleStatus::Maintenance)
        }
        VehicleStatus::InTransit if rng.gen_bool(0.02) => Some(VehicleStatus::Unloading),
        VehicleStatus::Unloading if rng.gen_bool(0.3) => Some(VehicleStatus::Loading),
        VehicleStatus::Loading if rng.gen_bool(0.3) => Some(VehicleStatus::InTransit),
        VehicleStatus::Idle if rng.gen_bool(0.1) => Some(VehicleStatus::Loading),
        VehicleStatus::Maintenance if rng.gen_bool(0.2) => {
            vehicle.fuel_percent = 100.0;
            vehicle.last_maintenance = now;
            Some(VehicleStatus::Idle)
        }
        _ => None,
    };

    if let Some(status) = next {
        debug!(vehicle_id = %vehicle.id, from = %vehicle.status, to = %status, "status change");
        vehicle.status = status;
    }
}

/// Per-(seed, tick, vehicle) stream so results do not depend on task scheduling
fn pipeline_seed(seed: u64, tick: u64, index: usize) -> u64 {
    let mut z = seed
        ^ tick.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (index as u64).wrapping_add(1).wrapping_mul(0xD6E8_FEB8_6659_FD93);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vehicle::fixtures;
    use crate::domain::CargoSpec;
    use crate::domain::Reading;
    use crate::environment::ConstantEnvironment;
    use crate::sinks::SinkError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rand::rngs::mock::StepRng;

    /// Panics on one vehicle's reading, accepts the rest
    struct PanicsOn(&'static str);

    #[async_trait]
    impl ReadingSink for PanicsOn {
        async fn emit(&self, reading: &Reading) -> Result<(), SinkError> {
            if reading.vehicle_id.as_str() == self.0 {
                panic!("sink bug for {}", self.0);
            }
            Ok(())
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            tick_interval: Duration::from_secs(30),
            realtime: false,
            seed: 7,
            max_ticks: Some(3),
            max_concurrency: 4,
            optimization_every_ticks: 0,
            history_capacity: 16,
            environment_cache_ttl: Duration::from_secs(600),
            start_time: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    fn engine(vehicles: Vec<Vehicle>) -> SimulationEngine {
        let registry = Arc::new(FleetRegistry::from_vehicles(vehicles).unwrap());
        SimulationEngine::builder(config())
            .registry(registry)
            .environment(Arc::new(ConstantEnvironment::at_temperature(20.0)))
            .build()
            .unwrap()
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let mut cfg = config();
        cfg.tick_interval = Duration::ZERO;
        let err = SimulationEngine::builder(cfg).build().err().unwrap();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_unrepresentable_tick_interval_rejected() {
        let mut cfg = config();
        cfg.tick_interval = Duration::from_secs(u64::MAX);
        assert!(matches!(cfg.validate(), Err(EngineError::Config(_))));
        let err = SimulationEngine::builder(cfg).build().err().unwrap();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_inverted_speed_range_rejected() {
        let err = SimulationEngine::builder(config())
            .motion(MotionConfig {
                min_speed_kmh: 90.0,
                max_speed_kmh: 60.0,
                ..MotionConfig::default()
            })
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[tokio::test]
    async fn test_empty_fleet() {
        let mut engine = SimulationEngine::builder(config()).build().unwrap();
        assert!(matches!(engine.tick().await, Err(EngineError::EmptyFleet)));
        assert!(matches!(
            engine.run(CancellationToken::new()).await,
            Err(EngineError::EmptyFleet)
        ));
    }

    #[tokio::test]
    async fn test_tick_advances_clock_and_counter() {
        let mut engine = engine(vec![fixtures::vehicle("TRK-0001", CargoSpec::refrigerated())]);
        let start = engine.clock();

        let report = engine.tick().await.unwrap();
        assert_eq!(report.tick, 1);
        assert_eq!(report.timestamp, start);
        assert_eq!(report.readings, 1);
        assert_eq!(engine.ticks(), 1);
        assert_eq!(engine.clock(), start + chrono::Duration::seconds(30));
    }

    #[tokio::test]
    async fn test_panicked_pipeline_names_its_vehicle() {
        let registry = Arc::new(
            FleetRegistry::from_vehicles([
                fixtures::vehicle("TRK-0001", CargoSpec::frozen()),
                fixtures::vehicle("TRK-0002", CargoSpec::refrigerated()),
            ])
            .unwrap(),
        );
        let mut engine = SimulationEngine::builder(config())
            .registry(registry.clone())
            .environment(Arc::new(ConstantEnvironment::at_temperature(20.0)))
            .reading_sink(Arc::new(PanicsOn("TRK-0002")))
            .build()
            .unwrap();
        let mut events = engine.subscribe();

        let report = engine.tick().await.unwrap();
        assert_eq!(report.readings, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].vehicle_id.as_str(), "TRK-0002");
        assert_eq!(report.failures[0].stage, PipelineStage::Task);

        let failed = std::iter::from_fn(|| events.try_recv().ok())
            .filter(|e| matches!(e, EngineEvent::VehicleFailed { .. }))
            .count();
        assert_eq!(failed, 1);

        // A panic is not an invalid state: the vehicle stays in the fleet
        assert_eq!(registry.active_count(), 2);
        assert_eq!(engine.tick().await.unwrap().tick, 2);
    }

    #[tokio::test]
    async fn test_invalid_vehicle_excluded_once() {
        let mut broken = fixtures::vehicle("TRK-0002", CargoSpec::refrigerated());
        broken.cargo = CargoSpec::Refrigerated { min_c: 6.0, max_c: 1.0 };
        let mut engine = engine(vec![
            fixtures::vehicle("TRK-0001", CargoSpec::frozen()),
            broken,
        ]);
        let mut events = engine.subscribe();

        let first = engine.tick().await.unwrap();
        assert_eq!(first.excluded, vec![VehicleId::new("TRK-0002")]);
        assert_eq!(first.readings, 1);

        let second = engine.tick().await.unwrap();
        assert!(second.excluded.is_empty());
        assert_eq!(second.vehicles_processed, 1);

        let mut saw_exclusion = false;
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::VehicleExcluded { vehicle_id, reason, .. } = event {
                assert_eq!(vehicle_id.as_str(), "TRK-0002");
                assert!(matches!(reason, VehicleError::InvalidCargoRange { .. }));
                saw_exclusion = true;
            }
        }
        assert!(saw_exclusion);
    }

    #[tokio::test]
    async fn test_all_excluded_halts_run() {
        let mut broken = fixtures::vehicle("TRK-0009", CargoSpec::frozen());
        broken.equipment.efficiency = 0.2;
        let mut engine = engine(vec![broken]);

        let err = engine.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::FleetExhausted { tick: 1 }));
    }

    #[tokio::test]
    async fn test_run_stops_at_max_ticks() {
        let mut engine = engine(vec![
            fixtures::vehicle("TRK-0001", CargoSpec::frozen()),
            fixtures::vehicle("TRK-0002", CargoSpec::pharmaceutical()),
        ]);
        let summary = engine.run(CancellationToken::new()).await.unwrap();
        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.readings, 6);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let mut engine = engine(vec![fixtures::vehicle("TRK-0001", CargoSpec::frozen())]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = engine.run(cancel).await.unwrap();
        assert_eq!(summary.ticks, 0);
        assert!(engine.history().readings(&VehicleId::new("TRK-0001")).is_empty());
    }

    #[test]
    fn test_low_fuel_goes_to_maintenance() {
        let now = Utc::now();
        let mut v = fixtures::vehicle("TRK-0001", CargoSpec::frozen());
        v.fuel_percent = 4.0;
        advance_status(&mut v, now, &mut StepRng::new(u64::MAX, 0));
        assert_eq!(v.status, VehicleStatus::Maintenance);
    }

    #[test]
    fn test_maintenance_exit_refuels() {
        let now = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        let mut v = fixtures::vehicle("TRK-0001", CargoSpec::frozen());
        v.status = VehicleStatus::Maintenance;
        v.fuel_percent = 5.0;
        // StepRng(0, 0) makes every gen_bool(p > 0) succeed
        advance_status(&mut v, now, &mut StepRng::new(0, 0));
        assert_eq!(v.status, VehicleStatus::Idle);
        assert_eq!(v.fuel_percent, 100.0);
        assert_eq!(v.last_maintenance, now);
    }

    #[test]
    fn test_pipeline_seed_varies_by_tick_and_vehicle() {
        let a = pipeline_seed(1, 1, 0);
        assert_ne!(a, pipeline_seed(1, 2, 0));
        assert_ne!(a, pipeline_seed(1, 1, 1));
        assert_ne!(a, pipeline_seed(2, 1, 0));
        assert_eq!(a, pipeline_seed(1, 1, 0));
    }
}

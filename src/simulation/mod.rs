//! # Fleet Simulation
//!
//! Per-tick models and the engine that drives them.
//!
//! - **Motion**: flat-earth position step from a random speed and heading
//! - **Thermal**: compartment temperature and humidity from cargo target, equipment and weather
//! - **Anomaly**: warning/critical classification of a reading's deviation
//! - **History**: bounded recent readings, alerts and optimization estimates
//! - **Engine**: tick loop with per-vehicle pipelines and cooperative cancellation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reefer_fleet_sim::fleet::{generate_fleet, FleetRegistry};
//! use reefer_fleet_sim::simulation::{EngineConfig, SimulationEngine};
//! use rand::SeedableRng;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! let fleet = generate_fleet(10, chrono::Utc::now(), &mut rng);
//! let registry = Arc::new(FleetRegistry::from_vehicles(fleet)?);
//!
//! let mut engine = SimulationEngine::builder(EngineConfig {
//!     realtime: false,
//!     max_ticks: Some(5),
//!     ..Default::default()
//! })
//! .registry(registry)
//! .build()?;
//!
//! let summary = engine.run(CancellationToken::new()).await?;
//! println!("{} readings", summary.readings);
//! # Ok(())
//! # }
//! ```

pub mod anomaly;
pub mod engine;
pub mod history;
pub mod motion;
pub mod thermal;

pub use anomaly::{AnomalyDetector, AnomalyThresholds, Classification};
pub use engine::{
    advance_status, EngineConfig, EngineError, EngineEvent, PipelineStage, RunSummary,
    SimulationEngine, SimulationEngineBuilder, TickReport, VehicleFailure,
};
pub use history::FleetHistory;
pub use motion::{MotionConfig, MotionModel, MotionStep};
pub use thermal::{ThermalConfig, ThermalModel, ThermalSample};

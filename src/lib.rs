//! Refrigerated fleet telemetry simulator.
//!
//! Synthesizes per-tick sensor readings for a fleet of reefer trucks, flags temperature
//! excursions as alerts and estimates fuel savings from optimized refrigeration control.

#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod environment;
pub mod fleet;
pub mod optimizer;
pub mod simulation;
pub mod sinks;
pub mod telemetry;

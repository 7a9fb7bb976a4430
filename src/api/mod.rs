//! Read-only status surface over the registry and recent telemetry.

pub mod error;
pub mod v1;

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::fleet::FleetRegistry;
use crate::optimizer::EnergyOptimizationEstimator;
use crate::simulation::FleetHistory;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<FleetRegistry>,
    pub history: Arc<FleetHistory>,
    pub estimator: EnergyOptimizationEstimator,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(registry: Arc<FleetRegistry>, history: Arc<FleetHistory>) -> Self {
        Self {
            registry,
            history,
            estimator: EnergyOptimizationEstimator::new(),
            started_at: Utc::now(),
        }
    }
}

pub fn router(state: AppState, cfg: &ServerConfig) -> Router {
    Router::new()
        .nest("/api/v1", v1::router(state))
        .layer(
            ServiceBuilder::new()
                .layer(TimeoutLayer::new(Duration::from_secs(cfg.request_timeout_secs))),
        )
        .layer(TraceLayer::new_for_http())
}

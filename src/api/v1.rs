use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{error::ApiError, AppState};
use crate::domain::{
    Alert, CargoSpec, EnergyOptimizationResult, Location, Reading, Vehicle, VehicleId,
    VehicleStatus,
};
use crate::fleet::VehicleEntry;
use crate::simulation::history::ALERT_CAPACITY;

const DEFAULT_ALERT_LIMIT: usize = 50;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/fleet", get(list_fleet))
        .route("/vehicles/:id", get(get_vehicle))
        .route("/vehicles/:id/readings", get(get_readings))
        .route("/vehicles/:id/optimization", get(get_optimization))
        .route("/alerts", get(list_alerts))
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub vehicles: usize,
    pub active_vehicles: usize,
    pub started_at: DateTime<Utc>,
}

pub async fn healthz(State(st): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        vehicles: st.registry.len(),
        active_vehicles: st.registry.active_count(),
        started_at: st.started_at,
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VehicleSummary {
    pub id: VehicleId,
    pub status: VehicleStatus,
    pub cargo: CargoSpec,
    pub location: Location,
    pub fuel_percent: f64,
    pub distance_km: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded: Option<String>,
}

pub async fn list_fleet(State(st): State<AppState>) -> Json<Vec<VehicleSummary>> {
    let mut out = Vec::with_capacity(st.registry.len());
    for entry in st.registry.entries() {
        let v = entry.snapshot().await;
        out.push(VehicleSummary {
            id: v.id,
            status: v.status,
            cargo: v.cargo,
            location: v.location,
            fuel_percent: v.fuel_percent,
            distance_km: v.distance_km,
            excluded: entry.exclusion().map(|e| e.to_string()),
        });
    }
    Json(out)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VehicleDetail {
    pub vehicle: Vehicle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded: Option<String>,
    pub latest_reading: Option<Reading>,
}

fn lookup(st: &AppState, id: &str) -> Result<(VehicleId, Arc<VehicleEntry>), ApiError> {
    let id = VehicleId::new(id);
    let entry = st
        .registry
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("vehicle {id}")))?;
    Ok((id, entry))
}

pub async fn get_vehicle(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VehicleDetail>, ApiError> {
    let (id, entry) = lookup(&st, &id)?;
    Ok(Json(VehicleDetail {
        vehicle: entry.snapshot().await,
        excluded: entry.exclusion().map(|e| e.to_string()),
        latest_reading: st.history.latest_reading(&id),
    }))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// Oldest first; `limit` keeps the newest N
pub async fn get_readings(
    State(st): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Vec<Reading>>, ApiError> {
    let (id, _) = lookup(&st, &id)?;
    let mut readings = st.history.readings(&id);
    if let Some(limit) = q.limit {
        let skip = readings.len().saturating_sub(limit);
        readings.drain(..skip);
    }
    Ok(Json(readings))
}

/// Computed from the buffered window on each request
pub async fn get_optimization(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EnergyOptimizationResult>, ApiError> {
    let (id, entry) = lookup(&st, &id)?;
    let equipment = entry.snapshot().await.equipment;
    let window = st.history.readings(&id);
    let result = st.estimator.estimate(&id, &equipment, &window, Utc::now())?;
    Ok(Json(result))
}

pub async fn list_alerts(
    State(st): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    let limit = q.limit.unwrap_or(DEFAULT_ALERT_LIMIT);
    if limit == 0 || limit > ALERT_CAPACITY {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {ALERT_CAPACITY}"
        )));
    }
    Ok(Json(st.history.recent_alerts(limit)))
}

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};

use crate::domain::{Alert, EnergyOptimizationResult, Reading, VehicleId};

pub const DEFAULT_READING_CAPACITY: usize = 120;
pub const ALERT_CAPACITY: usize = 500;

#[derive(Debug, Default)]
struct Buffers {
    readings: HashMap<VehicleId, VecDeque<Reading>>,
    alerts: VecDeque<Alert>,
    optimizations: HashMap<VehicleId, EnergyOptimizationResult>,
}

/// Bounded in-memory record of recent telemetry, shared by the engine and the status API.
#[derive(Debug)]
pub struct FleetHistory {
    reading_capacity: usize,
    alert_capacity: usize,
    buffers: RwLock<Buffers>,
}

impl Default for FleetHistory {
    fn default() -> Self {
        Self::new(DEFAULT_READING_CAPACITY)
    }
}

impl FleetHistory {
    pub fn new(reading_capacity: usize) -> Self {
        Self {
            reading_capacity: reading_capacity.max(1),
            alert_capacity: ALERT_CAPACITY,
            buffers: RwLock::new(Buffers::default()),
        }
    }

    pub fn with_alert_capacity(mut self, capacity: usize) -> Self {
        self.alert_capacity = capacity.max(1);
        self
    }

    pub fn reading_capacity(&self) -> usize {
        self.reading_capacity
    }

    pub fn record_reading(&self, reading: Reading) {
        let mut buffers = self.buffers.write();
        let ring = buffers
            .readings
            .entry(reading.vehicle_id.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.reading_capacity));
        if ring.len() == self.reading_capacity {
            ring.pop_front();
        }
        ring.push_back(reading);
    }

    pub fn record_alert(&self, alert: Alert) {
        let mut buffers = self.buffers.write();
        if buffers.alerts.len() == self.alert_capacity {
            buffers.alerts.pop_front();
        }
        buffers.alerts.push_back(alert);
    }

    pub fn record_optimization(&self, result: EnergyOptimizationResult) {
        self.buffers
            .write()
            .optimizations
            .insert(result.vehicle_id.clone(), result);
    }

    /// Oldest first
    pub fn readings(&self, vehicle_id: &VehicleId) -> Vec<Reading> {
        self.buffers
            .read()
            .readings
            .get(vehicle_id)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn latest_reading(&self, vehicle_id: &VehicleId) -> Option<Reading> {
        self.buffers
            .read()
            .readings
            .get(vehicle_id)
            .and_then(|ring| ring.back().cloned())
    }

    /// Newest first, at most `limit`
    pub fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        self.buffers
            .read()
            .alerts
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn alert_count(&self) -> usize {
        self.buffers.read().alerts.len()
    }

    pub fn optimization(&self, vehicle_id: &VehicleId) -> Option<EnergyOptimizationResult> {
        self.buffers.read().optimizations.get(vehicle_id).cloned()
    }
}

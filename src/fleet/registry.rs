use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::error;

use crate::domain::{Vehicle, VehicleError, VehicleId};

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("vehicle {0} is already registered")]
    DuplicateId(VehicleId),
    #[error("vehicle {0} not found")]
    NotFound(VehicleId),
}

/// One arena slot. The vehicle record is behind its own async mutex so pipelines for
/// different vehicles never contend.
#[derive(Debug)]
pub struct VehicleEntry {
    index: usize,
    id: VehicleId,
    vehicle: AsyncMutex<Vehicle>,
    excluded: Mutex<Option<VehicleError>>,
}

impl VehicleEntry {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> &VehicleId {
        &self.id
    }

    /// Exclusive access to the record for the duration of a pipeline step
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, Vehicle> {
        self.vehicle.lock().await
    }

    pub async fn snapshot(&self) -> Vehicle {
        self.vehicle.lock().await.clone()
    }

    pub fn is_excluded(&self) -> bool {
        self.excluded.lock().is_some()
    }

    pub fn exclusion(&self) -> Option<VehicleError> {
        self.excluded.lock().clone()
    }
}

#[derive(Debug, Default)]
struct Arena {
    slots: Vec<Arc<VehicleEntry>>,
    by_id: HashMap<VehicleId, usize>,
}

/// Authoritative set of simulated vehicles.
///
/// Slots are append-only and indices are stable for the life of the registry. The arena lock
/// is held only for lookups and inserts, never across an await.
#[derive(Debug, Default)]
pub struct FleetRegistry {
    arena: RwLock<Arena>,
}

impl FleetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vehicles(
        vehicles: impl IntoIterator<Item = Vehicle>,
    ) -> Result<Self, RegistryError> {
        let registry = Self::new();
        for v in vehicles {
            registry.insert(v)?;
        }
        Ok(registry)
    }

    /// Add a vehicle; returns its arena index. Validity is checked by the engine per tick,
    /// not here.
    pub fn insert(&self, vehicle: Vehicle) -> Result<usize, RegistryError> {
        let mut arena = self.arena.write();
        if arena.by_id.contains_key(&vehicle.id) {
            return Err(RegistryError::DuplicateId(vehicle.id));
        }
        let index = arena.slots.len();
        let id = vehicle.id.clone();
        arena.slots.push(Arc::new(VehicleEntry {
            index,
            id: id.clone(),
            vehicle: AsyncMutex::new(vehicle),
            excluded: Mutex::new(None),
        }));
        arena.by_id.insert(id, index);
        Ok(index)
    }

    pub fn get(&self, id: &VehicleId) -> Option<Arc<VehicleEntry>> {
        let arena = self.arena.read();
        arena.by_id.get(id).map(|&i| arena.slots[i].clone())
    }

    pub async fn snapshot(&self, id: &VehicleId) -> Option<Vehicle> {
        let entry = self.get(id)?;
        Some(entry.snapshot().await)
    }

    /// All entries in insertion order
    pub fn entries(&self) -> Vec<Arc<VehicleEntry>> {
        self.arena.read().slots.clone()
    }

    /// Entries still eligible for ticks
    pub fn active(&self) -> Vec<Arc<VehicleEntry>> {
        self.arena
            .read()
            .slots
            .iter()
            .filter(|e| !e.is_excluded())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.arena.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_count(&self) -> usize {
        self.arena
            .read()
            .slots
            .iter()
            .filter(|e| !e.is_excluded())
            .count()
    }

    /// Remove a vehicle from future ticks. Returns false if it was already excluded.
    pub fn exclude(&self, id: &VehicleId, reason: VehicleError) -> Result<bool, RegistryError> {
        let entry = self
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        let mut excluded = entry.excluded.lock();
        if excluded.is_some() {
            return Ok(false);
        }
        error!(vehicle_id = %id, reason = %reason, "vehicle excluded from simulation");
        *excluded = Some(reason);
        Ok(true)
    }

    pub fn exclusions(&self) -> Vec<(VehicleId, VehicleError)> {
        self.arena
            .read()
            .slots
            .iter()
            .filter_map(|e| e.exclusion().map(|r| (e.id.clone(), r)))
            .collect()
    }
}

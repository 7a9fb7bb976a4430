pub mod generator;
pub mod registry;

pub use generator::generate_fleet;
pub use registry::{FleetRegistry, RegistryError, VehicleEntry};

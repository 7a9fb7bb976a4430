//! Demo fleet: plausible reefer trucks scattered across US freight hubs

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::{
    CargoSpec, EquipmentProfile, Location, Vehicle, VehicleId, VehicleStatus,
};

/// (city, state, latitude, longitude)
const HUBS: &[(&str, &str, f64, f64)] = &[
    ("Chicago", "IL", 41.8781, -87.6298),
    ("Dallas", "TX", 32.7767, -96.7970),
    ("Atlanta", "GA", 33.7490, -84.3880),
    ("Los Angeles", "CA", 34.0522, -118.2437),
    ("Memphis", "TN", 35.1495, -90.0490),
    ("Kansas City", "MO", 39.0997, -94.5786),
    ("Phoenix", "AZ", 33.4484, -112.0740),
    ("Denver", "CO", 39.7392, -104.9903),
    ("Columbus", "OH", 39.9612, -82.9988),
    ("Seattle", "WA", 47.6062, -122.3321),
    ("Miami", "FL", 25.7617, -80.1918),
    ("Newark", "NJ", 40.7357, -74.1724),
];

/// (manufacturer, model)
const UNITS: &[(&str, &str)] = &[
    ("Thermo King", "Precedent S-600"),
    ("Thermo King", "Advancer A-500"),
    ("Carrier Transicold", "Vector 8600MT"),
    ("Carrier Transicold", "X4 7500"),
    ("Daikin", "Exigo"),
    ("Mitsubishi Heavy Industries", "TEJ35GAM"),
];

pub fn random_cargo<R: Rng>(rng: &mut R) -> CargoSpec {
    match rng.gen_range(0..10) {
        0..=3 => CargoSpec::frozen(),
        4..=7 => CargoSpec::refrigerated(),
        _ => CargoSpec::pharmaceutical(),
    }
}

pub fn random_equipment<R: Rng>(rng: &mut R) -> EquipmentProfile {
    let (manufacturer, model) = UNITS.choose(rng).copied().unwrap_or(UNITS[0]);
    let age_years = rng.gen_range(0.0..15.0_f64);
    // Older units drift toward the bottom of the efficiency band
    let efficiency = (1.0 - age_years * 0.015 - rng.gen_range(0.0..0.08)).clamp(0.7, 1.0);

    EquipmentProfile {
        manufacturer: manufacturer.to_string(),
        model: model.to_string(),
        age_years: (age_years * 10.0).round() / 10.0,
        efficiency,
        fuel_rate_lph: rng.gen_range(1.5..4.0),
        maintenance_condition: rng.gen_range(0.6..=1.0),
    }
}

pub fn random_hub<R: Rng>(rng: &mut R) -> Location {
    let (city, state, lat, lon) = HUBS.choose(rng).copied().unwrap_or(HUBS[0]);
    Location::named(lat, lon, city, state, "USA")
}

/// Build `size` vehicles `TRK-0001`.. with randomized cargo, equipment and hubs
pub fn generate_fleet<R: Rng>(
    size: usize,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Vehicle> {
    (1..=size)
        .map(|n| {
            let location = random_hub(rng);
            let destination = Some(random_hub(rng)).filter(|d| d.city != location.city);
            let status = if rng.gen_bool(0.8) {
                VehicleStatus::InTransit
            } else {
                VehicleStatus::Idle
            };

            Vehicle {
                id: VehicleId::new(format!("TRK-{n:04}")),
                operator_id: format!("OP-{:03}", rng.gen_range(1..=40)),
                location,
                destination,
                cargo: random_cargo(rng),
                equipment: random_equipment(rng),
                status,
                distance_km: 0.0,
                fuel_percent: rng.gen_range(40.0..=100.0),
                last_maintenance: now - Duration::days(rng.gen_range(1..180)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_generated_vehicles_are_valid_and_unique() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(2024);
        let fleet = generate_fleet(200, Utc::now(), &mut rng);

        assert_eq!(fleet.len(), 200);
        assert_eq!(fleet[0].id.as_str(), "TRK-0001");
        assert_eq!(fleet[199].id.as_str(), "TRK-0200");

        let ids: HashSet<_> = fleet.iter().map(|v| v.id.clone()).collect();
        assert_eq!(ids.len(), 200);

        for v in &fleet {
            v.validate().unwrap();
            if let Some(dest) = &v.destination {
                assert_ne!(dest.city, v.location.city);
            }
        }
    }

    #[test]
    fn test_same_seed_same_fleet() {
        let now = Utc::now();
        let a = generate_fleet(10, now, &mut rand::rngs::StdRng::seed_from_u64(5));
        let b = generate_fleet(10, now, &mut rand::rngs::StdRng::seed_from_u64(5));
        assert_eq!(a, b);
    }

    #[test]
    fn test_cargo_mix_covers_all_types() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let labels: HashSet<_> = (0..100).map(|_| random_cargo(&mut rng).label()).collect();
        assert_eq!(labels.len(), 3);
    }
}

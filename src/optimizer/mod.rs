pub mod energy;

pub use energy::{
    optimization_factor, weather_opt, EnergyOptimizationEstimator, OptimizationError,
};

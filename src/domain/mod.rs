pub mod reading;
pub mod types;
pub mod vehicle;

pub use reading::*;
pub use types::*;
pub use vehicle::*;

//! Boot-time configuration.
//!
//! The machine description is fixed before motion starts: kinematics,
//! per-axis pin polarities, endstop wiring, step-rate ceilings and
//! feature flags. With the `std` feature it loads from TOML; on
//! bare-metal targets it is constructed in code.

pub mod axis;
pub mod machine;
pub mod units;
pub mod validation;

#[cfg(feature = "std")]
mod loader;

pub use axis::{Axis, AxisConfig, EndstopConfig, EndstopSide};
pub use machine::{Kinematics, MachineConfig};
pub use validation::validate_config;

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};

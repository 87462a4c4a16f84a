//! # stepper-executor
//!
//! Interrupt-driven stepper motion executor for 3D-printer / CNC firmware.
//!
//! The executor consumes pre-planned motion blocks from a bounded FIFO and
//! emits step/direction pulses on up to four logical axes (X, Y, Z, E) so
//! that each block's velocity follows a trapezoidal profile, while honoring
//! endstop limits. Dual X/Z motors and multiple extruder channels are
//! addressed as physical channels behind the hardware adapter.
//!
//! ## Features
//!
//! - **Trapezoidal profiles**: accelerate / cruise / decelerate, integrated
//!   online in fixed point by the step timer interrupt itself
//! - **Multi-axis Bresenham**: one dominant-axis step event drives
//!   subordinate axes; steps produced always equal steps planned
//! - **Endstop interlocks**: two-sample debouncing, direction gating,
//!   instant block termination, dual-Z homing lockout
//! - **Pressure advance**: optional second interrupt draining per-extruder
//!   step corrections from an atomic mailbox
//! - **embedded-hal 1.0**: the hardware seam is a single trait over pin,
//!   endstop and timer access
//! - **no_std compatible**: the `std` feature only adds TOML file loading
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stepper_executor::{Block, BlockQueue, MachineConfig, StepExecutor};
//!
//! let config = stepper_executor::load_config("machine.toml")?;
//! let mut executor = StepExecutor::new(hal, config, BlockQueue::<8>::new());
//! executor.init();
//! executor.source_mut().push(block)?;
//! executor.wake();
//! // ...the step timer interrupt calls executor.on_step_timer()
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O and TOML parsing

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

// Core modules
pub mod config;
pub mod error;
pub mod executor;
pub mod hal;
pub mod motion;
pub mod planner;

// Re-exports for ergonomic API
pub use config::axis::Axis;
pub use config::{validate_config, AxisConfig, Kinematics, MachineConfig};
pub use error::{Error, Result};
pub use executor::{AdvanceExecutor, AdvanceMailbox, EndstopBits, StepExecutor};
pub use hal::{EndstopSwitch, MotorChannel, StepperHal};
pub use planner::{Block, BlockQueue, BlockSource};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::load_config;

// Unit types
pub use config::units::{Millimeters, Steps, StepsPerSec};

/// Number of logical axes driven by the executor (X, Y, Z, E).
pub const NUM_AXIS: usize = 4;

/// Maximum number of extruder channels addressable by one machine.
pub const MAX_EXTRUDERS: usize = 4;

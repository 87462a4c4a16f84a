//! Error types for stepper-executor.
//!
//! Errors only arise on the configuration and construction surface; the
//! step interrupt itself is infallible by design.

use core::fmt;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all stepper-executor operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Block queue error
    Queue(QueueError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// Steps-per-millimeter must be positive and finite
    InvalidStepsPerMm {
        /// Axis name
        axis: heapless::String<8>,
        /// Offending value
        value: f32,
    },
    /// Invalid extruder count (must be 1..=4)
    InvalidExtruderCount(u8),
    /// Maximum step frequency must be positive
    InvalidMaxStepFrequency(u32),
    /// Double-step threshold must be below the maximum step frequency
    InvalidDoubleStepFrequency {
        /// Configured threshold
        double: u32,
        /// Configured maximum
        max: u32,
    },
    /// Dual-Z endstops require both a Z min or max endstop to be present
    DualZWithoutZEndstop,
    /// Dual-X carriage gating requires the dual_x kinematics mode
    DualXHomeWithoutDualX,
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Block queue errors.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueError {
    /// The bounded FIFO is full; the block was rejected
    Full,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Queue(e) => write!(f, "Queue error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::InvalidStepsPerMm { axis, value } => {
                write!(f, "Invalid steps/mm for {}: {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidExtruderCount(n) => {
                write!(f, "Invalid extruder count: {}. Must be 1-4", n)
            }
            ConfigError::InvalidMaxStepFrequency(v) => {
                write!(f, "Invalid max step frequency: {}. Must be > 0", v)
            }
            ConfigError::InvalidDoubleStepFrequency { double, max } => {
                write!(
                    f,
                    "Double-step frequency {} must be below max step frequency {}",
                    double, max
                )
            }
            ConfigError::DualZWithoutZEndstop => {
                write!(f, "Dual-Z endstops configured but Z has no endstop")
            }
            ConfigError::DualXHomeWithoutDualX => {
                write!(f, "Dual-X homing directions set without dual_x kinematics")
            }
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Full => write!(f, "Block queue is full"),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<QueueError> for Error {
    fn from(e: QueueError) -> Self {
        Error::Queue(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for QueueError {}

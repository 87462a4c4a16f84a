//! Motion primitives: trapezoidal rate integration and Bresenham tracing.

pub mod bresenham;
pub mod trapezoid;

pub use bresenham::BresenhamCounters;
pub use trapezoid::{Phase, RateUpdate, TrapezoidGenerator};

//! Axis identity and per-axis configuration.

use serde::Deserialize;

use crate::NUM_AXIS;

/// Logical axis driven by the executor.
///
/// On CoreXY machines X and Y address the A and B motors; the mapping to
/// head motion happens in the endstop interlock, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// X axis (A motor on CoreXY).
    X,
    /// Y axis (B motor on CoreXY).
    Y,
    /// Z axis.
    Z,
    /// Extruder axis.
    E,
}

impl Axis {
    /// All axes in executor order.
    pub const ALL: [Axis; NUM_AXIS] = [Axis::X, Axis::Y, Axis::Z, Axis::E];

    /// Index into per-axis arrays.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bit mask for this axis inside a direction bitfield.
    #[inline]
    pub const fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Short display name.
    pub const fn name(self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
            Axis::E => "E",
        }
    }
}

/// Which end of an axis a limit switch sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndstopSide {
    /// Minimum-position end; trips on negative motion.
    Min,
    /// Maximum-position end; trips on positive motion.
    Max,
}

impl EndstopSide {
    /// The direction sign this side gates on (-1 for min, +1 for max).
    #[inline]
    pub const fn direction_sign(self) -> i8 {
        match self {
            EndstopSide::Min => -1,
            EndstopSide::Max => 1,
        }
    }
}

/// A single limit switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct EndstopConfig {
    /// Switch reads low when triggered.
    #[serde(default)]
    pub inverting: bool,
}

/// Per-axis boot configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AxisConfig {
    /// Steps per millimeter of axis travel.
    pub steps_per_mm: f32,

    /// Invert STEP pin logic.
    #[serde(default)]
    pub invert_step: bool,

    /// Invert DIR pin logic.
    #[serde(default)]
    pub invert_dir: bool,

    /// Invert ENABLE pin logic (enable is active-low on most drivers).
    #[serde(default)]
    pub invert_enable: bool,

    /// Minimum-end limit switch, if wired.
    #[serde(default)]
    pub min_endstop: Option<EndstopConfig>,

    /// Maximum-end limit switch, if wired.
    #[serde(default)]
    pub max_endstop: Option<EndstopConfig>,

    /// Which end this axis homes toward.
    #[serde(default = "default_home_side")]
    pub home_side: EndstopSide,
}

fn default_home_side() -> EndstopSide {
    EndstopSide::Min
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            steps_per_mm: 80.0,
            invert_step: false,
            invert_dir: false,
            invert_enable: true,
            min_endstop: None,
            max_endstop: None,
            home_side: EndstopSide::Min,
        }
    }
}

impl AxisConfig {
    /// Whether this axis has a switch on the given side.
    #[inline]
    pub fn endstop(&self, side: EndstopSide) -> Option<&EndstopConfig> {
        match side {
            EndstopSide::Min => self.min_endstop.as_ref(),
            EndstopSide::Max => self.max_endstop.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_bits_are_disjoint() {
        let mut seen = 0u8;
        for axis in Axis::ALL {
            assert_eq!(seen & axis.bit(), 0);
            seen |= axis.bit();
        }
        assert_eq!(seen, 0b1111);
    }

    #[test]
    fn test_endstop_side_signs() {
        assert_eq!(EndstopSide::Min.direction_sign(), -1);
        assert_eq!(EndstopSide::Max.direction_sign(), 1);
    }
}

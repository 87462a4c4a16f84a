//! Machine configuration - root configuration structure.

use serde::Deserialize;

use super::axis::{Axis, AxisConfig, EndstopConfig, EndstopSide};
use super::units::StepsPerSec;

/// Kinematic arrangement of the machine.
///
/// Selected at boot; the step interrupt stays monomorphic, only the
/// endstop interlock and babystep consult the variant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum Kinematics {
    /// One motor per Cartesian axis.
    #[default]
    Cartesian,
    /// A/B motors; head X/Y are sums and differences of motor motion.
    CoreXy,
    /// Three vertical towers; Z babysteps move all towers together.
    Delta,
    /// Two X carriages, each owning a set of extruders.
    DualX {
        /// Homing direction of the primary carriage.
        x_home_side: EndstopSide,
        /// Homing direction of the secondary carriage.
        x2_home_side: EndstopSide,
    },
}

/// Root machine configuration.
///
/// Deserializable from TOML (with the `std` feature) or constructed in
/// code and amended field by field on bare-metal targets.
#[derive(Debug, Clone, Deserialize)]
pub struct MachineConfig {
    /// Kinematic arrangement.
    #[serde(default)]
    pub kinematics: Kinematics,

    /// Number of extruder channels (1..=4).
    #[serde(default = "default_extruders")]
    pub extruders: u8,

    /// X axis configuration.
    pub x: AxisConfig,
    /// Y axis configuration.
    pub y: AxisConfig,
    /// Z axis configuration.
    pub z: AxisConfig,
    /// Extruder axis configuration.
    pub e: AxisConfig,

    /// Hard ceiling on the commanded step rate.
    #[serde(default = "default_max_step_frequency")]
    pub max_step_frequency: StepsPerSec,

    /// Rate above which the interrupt doubles (and quadruples) steps per
    /// tick.
    #[serde(default = "default_double_step_frequency")]
    pub double_step_frequency: StepsPerSec,

    /// Allow 2x/4x step bursts at high rates.
    #[serde(default = "default_true")]
    pub high_speed_stepping: bool,

    /// Minimum STEP pulse width in nanoseconds (0 relies on pin I/O
    /// latency alone).
    #[serde(default = "default_min_pulse_ns")]
    pub min_pulse_ns: u32,

    /// Drive extruder pressure advance from a second interrupt.
    #[serde(default)]
    pub pressure_advance: bool,

    /// Two independent Z motors with separate limit switches.
    #[serde(default)]
    pub z_dual_endstops: bool,

    /// A Z probe wired in addition to the Z endstops, with its own
    /// polarity.
    #[serde(default)]
    pub z_probe: Option<EndstopConfig>,

    /// Enable the Z driver only when a block first steps Z.
    #[serde(default)]
    pub z_late_enable: bool,

    /// Escalate an endstop trip into a motion abort.
    #[serde(default)]
    pub abort_on_endstop_hit: bool,

    /// Invert the direction of Z babysteps.
    #[serde(default)]
    pub babystep_invert_z: bool,
}

fn default_extruders() -> u8 {
    1
}

fn default_max_step_frequency() -> StepsPerSec {
    StepsPerSec(40_000)
}

fn default_double_step_frequency() -> StepsPerSec {
    StepsPerSec(10_000)
}

fn default_min_pulse_ns() -> u32 {
    2_000
}

fn default_true() -> bool {
    true
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            kinematics: Kinematics::Cartesian,
            extruders: 1,
            x: AxisConfig::default(),
            y: AxisConfig::default(),
            z: AxisConfig::default(),
            e: AxisConfig::default(),
            max_step_frequency: default_max_step_frequency(),
            double_step_frequency: default_double_step_frequency(),
            high_speed_stepping: true,
            min_pulse_ns: default_min_pulse_ns(),
            pressure_advance: false,
            z_dual_endstops: false,
            z_probe: None,
            z_late_enable: false,
            abort_on_endstop_hit: false,
            babystep_invert_z: false,
        }
    }
}

impl MachineConfig {
    /// Get the configuration for one axis.
    #[inline]
    pub fn axis(&self, axis: Axis) -> &AxisConfig {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
            Axis::E => &self.e,
        }
    }

    /// Whether the machine routes X motion through two carriages.
    #[inline]
    pub fn is_dual_x(&self) -> bool {
        matches!(self.kinematics, Kinematics::DualX { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_cartesian_single_extruder() {
        let config = MachineConfig::default();
        assert_eq!(config.kinematics, Kinematics::Cartesian);
        assert_eq!(config.extruders, 1);
        assert!(!config.pressure_advance);
    }

    #[test]
    fn test_axis_lookup() {
        let mut config = MachineConfig::default();
        config.z.steps_per_mm = 400.0;
        assert!((config.axis(Axis::Z).steps_per_mm - 400.0).abs() < 1e-6);
        assert!((config.axis(Axis::X).steps_per_mm - 80.0).abs() < 1e-6);
    }
}

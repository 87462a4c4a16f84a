//! Endstop sampling, debouncing and trip interlocks.
//!
//! Limit switches are sampled on every step interrupt. A switch counts
//! as triggered only when it reads triggered on two consecutive samples,
//! a limit only trips when the head is moving toward it and the block
//! commands motion on its axis, and a trip terminates the block in the
//! same interrupt. Dual-Z machines lock the first motor to trip during
//! homing and let the other catch up.

use crate::config::axis::{Axis, EndstopSide};
use crate::config::machine::{Kinematics, MachineConfig};
use crate::hal::{EndstopSwitch, StepperHal};
use crate::planner::Block;

use super::position::PositionRegister;

/// Fixed-width endstop state word with named bit indices.
///
/// The interrupt relies on whole-word AND/OR, so this is one `u16`, not
/// a collection of booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EndstopBits(u16);

impl EndstopBits {
    /// No switches.
    pub const EMPTY: Self = Self(0);
    /// X minimum switch.
    pub const X_MIN: Self = Self(1 << 0);
    /// Y minimum switch.
    pub const Y_MIN: Self = Self(1 << 1);
    /// Z minimum switch.
    pub const Z_MIN: Self = Self(1 << 2);
    /// Z probe.
    pub const Z_PROBE: Self = Self(1 << 3);
    /// X maximum switch.
    pub const X_MAX: Self = Self(1 << 4);
    /// Y maximum switch.
    pub const Y_MAX: Self = Self(1 << 5);
    /// Z maximum switch.
    pub const Z_MAX: Self = Self(1 << 6);
    /// Secondary Z minimum switch.
    pub const Z2_MIN: Self = Self(1 << 7);
    /// Secondary Z maximum switch.
    pub const Z2_MAX: Self = Self(1 << 8);

    /// The bit of a primary limit switch.
    pub const fn limit(axis: Axis, side: EndstopSide) -> Self {
        match (axis, side) {
            (Axis::X, EndstopSide::Min) => Self::X_MIN,
            (Axis::X, EndstopSide::Max) => Self::X_MAX,
            (Axis::Y, EndstopSide::Min) => Self::Y_MIN,
            (Axis::Y, EndstopSide::Max) => Self::Y_MAX,
            (Axis::Z, EndstopSide::Min) => Self::Z_MIN,
            (Axis::Z, EndstopSide::Max) => Self::Z_MAX,
            (Axis::E, _) => Self::EMPTY,
        }
    }

    /// The bit of a secondary-Z limit switch.
    pub const fn z2(side: EndstopSide) -> Self {
        match side {
            EndstopSide::Min => Self::Z2_MIN,
            EndstopSide::Max => Self::Z2_MAX,
        }
    }

    /// Whether any bit of `other` is set in `self`.
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Set all bits of `other`.
    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Set or clear the bits of `mask`.
    #[inline]
    pub fn set(&mut self, mask: Self, value: bool) {
        if value {
            self.0 |= mask.0;
        } else {
            self.0 &= !mask.0;
        }
    }

    /// Whether no bit is set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw word value.
    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl core::ops::BitOr for EndstopBits {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Endstop interlock state.
#[derive(Debug, Clone, Copy)]
pub struct EndstopMonitor {
    enabled: bool,
    /// Previous interrupt's sample; the debounce reference.
    old: EndstopBits,
    /// Latched trip flags, cleared by the foreground.
    hit: EndstopBits,
    /// Positions captured at trip time (X, Y, Z).
    trigsteps: [i64; 3],
    performing_homing: bool,
    locked_z: bool,
    locked_z2: bool,
}

impl Default for EndstopMonitor {
    fn default() -> Self {
        Self {
            enabled: true,
            old: EndstopBits::EMPTY,
            hit: EndstopBits::EMPTY,
            trigsteps: [0; 3],
            performing_homing: false,
            locked_z: false,
            locked_z2: false,
        }
    }
}

impl EndstopMonitor {
    /// Whether checking is armed.
    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Arm or disarm checking (disarmed after homing, typically).
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Latched trip flags.
    #[inline]
    pub fn hit_bits(&self) -> EndstopBits {
        self.hit
    }

    /// Clear the latched trip flags.
    pub fn clear_hits(&mut self) {
        self.hit = EndstopBits::EMPTY;
    }

    /// Position captured when the given axis tripped.
    #[inline]
    pub fn trigsteps(&self, axis: Axis) -> i64 {
        self.trigsteps[axis.index()]
    }

    /// Enter or leave the homing sequence (dual-Z lockout is only armed
    /// while homing).
    pub fn set_homing(&mut self, homing: bool) {
        self.performing_homing = homing;
        if !homing {
            self.locked_z = false;
            self.locked_z2 = false;
        }
    }

    /// Manually lock the primary Z motor.
    pub fn lock_z(&mut self, locked: bool) {
        self.locked_z = locked;
    }

    /// Manually lock the secondary Z motor.
    pub fn lock_z2(&mut self, locked: bool) {
        self.locked_z2 = locked;
    }

    /// Whether the primary (or secondary) Z motor may pulse right now.
    ///
    /// Outside homing both always may. During homing a motor is held
    /// once its own switch read triggered on the previous sample while
    /// still moving toward it, or once it is explicitly locked.
    pub fn z_step_allowed(&self, primary: bool, z_direction: i8, home_side: EndstopSide) -> bool {
        if !self.performing_homing {
            return true;
        }
        let (bit, locked) = if primary {
            (EndstopBits::limit(Axis::Z, home_side), self.locked_z)
        } else {
            (EndstopBits::z2(home_side), self.locked_z2)
        };
        let held = self.old.intersects(bit) && z_direction == home_side.direction_sign();
        !(held || locked)
    }

    /// Sample and evaluate all switches for one step interrupt.
    ///
    /// `head_negative` is the head-space direction of X and Y (equal to
    /// the axis direction bits except on CoreXY, where the executor
    /// derives it from the A/B motor deltas). Returns true when the
    /// current block must terminate.
    pub fn check<H: StepperHal>(
        &mut self,
        hal: &mut H,
        config: &MachineConfig,
        block: &Block,
        position: &PositionRegister,
        head_negative: [bool; 2],
    ) -> bool {
        let mut current = EndstopBits::EMPTY;
        let mut terminate = false;

        // X: on CoreXY the head only moves in X when the motor deltas
        // differ or the motor directions agree.
        let x_head_moves = match config.kinematics {
            Kinematics::CoreXy => {
                block.steps[Axis::X.index()] != block.steps[Axis::Y.index()]
                    || block.is_negative(Axis::X) == block.is_negative(Axis::Y)
            }
            _ => true,
        };
        if x_head_moves {
            let side = side_of(head_negative[0]);
            if self.x_carriage_checked(config, block, side) {
                terminate |=
                    self.update_limit(hal, config, block, position, &mut current, Axis::X, side);
            }
        }

        // Y: the complementary CoreXY condition.
        let y_head_moves = match config.kinematics {
            Kinematics::CoreXy => {
                block.steps[Axis::X.index()] != block.steps[Axis::Y.index()]
                    || block.is_negative(Axis::X) != block.is_negative(Axis::Y)
            }
            _ => true,
        };
        if y_head_moves {
            let side = side_of(head_negative[1]);
            terminate |=
                self.update_limit(hal, config, block, position, &mut current, Axis::Y, side);
        }

        // Z
        let z_side = side_of(block.is_negative(Axis::Z));
        if config.z_dual_endstops {
            terminate |= self.update_dual_z(hal, config, block, position, &mut current, z_side);
        } else {
            terminate |=
                self.update_limit(hal, config, block, position, &mut current, Axis::Z, z_side);
        }

        // The probe records its trigger position but does not abort the
        // block; probing moves terminate through the Z-min switch when
        // the probe is wired as one.
        if let Some(probe) = config.z_probe {
            let triggered = hal.endstop_read(EndstopSwitch::ZProbe) != probe.inverting;
            current.set(EndstopBits::Z_PROBE, triggered);
            if triggered && self.old.intersects(EndstopBits::Z_PROBE) {
                self.trigsteps[Axis::Z.index()] = position.get(Axis::Z);
                self.hit.insert(EndstopBits::Z_PROBE);
            }
        }

        self.old = current;
        terminate
    }

    /// Dual-X machines only watch the carriage owning the active
    /// extruder, and only in its homing direction.
    fn x_carriage_checked(
        &self,
        config: &MachineConfig,
        block: &Block,
        side: EndstopSide,
    ) -> bool {
        match config.kinematics {
            Kinematics::DualX {
                x_home_side,
                x2_home_side,
            } => {
                let home = if block.active_extruder == 0 {
                    x_home_side
                } else {
                    x2_home_side
                };
                home == side
            }
            _ => true,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn update_limit<H: StepperHal>(
        &mut self,
        hal: &mut H,
        config: &MachineConfig,
        block: &Block,
        position: &PositionRegister,
        current: &mut EndstopBits,
        axis: Axis,
        side: EndstopSide,
    ) -> bool {
        let Some(switch) = config.axis(axis).endstop(side) else {
            return false;
        };
        let bit = EndstopBits::limit(axis, side);
        let triggered = hal.endstop_read(EndstopSwitch::Limit(axis, side)) != switch.inverting;
        current.set(bit, triggered);

        if triggered && self.old.intersects(bit) && block.axis_steps(axis) > 0 {
            self.trigsteps[axis.index()] = position.get(axis);
            self.hit.insert(bit);
            return true;
        }
        false
    }

    #[allow(clippy::too_many_arguments)]
    fn update_dual_z<H: StepperHal>(
        &mut self,
        hal: &mut H,
        config: &MachineConfig,
        block: &Block,
        position: &PositionRegister,
        current: &mut EndstopBits,
        side: EndstopSide,
    ) -> bool {
        let Some(switch) = config.z.endstop(side) else {
            return false;
        };
        let z_bit = EndstopBits::limit(Axis::Z, side);
        let z2_bit = EndstopBits::z2(side);

        let z_raw = hal.endstop_read(EndstopSwitch::Limit(Axis::Z, side)) != switch.inverting;
        let z2_raw = hal.endstop_read(EndstopSwitch::Z2(side)) != switch.inverting;
        current.set(z_bit, z_raw);
        current.set(z2_bit, z2_raw);

        // Two-bit word: bit 0 for Z, bit 1 for Z2, each debounced
        // against the previous sample.
        let z_test = ((z_raw && self.old.intersects(z_bit)) as u8)
            | (((z2_raw && self.old.intersects(z2_bit)) as u8) << 1);

        if z_test != 0 && block.axis_steps(Axis::Z) > 0 {
            self.trigsteps[Axis::Z.index()] = position.get(Axis::Z);
            self.hit.insert(z_bit);
            if self.performing_homing {
                if z_test & 0b01 != 0 {
                    self.locked_z = true;
                }
                if z_test & 0b10 != 0 {
                    self.locked_z2 = true;
                }
                // Keep homing until both sides have landed.
                return z_test == 0b11;
            }
            return true;
        }
        false
    }
}

#[inline]
fn side_of(negative: bool) -> EndstopSide {
    if negative {
        EndstopSide::Min
    } else {
        EndstopSide::Max
    }
}

//! Hardware adapter traits.
//!
//! The executor talks to the machine through [`StepperHal`]: raw pin
//! writes (inversion is applied by the executor from configuration),
//! endstop reads, and step-timer control. Implementations are typically
//! thin wrappers over `embedded-hal` pins and a hardware timer channel;
//! [`PinBank`] covers the pin half for targets with type-erased pins.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::config::axis::{Axis, EndstopSide};

/// Number of distinct physical motor channels.
pub const NUM_CHANNELS: usize = 9;

/// A physical motor channel.
///
/// Logical axes fan out to one or two channels each: dual-Z machines
/// drive `Z` and `Z2`, dual-X carriages drive `X` or `X2` depending on
/// the active extruder, and each extruder has its own `E(n)` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorChannel {
    /// Primary X motor.
    X,
    /// Secondary X carriage motor.
    X2,
    /// Y motor.
    Y,
    /// Primary Z motor.
    Z,
    /// Secondary Z motor.
    Z2,
    /// Extruder motor `n`.
    E(u8),
}

impl MotorChannel {
    /// Dense index for channel-keyed arrays.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            MotorChannel::X => 0,
            MotorChannel::X2 => 1,
            MotorChannel::Y => 2,
            MotorChannel::Z => 3,
            MotorChannel::Z2 => 4,
            MotorChannel::E(n) => 5 + n as usize,
        }
    }

    /// The logical axis this channel belongs to.
    #[inline]
    pub const fn axis(self) -> Axis {
        match self {
            MotorChannel::X | MotorChannel::X2 => Axis::X,
            MotorChannel::Y => Axis::Y,
            MotorChannel::Z | MotorChannel::Z2 => Axis::Z,
            MotorChannel::E(_) => Axis::E,
        }
    }
}

/// A physical limit switch or probe input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndstopSwitch {
    /// Limit switch of a logical axis on one side.
    Limit(Axis, EndstopSide),
    /// Limit switch of the secondary Z motor.
    Z2(EndstopSide),
    /// The Z probe.
    ZProbe,
}

/// Hardware adapter consumed by the executor.
///
/// Pin writes are raw levels; the executor applies configured
/// inversions. All methods are called from interrupt context except
/// where noted. The `DelayNs` bound provides the minimum step pulse
/// width; implementations on fast targets may make it a no-op when
/// pin I/O latency already exceeds the driver's requirement.
pub trait StepperHal: DelayNs {
    /// Write a STEP pin level.
    fn step_write(&mut self, channel: MotorChannel, level: bool);

    /// Write a DIR pin level.
    fn dir_write(&mut self, channel: MotorChannel, level: bool);

    /// Write an ENABLE pin level.
    fn enable_write(&mut self, channel: MotorChannel, level: bool);

    /// Sample a limit switch. Returns the raw electrical level.
    fn endstop_read(&mut self, switch: EndstopSwitch) -> bool;

    /// Step timer frequency in ticks per second.
    fn timer_base_frequency(&self) -> u32;

    /// Schedule the next step interrupt `ticks` from the previous
    /// deadline.
    ///
    /// Contract: the implementation must place the compare value at
    /// least ~42 timer ticks beyond the current counter so the interrupt
    /// has time to exit before it fires again.
    fn program_step_timer(&mut self, ticks: u32);

    /// Enable the step timer interrupt.
    fn enable_step_isr(&mut self);

    /// Disable the step timer interrupt. Used both for sleep and as the
    /// critical section around multi-word shared state.
    fn disable_step_isr(&mut self);

    /// Cooperative yield while the foreground blocks in
    /// [`synchronize`](crate::StepExecutor::synchronize). Called from
    /// foreground context only; may service other subsystems.
    fn idle(&mut self);

    /// Motion-abort policy hook, invoked by
    /// [`check_hit_endstops`](crate::StepExecutor::check_hit_endstops)
    /// when `abort_on_endstop_hit` is configured. External subsystems
    /// (SD print, heaters) react here. Foreground context.
    fn motion_aborted(&mut self) {}
}

/// STEP/DIR/ENABLE pin triple for one motor channel.
#[derive(Debug)]
pub struct MotorPins<P: OutputPin> {
    /// STEP pin.
    pub step: P,
    /// DIR pin.
    pub dir: P,
    /// ENABLE pin.
    pub enable: P,
}

/// Pin bank over type-erased `embedded-hal` output pins.
///
/// Covers the pin-write half of [`StepperHal`] for targets where all
/// motor pins share one erased pin type (`AnyPin`, `DynPin`, ...).
/// Channels the machine does not populate are ignored on write.
#[derive(Debug)]
pub struct PinBank<P: OutputPin> {
    motors: [Option<MotorPins<P>>; NUM_CHANNELS],
}

impl<P: OutputPin> Default for PinBank<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: OutputPin> PinBank<P> {
    /// Create an empty bank.
    pub fn new() -> Self {
        Self {
            motors: [(); NUM_CHANNELS].map(|_| None),
        }
    }

    /// Attach the pins of one channel.
    pub fn attach(&mut self, channel: MotorChannel, pins: MotorPins<P>) {
        self.motors[channel.index()] = Some(pins);
    }

    /// Write a STEP pin. Pin errors are ignored, as is an unpopulated
    /// channel.
    pub fn step_write(&mut self, channel: MotorChannel, level: bool) {
        if let Some(pins) = self.motors[channel.index()].as_mut() {
            let _ = if level {
                pins.step.set_high()
            } else {
                pins.step.set_low()
            };
        }
    }

    /// Write a DIR pin.
    pub fn dir_write(&mut self, channel: MotorChannel, level: bool) {
        if let Some(pins) = self.motors[channel.index()].as_mut() {
            let _ = if level {
                pins.dir.set_high()
            } else {
                pins.dir.set_low()
            };
        }
    }

    /// Write an ENABLE pin.
    pub fn enable_write(&mut self, channel: MotorChannel, level: bool) {
        if let Some(pins) = self.motors[channel.index()].as_mut() {
            let _ = if level {
                pins.enable.set_high()
            } else {
                pins.enable.set_low()
            };
        }
    }
}

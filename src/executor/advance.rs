//! Pressure-advance machinery.
//!
//! The step interrupt integrates the advance value alongside the
//! trapezoid and posts extruder step corrections into a mailbox; a
//! second interrupt at ~10 kHz drains the mailbox one pulse at a time.
//! The mailbox is the only state shared between the two interrupts, so
//! every access is an atomic read-modify-write.

use core::sync::atomic::{AtomicI32, Ordering};

use crate::config::machine::MachineConfig;
use crate::hal::{MotorChannel, StepperHal};
use crate::planner::Block;
use crate::MAX_EXTRUDERS;

/// Pending extruder steps, one signed counter per extruder channel.
///
/// Writer: the step interrupt. Reader: the advance interrupt. Both use
/// relaxed atomic add; no ordering is needed beyond the counter itself.
#[derive(Debug, Default)]
pub struct AdvanceMailbox {
    e_steps: [AtomicI32; MAX_EXTRUDERS],
}

impl AdvanceMailbox {
    /// Create an empty mailbox.
    pub const fn new() -> Self {
        Self {
            e_steps: [
                AtomicI32::new(0),
                AtomicI32::new(0),
                AtomicI32::new(0),
                AtomicI32::new(0),
            ],
        }
    }

    /// Add pending steps for one extruder (sign is direction).
    #[inline]
    pub fn post(&self, extruder: u8, delta: i32) {
        self.e_steps[extruder as usize].fetch_add(delta, Ordering::Relaxed);
    }

    /// Pending steps of one extruder.
    #[inline]
    pub fn pending(&self, extruder: u8) -> i32 {
        self.e_steps[extruder as usize].load(Ordering::Relaxed)
    }

    /// Claim one pending step, moving the counter toward zero.
    ///
    /// Returns the direction sign of the claimed step, or 0 if none is
    /// pending.
    #[inline]
    pub fn take_step(&self, extruder: u8) -> i8 {
        let counter = &self.e_steps[extruder as usize];
        let pending = counter.load(Ordering::Relaxed);
        if pending > 0 {
            counter.fetch_sub(1, Ordering::Relaxed);
            1
        } else if pending < 0 {
            counter.fetch_add(1, Ordering::Relaxed);
            -1
        } else {
            0
        }
    }
}

/// Advance value integrator, owned by the step interrupt.
///
/// `advance` is 8.8 fixed point; the whole-step difference against the
/// last posted value goes to the mailbox. `old_advance` survives across
/// blocks so a block boundary posts only the profile discontinuity.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdvanceIntegrator {
    advance: i32,
    old_advance: i32,
    final_advance: i32,
    advance_rate: i32,
}

impl AdvanceIntegrator {
    /// Load a new block's advance profile.
    ///
    /// Returns the whole-step correction to post for the entry
    /// discontinuity.
    pub fn reset(&mut self, block: &Block) -> i32 {
        self.advance = block.initial_advance;
        self.final_advance = block.final_advance;
        self.advance_rate = block.advance_rate;
        self.shift_whole_steps()
    }

    /// Integrate one accelerating interrupt (`step_loops` inner steps).
    pub fn accelerate(&mut self, step_loops: u8) -> i32 {
        self.advance += self.advance_rate * step_loops as i32;
        self.shift_whole_steps()
    }

    /// Integrate one decelerating interrupt, clamped at the exit value.
    pub fn decelerate(&mut self, step_loops: u8) -> i32 {
        self.advance -= self.advance_rate * step_loops as i32;
        if self.advance < self.final_advance {
            self.advance = self.final_advance;
        }
        self.shift_whole_steps()
    }

    fn shift_whole_steps(&mut self) -> i32 {
        let whole = self.advance >> 8;
        let delta = whole - self.old_advance;
        self.old_advance = whole;
        delta
    }
}

/// The pressure-advance interrupt.
///
/// Owns its own HAL handle (extruder STEP/DIR pins are disjoint from
/// everything the step interrupt touches) and drains up to four pulses
/// per extruder per invocation.
#[derive(Debug)]
pub struct AdvanceExecutor<H: StepperHal> {
    hal: H,
    extruders: u8,
    invert_e_step: bool,
    invert_e_dir: bool,
}

impl<H: StepperHal> AdvanceExecutor<H> {
    /// Create the advance interrupt handler.
    pub fn new(hal: H, config: &MachineConfig) -> Self {
        Self {
            hal,
            extruders: config.extruders,
            invert_e_step: config.e.invert_step,
            invert_e_dir: config.e.invert_dir,
        }
    }

    /// One ~10 kHz interrupt: emit at most four pulses per extruder.
    pub fn on_advance_timer(&mut self, mailbox: &AdvanceMailbox) {
        for _ in 0..4 {
            for extruder in 0..self.extruders {
                let sign = mailbox.take_step(extruder);
                if sign == 0 {
                    continue;
                }
                let channel = MotorChannel::E(extruder);
                let forward = sign > 0;
                self.hal.step_write(channel, self.invert_e_step);
                self.hal.dir_write(channel, forward != self.invert_e_dir);
                self.hal.step_write(channel, !self.invert_e_step);
            }
        }
    }

    /// Release the HAL handle.
    pub fn release(self) -> H {
        self.hal
    }
}

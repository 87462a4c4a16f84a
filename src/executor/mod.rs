//! The step executor - interrupt bodies and the firmware-facing control
//! API.
//!
//! [`StepExecutor::on_step_timer`] is the step interrupt: it pops blocks
//! from the planner FIFO, traces them with the Bresenham counters, keeps
//! the trapezoid integration current and reprograms its own next
//! deadline. [`AdvanceExecutor::on_advance_timer`] is the optional
//! second interrupt draining pressure-advance corrections. Everything
//! else here is the foreground control surface.

mod advance;
mod endstop;
mod position;

pub use advance::{AdvanceExecutor, AdvanceIntegrator, AdvanceMailbox};
pub use endstop::{EndstopBits, EndstopMonitor};
pub use position::PositionRegister;

use crate::config::axis::{Axis, EndstopSide};
use crate::config::machine::{Kinematics, MachineConfig};
use crate::config::units::Steps;
use crate::hal::{MotorChannel, StepperHal};
use crate::motion::trapezoid::Phase;
use crate::motion::{BresenhamCounters, TrapezoidGenerator};
use crate::planner::{Block, BlockSource};
use crate::NUM_AXIS;

/// Drain ticks programmed by [`StepExecutor::quick_stop`]; at ~5 ms each
/// this holds motion off long enough for the drivers to settle.
const CLEANUP_TICKS: u16 = 5000;

/// The stepper motion executor.
///
/// Owns the hardware adapter, the consumer side of the block FIFO and
/// all per-block tracing state. `on_step_timer` must be wired to the
/// step timer interrupt; every other method is foreground API unless
/// its documentation says otherwise.
pub struct StepExecutor<'m, H: StepperHal, S: BlockSource> {
    hal: H,
    config: MachineConfig,
    source: S,
    mailbox: Option<&'m AdvanceMailbox>,

    current: Option<Block>,
    trapezoid: TrapezoidGenerator,
    bresenham: BresenhamCounters,
    endstops: EndstopMonitor,
    position: PositionRegister,
    integrator: AdvanceIntegrator,

    /// Direction bits currently applied to the DIR pins.
    out_bits: u8,
    /// Head-space X/Y direction of the current block (differs from
    /// `out_bits` only on CoreXY).
    head_negative: [bool; 2],
    step_events_completed: u32,
    cleanup_ticks: u16,
    isr_enabled: bool,
}

impl<'m, H: StepperHal, S: BlockSource> StepExecutor<'m, H, S> {
    /// Create an executor over a hardware adapter and a block source.
    pub fn new(hal: H, config: MachineConfig, source: S) -> Self {
        Self {
            hal,
            config,
            source,
            mailbox: None,
            current: None,
            trapezoid: TrapezoidGenerator::default(),
            bresenham: BresenhamCounters::default(),
            endstops: EndstopMonitor::default(),
            position: PositionRegister::default(),
            integrator: AdvanceIntegrator::default(),
            out_bits: 0,
            head_negative: [false; 2],
            step_events_completed: 0,
            cleanup_ticks: 0,
            isr_enabled: false,
        }
    }

    /// Attach the pressure-advance mailbox shared with an
    /// [`AdvanceExecutor`]. Required when `pressure_advance` is
    /// configured.
    pub fn with_advance(mut self, mailbox: &'m AdvanceMailbox) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    /// Bring the pins to their idle levels, arm the endstops and enable
    /// the step interrupt.
    pub fn init(&mut self) {
        let (channels, n) = self.channel_list();
        for &channel in &channels[..n] {
            let axis = channel.axis();
            let step_idle = self.config.axis(axis).invert_step;
            let enable_off = self.config.axis(axis).invert_enable;
            self.hal.step_write(channel, step_idle);
            self.hal.enable_write(channel, enable_off);
        }
        self.out_bits = 0;
        self.apply_direction_pins(None);
        self.endstops.set_enabled(true);
        self.hal.enable_step_isr();
        self.isr_enabled = true;
        log::debug!("stepper executor initialized");
    }

    // ------------------------------------------------------------------
    // The step interrupt
    // ------------------------------------------------------------------

    /// One step timer interrupt.
    ///
    /// Emits a burst of 1, 2 or 4 step events depending on the current
    /// rate, updates the trapezoid integration and reprograms the timer
    /// for the next deadline.
    pub fn on_step_timer(&mut self) {
        let timer_hz = self.hal.timer_base_frequency();

        // Quick-stop drain: release whatever is queued, one block per
        // ~5 ms tick, without stepping.
        if self.cleanup_ticks > 0 {
            self.current = None;
            self.source.discard();
            self.cleanup_ticks -= 1;
            self.hal.program_step_timer(timer_hz / 200);
            return;
        }

        if self.current.is_none() && !self.acquire_block(timer_hz) {
            return;
        }
        let Some(block) = self.current else { return };

        if self.endstops.enabled()
            && self.endstops.check(
                &mut self.hal,
                &self.config,
                &block,
                &self.position,
                self.head_negative,
            )
        {
            // Terminate at the end of this interrupt: no further pulses,
            // the completion path below releases the block.
            self.step_events_completed = block.step_event_count;
        }

        let advance_on = self.config.pressure_advance && self.mailbox.is_some();

        let loops = self.trapezoid.step_loops();
        for _ in 0..loops {
            if self.step_events_completed >= block.step_event_count {
                break;
            }

            // Extruder steps are deferred to the advance interrupt; the
            // Bresenham decision still happens here, in block order.
            if advance_on && self.bresenham.advance(Axis::E, &block) {
                if let Some(mailbox) = self.mailbox {
                    mailbox.post(block.active_extruder, block.direction_sign(Axis::E) as i32);
                }
                self.position.apply_step(Axis::E);
            }

            let mut stepped = [false; NUM_AXIS];
            for axis in [Axis::X, Axis::Y, Axis::Z] {
                if self.bresenham.advance(axis, &block) {
                    self.write_step(axis, &block, true);
                    self.position.apply_step(axis);
                    stepped[axis.index()] = true;
                }
            }
            if !advance_on && self.bresenham.advance(Axis::E, &block) {
                self.write_step(Axis::E, &block, true);
                self.position.apply_step(Axis::E);
                stepped[Axis::E.index()] = true;
            }

            // All STEP pins are up before any goes down, and stay up for
            // the configured minimum width.
            if self.config.min_pulse_ns > 0 {
                self.hal.delay_ns(self.config.min_pulse_ns);
            }
            for axis in Axis::ALL {
                if stepped[axis.index()] {
                    self.write_step(axis, &block, false);
                }
            }

            self.step_events_completed += 1;
        }

        let update =
            self.trapezoid
                .next_period(&block, self.step_events_completed, &self.config, timer_hz);
        if advance_on {
            let delta = match update.phase {
                Phase::Accelerating => self.integrator.accelerate(update.step_loops),
                Phase::Decelerating => self.integrator.decelerate(update.step_loops),
                Phase::Cruising => 0,
            };
            if let (true, Some(mailbox)) = (delta != 0, self.mailbox) {
                mailbox.post(block.active_extruder, delta);
            }
        }

        self.hal.program_step_timer(update.period);

        if self.step_events_completed >= block.step_event_count {
            self.current = None;
            self.source.discard();
            log::trace!("block complete");
        }
    }

    /// Pop and set up the next block. Returns false when this interrupt
    /// is done (no work, or the Z driver needs its late-enable settle
    /// time).
    fn acquire_block(&mut self, timer_hz: u32) -> bool {
        let block = match self.source.peek() {
            Some(block) => *block,
            None => {
                // Idle at 1 kHz until the planner delivers.
                self.hal.program_step_timer(timer_hz / 1000);
                return false;
            }
        };
        debug_assert!(block.is_well_formed());

        let mut block = block;
        block.busy = true;

        self.apply_direction_pins(Some(&block));
        self.head_negative = self.derive_head_directions(&block);
        self.trapezoid.reset(&block, &self.config, timer_hz);
        self.bresenham.reset(block.step_event_count);
        self.step_events_completed = 0;

        if self.config.pressure_advance {
            if let Some(mailbox) = self.mailbox {
                let delta = self.integrator.reset(&block);
                if delta != 0 {
                    mailbox.post(block.active_extruder, delta);
                }
            }
        }

        log::trace!(
            "block start: {} step events at {}..{} steps/s",
            block.step_event_count,
            block.initial_rate,
            block.nominal_rate
        );

        let z_wait = self.config.z_late_enable && block.axis_steps(Axis::Z) > 0;
        self.current = Some(block);

        if z_wait {
            self.set_axis_drivers(Axis::Z, true);
            self.hal.program_step_timer(timer_hz / 1000);
            return false;
        }
        true
    }

    /// Apply direction bits to the DIR pins and the position register.
    ///
    /// `block` selects the dual-X carriage; `None` (init) writes both.
    fn apply_direction_pins(&mut self, block: Option<&Block>) {
        if let Some(block) = block {
            if block.direction_bits == self.out_bits {
                return;
            }
            self.out_bits = block.direction_bits;
        }
        let out_bits = self.out_bits;

        for axis in Axis::ALL {
            let negative = out_bits & axis.bit() != 0;
            let level = negative == self.config.axis(axis).invert_dir;
            self.position
                .set_direction(axis, if negative { -1 } else { 1 });

            match axis {
                Axis::X => match (self.config.kinematics, block) {
                    (Kinematics::DualX { .. }, Some(block)) => {
                        let channel = if block.active_extruder != 0 {
                            MotorChannel::X2
                        } else {
                            MotorChannel::X
                        };
                        self.hal.dir_write(channel, level);
                    }
                    (Kinematics::DualX { .. }, None) => {
                        self.hal.dir_write(MotorChannel::X, level);
                        self.hal.dir_write(MotorChannel::X2, level);
                    }
                    _ => self.hal.dir_write(MotorChannel::X, level),
                },
                Axis::Y => self.hal.dir_write(MotorChannel::Y, level),
                Axis::Z => {
                    self.hal.dir_write(MotorChannel::Z, level);
                    if self.config.z_dual_endstops {
                        self.hal.dir_write(MotorChannel::Z2, level);
                    }
                }
                Axis::E => {
                    // With pressure advance the advance interrupt owns
                    // the E direction pin.
                    if !(self.config.pressure_advance && self.mailbox.is_some()) {
                        let extruder = block.map(|b| b.active_extruder).unwrap_or(0);
                        self.hal.dir_write(MotorChannel::E(extruder), level);
                    }
                }
            }
        }
    }

    /// Head-space X/Y signs; on CoreXY they come from the A/B motor
    /// deltas, elsewhere they are the axis bits themselves.
    fn derive_head_directions(&self, block: &Block) -> [bool; 2] {
        match self.config.kinematics {
            Kinematics::CoreXy => {
                let a = block.axis_steps(Axis::X) as i64 * block.direction_sign(Axis::X) as i64;
                let b = block.axis_steps(Axis::Y) as i64 * block.direction_sign(Axis::Y) as i64;
                [a + b < 0, a - b < 0]
            }
            _ => [
                block.is_negative(Axis::X),
                block.is_negative(Axis::Y),
            ],
        }
    }

    /// Write one axis's STEP level, routed to its physical channels.
    fn write_step(&mut self, axis: Axis, block: &Block, active: bool) {
        let level = active != self.config.axis(axis).invert_step;
        match axis {
            Axis::X => {
                let channel = if self.config.is_dual_x() && block.active_extruder != 0 {
                    MotorChannel::X2
                } else {
                    MotorChannel::X
                };
                self.hal.step_write(channel, level);
            }
            Axis::Y => self.hal.step_write(MotorChannel::Y, level),
            Axis::Z => {
                if self.config.z_dual_endstops {
                    let direction = self.position.direction(Axis::Z);
                    let home_side = self.config.z.home_side;
                    if self.endstops.z_step_allowed(true, direction, home_side) {
                        self.hal.step_write(MotorChannel::Z, level);
                    }
                    if self.endstops.z_step_allowed(false, direction, home_side) {
                        self.hal.step_write(MotorChannel::Z2, level);
                    }
                } else {
                    self.hal.step_write(MotorChannel::Z, level);
                }
            }
            Axis::E => self
                .hal
                .step_write(MotorChannel::E(block.active_extruder), level),
        }
    }

    // ------------------------------------------------------------------
    // Control API (foreground)
    // ------------------------------------------------------------------

    /// Enable the step timer interrupt.
    pub fn wake(&mut self) {
        self.hal.enable_step_isr();
        self.isr_enabled = true;
    }

    /// Block until the FIFO is empty and no block is executing, yielding
    /// to the idle hook.
    pub fn synchronize(&mut self) {
        while self.source.queued() || self.current.is_some() {
            self.hal.idle();
        }
    }

    /// Discard all queued motion and hold the executor in a drain loop
    /// of 5000 ~5 ms ticks before new blocks are taken.
    ///
    /// In-flight pulses already emitted are not undone.
    pub fn quick_stop(&mut self) {
        self.cleanup_ticks = CLEANUP_TICKS;
        self.hal.disable_step_isr();
        while self.source.queued() {
            self.source.discard();
        }
        self.current = None;
        self.hal.enable_step_isr();
        self.isr_enabled = true;
        log::debug!("quick stop: queue drained");
    }

    /// Synchronize, then disable every motor driver.
    pub fn finish_and_disable(&mut self) {
        self.synchronize();
        let (channels, n) = self.channel_list();
        for &channel in &channels[..n] {
            let off = self.config.axis(channel.axis()).invert_enable;
            self.hal.enable_write(channel, off);
        }
    }

    /// Overwrite the stepper-space position of all four axes.
    pub fn set_position(&mut self, x: i64, y: i64, z: i64, e: i64) {
        self.with_isr_disabled(|this| this.position.set_all(x, y, z, e));
    }

    /// Overwrite the extruder position only.
    pub fn set_e_position(&mut self, e: i64) {
        self.with_isr_disabled(|this| this.position.set(Axis::E, e));
    }

    /// Read one axis position in steps.
    pub fn position(&mut self, axis: Axis) -> i64 {
        self.with_isr_disabled(|this| this.position.get(axis))
    }

    /// Read one axis position in millimeters.
    pub fn position_mm(&mut self, axis: Axis) -> f32 {
        let steps = Steps(self.position(axis));
        steps.to_mm(self.config.axis(axis).steps_per_mm).value()
    }

    /// Arm or disarm endstop checking.
    pub fn enable_endstops(&mut self, enabled: bool) {
        self.endstops.set_enabled(enabled);
    }

    /// Clear the latched endstop trip flags.
    pub fn endstops_hit_on_purpose(&mut self) {
        self.endstops.clear_hits();
    }

    /// Report and clear latched endstop trips.
    ///
    /// Logs one warning per tripped switch with the trigger position in
    /// millimeters. When `abort_on_endstop_hit` is configured this also
    /// quick-stops and invokes the adapter's abort hook.
    pub fn check_hit_endstops(&mut self) {
        let hits = self.endstops.hit_bits();
        if hits.is_empty() {
            return;
        }

        for axis in [Axis::X, Axis::Y, Axis::Z] {
            let mut mask = EndstopBits::limit(axis, EndstopSide::Min)
                | EndstopBits::limit(axis, EndstopSide::Max);
            if axis == Axis::Z {
                mask = mask
                    | EndstopBits::z2(EndstopSide::Min)
                    | EndstopBits::z2(EndstopSide::Max);
            }
            if hits.intersects(mask) {
                let mm = Steps(self.endstops.trigsteps(axis))
                    .to_mm(self.config.axis(axis).steps_per_mm);
                log::warn!("{} endstop hit at {} mm", axis.name(), mm.value());
            }
        }
        if hits.intersects(EndstopBits::Z_PROBE) {
            let mm = Steps(self.endstops.trigsteps(Axis::Z)).to_mm(self.config.z.steps_per_mm);
            log::warn!("Z probe triggered at {} mm", mm.value());
        }

        self.endstops.clear_hits();

        if self.config.abort_on_endstop_hit {
            self.quick_stop();
            self.hal.motion_aborted();
        }
    }

    /// Enter or leave the homing sequence (arms the dual-Z lockout).
    pub fn in_homing_process(&mut self, homing: bool) {
        self.endstops.set_homing(homing);
    }

    /// Lock the primary Z motor (dual-Z homing adjustment).
    pub fn lock_z_motor(&mut self, locked: bool) {
        self.endstops.lock_z(locked);
    }

    /// Lock the secondary Z motor.
    pub fn lock_z2_motor(&mut self, locked: bool) {
        self.endstops.lock_z2(locked);
    }

    /// Emit one out-of-band step on an axis for live offset adjustment.
    ///
    /// Must only be called from interrupt context nested above the step
    /// interrupt: it writes the DIR pins without taking any lock and
    /// restores them afterwards, which races foreground callers. On
    /// Delta machines a Z babystep pulses all three towers together.
    pub fn babystep(&mut self, axis: Axis, positive: bool) {
        if axis == Axis::E {
            return;
        }
        let pulse_ns = self.config.min_pulse_ns.max(1_000);

        if matches!(self.config.kinematics, Kinematics::Delta) && axis == Axis::Z {
            let negative = positive == self.config.babystep_invert_z;
            let towers = [Axis::X, Axis::Y, Axis::Z];
            for tower in towers {
                self.set_axis_drivers(tower, true);
            }
            for tower in towers {
                let level = negative == self.config.axis(tower).invert_dir;
                self.hal.dir_write(tower_channel(tower), level);
            }
            for tower in towers {
                let level = !self.config.axis(tower).invert_step;
                self.hal.step_write(tower_channel(tower), level);
            }
            self.hal.delay_ns(pulse_ns);
            for tower in towers {
                let level = self.config.axis(tower).invert_step;
                self.hal.step_write(tower_channel(tower), level);
            }
            for tower in towers {
                let old_negative = self.out_bits & tower.bit() != 0;
                let level = old_negative == self.config.axis(tower).invert_dir;
                self.hal.dir_write(tower_channel(tower), level);
            }
            return;
        }

        let invert_extra = axis == Axis::Z && self.config.babystep_invert_z;
        let negative = positive == invert_extra;
        let invert_dir = self.config.axis(axis).invert_dir;
        let invert_step = self.config.axis(axis).invert_step;

        self.set_axis_drivers(axis, true);
        let (channels, n) = self.axis_channels(axis);
        for &channel in &channels[..n] {
            self.hal.dir_write(channel, negative == invert_dir);
        }
        for &channel in &channels[..n] {
            self.hal.step_write(channel, !invert_step);
        }
        self.hal.delay_ns(pulse_ns);
        for &channel in &channels[..n] {
            self.hal.step_write(channel, invert_step);
        }
        let old_negative = self.out_bits & axis.bit() != 0;
        for &channel in &channels[..n] {
            self.hal.dir_write(channel, old_negative == invert_dir);
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The block source (push new blocks through this on owned queues).
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// The block currently being executed.
    pub fn current_block(&self) -> Option<&Block> {
        self.current.as_ref()
    }

    /// Whether a block is being executed.
    pub fn is_busy(&self) -> bool {
        self.current.is_some()
    }

    /// Step events completed within the current block.
    pub fn steps_completed(&self) -> u32 {
        self.step_events_completed
    }

    /// Latched endstop trip flags.
    pub fn endstop_hit_bits(&self) -> EndstopBits {
        self.endstops.hit_bits()
    }

    /// Position captured when the given axis's endstop tripped.
    pub fn endstop_trigsteps(&self, axis: Axis) -> i64 {
        self.endstops.trigsteps(axis)
    }

    /// The hardware adapter.
    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }

    /// The machine configuration.
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn with_isr_disabled<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.hal.disable_step_isr();
        let value = f(self);
        if self.isr_enabled {
            self.hal.enable_step_isr();
        }
        value
    }

    /// Enable or disable the driver(s) of one logical axis.
    fn set_axis_drivers(&mut self, axis: Axis, on: bool) {
        let level = on != self.config.axis(axis).invert_enable;
        let (channels, n) = self.axis_channels(axis);
        for &channel in &channels[..n] {
            self.hal.enable_write(channel, level);
        }
    }

    /// Physical channels of one logical axis (babystep and enable
    /// fan-out; E maps to extruder 0 here).
    fn axis_channels(&self, axis: Axis) -> ([MotorChannel; 2], usize) {
        match axis {
            Axis::X if self.config.is_dual_x() => ([MotorChannel::X, MotorChannel::X2], 2),
            Axis::X => ([MotorChannel::X, MotorChannel::X], 1),
            Axis::Y => ([MotorChannel::Y, MotorChannel::Y], 1),
            Axis::Z if self.config.z_dual_endstops => ([MotorChannel::Z, MotorChannel::Z2], 2),
            Axis::Z => ([MotorChannel::Z, MotorChannel::Z], 1),
            Axis::E => ([MotorChannel::E(0), MotorChannel::E(0)], 1),
        }
    }

    /// Every channel this machine populates.
    fn channel_list(&self) -> ([MotorChannel; 9], usize) {
        let mut list = [MotorChannel::X; 9];
        let mut n = 0;
        list[n] = MotorChannel::X;
        n += 1;
        if self.config.is_dual_x() {
            list[n] = MotorChannel::X2;
            n += 1;
        }
        list[n] = MotorChannel::Y;
        n += 1;
        list[n] = MotorChannel::Z;
        n += 1;
        if self.config.z_dual_endstops {
            list[n] = MotorChannel::Z2;
            n += 1;
        }
        for extruder in 0..self.config.extruders {
            list[n] = MotorChannel::E(extruder);
            n += 1;
        }
        (list, n)
    }
}

/// Delta tower channel of a logical axis.
fn tower_channel(axis: Axis) -> MotorChannel {
    match axis {
        Axis::X => MotorChannel::X,
        Axis::Y => MotorChannel::Y,
        _ => MotorChannel::Z,
    }
}

#[cfg(test)]
mod tests {
    // The interrupt bodies are exercised end to end by
    // tests/integration_tests.rs with a scripted hardware adapter.
}

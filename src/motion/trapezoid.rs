//! Trapezoid generator - per-block speed profile state.
//!
//! The speed curve of a block is a trapezoid: accelerate from
//! `initial_rate` until `accelerate_until` step events, cruise at
//! `nominal_rate`, then decelerate to `final_rate` after
//! `decelerate_after`. The slope is integrated online with v = u + a*t
//! where t is the accumulated timer periods of the steps taken so far
//! (Euler on time, not on step count), so `acceleration_time` grows by
//! the *variable* period each tick.

use crate::config::machine::MachineConfig;
use crate::planner::Block;

/// Rounded multiply-high on 32.32 fixed-point operands.
///
/// `(a * b + 0x8000_0000) >> 32` with a 64-bit intermediate. The
/// rounding bias must be preserved; truncation loses up to a full rate
/// tick per integration step.
#[inline]
pub fn mul_high_round(a: u32, b: u32) -> u32 {
    (((a as u64) * (b as u64) + 0x8000_0000) >> 32) as u32
}

/// Which phase of the trapezoid a step event falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Ramping up from `initial_rate`.
    Accelerating,
    /// Holding `nominal_rate`.
    Cruising,
    /// Ramping down to `final_rate`.
    Decelerating,
}

/// Outcome of one rate update.
#[derive(Debug, Clone, Copy)]
pub struct RateUpdate {
    /// Timer period until the next step interrupt, in timer ticks.
    pub period: u32,
    /// Phase the update was computed in.
    pub phase: Phase,
    /// Bresenham iterations the next interrupt must run (1, 2 or 4).
    pub step_loops: u8,
}

/// Per-block runtime state of the speed profile.
#[derive(Debug, Clone, Copy)]
pub struct TrapezoidGenerator {
    /// Current rate while accelerating; frozen at acceleration end as
    /// the deceleration starting point.
    acc_step_rate: u32,
    /// Accumulated timer ticks since acceleration start.
    acceleration_time: u32,
    /// Accumulated timer ticks since deceleration start.
    deceleration_time: u32,
    /// Bresenham iterations per interrupt at the current rate.
    step_loops: u8,
    /// Cached cruise-phase values.
    step_loops_nominal: u8,
    period_nominal: u32,
}

impl Default for TrapezoidGenerator {
    fn default() -> Self {
        Self {
            acc_step_rate: 0,
            acceleration_time: 0,
            deceleration_time: 0,
            step_loops: 1,
            step_loops_nominal: 1,
            period_nominal: 0,
        }
    }
}

impl TrapezoidGenerator {
    /// Initialize for a new block. Called once at block acquisition.
    ///
    /// Returns the period to program for the block's first step event.
    pub fn reset(&mut self, block: &Block, config: &MachineConfig, timer_hz: u32) -> u32 {
        self.deceleration_time = 0;
        self.period_nominal = self.rate_to_period(block.nominal_rate, config, timer_hz);
        self.step_loops_nominal = self.step_loops;
        self.acc_step_rate = block.initial_rate;
        let first = self.rate_to_period(self.acc_step_rate, config, timer_hz);
        self.acceleration_time = first;
        first
    }

    /// Current rate (steps/s of the dominant axis).
    #[inline]
    pub fn rate(&self) -> u32 {
        self.acc_step_rate
    }

    /// Bresenham iterations the next interrupt must run.
    #[inline]
    pub fn step_loops(&self) -> u8 {
        self.step_loops
    }

    /// Compute the period for the next step event.
    ///
    /// `completed` is the step event count *after* this tick's pulses.
    /// Boundary tie-breaks: at `completed == accelerate_until` the accel
    /// branch still applies; the decel branch starts strictly after
    /// `decelerate_after`.
    pub fn next_period(
        &mut self,
        block: &Block,
        completed: u32,
        config: &MachineConfig,
        timer_hz: u32,
    ) -> RateUpdate {
        if completed <= block.accelerate_until {
            let mut rate =
                mul_high_round(self.acceleration_time, block.acceleration_rate);
            rate += block.initial_rate;
            // upper limit
            if rate > block.nominal_rate {
                rate = block.nominal_rate;
            }
            self.acc_step_rate = rate;

            let period = self.rate_to_period(rate, config, timer_hz);
            self.acceleration_time += period;
            RateUpdate {
                period,
                phase: Phase::Accelerating,
                step_loops: self.step_loops,
            }
        } else if completed > block.decelerate_after {
            let delta = mul_high_round(self.deceleration_time, block.acceleration_rate);

            // A delta past the acceleration end point would flip the
            // sign; fall straight to the exit rate.
            let mut rate = if delta > self.acc_step_rate {
                block.final_rate
            } else {
                self.acc_step_rate - delta
            };

            // lower limit
            if rate < block.final_rate {
                rate = block.final_rate;
            }

            let period = self.rate_to_period(rate, config, timer_hz);
            self.deceleration_time += period;
            RateUpdate {
                period,
                phase: Phase::Decelerating,
                step_loops: self.step_loops,
            }
        } else {
            // Re-assert the cached loop count in case the last
            // acceleration tick left a different one behind.
            self.step_loops = self.step_loops_nominal;
            RateUpdate {
                period: self.period_nominal,
                phase: Phase::Cruising,
                step_loops: self.step_loops_nominal,
            }
        }
    }

    /// Convert a step rate to a timer period, choosing the per-interrupt
    /// burst size for high rates.
    pub fn rate_to_period(&mut self, rate: u32, config: &MachineConfig, timer_hz: u32) -> u32 {
        let mut rate = rate.min(config.max_step_frequency.value());
        let double = config.double_step_frequency.value();

        if config.high_speed_stepping && rate > 2 * double {
            rate >>= 2;
            self.step_loops = 4;
        } else if config.high_speed_stepping && rate > double {
            rate >>= 1;
            self.step_loops = 2;
        } else {
            self.step_loops = 1;
        }

        timer_hz / rate.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NUM_AXIS;

    const TIMER_HZ: u32 = 1_000_000;

    fn config() -> MachineConfig {
        MachineConfig::default()
    }

    fn trapezoid_block() -> Block {
        let mut block = Block::constant_rate([1000, 0, 0, 0], 0, 2000);
        block.initial_rate = 500;
        block.final_rate = 500;
        block.accelerate_until = 250;
        block.decelerate_after = 750;
        // 9000 steps/s^2: the 500 -> 2000 ramp covers ~208 events, so the
        // rate saturates at nominal before the accel phase ends
        block.acceleration_rate = ((9000u64 << 32) / TIMER_HZ as u64) as u32;
        block
    }

    #[test]
    fn test_mul_high_rounds_half_up() {
        // 1 * 0x8000_0000 + bias = 2^32 exactly -> 1
        assert_eq!(mul_high_round(1, 0x8000_0000), 1);
        // Just below the bias threshold -> 0
        assert_eq!(mul_high_round(1, 0x7FFF_FFFF), 0);
        assert_eq!(mul_high_round(0, u32::MAX), 0);
    }

    #[test]
    fn test_reset_programs_initial_rate() {
        let mut tg = TrapezoidGenerator::default();
        let block = trapezoid_block();
        let first = tg.reset(&block, &config(), TIMER_HZ);

        assert_eq!(first, TIMER_HZ / 500);
        assert_eq!(tg.rate(), 500);
    }

    #[test]
    fn test_acceleration_is_monotonic_and_capped() {
        let mut tg = TrapezoidGenerator::default();
        let block = trapezoid_block();
        tg.reset(&block, &config(), TIMER_HZ);

        let mut last_rate = tg.rate();
        for completed in 1..=block.accelerate_until {
            let update = tg.next_period(&block, completed, &config(), TIMER_HZ);
            assert_eq!(update.phase, Phase::Accelerating);
            assert!(tg.rate() >= last_rate);
            assert!(tg.rate() <= block.nominal_rate);
            last_rate = tg.rate();
        }
        assert_eq!(last_rate, block.nominal_rate);
    }

    #[test]
    fn test_cruise_uses_cached_period() {
        let mut tg = TrapezoidGenerator::default();
        let block = trapezoid_block();
        tg.reset(&block, &config(), TIMER_HZ);
        for completed in 1..=block.accelerate_until {
            tg.next_period(&block, completed, &config(), TIMER_HZ);
        }

        let update = tg.next_period(&block, block.accelerate_until + 1, &config(), TIMER_HZ);
        assert_eq!(update.phase, Phase::Cruising);
        assert_eq!(update.period, TIMER_HZ / 2000);
    }

    #[test]
    fn test_deceleration_floors_at_final_rate() {
        let mut tg = TrapezoidGenerator::default();
        let block = trapezoid_block();
        tg.reset(&block, &config(), TIMER_HZ);
        for completed in 1..block.step_event_count {
            tg.next_period(&block, completed, &config(), TIMER_HZ);
        }

        let update = tg.next_period(&block, block.step_event_count, &config(), TIMER_HZ);
        assert_eq!(update.phase, Phase::Decelerating);
        assert!(TIMER_HZ / update.period <= 500 + 1);
    }

    #[test]
    fn test_boundary_tiebreaks() {
        let mut tg = TrapezoidGenerator::default();
        let block = trapezoid_block();
        tg.reset(&block, &config(), TIMER_HZ);

        // Exactly at accelerate_until: still the accel branch
        let update = tg.next_period(&block, block.accelerate_until, &config(), TIMER_HZ);
        assert_eq!(update.phase, Phase::Accelerating);

        // Exactly at decelerate_after: still cruising
        let update = tg.next_period(&block, block.decelerate_after, &config(), TIMER_HZ);
        assert_eq!(update.phase, Phase::Cruising);

        let update = tg.next_period(&block, block.decelerate_after + 1, &config(), TIMER_HZ);
        assert_eq!(update.phase, Phase::Decelerating);
    }

    #[test]
    fn test_step_loop_selection() {
        let mut tg = TrapezoidGenerator::default();
        let cfg = config();

        // double_step_frequency defaults to 10 kHz
        tg.rate_to_period(5_000, &cfg, TIMER_HZ);
        assert_eq!(tg.step_loops, 1);

        let period = tg.rate_to_period(16_000, &cfg, TIMER_HZ);
        assert_eq!(tg.step_loops, 2);
        assert_eq!(period, TIMER_HZ / 8_000);

        let period = tg.rate_to_period(32_000, &cfg, TIMER_HZ);
        assert_eq!(tg.step_loops, 4);
        assert_eq!(period, TIMER_HZ / 8_000);
    }

    #[test]
    fn test_rate_clamped_to_max_frequency() {
        use crate::config::units::StepsPerSec;

        let mut tg = TrapezoidGenerator::default();
        let mut cfg = config();
        cfg.high_speed_stepping = false;
        cfg.max_step_frequency = StepsPerSec(20_000);

        let period = tg.rate_to_period(1_000_000, &cfg, TIMER_HZ);
        assert_eq!(tg.step_loops, 1);
        assert_eq!(period, TIMER_HZ / 20_000);
    }

    #[test]
    fn test_zero_step_block_rejected_by_wellformedness() {
        let block = Block::constant_rate([0; NUM_AXIS], 0, 1000);
        assert!(!block.is_well_formed());
    }
}

//! Multi-axis Bresenham line tracer.
//!
//! The dominant axis is implicit: it steps on every event. Each
//! subordinate axis keeps a signed accumulator seeded at `-N/2` and
//! steps whenever the accumulator crosses zero, which places its first
//! step near the fair Bresenham position instead of at event 1.

use crate::config::axis::Axis;
use crate::planner::Block;
use crate::NUM_AXIS;

/// Per-axis Bresenham accumulators for the current block.
#[derive(Debug, Clone, Copy, Default)]
pub struct BresenhamCounters {
    counters: [i32; NUM_AXIS],
}

impl BresenhamCounters {
    /// Seed all accumulators for a block of `step_event_count` events.
    pub fn reset(&mut self, step_event_count: u32) {
        let seed = -((step_event_count >> 1) as i32);
        self.counters = [seed; NUM_AXIS];
    }

    /// Advance one axis by one step event.
    ///
    /// Returns true if the axis must pulse on this event.
    #[inline]
    pub fn advance(&mut self, axis: Axis, block: &Block) -> bool {
        let counter = &mut self.counters[axis.index()];
        *counter += block.steps[axis.index()] as i32;
        if *counter > 0 {
            *counter -= block.step_event_count as i32;
            true
        } else {
            false
        }
    }

    /// Current accumulator value of one axis.
    #[cfg(test)]
    fn value(&self, axis: Axis) -> i32 {
        self.counters[axis.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_is_negative_half() {
        let mut counters = BresenhamCounters::default();
        counters.reset(100);
        assert_eq!(counters.value(Axis::X), -50);
        assert_eq!(counters.value(Axis::E), -50);

        counters.reset(101);
        assert_eq!(counters.value(Axis::Y), -50);
    }

    #[test]
    fn test_dominant_axis_steps_every_event() {
        let block = Block::constant_rate([100, 0, 0, 0], 0, 1000);
        let mut counters = BresenhamCounters::default();
        counters.reset(block.step_event_count);

        for _ in 0..100 {
            assert!(counters.advance(Axis::X, &block));
        }
    }

    #[test]
    fn test_half_rate_axis_steps_on_odd_events() {
        // 100 X steps, 50 Y steps: Y pulses at events 1, 3, 5, ... 99
        let block = Block::constant_rate([100, 50, 0, 0], 0, 1000);
        let mut counters = BresenhamCounters::default();
        counters.reset(block.step_event_count);

        let mut y_events = [0u32; 50];
        let mut n = 0;
        for event in 0..100u32 {
            counters.advance(Axis::X, &block);
            if counters.advance(Axis::Y, &block) {
                y_events[n] = event;
                n += 1;
            }
        }

        assert_eq!(n, 50);
        for (i, &event) in y_events.iter().enumerate() {
            assert_eq!(event, 2 * i as u32 + 1);
        }
    }

    #[test]
    fn test_steps_produced_equal_steps_planned() {
        let block = Block::constant_rate([997, 613, 311, 7], 0, 1000);
        let mut counters = BresenhamCounters::default();
        counters.reset(block.step_event_count);

        let mut produced = [0u32; NUM_AXIS];
        for _ in 0..block.step_event_count {
            for axis in Axis::ALL {
                if counters.advance(axis, &block) {
                    produced[axis.index()] += 1;
                }
            }
        }

        assert_eq!(produced, block.steps);
    }

    #[test]
    fn test_idle_axis_never_steps() {
        let block = Block::constant_rate([100, 0, 0, 0], 0, 1000);
        let mut counters = BresenhamCounters::default();
        counters.reset(block.step_event_count);

        for _ in 0..100 {
            counters.advance(Axis::X, &block);
            assert!(!counters.advance(Axis::Z, &block));
        }
    }
}

//! Simulated hardware adapter and tick pump for integration tests.

use stepper_executor::hal::NUM_CHANNELS;
use stepper_executor::{
    Axis, Block, BlockQueue, BlockSource, EndstopSwitch, MachineConfig, MotorChannel,
    StepExecutor, StepperHal,
};
use stepper_executor::config::axis::EndstopSide;

/// Timer frequency of the simulated step timer.
pub const TIMER_HZ: u32 = 1_000_000;

/// Minimum distance between the programmed deadline and the counter.
const TIMER_EXIT_MARGIN: u32 = 42;

/// Scripted, recording hardware adapter.
///
/// Pin writes are recorded as levels and rising-edge counts per channel;
/// endstop levels are set by the test between pump ticks; programmed
/// timer periods are collected with the hardware floor applied.
#[derive(Debug)]
pub struct SimHal {
    pub step_level: [bool; NUM_CHANNELS],
    pub step_edges: [u32; NUM_CHANNELS],
    pub dir_level: [bool; NUM_CHANNELS],
    pub enable_level: [Option<bool>; NUM_CHANNELS],
    endstop_level: [bool; 11],
    pub programmed: Vec<u32>,
    pub isr_enabled: bool,
    pub idle_calls: u32,
    pub aborted: bool,
}

impl SimHal {
    pub fn new() -> Self {
        Self {
            step_level: [false; NUM_CHANNELS],
            step_edges: [0; NUM_CHANNELS],
            dir_level: [false; NUM_CHANNELS],
            enable_level: [None; NUM_CHANNELS],
            endstop_level: [false; 11],
            programmed: Vec::new(),
            isr_enabled: false,
            idle_calls: 0,
            aborted: false,
        }
    }

    /// Drive one switch level (raw, before polarity).
    pub fn set_endstop(&mut self, switch: EndstopSwitch, level: bool) {
        self.endstop_level[switch_slot(switch)] = level;
    }

    /// Rising edges seen on one channel's STEP pin.
    pub fn edges(&self, channel: MotorChannel) -> u32 {
        self.step_edges[channel.index()]
    }

    /// Last period handed to the timer.
    pub fn last_period(&self) -> u32 {
        *self.programmed.last().expect("no period programmed")
    }
}

fn switch_slot(switch: EndstopSwitch) -> usize {
    match switch {
        EndstopSwitch::Limit(axis, EndstopSide::Min) => axis.index(),
        EndstopSwitch::Limit(axis, EndstopSide::Max) => 4 + axis.index(),
        EndstopSwitch::Z2(EndstopSide::Min) => 8,
        EndstopSwitch::Z2(EndstopSide::Max) => 9,
        EndstopSwitch::ZProbe => 10,
    }
}

impl embedded_hal::delay::DelayNs for SimHal {
    fn delay_ns(&mut self, _ns: u32) {}
}

impl StepperHal for SimHal {
    fn step_write(&mut self, channel: MotorChannel, level: bool) {
        let slot = channel.index();
        if level && !self.step_level[slot] {
            self.step_edges[slot] += 1;
        }
        self.step_level[slot] = level;
    }

    fn dir_write(&mut self, channel: MotorChannel, level: bool) {
        self.dir_level[channel.index()] = level;
    }

    fn enable_write(&mut self, channel: MotorChannel, level: bool) {
        self.enable_level[channel.index()] = Some(level);
    }

    fn endstop_read(&mut self, switch: EndstopSwitch) -> bool {
        self.endstop_level[switch_slot(switch)]
    }

    fn timer_base_frequency(&self) -> u32 {
        TIMER_HZ
    }

    fn program_step_timer(&mut self, ticks: u32) {
        self.programmed.push(ticks.max(TIMER_EXIT_MARGIN));
    }

    fn enable_step_isr(&mut self) {
        self.isr_enabled = true;
    }

    fn disable_step_isr(&mut self) {
        self.isr_enabled = false;
    }

    fn idle(&mut self) {
        self.idle_calls += 1;
    }

    fn motion_aborted(&mut self) {
        self.aborted = true;
    }
}

/// Executor type used across the integration tests.
pub type SimExecutor<'m> = StepExecutor<'m, SimHal, BlockQueue<8>>;

/// Build an initialized executor over a fresh simulated machine.
pub fn executor(config: MachineConfig) -> SimExecutor<'static> {
    let mut exec = StepExecutor::new(SimHal::new(), config, BlockQueue::new());
    exec.init();
    exec
}

/// Pump step interrupts until all queued motion has completed.
///
/// Returns the number of interrupts taken. Panics if the executor does
/// not converge within `max_ticks`.
pub fn pump_until_idle(exec: &mut SimExecutor<'_>, max_ticks: u32) -> u32 {
    let mut ticks = 0;
    while exec.is_busy() || exec.source_mut().queued() {
        assert!(ticks < max_ticks, "tick pump did not converge");
        exec.on_step_timer();
        ticks += 1;
    }
    ticks
}

/// A pure single-axis block at constant rate.
pub fn axis_block(axis: Axis, steps: u32, negative: bool, rate: u32) -> Block {
    let mut counts = [0u32; 4];
    counts[axis.index()] = steps;
    let bits = if negative { axis.bit() } else { 0 };
    Block::constant_rate(counts, bits, rate)
}

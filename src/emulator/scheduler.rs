//! Paces instruction execution against a 60 Hz real-time frame clock.
//!
//! Each iteration runs a batch of instructions, drains input, then accounts for the
//! whole frames that passed since the run started: timers count down once per frame
//! and the display is presented if it changed. The next batch is sized from the
//! number of frames that passed, so the configured instructions per second holds
//! however long an iteration took.

use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use crate::emulator::debugger::{DebugConsole, Debugger, Gate};
use crate::emulator::emulator::{Emulator, State};
use crate::emulator::input::EmulatorInput;
use crate::emulator::output::EmulatorOutput;

pub const FPS: u64 = 60;
pub const MIN_IPS: u32 = 60;

/// A source of wall-clock time since the run started.
pub trait Clock {
    fn elapsed(&self) -> Duration;
    fn sleep(&mut self, duration: Duration);
}

pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> SystemClock {
        SystemClock {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// A clock that only moves when told to, or when slept on. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> ManualClock {
        ManualClock::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }

    /// Move to the start of the frame `frames` frames from now.
    pub fn advance_frames(&self, frames: u64) {
        let target = frames_elapsed(self.now.get()) + frames;
        let nanos = (target * 1_000_000_000 + FPS - 1) / FPS;
        self.now.set(Duration::from_nanos(nanos));
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&mut self, duration: Duration) {
        self.advance(duration);
    }
}

fn frames_elapsed(elapsed: Duration) -> u64 {
    (elapsed.as_nanos() * FPS as u128 / 1_000_000_000) as u64
}

/// Instructions run per frame. Half the per-frame share of `ips`, and never zero.
pub fn instructions_per_frame(ips: u32) -> u32 {
    (ips / FPS as u32 / 2).max(1)
}

pub struct Scheduler<C: Clock = SystemClock> {
    clock: C,
    instructions_per_frame: u32,
    frames_accounted: u64,
    budget: u64,
}

impl Scheduler<SystemClock> {
    pub fn new(ips: u32) -> Scheduler<SystemClock> {
        Scheduler::with_clock(ips, SystemClock::new())
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn with_clock(ips: u32, clock: C) -> Scheduler<C> {
        let ips = ips.max(MIN_IPS);
        Scheduler {
            clock,
            instructions_per_frame: instructions_per_frame(ips),
            frames_accounted: 0,
            budget: 0,
        }
    }

    pub fn instructions_per_frame(&self) -> u32 {
        self.instructions_per_frame
    }

    /// Instructions the next iteration will execute at most.
    pub fn budget(&self) -> u64 {
        self.budget
    }

    pub fn frames_accounted(&self) -> u64 {
        self.frames_accounted
    }

    /// Run until the machine halts.
    pub fn run<I: EmulatorInput, O: EmulatorOutput>(&mut self, emulator: &mut Emulator<I, O>) -> State {
        self.log_start();
        while self.run_iteration(emulator, |_| Gate::Execute) {}
        emulator.state().clone()
    }

    /// Run until the machine halts, asking the debugger before every instruction.
    pub fn run_with_debugger<I, O, D>(&mut self, emulator: &mut Emulator<I, O>, debugger: &mut Debugger<D>) -> State
    where
        I: EmulatorInput,
        O: EmulatorOutput,
        D: DebugConsole,
    {
        self.log_start();
        while self.run_iteration(emulator, |emulator| debugger.gate(emulator)) {}
        emulator.state().clone()
    }

    fn log_start(&self) {
        log::info!(
            "Running program at {} IPS ({} per frame)",
            self.instructions_per_frame as u64 * FPS * 2,
            self.instructions_per_frame
        );
    }

    /// One pass of the loop: execute, poll input, account frames, maybe idle.
    ///
    /// Returns false once the machine has halted.
    pub fn run_iteration<I, O, G>(&mut self, emulator: &mut Emulator<I, O>, mut gate: G) -> bool
    where
        I: EmulatorInput,
        O: EmulatorOutput,
        G: FnMut(&Emulator<I, O>) -> Gate,
    {
        self.execute_batch(emulator, &mut gate);
        emulator.poll_input();

        let frames = frames_elapsed(self.clock.elapsed()).saturating_sub(self.frames_accounted);
        if frames > 0 {
            self.frames_accounted += frames;
            log::debug!("{} frame(s) elapsed, {} accounted", frames, self.frames_accounted);
            emulator.advance_frames(frames);
        }

        self.budget = frames.max(1) * self.instructions_per_frame as u64;

        if emulator.halt_requested() {
            emulator.request_halt();
        }
        if emulator.is_halted() {
            return false;
        }

        if emulator.is_waiting_for_key() || frames == 0 {
            self.clock.sleep(Duration::from_secs(1) / FPS as u32);
        }
        true
    }

    fn execute_batch<I, O, G>(&mut self, emulator: &mut Emulator<I, O>, gate: &mut G)
    where
        I: EmulatorInput,
        O: EmulatorOutput,
        G: FnMut(&Emulator<I, O>) -> Gate,
    {
        for _ in 0..self.budget {
            if emulator.is_waiting_for_key() || emulator.is_halted() {
                break;
            }
            if emulator.halt_requested() {
                emulator.request_halt();
                break;
            }
            if gate(&*emulator) == Gate::Quit {
                emulator.request_halt();
                break;
            }
            if emulator.step().is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::emulator::debugger::{DebugCommand, DebugMode};
    use crate::emulator::emulator::Halt;
    use crate::emulator::error::{BoundsError, Fault};
    use crate::emulator::input::{InputEvent, QueuedInput};
    use crate::emulator::output::DummyOutput;
    use std::collections::VecDeque;
    use std::sync::atomic::Ordering;
    use test_case::test_case;

    type TestEmulator = Emulator<QueuedInput, DummyOutput>;

    fn setup(program: &[u8], ips: u32) -> (TestEmulator, Scheduler<ManualClock>, ManualClock) {
        let mut emulator = Emulator::with_seed(QueuedInput::default(), DummyOutput::new(), 1);
        emulator.load(program).unwrap();
        let clock = ManualClock::new();
        let scheduler = Scheduler::with_clock(ips, clock.clone());
        (emulator, scheduler, clock)
    }

    fn iterate(scheduler: &mut Scheduler<ManualClock>, emulator: &mut TestEmulator) -> bool {
        scheduler.run_iteration(emulator, |_| Gate::Execute)
    }

    #[test_case(60 => 1 ; "minimum rate")]
    #[test_case(600 => 5 ; "default rate")]
    #[test_case(3000 => 25 ; "fast")]
    #[test_case(100 => 1 ; "rounds down but never to zero")]
    fn instructions_per_frame_from_ips(ips: u32) -> u32 {
        instructions_per_frame(ips)
    }

    #[test]
    fn manual_clock_lands_on_whole_frames() {
        let clock = ManualClock::new();
        for n in 1..=200 {
            clock.advance_frames(1);
            assert_eq!(frames_elapsed(clock.elapsed()), n);
        }
    }

    #[test]
    fn delay_timer_counts_down_once_per_frame() {
        // LD VA, 0x12; LD DT, VA; then spin
        let (mut emulator, mut scheduler, clock) = setup(&[0x6A, 0x12, 0xFA, 0x15, 0x12, 0x04], 600);
        iterate(&mut scheduler, &mut emulator); // no budget yet
        clock.advance_frames(1);
        iterate(&mut scheduler, &mut emulator);
        // Set during the batch, then counted down by the frame that ended it
        assert_eq!(emulator.delay_timer(), 0x11);

        for n in 2..0x12u8 {
            clock.advance_frames(1);
            iterate(&mut scheduler, &mut emulator);
            assert_eq!(emulator.delay_timer(), 0x12 - n);
        }

        clock.advance_frames(1);
        iterate(&mut scheduler, &mut emulator);
        assert_eq!(emulator.delay_timer(), 0);
        clock.advance_frames(30);
        iterate(&mut scheduler, &mut emulator);
        assert_eq!(emulator.delay_timer(), 0);
    }

    #[test]
    fn several_frames_at_once_scale_budget_and_timers() {
        // LD VA, 0x12; LD ST, VA; then spin
        let (mut emulator, mut scheduler, clock) = setup(&[0x6A, 0x12, 0xFA, 0x18, 0x12, 0x04], 600);
        let sound = emulator.sound_timer_handle();
        iterate(&mut scheduler, &mut emulator);

        clock.advance_frames(4);
        iterate(&mut scheduler, &mut emulator);
        assert_eq!(scheduler.frames_accounted(), 4);
        assert_eq!(scheduler.budget(), 4 * 5);
        assert_eq!(sound.get(), 0x12 - 4);
    }

    #[test]
    fn budget_is_one_frame_when_no_frame_elapsed() {
        let (mut emulator, mut scheduler, clock) = setup(&[0x12, 0x00], 600);
        iterate(&mut scheduler, &mut emulator);
        assert_eq!(scheduler.budget(), 5);
        // Idling moved the clock forward by one frame's worth
        assert!(clock.elapsed() >= Duration::from_millis(16));
    }

    #[test]
    fn batch_executes_budgeted_instructions() {
        // ADD V0, 1; JP 0x200
        let (mut emulator, mut scheduler, clock) = setup(&[0x70, 0x01, 0x12, 0x00], 600);
        iterate(&mut scheduler, &mut emulator);
        clock.advance_frames(1);
        iterate(&mut scheduler, &mut emulator);
        // 5 instructions: three adds and two jumps
        assert_eq!(emulator.registers()[0], 3);
    }

    #[test]
    fn wait_for_key_stops_the_batch_immediately() {
        // LD V3, K; ADD V0, 1; JP 0x202
        let (mut emulator, mut scheduler, clock) = setup(&[0xF3, 0x0A, 0x70, 0x01, 0x12, 0x02], 3000);
        iterate(&mut scheduler, &mut emulator);
        clock.advance_frames(1);
        iterate(&mut scheduler, &mut emulator);
        assert!(emulator.is_waiting_for_key());
        assert_eq!(emulator.program_counter(), 0x202);
        assert_eq!(emulator.registers()[0], 0);

        // Waiting idles a frame per iteration without running anything
        let before = clock.elapsed();
        iterate(&mut scheduler, &mut emulator);
        assert!(clock.elapsed() > before);
        assert_eq!(emulator.registers()[0], 0);

        emulator.input_mut().push(InputEvent::KeyDown(0xB));
        iterate(&mut scheduler, &mut emulator);
        assert_eq!(emulator.registers()[3], 0x0B);
        assert_eq!(emulator.registers()[0], 0);

        clock.advance_frames(1);
        iterate(&mut scheduler, &mut emulator);
        assert!(emulator.registers()[0] > 0);
    }

    #[test]
    fn display_is_presented_once_per_change() {
        // LD I, 0; DRW V0, V0, 5; JP 0x204
        let (mut emulator, mut scheduler, clock) = setup(&[0xA0, 0x00, 0xD0, 0x05, 0x12, 0x04], 600);
        iterate(&mut scheduler, &mut emulator);
        clock.advance_frames(1);
        iterate(&mut scheduler, &mut emulator);
        clock.advance_frames(1);
        iterate(&mut scheduler, &mut emulator);
        assert_eq!(emulator.output().frames(), 1);
        assert!(!emulator.display().is_changed());

        clock.advance_frames(5);
        iterate(&mut scheduler, &mut emulator);
        assert_eq!(emulator.output().frames(), 1);
    }

    #[test]
    fn fault_ends_the_run_with_state_intact() {
        let (mut emulator, mut scheduler, clock) = setup(&[0x6A, 0x07, 0x00, 0xEE], 600);
        iterate(&mut scheduler, &mut emulator);
        clock.advance_frames(1);
        assert_eq!(iterate(&mut scheduler, &mut emulator), false);
        assert_eq!(
            emulator.state(),
            &State::Halted(Halt::Fault(Fault::Bounds(BoundsError::StackUnderflow { pc: 0x202 })))
        );
        assert_eq!(emulator.registers()[0xA], 7);
    }

    #[test]
    fn quit_event_ends_run() {
        let (mut emulator, mut scheduler, _clock) = setup(&[0x12, 0x00], 600);
        emulator.input_mut().push(InputEvent::Quit);
        assert_eq!(scheduler.run(&mut emulator), State::Halted(Halt::Requested));
    }

    #[test]
    fn halt_flag_ends_run() {
        let (mut emulator, mut scheduler, _clock) = setup(&[0x12, 0x00], 600);
        emulator.halt_handle().store(true, Ordering::Release);
        assert_eq!(scheduler.run(&mut emulator), State::Halted(Halt::Requested));
    }

    struct Script(VecDeque<DebugCommand>);

    impl DebugConsole for Script {
        fn next_command(&mut self) -> Option<DebugCommand> {
            self.0.pop_front()
        }
        fn print(&mut self, _text: &str) {}
    }

    #[test]
    fn debugger_steps_one_instruction_per_command() {
        let (mut emulator, mut scheduler, clock) = setup(&[0x70, 0x01, 0x12, 0x00], 3000);
        let commands = vec![DebugCommand::Step, DebugCommand::Step, DebugCommand::Step, DebugCommand::Quit];
        let mut debugger = Debugger::new(Script(commands.into_iter().collect()));
        clock.advance_frames(1);
        let state = scheduler.run_with_debugger(&mut emulator, &mut debugger);
        assert_eq!(state, State::Halted(Halt::Requested));
        // ADD, JP, ADD
        assert_eq!(emulator.registers()[0], 2);
        assert_eq!(debugger.mode(), DebugMode::StepInto);
    }

    #[test]
    fn interrupt_returns_running_debugger_to_stepping() {
        let (mut emulator, mut scheduler, clock) = setup(&[0x70, 0x01, 0x12, 0x00], 600);
        let commands = vec![DebugCommand::Run, DebugCommand::Quit];
        let mut debugger = Debugger::new(Script(commands.into_iter().collect()));
        let interrupt = debugger.interrupt_handle();

        scheduler.run_iteration(&mut emulator, |emulator| debugger.gate(emulator));
        clock.advance_frames(1);
        assert!(scheduler.run_iteration(&mut emulator, |emulator| debugger.gate(emulator)));
        assert_eq!(emulator.registers()[0], 3);

        interrupt.store(true, Ordering::Release);
        clock.advance_frames(1);
        assert!(!scheduler.run_iteration(&mut emulator, |emulator| debugger.gate(emulator)));
        assert_eq!(debugger.mode(), DebugMode::StepInto);
        assert_eq!(emulator.state(), &State::Halted(Halt::Requested));
        assert_eq!(emulator.registers()[0], 3);
    }
}

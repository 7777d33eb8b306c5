//! A single-step gate consulted before every instruction.
//!
//! The gate is a two-state machine. Where its commands come from and where its
//! text goes is up to a `DebugConsole`, so no terminal is needed to drive it.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::emulator::emulator::Emulator;
use crate::emulator::input::EmulatorInput;
use crate::emulator::output::EmulatorOutput;

pub const HELP: &str = "\
h, help      show this help
r, regs      print registers
d, display   print the display
s, step      execute one instruction (also an empty line)
c, run       run without stopping
q, quit      halt the machine
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugCommand {
    Help,
    Registers,
    Display,
    Step,
    Run,
    Quit,
}

impl FromStr for DebugCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h" | "help" | "?" => Ok(DebugCommand::Help),
            "r" | "regs" | "registers" => Ok(DebugCommand::Registers),
            "d" | "display" => Ok(DebugCommand::Display),
            "" | "s" | "step" => Ok(DebugCommand::Step),
            "c" | "run" | "continue" => Ok(DebugCommand::Run),
            "q" | "quit" => Ok(DebugCommand::Quit),
            other => Err(format!("unknown command {:?}, try \"help\"", other)),
        }
    }
}

/// Where debugger commands come from, and where its text goes.
pub trait DebugConsole {
    /// The next command, or `None` once the source is exhausted.
    fn next_command(&mut self) -> Option<DebugCommand>;
    fn print(&mut self, text: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugMode {
    StepInto,
    Run,
}

/// What the scheduler should do with the instruction it is about to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Execute,
    Quit,
}

pub struct Debugger<C: DebugConsole> {
    mode: DebugMode,
    console: C,
    interrupt: Arc<AtomicBool>,
}

impl<C: DebugConsole> Debugger<C> {
    pub fn new(console: C) -> Debugger<C> {
        Debugger::with_interrupt(console, Arc::new(AtomicBool::new(false)))
    }

    /// Use an interrupt flag created up front, for consoles that need to hold it themselves.
    pub fn with_interrupt(console: C, interrupt: Arc<AtomicBool>) -> Debugger<C> {
        Debugger {
            mode: DebugMode::StepInto,
            console,
            interrupt,
        }
    }

    pub fn mode(&self) -> DebugMode {
        self.mode
    }

    /// Return to stepping before the next instruction.
    pub fn interrupt(&mut self) {
        self.mode = DebugMode::StepInto;
    }

    /// A flag that, when set from anywhere, returns the debugger to stepping before the next instruction.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    /// Block on the console until the next instruction may run, or the machine should quit.
    /// Never blocks in `Run` mode.
    pub fn gate<I: EmulatorInput, O: EmulatorOutput>(&mut self, emulator: &Emulator<I, O>) -> Gate {
        if self.interrupt.swap(false, Ordering::AcqRel) && self.mode == DebugMode::Run {
            log::debug!("Interrupted, back to stepping");
            self.mode = DebugMode::StepInto;
        }
        if self.mode == DebugMode::Run {
            return Gate::Execute;
        }

        loop {
            match self.console.next_command() {
                Some(DebugCommand::Help) => self.console.print(HELP),
                Some(DebugCommand::Registers) => self.console.print(&emulator.dump_registers()),
                Some(DebugCommand::Display) => self.console.print(&emulator.display().to_string()),
                Some(DebugCommand::Step) => return Gate::Execute,
                Some(DebugCommand::Run) => {
                    // Whatever was pending belongs to the stepping that just ended
                    self.interrupt.store(false, Ordering::Release);
                    self.mode = DebugMode::Run;
                    return Gate::Execute;
                }
                Some(DebugCommand::Quit) | None => return Gate::Quit,
            }
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use std::collections::VecDeque;
    use test_case::test_case;

    #[derive(Default)]
    struct Script {
        commands: VecDeque<DebugCommand>,
        printed: Vec<String>,
    }

    impl Script {
        fn new(commands: &[DebugCommand]) -> Script {
            Script {
                commands: commands.iter().copied().collect(),
                printed: Vec::new(),
            }
        }
    }

    impl DebugConsole for Script {
        fn next_command(&mut self) -> Option<DebugCommand> {
            self.commands.pop_front()
        }
        fn print(&mut self, text: &str) {
            self.printed.push(text.to_string());
        }
    }

    #[test_case("h" => Ok(DebugCommand::Help) ; "help")]
    #[test_case(" Regs\n" => Ok(DebugCommand::Registers) ; "registers")]
    #[test_case("d" => Ok(DebugCommand::Display) ; "display")]
    #[test_case("\n" => Ok(DebugCommand::Step) ; "empty line steps")]
    #[test_case("c" => Ok(DebugCommand::Run) ; "run")]
    #[test_case("quit" => Ok(DebugCommand::Quit) ; "quit")]
    fn parses_commands(line: &str) -> Result<DebugCommand, String> {
        line.parse()
    }

    #[test]
    fn rejects_unknown_commands() {
        assert!("jump".parse::<DebugCommand>().is_err());
    }

    #[test]
    fn step_prints_until_step() {
        let emulator = Emulator::new();
        let mut debugger = Debugger::new(Script::new(&[
            DebugCommand::Help,
            DebugCommand::Registers,
            DebugCommand::Display,
            DebugCommand::Step,
        ]));
        assert_eq!(debugger.gate(&emulator), Gate::Execute);
        assert_eq!(debugger.mode(), DebugMode::StepInto);
        let printed = &debugger.console().printed;
        assert_eq!(printed.len(), 3);
        assert_eq!(printed[0], HELP);
        assert!(printed[1].contains("PC=200"));
        assert!(printed[2].starts_with("...."));

        // Script is now empty, which counts as quitting
        assert_eq!(debugger.gate(&emulator), Gate::Quit);
    }

    #[test]
    fn run_never_blocks_until_interrupted() {
        let emulator = Emulator::new();
        let mut debugger = Debugger::new(Script::new(&[DebugCommand::Run]));
        for _ in 0..10 {
            assert_eq!(debugger.gate(&emulator), Gate::Execute);
        }
        assert_eq!(debugger.mode(), DebugMode::Run);

        debugger.interrupt();
        assert_eq!(debugger.gate(&emulator), Gate::Quit);
    }

    #[test]
    fn interrupt_handle_stops_run() {
        let emulator = Emulator::new();
        let mut debugger = Debugger::new(Script::new(&[DebugCommand::Run, DebugCommand::Step]));
        let handle = debugger.interrupt_handle();
        assert_eq!(debugger.gate(&emulator), Gate::Execute);
        assert_eq!(debugger.gate(&emulator), Gate::Execute);
        assert_eq!(debugger.mode(), DebugMode::Run);

        handle.store(true, Ordering::Release);
        assert_eq!(debugger.gate(&emulator), Gate::Execute); // consumed the Step
        assert_eq!(debugger.mode(), DebugMode::StepInto);
        assert!(!handle.load(Ordering::Acquire));
        assert_eq!(debugger.gate(&emulator), Gate::Quit);
    }

    #[test]
    fn stale_interrupt_is_dropped_on_run() {
        let emulator = Emulator::new();
        let mut debugger = Debugger::new(Script::new(&[DebugCommand::Run]));
        debugger.interrupt_handle().store(true, Ordering::Release);
        assert_eq!(debugger.gate(&emulator), Gate::Execute);
        assert_eq!(debugger.gate(&emulator), Gate::Execute);
        assert_eq!(debugger.mode(), DebugMode::Run);
    }
}

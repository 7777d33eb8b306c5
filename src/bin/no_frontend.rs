use std::error::Error;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

use structopt::StructOpt;

use chip8_vm::config::Opt;
use chip8_vm::emulator::debugger::{DebugCommand, DebugConsole, Debugger};
use chip8_vm::emulator::emulator::{Halt, State};
use chip8_vm::emulator::scheduler::Scheduler;
use chip8_vm::emulator::{read_program, Emulator};

/// Reads debugger commands line by line from stdin.
///
/// Lines are read on their own thread, so a line typed while the machine runs
/// sets the interrupt flag and drops the debugger back into stepping.
struct StdinConsole {
    lines: Receiver<String>,
}

impl StdinConsole {
    fn spawn(interrupt: Arc<AtomicBool>) -> StdinConsole {
        let (sender, lines) = mpsc::channel();
        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        log::error!("Failed to read command: {}", e);
                        break;
                    }
                };
                interrupt.store(true, Ordering::Release);
                if sender.send(line).is_err() {
                    break;
                }
            }
        });
        StdinConsole { lines }
    }
}

impl DebugConsole for StdinConsole {
    fn next_command(&mut self) -> Option<DebugCommand> {
        loop {
            print!("> ");
            io::stdout().flush().ok()?;

            // Closed once stdin reaches end of file
            let line = self.lines.recv().ok()?;
            match line.parse() {
                Ok(command) => return Some(command),
                Err(message) => println!("{}", message),
            }
        }
    }

    fn print(&mut self, text: &str) {
        print!("{}", text);
        if !text.ends_with('\n') {
            println!();
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();

    // Get configuration and read input file
    let opt = Opt::from_args();
    let config = opt.config()?;
    log::info!("Executing {:?}", &opt.input);
    let program = read_program(&opt.input)?;
    log::info!(
        "Running headless: volume {}, pixel scale {} and palette {}/{} are not used",
        config.volume,
        config.pixel_scale,
        config.palette.background,
        config.palette.foreground
    );
    if let Some(device) = &config.audio_device {
        log::info!("No audio backend when headless, ignoring device {:?}", device);
    }

    // Load instructions into emulator memory
    let mut emulator = Emulator::new();
    emulator.load(&program)?;

    // Start execution
    let mut scheduler = Scheduler::new(config.ips);
    let state = if config.debug {
        let interrupt = Arc::new(AtomicBool::new(false));
        let mut debugger = Debugger::with_interrupt(StdinConsole::spawn(interrupt.clone()), interrupt);
        println!("Press Enter while running to stop and step again.");
        scheduler.run_with_debugger(&mut emulator, &mut debugger)
    } else {
        scheduler.run(&mut emulator)
    };

    print!("{}", emulator.dump_registers());
    match state {
        State::Halted(Halt::Fault(fault)) => Err(fault.into()),
        _ => Ok(()),
    }
}

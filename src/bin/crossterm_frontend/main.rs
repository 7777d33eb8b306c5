use std::error::Error;

use structopt::StructOpt;

use chip8_vm::config::Opt;
use chip8_vm::emulator::emulator::{Halt, State};
use chip8_vm::emulator::scheduler::Scheduler;
use chip8_vm::emulator::{read_program, Emulator};

mod crossterm_io;
mod key_buffer;
mod key_manager;
use crossterm_io::{CrosstermInput, CrosstermOutput};
use key_manager::KeyManager;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    // Get configuration and read input file
    let opt = Opt::from_args();
    let config = opt.config()?;
    log::info!("Executing {:?}", &opt.input);
    let program = read_program(&opt.input)?;

    if config.debug {
        log::warn!("The step debugger needs a line-based terminal, use no_frontend --debug instead");
    }
    if let Some(device) = &config.audio_device {
        log::info!("No audio backend in this frontend, ignoring device {:?}", device);
    }
    log::info!(
        "Volume {} unused without audio, pixel scale {} unused in a terminal (one cell per pixel)",
        config.volume,
        config.pixel_scale
    );

    let key_manager = KeyManager::new();

    // Load instructions into emulator memory
    let mut emulator = Emulator::with_io(CrosstermInput::new(&key_manager), CrosstermOutput::new(config.palette)?);
    emulator.load(&program)?;

    // Start execution
    let state = Scheduler::new(config.ips).run(&mut emulator);
    let dump = emulator.dump_registers();

    // Leave the alternate screen before reporting
    drop(emulator);

    match state {
        State::Halted(Halt::Fault(fault)) => {
            eprintln!("{}", dump);
            Err(fault.into())
        }
        _ => Ok(()),
    }
}

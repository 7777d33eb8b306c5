/*!

A CHIP-8 interpreter core as specified at https://en.wikipedia.org/wiki/CHIP-8.

# Crossterm Frontend

If you want to try the interpreter on some programs, there is a ready-to-use implementation
you can run by using `cargo run --release --bin crossterm_frontend -- <program>`.
The keypad sits on the left of the keyboard: 1234, qwer, asdf and zxcv. Esc quits.

There is also a headless runner, `cargo run --bin no_frontend -- --debug <program>`,
which drops into a line-based step debugger when `--debug` is given.

# Library

If you are not interested in handling input (key presses and such),
then you can use `Emulator::new()` to get an emulator to work with.

The main way of running a program is to load instructions as bytes.

```rust
use chip8_vm::emulator::Emulator;

let mut emulator = Emulator::new();

// Load a program at address 0x200.
let clear_display = [0x00, 0xE0];
emulator.load(&clear_display).unwrap();
emulator.step().unwrap(); // Clears the display
assert_eq!(emulator.program_counter(), 0x202);
```

Alternatively, you can experiment by executing instructions manually.

```rust
use chip8_vm::emulator::Emulator;
use chip8_vm::emulator::instruction::{Instruction, Reg, Const, Addr};

let mut emulator = Emulator::new();

// Execute instructions manually
emulator.execute_single(Instruction::ClearScreen).unwrap();

// Or many sequentially
emulator.execute_many(&[
    Instruction::Goto(Addr(0x250)),
    Instruction::SetRegToConst(Reg(0xA), Const(35)),
    Instruction::SetRegToReg(Reg(0xB), Reg(0xA))
]).unwrap();
assert_eq!(emulator.registers()[0xB], 35);
```

## Running in real time

A `Scheduler` paces execution at a number of instructions per second and counts the
timers down at 60 Hz. It returns once the machine halts, either on a fault or on request.

```rust
use chip8_vm::emulator::Emulator;
use chip8_vm::emulator::emulator::{Halt, State};
use chip8_vm::emulator::error::{BoundsError, Fault};
use chip8_vm::emulator::scheduler::{ManualClock, Scheduler};

let mut emulator = Emulator::new();
emulator.load(&[0x00, 0xEE]).unwrap(); // Return with nothing on the stack

let mut scheduler = Scheduler::with_clock(600, ManualClock::new());
let state = scheduler.run(&mut emulator);
assert_eq!(
    state,
    State::Halted(Halt::Fault(Fault::Bounds(BoundsError::StackUnderflow { pc: 0x200 })))
);
```

## Custom input and output

To get keypresses, you must implement `EmulatorInput` and `EmulatorOutput`,
which represent somewhere to get keyboard input from and a screen respectively.
Input is polled for events, and a frame is presented whenever the display changed.
Take a look at `src/emulator/input.rs` and `src/emulator/output.rs` to see how to implement this, then do the following.

```ignore
use chip8_vm::emulator::Emulator;

let mut emulator = Emulator::with_io(MyInput::new(), MyOutput::new());
```

You can then implement the emulator using your own custom frontend, as done with crossterm in crossterm_frontend.
*/

pub mod config;
pub mod emulator;

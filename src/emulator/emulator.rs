//! The CHIP-8 virtual machine as described at https://en.wikipedia.org/wiki/CHIP-8#Virtual_machine_description.

use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::emulator::display::Display;
use crate::emulator::error::{BoundsError, DecodeError, Fault, LoadError};
use crate::emulator::input::{DummyInput, EmulatorInput, InputEvent};
use crate::emulator::instruction::*;
use crate::emulator::keypad::{Keypad, WaitState};
use crate::emulator::output::{DummyOutput, EmulatorOutput};
use crate::emulator::timer::{SoundTimer, Timers};

pub const MEM_SIZE: usize = 4096;
pub const NUM_REGISTERS: usize = 16;
pub const STACK_SIZE: usize = 16;
pub const PC_START: u16 = 0x200;
pub const MAX_PROGRAM_SIZE: usize = MEM_SIZE - PC_START as usize;
pub const FONT_ADDR: u16 = 0;
const FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Why the machine stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    Fault(Fault),
    /// Quit event, debugger quit or the external halt flag.
    Requested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Running,
    Halted(Halt),
}

pub struct Emulator<I: EmulatorInput, O: EmulatorOutput> {
    // Standard fields
    memory: [u8; MEM_SIZE],
    registers: [u8; NUM_REGISTERS],
    i: u16,
    program_counter: u16,
    stack_pointer: usize,
    stack: [u16; STACK_SIZE],
    timers: Timers,
    display: Display,
    keypad: Keypad,

    rng: StdRng,
    state: State,
    halt_flag: Arc<AtomicBool>,

    input: I,
    output: O,
}

impl<I: EmulatorInput, O: EmulatorOutput> Emulator<I, O> {
    /// Create a new emulator with input and output
    pub fn with_io(input: I, output: O) -> Emulator<I, O> {
        Self::with_rng(input, output, StdRng::from_entropy())
    }

    /// Create an emulator whose `CXKK` results are reproducible.
    pub fn with_seed(input: I, output: O, seed: u64) -> Emulator<I, O> {
        Self::with_rng(input, output, StdRng::seed_from_u64(seed))
    }

    fn with_rng(input: I, output: O, rng: StdRng) -> Emulator<I, O> {
        let mut memory = [0; MEM_SIZE];

        // Load font
        let font_start = FONT_ADDR as usize;
        memory[font_start..font_start + FONT.len()].copy_from_slice(&FONT);

        Emulator {
            memory,
            registers: [0; NUM_REGISTERS],
            i: 0,
            program_counter: PC_START,
            stack_pointer: 0,
            stack: [0; STACK_SIZE],
            timers: Timers::new(),
            display: Display::new(),
            keypad: Keypad::new(),

            rng,
            state: State::Running,
            halt_flag: Arc::new(AtomicBool::new(false)),

            input,
            output,
        }
    }

    /// Put every register, the stack, timers, display and keypad back to their power-on state.
    /// Memory keeps the font and whatever program was loaded.
    pub fn reset(&mut self) {
        self.registers = [0; NUM_REGISTERS];
        self.i = 0;
        self.program_counter = PC_START;
        self.stack_pointer = 0;
        self.stack = [0; STACK_SIZE];
        self.timers.reset();
        self.display.clear();
        self.keypad.reset();
        self.state = State::Running;
        self.halt_flag.store(false, Ordering::Release);
    }

    /// Copy a program into memory at 0x200 and reset the machine.
    pub fn load(&mut self, program: &[u8]) -> Result<(), LoadError> {
        if program.is_empty() {
            return Err(LoadError::Empty);
        }
        if program.len() > MAX_PROGRAM_SIZE {
            return Err(LoadError::TooLarge {
                size: program.len(),
                max: MAX_PROGRAM_SIZE,
            });
        }

        let start = PC_START as usize;
        for byte in self.memory[start..].iter_mut() {
            *byte = 0;
        }
        self.memory[start..start + program.len()].copy_from_slice(program);
        self.reset();
        log::info!("Loaded program ({} bytes)", program.len());
        Ok(())
    }

    /// Fetch, decode and execute one instruction.
    ///
    /// Does nothing while halted or while an `FX0A` waits for a key.
    /// A returned fault has already moved the machine to its halted state.
    pub fn step(&mut self) -> Result<(), Fault> {
        if self.is_halted() || self.keypad.is_waiting() {
            return Ok(());
        }
        if self.halt_flag.load(Ordering::Acquire) {
            self.halt(Halt::Requested);
            return Ok(());
        }

        let result = self.fetch().and_then(|(addr, instruction)| {
            log::trace!("{:#05x}: {}", addr, instruction);
            self.execute_single(instruction)
        });
        if let Err(fault) = &result {
            self.halt(Halt::Fault(fault.clone()));
        }
        result
    }

    fn fetch(&mut self) -> Result<(u16, Instruction), Fault> {
        let addr = self.program_counter;
        self.check_program_counter()?;

        // Each opcode is two bytes
        let left = self.memory[addr as usize];
        let right = self.memory[addr as usize + 1];
        let opcode = Opcode::from_two_u8(left, right);
        self.program_counter += 2;

        let instruction = Instruction::decode(opcode)
            .ok_or(DecodeError::UnhandledOpcode { opcode, addr })?;
        Ok((addr, instruction))
    }

    /// Execute a single instruction
    pub fn execute_single(&mut self, instruction: Instruction) -> Result<(), Fault> {
        match instruction {
            // Clear the screen
            Instruction::ClearScreen => self.display.clear(),

            // Return to the previous call site via the stack.
            Instruction::Return => {
                if self.stack_pointer == 0 {
                    return Err(BoundsError::StackUnderflow { pc: self.current_addr() }.into());
                }
                self.stack_pointer -= 1;
                self.program_counter = self.stack[self.stack_pointer]; // Jump back via stack
            }

            // Legacy machine code routine, skipped
            Instruction::MachineCall(Addr(addr)) => {
                log::warn!("Ignoring machine code call to {:#05x}", addr);
            }

            // Go to a specific memory address
            Instruction::Goto(Addr(addr)) => {
                self.program_counter = addr;
            }

            // Store the current address on the stack, then jump to the specified address
            Instruction::Call(Addr(addr)) => {
                if self.stack_pointer == STACK_SIZE {
                    return Err(BoundsError::StackOverflow { pc: self.current_addr() }.into());
                }
                self.stack[self.stack_pointer] = self.program_counter; // Store current address
                self.stack_pointer += 1;
                self.program_counter = addr; // Jump to addr
            }

            // If the register equals the constant, skip the next instruction
            Instruction::IfRegEqConst(x, Const(n)) => self.skip_if(self.reg(x) == n),

            Instruction::IfRegNeqConst(x, Const(n)) => self.skip_if(self.reg(x) != n),

            Instruction::IfRegEqReg(x, y) => self.skip_if(self.reg(x) == self.reg(y)),

            Instruction::SetRegToConst(x, Const(n)) => self.set_reg(x, n),

            // Wraps without touching VF
            Instruction::IncRegByConst(x, Const(n)) => self.set_reg(x, self.reg(x).wrapping_add(n)),

            Instruction::SetRegToReg(x, y) => self.set_reg(x, self.reg(y)),

            Instruction::BitwiseOr(x, y) => self.set_reg(x, self.reg(x) | self.reg(y)),

            Instruction::BitwiseAnd(x, y) => self.set_reg(x, self.reg(x) & self.reg(y)),

            Instruction::BitwiseXor(x, y) => self.set_reg(x, self.reg(x) ^ self.reg(y)),

            // VF is 1 on carry. The flag is written before Vx, so the result wins when x is F.
            Instruction::IncRegByReg(x, y) => {
                let (sum, carry) = self.reg(x).overflowing_add(self.reg(y));
                self.registers[0xF] = carry as u8;
                self.set_reg(x, sum);
            }

            // VF is 0 on borrow, 1 otherwise
            Instruction::DecRegByReg(x, y) => {
                let (difference, borrow) = self.reg(x).overflowing_sub(self.reg(y));
                self.registers[0xF] = !borrow as u8;
                self.set_reg(x, difference);
            }

            // Shifts take Vy as the source, the older convention
            Instruction::BitshiftRight(x, y) => {
                let source = self.reg(y);
                self.registers[0xF] = source & 0x1;
                self.set_reg(x, source >> 1);
            }

            Instruction::SetVxVyMinusVx(x, y) => {
                let (difference, borrow) = self.reg(y).overflowing_sub(self.reg(x));
                self.registers[0xF] = !borrow as u8;
                self.set_reg(x, difference);
            }

            Instruction::BitshiftLeft(x, y) => {
                let source = self.reg(y);
                self.registers[0xF] = source >> 7;
                self.set_reg(x, source << 1);
            }

            Instruction::IfRegNeqReg(x, y) => self.skip_if(self.reg(x) != self.reg(y)),

            Instruction::SetI(Addr(addr)) => {
                self.i = addr;
            }

            Instruction::SetPcToV0PlusAddr(Addr(addr)) => {
                self.program_counter = self.registers[0] as u16 + addr;
            }

            Instruction::SetVxRand(x, Const(n)) => {
                let value = self.rng.gen::<u8>() & n;
                self.set_reg(x, value);
            }

            Instruction::Draw(x, y, Const(sprite_height)) => {
                let rows = sprite_height as usize;
                let start = self.checked_range(rows)?;
                let mut sprite = [0u8; 15];
                for (row, byte) in sprite[..rows].iter_mut().enumerate() {
                    *byte = self.memory[(start + row) % MEM_SIZE];
                }
                let (px, py) = (self.reg(x), self.reg(y));
                let collision = self.display.draw_sprite(px, py, &sprite[..rows]);

                // Set VF collision flag
                self.registers[0xF] = collision as u8;
            }

            Instruction::IfKeyEqVx(x) => self.skip_if(self.keypad.is_pressed(self.reg(x))),

            Instruction::IfKeyNeqVx(x) => self.skip_if(!self.keypad.is_pressed(self.reg(x))),

            Instruction::SetRegToDelayTimer(x) => self.set_reg(x, self.timers.delay()),

            // Get a key press. The machine stops fetching until the keypad delivers one.
            Instruction::SetRegToGetKey(Reg(x)) => self.keypad.wait_for_key(x),

            Instruction::SetDelayTimerToReg(x) => self.timers.set_delay(self.reg(x)),

            Instruction::SetSoundTimerToReg(x) => self.timers.set_sound(self.reg(x)),

            Instruction::AddRegToI(x) => {
                self.i = self.i.wrapping_add(self.reg(x) as u16);
            }

            // Set i to character address. Each font element is 5 bytes wide.
            Instruction::SetIToSpriteAddrVx(x) => {
                self.i = FONT_ADDR + 5 * (self.reg(x) & 0xF) as u16;
            }

            Instruction::SetIToBcdOfReg(x) => {
                let i = self.checked_range(3)?;
                let value = self.reg(x);
                self.memory[i] = value / 100;
                self.memory[i + 1] = (value / 10) % 10;
                self.memory[i + 2] = value % 10;
            }

            // Dump register values up to Vx
            Instruction::RegDump(Reg(x)) => {
                let count = x as usize + 1;
                let i = self.checked_range(count)?;
                self.memory[i..i + count].copy_from_slice(&self.registers[..count]);
                self.i += count as u16;
            }

            // Load register values up to Vx
            Instruction::RegLoad(Reg(x)) => {
                let count = x as usize + 1;
                let i = self.checked_range(count)?;
                self.registers[..count].copy_from_slice(&self.memory[i..i + count]);
                self.i += count as u16;
            }
        };

        self.check_program_counter()
    }

    /// Execute instructions in order, stopping at the first fault.
    pub fn execute_many(&mut self, instructions: &[Instruction]) -> Result<(), Fault> {
        for instruction in instructions {
            self.execute_single(*instruction)?;
        }
        Ok(())
    }

    fn reg(&self, Reg(x): Reg) -> u8 {
        self.registers[x as usize & 0xF]
    }

    fn set_reg(&mut self, Reg(x): Reg, value: u8) {
        self.registers[x as usize & 0xF] = value;
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.program_counter += 2;
        }
    }

    /// Address of the instruction being executed.
    fn current_addr(&self) -> u16 {
        self.program_counter.wrapping_sub(2)
    }

    fn check_program_counter(&self) -> Result<(), Fault> {
        let pc = self.program_counter;
        if pc < PC_START || pc as usize + 1 >= MEM_SIZE {
            return Err(BoundsError::ProgramCounter { pc }.into());
        }
        Ok(())
    }

    /// Start of `len` bytes at I, if they all lie inside memory.
    fn checked_range(&self, len: usize) -> Result<usize, Fault> {
        let start = self.i as usize;
        let end = start + len.max(1) - 1;
        if end >= MEM_SIZE {
            return Err(BoundsError::Memory {
                start,
                end,
                pc: self.current_addr(),
            }
            .into());
        }
        Ok(start)
    }

    pub(crate) fn halt(&mut self, reason: Halt) {
        match &reason {
            Halt::Fault(fault) => log::error!("Halting: {}", fault),
            Halt::Requested => log::info!("Halt requested"),
        }
        self.state = State::Halted(reason);
    }

    /// Stop before the next instruction is fetched.
    pub fn request_halt(&mut self) {
        if !self.is_halted() {
            self.halt(Halt::Requested);
        }
    }

    /// Apply one input event. A key press while an `FX0A` waits writes the key into its register.
    pub fn handle_event(&mut self, event: InputEvent) {
        match event {
            InputEvent::KeyDown(key) => {
                if let Some(register) = self.keypad.press(key) {
                    self.registers[register as usize] = key & 0xF;
                }
            }
            InputEvent::KeyUp(key) => self.keypad.release(key),
            InputEvent::Quit => self.request_halt(),
        }
    }

    /// Drain all pending events from the input device.
    pub fn poll_input(&mut self) {
        while let Some(event) = self.input.poll() {
            self.handle_event(event);
        }
    }

    /// Account for elapsed 60 Hz frames: count the timers down and present the display if it changed.
    pub(crate) fn advance_frames(&mut self, frames: u64) {
        self.timers.count_down(frames);
        if self.display.take_changed() {
            self.output.present(&self.display);
        }
    }

    /// True once the machine has reached its terminal state.
    pub fn is_halted(&self) -> bool {
        match self.state {
            State::Halted(_) => true,
            State::Running => false,
        }
    }

    pub fn halt_requested(&self) -> bool {
        self.halt_flag.load(Ordering::Acquire)
    }

    /// A flag that, when set from anywhere, halts the machine before its next instruction.
    pub fn halt_handle(&self) -> Arc<AtomicBool> {
        self.halt_flag.clone()
    }

    pub fn sound_timer_handle(&self) -> SoundTimer {
        self.timers.sound_handle()
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn is_waiting_for_key(&self) -> bool {
        self.keypad.is_waiting()
    }

    pub fn registers(&self) -> &[u8; NUM_REGISTERS] {
        &self.registers
    }

    pub fn i(&self) -> u16 {
        self.i
    }

    pub fn program_counter(&self) -> u16 {
        self.program_counter
    }

    /// The active part of the call stack, oldest return address first.
    pub fn stack(&self) -> &[u16] {
        &self.stack[..self.stack_pointer]
    }

    pub fn delay_timer(&self) -> u8 {
        self.timers.delay()
    }

    pub fn sound_timer(&self) -> u8 {
        self.timers.sound()
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn keypad(&self) -> &Keypad {
        &self.keypad
    }

    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    /// Registers, stack, timers and keypad as text, for diagnostics.
    pub fn dump_registers(&self) -> String {
        let mut out = String::new();
        for (n, value) in self.registers.iter().enumerate() {
            let _ = write!(out, "V{:X}={:02X}", n, value);
            out.push(if n % 8 == 7 { '\n' } else { ' ' });
        }
        let _ = writeln!(
            out,
            "I={:03X} PC={:03X} SP={} DT={:02X} ST={:02X}",
            self.i,
            self.program_counter,
            self.stack_pointer,
            self.timers.delay(),
            self.timers.sound()
        );
        let stack: Vec<String> = self.stack().iter().map(|a| format!("{:03X}", a)).collect();
        let _ = writeln!(out, "stack=[{}]", stack.join(" "));
        let wait = match self.keypad.wait_state() {
            WaitState::Idle => String::from("idle"),
            WaitState::WaitingForKey(x) => format!("V{:X}", x),
        };
        let _ = writeln!(out, "keys={:016b} wait={}", self.keypad.pressed_mask(), wait);
        if let State::Halted(reason) = &self.state {
            let _ = writeln!(out, "halted: {:?}", reason);
        }
        out
    }
}

impl Emulator<DummyInput, DummyOutput> {
    /// Create a new emulator with dummy input and output
    pub fn new() -> Emulator<DummyInput, DummyOutput> {
        Emulator::with_io(DummyInput, DummyOutput::new())
    }
}

impl Default for Emulator<DummyInput, DummyOutput> {
    fn default() -> Self {
        Self::new()
    }
}

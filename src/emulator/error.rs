//! Everything that can stop a program from loading or keep it from running.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::emulator::instruction::Opcode;

/// A program could not be placed in memory. The machine is never started.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("missing or unreadable program {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("program is empty")]
    Empty,

    #[error("program size of {size} bytes exceeds maximum size of {max} bytes")]
    TooLarge { size: usize, max: usize },
}

/// The fetched word is not part of the instruction set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unhandled opcode {opcode} at {addr:#05x}")]
    UnhandledOpcode { opcode: Opcode, addr: u16 },
}

/// An access left the memory, stack or program space.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundsError {
    #[error("return with empty stack at {pc:#05x}")]
    StackUnderflow { pc: u16 },

    #[error("call depth exceeds 16 at {pc:#05x}")]
    StackOverflow { pc: u16 },

    #[error("program counter {pc:#05x} outside program space")]
    ProgramCounter { pc: u16 },

    #[error("memory access {start:#05x}..={end:#05x} outside memory at {pc:#05x}")]
    Memory { start: usize, end: usize, pc: u16 },
}

/// A fatal condition raised while executing. Puts the machine in its halted state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Bounds(#[from] BoundsError),
}

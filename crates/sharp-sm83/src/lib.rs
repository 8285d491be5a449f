//! Sharp SM83 CPU emulator (the Game Boy's Z80-like core).
//!
//! Each call to `step()` executes one whole instruction and reports its
//! cost in T-cycles (4 per machine cycle).

mod alu;
mod cpu;
mod flags;
mod registers;

pub use cpu::{Fault, Sm83, interrupt};
pub use flags::{CF, HF, NF, ZF};
pub use registers::Registers;

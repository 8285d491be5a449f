//! CPU core trait.

use crate::Bus;

/// A CPU core stepped one instruction at a time.
///
/// CPUs execute instructions and access memory through a bus they do not
/// own, so the bus can be shared with the video and timer hardware that
/// the machine advances between steps.
///
/// CPUs expose their internal state for observation and debugging.
pub trait Cpu {
    /// The type used for register inspection.
    type Registers;

    /// Error raised when an instruction cannot be executed.
    type Fault;

    /// Execute one instruction (or service one interrupt, or idle while
    /// halted) and return the number of master clock ticks it took.
    ///
    /// On error the CPU state is left as it was at the faulting fetch so
    /// it can be inspected.
    fn step<B: Bus>(&mut self, bus: &mut B) -> Result<u32, Self::Fault>;

    /// Returns the current program counter.
    fn pc(&self) -> u16;

    /// Returns a snapshot of all registers for inspection.
    fn registers(&self) -> Self::Registers;

    /// Returns true if the CPU is halted waiting for an interrupt.
    fn is_halted(&self) -> bool;

    /// Reset the CPU to its power-on state.
    fn reset(&mut self);
}

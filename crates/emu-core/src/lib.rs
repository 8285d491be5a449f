//! Core traits and types for cycle-counted emulation.
//!
//! Everything is measured in master clock ticks. The CPU reports how many
//! ticks each instruction took and the rest of the machine catches up by
//! exactly that amount.

mod bus;
mod clock;
mod cpu;
mod observable;
mod tickable;
mod ticks;

pub use bus::{Bus, SimpleBus};
pub use clock::MasterClock;
pub use cpu::Cpu;
pub use observable::{Observable, Value, parse_address};
pub use tickable::Tickable;
pub use ticks::Ticks;

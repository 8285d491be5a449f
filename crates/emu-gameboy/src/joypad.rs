//! Joypad register and the cross-thread input latch.
//!
//! The DMG reads its eight buttons through $FF00 as two groups of four.
//! Writing P14 (bit 4) low selects the direction keys and P15 (bit 5) low
//! selects the action keys; the low nibble then reads the selected keys,
//! active-low.
//!
//! The button state itself lives in an [`InputLatch`] that an input thread
//! can replace at any time without waiting for the emulation thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use bitflags::bitflags;

use crate::error::InputError;

bitflags! {
    /// Pressed buttons. The low nibble is the direction group and the high
    /// nibble the action group, each in $FF00 bit order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Buttons: u8 {
        const RIGHT = 0x01;
        const LEFT = 0x02;
        const UP = 0x04;
        const DOWN = 0x08;
        const A = 0x10;
        const B = 0x20;
        const SELECT = 0x40;
        const START = 0x80;
    }
}

/// Order of the per-button flags in the 8-byte wire form.
const WIRE_ORDER: [Buttons; 8] = [
    Buttons::UP,
    Buttons::DOWN,
    Buttons::LEFT,
    Buttons::RIGHT,
    Buttons::A,
    Buttons::B,
    Buttons::START,
    Buttons::SELECT,
];

impl Buttons {
    /// Decode button state sent across the host boundary.
    ///
    /// One byte is the packed bitset. Eight bytes are one flag per button
    /// in the order Up, Down, Left, Right, A, B, Start, Select, where any
    /// non-zero byte means pressed.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, InputError> {
        match bytes {
            [packed] => Ok(Self::from_bits_retain(*packed)),
            flags if flags.len() == WIRE_ORDER.len() => Ok(flags
                .iter()
                .zip(WIRE_ORDER)
                .filter(|(flag, _)| **flag != 0)
                .fold(Self::empty(), |acc, (_, button)| acc | button)),
            other => Err(InputError::Malformed { len: other.len() }),
        }
    }
}

/// Latest committed button state, shared between threads.
///
/// Every update replaces the whole set in one atomic operation, so a reader
/// never sees half of an update.
#[derive(Debug, Default)]
pub struct InputLatch {
    state: AtomicU8,
}

impl InputLatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the button state, returning the previous one.
    pub fn set(&self, buttons: Buttons) -> Buttons {
        Buttons::from_bits_retain(self.state.swap(buttons.bits(), Ordering::AcqRel))
    }

    #[must_use]
    pub fn get(&self) -> Buttons {
        Buttons::from_bits_retain(self.state.load(Ordering::Acquire))
    }

    /// Add buttons to the current state.
    pub fn press(&self, buttons: Buttons) {
        self.state.fetch_or(buttons.bits(), Ordering::AcqRel);
    }

    /// Remove buttons from the current state.
    pub fn release(&self, buttons: Buttons) {
        self.state.fetch_and(!buttons.bits(), Ordering::AcqRel);
    }
}

/// $FF00 (P1/JOYP).
pub struct Joypad {
    /// Select lines, bits 4-5 as last written.
    select: u8,
    latch: Arc<InputLatch>,
    /// Buttons seen at the previous frame-start sample.
    sampled: Buttons,
}

impl Joypad {
    #[must_use]
    pub fn new(latch: Arc<InputLatch>) -> Self {
        Self {
            select: 0x30,
            latch,
            sampled: Buttons::empty(),
        }
    }

    /// Read $FF00. Unused bits 6-7 read as 1.
    #[must_use]
    pub fn read(&self) -> u8 {
        let pressed = self.latch.get().bits();
        let mut low = 0;
        if self.select & 0x10 == 0 {
            low |= pressed & 0x0F;
        }
        if self.select & 0x20 == 0 {
            low |= pressed >> 4;
        }
        0xC0 | self.select | (!low & 0x0F)
    }

    /// Write $FF00. Only the select lines are writable.
    pub fn write(&mut self, value: u8) {
        self.select = value & 0x30;
    }

    /// Take a frame-start sample of the latch. Returns true when any button
    /// went from released to pressed since the previous sample.
    pub fn sample(&mut self) -> bool {
        let now = self.latch.get();
        let newly_pressed = now & !self.sampled;
        self.sampled = now;
        !newly_pressed.is_empty()
    }

    #[must_use]
    pub fn latch(&self) -> &Arc<InputLatch> {
        &self.latch
    }
}

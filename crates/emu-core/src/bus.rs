//! Memory bus interface.

/// Memory bus interface.
///
/// The CPU accesses memory and memory-mapped peripherals through this
/// trait. The bus handles address decoding and routing to the appropriate
/// device. Every address must decode to something: unmapped locations
/// return a fixed open-bus value rather than panicking.
pub trait Bus {
    /// Read a byte from the given address.
    ///
    /// Takes `&mut self` because reads of some I/O registers have side
    /// effects (latches, acknowledge bits).
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte to the given address.
    fn write(&mut self, address: u16, value: u8);
}

/// Flat 64 KiB RAM bus.
///
/// Every address is plain read/write memory. Used by CPU tests that need a
/// bus without any machine attached.
#[derive(Clone)]
pub struct SimpleBus {
    ram: Box<[u8; 0x10000]>,
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: Box::new([0; 0x10000]),
        }
    }

    /// Copy `data` into memory starting at `address`, wrapping at $FFFF.
    pub fn load(&mut self, address: u16, data: &[u8]) {
        let mut addr = address;
        for &byte in data {
            self.ram[addr as usize] = byte;
            addr = addr.wrapping_add(1);
        }
    }

    /// Read a byte without going through the `Bus` trait.
    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        self.ram[address as usize]
    }

    /// Full memory contents, for snapshot comparisons.
    #[must_use]
    pub fn memory(&self) -> &[u8] {
        &self.ram[..]
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, address: u16) -> u8 {
        self.ram[address as usize]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.ram[address as usize] = value;
    }
}

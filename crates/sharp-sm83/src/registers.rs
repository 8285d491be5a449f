//! SM83 register set.

use crate::flags::{CF, FLAG_MASK, HF, NF, ZF};

/// SM83 registers snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,

    pub sp: u16,
    pub pc: u16,

    /// Interrupt master enable.
    pub ime: bool,
    /// Set by HALT until an enabled interrupt becomes pending.
    pub halted: bool,
}

impl Registers {
    /// Register state left by the DMG boot ROM when it jumps to $0100.
    #[must_use]
    pub const fn post_boot() -> Self {
        Self {
            a: 0x01,
            f: 0xB0,
            b: 0x00,
            c: 0x13,
            d: 0x00,
            e: 0xD8,
            h: 0x01,
            l: 0x4D,
            sp: 0xFFFE,
            pc: 0x0100,
            ime: false,
            halted: false,
        }
    }

    #[must_use]
    pub const fn af(&self) -> u16 {
        (self.a as u16) << 8 | self.f as u16
    }

    #[must_use]
    pub const fn bc(&self) -> u16 {
        (self.b as u16) << 8 | self.c as u16
    }

    #[must_use]
    pub const fn de(&self) -> u16 {
        (self.d as u16) << 8 | self.e as u16
    }

    #[must_use]
    pub const fn hl(&self) -> u16 {
        (self.h as u16) << 8 | self.l as u16
    }

    /// Set AF. The low nibble of F does not exist and is dropped.
    pub fn set_af(&mut self, value: u16) {
        self.a = (value >> 8) as u8;
        self.f = value as u8 & FLAG_MASK;
    }

    pub fn set_bc(&mut self, value: u16) {
        self.b = (value >> 8) as u8;
        self.c = value as u8;
    }

    pub fn set_de(&mut self, value: u16) {
        self.d = (value >> 8) as u8;
        self.e = value as u8;
    }

    pub fn set_hl(&mut self, value: u16) {
        self.h = (value >> 8) as u8;
        self.l = value as u8;
    }

    #[must_use]
    pub const fn zero(&self) -> bool {
        self.f & ZF != 0
    }

    #[must_use]
    pub const fn subtract(&self) -> bool {
        self.f & NF != 0
    }

    #[must_use]
    pub const fn half_carry(&self) -> bool {
        self.f & HF != 0
    }

    #[must_use]
    pub const fn carry(&self) -> bool {
        self.f & CF != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn af_drops_low_nibble() {
        let mut regs = Registers::default();
        regs.set_af(0x12FF);
        assert_eq!(regs.af(), 0x12F0);
    }

    #[test]
    fn post_boot_pairs() {
        let regs = Registers::post_boot();
        assert_eq!(regs.af(), 0x01B0);
        assert_eq!(regs.bc(), 0x0013);
        assert_eq!(regs.de(), 0x00D8);
        assert_eq!(regs.hl(), 0x014D);
        assert!(regs.zero() && regs.half_carry() && regs.carry());
        assert!(!regs.subtract());
    }
}

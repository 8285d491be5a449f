//! CB-prefixed instructions: rotates, shifts, SWAP and bit operations.

use emu_core::Bus;

use crate::alu;
use crate::flags::{CF, HF, z};

use super::Sm83;

impl Sm83 {
    /// Execute the opcode following a $CB prefix. Costs include the prefix.
    pub(super) fn execute_cb<B: Bus>(&mut self, bus: &mut B, op: u8) -> u32 {
        let target = op & 7;
        let bit = (op >> 3) & 7;
        let value = self.read_r8(bus, target);
        let memory = target == 6;

        match op >> 6 {
            // Rotate / shift / swap
            0 => {
                let result = alu::rotate(bit, value, self.regs.carry());
                self.write_r8(bus, target, result.value);
                self.regs.f = result.flags;
            }

            // BIT b, r
            1 => {
                self.regs.f = z(value & (1 << bit)) | HF | (self.regs.f & CF);
                return if memory { 12 } else { 8 };
            }

            // RES b, r
            2 => self.write_r8(bus, target, value & !(1 << bit)),

            // SET b, r
            _ => self.write_r8(bus, target, value | (1 << bit)),
        }

        if memory { 16 } else { 8 }
    }
}

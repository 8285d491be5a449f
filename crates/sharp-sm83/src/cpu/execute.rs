//! Unprefixed instruction execution for the SM83.

use emu_core::Bus;

use crate::alu;
use crate::flags::{CF, HF, NF, ZF};

use super::Sm83;

impl Sm83 {
    /// Execute one unprefixed opcode and return its T-cycle cost.
    ///
    /// Returns `None` for the opcodes the SM83 does not implement.
    pub(super) fn execute<B: Bus>(&mut self, bus: &mut B, op: u8) -> Option<u32> {
        let cycles = match op {
            // NOP
            0x00 => 4,

            // STOP (two bytes; the second is ignored)
            0x10 => {
                self.fetch8(bus);
                self.stopped = true;
                4
            }

            // LD rr, nn
            0x01 | 0x11 | 0x21 | 0x31 => {
                let value = self.fetch16(bus);
                self.write_rr(op >> 4, value);
                12
            }

            // LD (BC), A / LD (DE), A
            0x02 => {
                bus.write(self.regs.bc(), self.regs.a);
                8
            }
            0x12 => {
                bus.write(self.regs.de(), self.regs.a);
                8
            }

            // LD (HL+), A / LD (HL-), A
            0x22 | 0x32 => {
                let hl = self.regs.hl();
                bus.write(hl, self.regs.a);
                self.step_hl(op, hl);
                8
            }

            // LD A, (BC) / LD A, (DE)
            0x0A => {
                self.regs.a = bus.read(self.regs.bc());
                8
            }
            0x1A => {
                self.regs.a = bus.read(self.regs.de());
                8
            }

            // LD A, (HL+) / LD A, (HL-)
            0x2A | 0x3A => {
                let hl = self.regs.hl();
                self.regs.a = bus.read(hl);
                self.step_hl(op, hl);
                8
            }

            // INC rr / DEC rr
            0x03 | 0x13 | 0x23 | 0x33 => {
                let index = op >> 4;
                self.write_rr(index, self.read_rr(index).wrapping_add(1));
                8
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let index = op >> 4;
                self.write_rr(index, self.read_rr(index).wrapping_sub(1));
                8
            }

            // ADD HL, rr
            0x09 | 0x19 | 0x29 | 0x39 => {
                let (value, flags) = alu::add16(self.regs.hl(), self.read_rr(op >> 4));
                self.regs.set_hl(value);
                self.regs.f = (self.regs.f & ZF) | flags;
                8
            }

            // INC r
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let index = op >> 3;
                let result = alu::inc8(self.read_r8(bus, index));
                self.write_r8(bus, index, result.value);
                self.regs.f = (self.regs.f & CF) | result.flags;
                if index & 7 == 6 { 12 } else { 4 }
            }

            // DEC r
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let index = op >> 3;
                let result = alu::dec8(self.read_r8(bus, index));
                self.write_r8(bus, index, result.value);
                self.regs.f = (self.regs.f & CF) | result.flags;
                if index & 7 == 6 { 12 } else { 4 }
            }

            // LD r, n
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let value = self.fetch8(bus);
                let index = op >> 3;
                self.write_r8(bus, index, value);
                if index & 7 == 6 { 12 } else { 8 }
            }

            // RLCA / RRCA / RLA / RRA
            0x07 | 0x0F | 0x17 | 0x1F => {
                let result = alu::rotate_a(op >> 3, self.regs.a, self.regs.carry());
                self.regs.a = result.value;
                self.regs.f = result.flags;
                4
            }

            // DAA
            0x27 => {
                let result = alu::daa(self.regs.a, self.regs.f);
                self.regs.a = result.value;
                self.regs.f = result.flags;
                4
            }

            // CPL
            0x2F => {
                self.regs.a = !self.regs.a;
                self.regs.f |= NF | HF;
                4
            }

            // SCF / CCF
            0x37 => {
                self.regs.f = (self.regs.f & ZF) | CF;
                4
            }
            0x3F => {
                self.regs.f = (self.regs.f & ZF) | ((self.regs.f & CF) ^ CF);
                4
            }

            // LD (nn), SP
            0x08 => {
                let addr = self.fetch16(bus);
                let [lo, hi] = self.regs.sp.to_le_bytes();
                bus.write(addr, lo);
                bus.write(addr.wrapping_add(1), hi);
                20
            }

            // JR e
            0x18 => {
                let offset = self.fetch8(bus) as i8;
                self.jump_relative(offset);
                12
            }

            // JR cc, e
            0x20 | 0x28 | 0x30 | 0x38 => {
                let offset = self.fetch8(bus) as i8;
                if self.condition(op >> 3) {
                    self.jump_relative(offset);
                    12
                } else {
                    8
                }
            }

            // HALT
            0x76 => {
                if !self.regs.ime && Self::pending(bus) != 0 {
                    self.halt_bug = true;
                } else {
                    self.regs.halted = true;
                }
                4
            }

            // LD r, r'
            0x40..=0x7F => {
                let src = op & 7;
                let dst = op >> 3;
                let value = self.read_r8(bus, src);
                self.write_r8(bus, dst, value);
                if src == 6 || dst & 7 == 6 { 8 } else { 4 }
            }

            // ALU A, r
            0x80..=0xBF => {
                let src = op & 7;
                let value = self.read_r8(bus, src);
                self.alu_a(op >> 3, value);
                if src == 6 { 8 } else { 4 }
            }

            // ALU A, n
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let value = self.fetch8(bus);
                self.alu_a(op >> 3, value);
                8
            }

            // RET cc
            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                if self.condition(op >> 3) {
                    self.regs.pc = self.pop16(bus);
                    20
                } else {
                    8
                }
            }

            // RET / RETI
            0xC9 => {
                self.regs.pc = self.pop16(bus);
                16
            }
            0xD9 => {
                self.regs.pc = self.pop16(bus);
                self.regs.ime = true;
                16
            }

            // POP rr
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let value = self.pop16(bus);
                match (op >> 4) & 3 {
                    0 => self.regs.set_bc(value),
                    1 => self.regs.set_de(value),
                    2 => self.regs.set_hl(value),
                    _ => self.regs.set_af(value),
                }
                12
            }

            // PUSH rr
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                let value = match (op >> 4) & 3 {
                    0 => self.regs.bc(),
                    1 => self.regs.de(),
                    2 => self.regs.hl(),
                    _ => self.regs.af(),
                };
                self.push16(bus, value);
                16
            }

            // JP nn / JP cc, nn / JP HL
            0xC3 => {
                self.regs.pc = self.fetch16(bus);
                16
            }
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                let addr = self.fetch16(bus);
                if self.condition(op >> 3) {
                    self.regs.pc = addr;
                    16
                } else {
                    12
                }
            }
            0xE9 => {
                self.regs.pc = self.regs.hl();
                4
            }

            // CALL nn / CALL cc, nn
            0xCD => {
                let addr = self.fetch16(bus);
                self.push16(bus, self.regs.pc);
                self.regs.pc = addr;
                24
            }
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                let addr = self.fetch16(bus);
                if self.condition(op >> 3) {
                    self.push16(bus, self.regs.pc);
                    self.regs.pc = addr;
                    24
                } else {
                    12
                }
            }

            // RST n
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.push16(bus, self.regs.pc);
                self.regs.pc = u16::from(op & 0x38);
                16
            }

            // CB prefix
            0xCB => {
                let cb = self.fetch8(bus);
                self.execute_cb(bus, cb)
            }

            // LDH (n), A / LDH A, (n)
            0xE0 => {
                let addr = 0xFF00 | u16::from(self.fetch8(bus));
                bus.write(addr, self.regs.a);
                12
            }
            0xF0 => {
                let addr = 0xFF00 | u16::from(self.fetch8(bus));
                self.regs.a = bus.read(addr);
                12
            }

            // LD (C), A / LD A, (C)
            0xE2 => {
                bus.write(0xFF00 | u16::from(self.regs.c), self.regs.a);
                8
            }
            0xF2 => {
                self.regs.a = bus.read(0xFF00 | u16::from(self.regs.c));
                8
            }

            // LD (nn), A / LD A, (nn)
            0xEA => {
                let addr = self.fetch16(bus);
                bus.write(addr, self.regs.a);
                16
            }
            0xFA => {
                let addr = self.fetch16(bus);
                self.regs.a = bus.read(addr);
                16
            }

            // ADD SP, e
            0xE8 => {
                let offset = self.fetch8(bus) as i8;
                let (value, flags) = alu::add_sp(self.regs.sp, offset);
                self.regs.sp = value;
                self.regs.f = flags;
                16
            }

            // LD HL, SP+e
            0xF8 => {
                let offset = self.fetch8(bus) as i8;
                let (value, flags) = alu::add_sp(self.regs.sp, offset);
                self.regs.set_hl(value);
                self.regs.f = flags;
                12
            }

            // LD SP, HL
            0xF9 => {
                self.regs.sp = self.regs.hl();
                8
            }

            // DI / EI
            0xF3 => {
                self.regs.ime = false;
                self.ei_delay = 0;
                4
            }
            0xFB => {
                if !self.regs.ime {
                    self.ei_delay = 2;
                }
                4
            }

            // D3 DB DD E3 E4 EB EC ED F4 FC FD
            _ => return None,
        };

        Some(cycles)
    }

    /// Post-increment or post-decrement HL for the (HL+)/(HL-) loads.
    fn step_hl(&mut self, op: u8, hl: u16) {
        let next = if op & 0x10 == 0 {
            hl.wrapping_add(1)
        } else {
            hl.wrapping_sub(1)
        };
        self.regs.set_hl(next);
    }

    fn jump_relative(&mut self, offset: i8) {
        self.regs.pc = self.regs.pc.wrapping_add(offset as u16);
    }

    /// ADD ADC SUB SBC AND XOR OR CP, selected by bits 5-3.
    fn alu_a(&mut self, op: u8, value: u8) {
        let a = self.regs.a;
        let carry = self.regs.carry();
        let result = match op & 7 {
            0 => alu::add8(a, value, false),
            1 => alu::add8(a, value, carry),
            2 => alu::sub8(a, value, false),
            3 => alu::sub8(a, value, carry),
            4 => alu::and8(a, value),
            5 => alu::xor8(a, value),
            6 => alu::or8(a, value),
            _ => {
                self.regs.f = alu::sub8(a, value, false).flags;
                return;
            }
        };
        self.regs.a = result.value;
        self.regs.f = result.flags;
    }
}

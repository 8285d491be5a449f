//! SM83 CPU core with per-instruction execution.

use emu_core::{Bus, Cpu, Observable, Ticks, Value};
use thiserror::Error;

use crate::flags::{CF, HF, NF, ZF};
use crate::registers::Registers;

mod cb;
mod execute;

/// Interrupt request bits and the registers that hold them.
pub mod interrupt {
    /// Interrupt flag register (IF).
    pub const IF: u16 = 0xFF0F;
    /// Interrupt enable register (IE).
    pub const IE: u16 = 0xFFFF;

    pub const VBLANK: u8 = 0x01;
    pub const STAT: u8 = 0x02;
    pub const TIMER: u8 = 0x04;
    pub const SERIAL: u8 = 0x08;
    pub const JOYPAD: u8 = 0x10;

    /// All five request lines.
    pub const ALL: u8 = 0x1F;
}

/// Cost of dispatching an interrupt: two idle M-cycles, two pushes, jump.
const INTERRUPT_CYCLES: u32 = 20;

/// Cycles burned per step while halted or stopped.
const IDLE_CYCLES: u32 = 4;

/// Execution fault raised by `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fault {
    /// The opcode at `pc` is one of the eleven holes in the SM83 table.
    #[error("illegal instruction ${opcode:02X} at ${pc:04X}")]
    IllegalInstruction { opcode: u8, pc: u16 },
}

/// Sharp SM83 CPU.
///
/// The CPU does not own the bus. The machine passes it to `step()` so the
/// PPU and timer can be advanced by the returned cycle count between
/// instructions.
pub struct Sm83 {
    pub(crate) regs: Registers,
    /// Instructions left before a pending EI takes effect.
    ei_delay: u8,
    /// STOP executed; waiting for a joypad request.
    stopped: bool,
    /// HALT bug armed: the next opcode fetch does not advance PC.
    halt_bug: bool,
    total_ticks: Ticks,
}

impl Sm83 {
    /// Create a CPU with every register cleared and PC at $0000.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registers(Registers::default())
    }

    /// Create a CPU in the state the DMG boot ROM leaves behind.
    #[must_use]
    pub fn post_boot() -> Self {
        Self::with_registers(Registers::post_boot())
    }

    #[must_use]
    pub fn with_registers(regs: Registers) -> Self {
        Self {
            regs,
            ei_delay: 0,
            stopped: false,
            halt_bug: false,
            total_ticks: Ticks::ZERO,
        }
    }

    /// Mutable access to the register file, for loaders and tests.
    pub fn regs_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    /// Total T-cycles elapsed since creation.
    #[must_use]
    pub const fn total_ticks(&self) -> Ticks {
        self.total_ticks
    }

    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Requested and enabled interrupts.
    fn pending<B: Bus>(bus: &mut B) -> u8 {
        bus.read(interrupt::IF) & bus.read(interrupt::IE) & interrupt::ALL
    }

    fn step_inner<B: Bus>(&mut self, bus: &mut B) -> Result<u32, Fault> {
        if self.stopped {
            if bus.read(interrupt::IF) & interrupt::JOYPAD == 0 {
                return Ok(IDLE_CYCLES);
            }
            self.stopped = false;
        }

        let pending = Self::pending(bus);

        if self.regs.halted {
            if pending == 0 {
                return Ok(IDLE_CYCLES);
            }
            self.regs.halted = false;
        }

        if self.regs.ime && pending != 0 {
            return Ok(self.service_interrupt(bus, pending));
        }

        let pc = self.regs.pc;
        let opcode = self.fetch_opcode(bus);
        let cycles = match self.execute(bus, opcode) {
            Some(cycles) => cycles,
            None => {
                self.regs.pc = pc;
                return Err(Fault::IllegalInstruction { opcode, pc });
            }
        };

        if self.ei_delay > 0 {
            self.ei_delay -= 1;
            if self.ei_delay == 0 {
                self.regs.ime = true;
            }
        }

        Ok(cycles)
    }

    /// Push PC and jump to the vector of the highest-priority request.
    fn service_interrupt<B: Bus>(&mut self, bus: &mut B, pending: u8) -> u32 {
        let line = pending.trailing_zeros() as u8;
        let requested = bus.read(interrupt::IF);
        bus.write(interrupt::IF, requested & !(1 << line));

        // EI then HALT with a request pending: the handler returns to the HALT.
        let return_pc = if std::mem::take(&mut self.halt_bug) {
            self.regs.pc.wrapping_sub(1)
        } else {
            self.regs.pc
        };

        self.regs.ime = false;
        self.ei_delay = 0;
        self.push16(bus, return_pc);
        self.regs.pc = 0x0040 + u16::from(line) * 8;
        INTERRUPT_CYCLES
    }

    // === Bus helpers ===

    fn fetch_opcode<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.regs.pc);
        if self.halt_bug {
            self.halt_bug = false;
        } else {
            self.regs.pc = self.regs.pc.wrapping_add(1);
        }
        value
    }

    fn fetch8<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn fetch16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch8(bus);
        let hi = self.fetch8(bus);
        u16::from_le_bytes([lo, hi])
    }

    fn read16<B: Bus>(bus: &mut B, addr: u16) -> u16 {
        let lo = bus.read(addr);
        let hi = bus.read(addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    fn push16<B: Bus>(&mut self, bus: &mut B, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, hi);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, lo);
    }

    fn pop16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let value = Self::read16(bus, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(2);
        value
    }

    // === Operand decoding ===

    /// 8-bit operand by 3-bit index: B C D E H L (HL) A.
    fn read_r8<B: Bus>(&self, bus: &mut B, index: u8) -> u8 {
        match index & 7 {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            6 => bus.read(self.regs.hl()),
            _ => self.regs.a,
        }
    }

    fn write_r8<B: Bus>(&mut self, bus: &mut B, index: u8, value: u8) {
        match index & 7 {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => self.regs.h = value,
            5 => self.regs.l = value,
            6 => bus.write(self.regs.hl(), value),
            _ => self.regs.a = value,
        }
    }

    /// 16-bit operand for LD/INC/DEC/ADD: BC DE HL SP.
    fn read_rr(&self, index: u8) -> u16 {
        match index & 3 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            _ => self.regs.sp,
        }
    }

    fn write_rr(&mut self, index: u8, value: u16) {
        match index & 3 {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.regs.set_hl(value),
            _ => self.regs.sp = value,
        }
    }

    /// Branch condition by 2-bit index: NZ Z NC C.
    fn condition(&self, index: u8) -> bool {
        match index & 3 {
            0 => !self.regs.zero(),
            1 => self.regs.zero(),
            2 => !self.regs.carry(),
            _ => self.regs.carry(),
        }
    }
}

impl Default for Sm83 {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu for Sm83 {
    type Registers = Registers;
    type Fault = Fault;

    fn step<B: Bus>(&mut self, bus: &mut B) -> Result<u32, Fault> {
        let cycles = self.step_inner(bus)?;
        self.total_ticks += Ticks::from(cycles);
        Ok(cycles)
    }

    fn pc(&self) -> u16 {
        self.regs.pc
    }

    fn registers(&self) -> Self::Registers {
        self.regs
    }

    fn is_halted(&self) -> bool {
        self.regs.halted
    }

    /// Return to the post-boot state. The cycle counter keeps running.
    fn reset(&mut self) {
        self.regs = Registers::post_boot();
        self.ei_delay = 0;
        self.stopped = false;
        self.halt_bug = false;
    }
}

impl Observable for Sm83 {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "a" => Some(self.regs.a.into()),
            "f" => Some(self.regs.f.into()),
            "b" => Some(self.regs.b.into()),
            "c" => Some(self.regs.c.into()),
            "d" => Some(self.regs.d.into()),
            "e" => Some(self.regs.e.into()),
            "h" => Some(self.regs.h.into()),
            "l" => Some(self.regs.l.into()),

            "af" => Some(self.regs.af().into()),
            "bc" => Some(self.regs.bc().into()),
            "de" => Some(self.regs.de().into()),
            "hl" => Some(self.regs.hl().into()),
            "sp" => Some(self.regs.sp.into()),
            "pc" => Some(self.regs.pc.into()),

            "flags.z" => Some((self.regs.f & ZF != 0).into()),
            "flags.n" => Some((self.regs.f & NF != 0).into()),
            "flags.h" => Some((self.regs.f & HF != 0).into()),
            "flags.c" => Some((self.regs.f & CF != 0).into()),

            "ime" => Some(self.regs.ime.into()),
            "halted" => Some(self.regs.halted.into()),
            "stopped" => Some(self.stopped.into()),
            "cycles" => Some(self.total_ticks.get().into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "a", "f", "b", "c", "d", "e", "h", "l", "af", "bc", "de", "hl", "sp", "pc",
            "flags.z", "flags.n", "flags.h", "flags.c", "ime", "halted", "stopped", "cycles",
        ]
    }
}

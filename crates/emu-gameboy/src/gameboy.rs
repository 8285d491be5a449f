//! Top-level DMG system.
//!
//! The master clock is the CPU crystal, 4,194,304 Hz. Every component
//! counts in the same T-cycles: the CPU reports the cost of each step and
//! the timer and PPU catch up by exactly that amount.
//!
//! One frame = 456 dots × 154 lines = 70,224 T-cycles (about 59.7 Hz).

use std::sync::Arc;

use emu_core::{Cpu, MasterClock, Observable, Ticks, Value, parse_address};
use sharp_sm83::{Sm83, interrupt};
use tracing::warn;

use crate::bus::GbBus;
use crate::cartridge::Cartridge;
use crate::config::GbConfig;
use crate::error::{ExecutionFault, LoadError};
use crate::frame::FrameBuffer;
use crate::input::InputQueue;
use crate::joypad::InputLatch;
use crate::ppu::{DOTS_PER_LINE, LINES_PER_FRAME};

/// T-cycles per frame.
pub const CYCLES_PER_FRAME: u32 = DOTS_PER_LINE as u32 * LINES_PER_FRAME as u32;

/// CPU crystal frequency.
pub const CPU_HZ: u64 = 4_194_304;

/// Game Boy system.
pub struct GameBoy {
    cpu: Sm83,
    bus: GbBus,
    /// Timed input event queue.
    input_queue: InputQueue,
    /// Frames started so far.
    frame_count: u64,
    /// Cycles the previous frame ran past its budget.
    carry: u32,
    master_clock: MasterClock,
    /// First fault raised; the machine does not run past it.
    fault: Option<ExecutionFault>,
}

impl GameBoy {
    /// Create a Game Boy in its post-boot state with a private input latch.
    ///
    /// # Errors
    ///
    /// Returns an error if the ROM is invalid or the RAM image does not fit.
    pub fn new(config: GbConfig) -> Result<Self, LoadError> {
        Self::with_latch(config, Arc::new(InputLatch::new()))
    }

    /// Create a Game Boy whose joypad reads from a shared latch.
    ///
    /// # Errors
    ///
    /// Returns an error if the ROM is invalid or the RAM image does not fit.
    pub fn with_latch(config: GbConfig, latch: Arc<InputLatch>) -> Result<Self, LoadError> {
        let cartridge = Cartridge::load(config.rom_data, &config.ram_data)?;
        Ok(Self {
            cpu: Sm83::post_boot(),
            bus: GbBus::new(cartridge, latch, config.palette),
            input_queue: InputQueue::new(),
            frame_count: 0,
            carry: 0,
            master_clock: MasterClock::new(CPU_HZ),
            fault: None,
        })
    }

    /// Run one complete frame.
    ///
    /// Applies due input queue events and samples the joypad, then steps
    /// the CPU until this frame's share of cycles has run. The overshoot of
    /// the last instruction is taken off the next frame's budget.
    ///
    /// # Errors
    ///
    /// Returns the fault that stopped the machine, now or on an earlier
    /// frame.
    pub fn run_frame(&mut self) -> Result<FrameBuffer, ExecutionFault> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }

        self.input_queue
            .process(self.frame_count, self.bus.joypad.latch());
        if self.bus.joypad.sample() {
            self.bus.request(interrupt::JOYPAD);
        }
        self.frame_count += 1;

        let budget = CYCLES_PER_FRAME - self.carry;
        let mut elapsed = 0;
        while elapsed < budget {
            elapsed += self.step()?;
        }
        self.carry = elapsed - budget;

        Ok(FrameBuffer::new(
            self.bus.ppu.frame().to_vec(),
            elapsed,
            self.frame_count,
        ))
    }

    /// Execute one CPU step and advance the rest of the machine by its cost.
    ///
    /// # Errors
    ///
    /// Returns an illegal instruction or a bus fault raised by the step.
    pub fn step(&mut self) -> Result<u32, ExecutionFault> {
        let cycles = match self.cpu.step(&mut self.bus) {
            Ok(cycles) => cycles,
            Err(fault) => return Err(self.record(fault.into())),
        };
        self.bus.tick(cycles);
        if let Some(fault) = self.bus.take_fault() {
            return Err(self.record(fault));
        }
        Ok(cycles)
    }

    fn record(&mut self, fault: ExecutionFault) -> ExecutionFault {
        warn!(%fault, pc = self.cpu.pc(), frame = self.frame_count, "execution fault");
        self.fault = Some(fault);
        fault
    }

    /// Reference to the CPU.
    #[must_use]
    pub fn cpu(&self) -> &Sm83 {
        &self.cpu
    }

    /// Reference to the bus.
    #[must_use]
    pub fn bus(&self) -> &GbBus {
        &self.bus
    }

    /// Mutable reference to the bus.
    pub fn bus_mut(&mut self) -> &mut GbBus {
        &mut self.bus
    }

    /// Frames started so far.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[must_use]
    pub fn master_clock(&self) -> MasterClock {
        self.master_clock
    }

    /// Nominal frame rate, about 59.73 Hz.
    #[must_use]
    pub fn frame_rate(&self) -> f64 {
        self.master_clock
            .frames_per_second(Ticks::from(CYCLES_PER_FRAME))
    }

    /// Emulated time since power-on, in microseconds.
    #[must_use]
    pub fn emulated_micros(&self) -> u64 {
        self.master_clock.micros(self.cpu.total_ticks())
    }

    /// Mutable reference to the timed input queue.
    pub fn input_queue(&mut self) -> &mut InputQueue {
        &mut self.input_queue
    }

    /// The latch the joypad reads.
    #[must_use]
    pub fn latch(&self) -> &Arc<InputLatch> {
        self.bus.joypad.latch()
    }

    /// Battery-backed RAM contents, when the cartridge has any.
    #[must_use]
    pub fn save_data(&self) -> Option<Vec<u8>> {
        self.bus.save_data()
    }

    #[must_use]
    pub fn serial_output(&self) -> &[u8] {
        self.bus.serial_output()
    }

    /// The fault that stopped the machine, if any.
    #[must_use]
    pub fn fault(&self) -> Option<ExecutionFault> {
        self.fault
    }
}

impl Observable for GameBoy {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            self.cpu.query(rest)
        } else if let Some(rest) = path.strip_prefix("ppu.") {
            let ppu = &self.bus.ppu;
            match rest {
                "ly" => Some(ppu.ly().into()),
                "dot" => Some(ppu.dot().into()),
                "mode" => Some(Value::U8(ppu.mode() as u8)),
                "lcdc" => Some(ppu.lcdc().bits().into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("timer.") {
            match rest {
                "div" => Some(self.bus.timer.read(0xFF04).into()),
                "tima" => Some(self.bus.timer.read(0xFF05).into()),
                "divider" => Some(self.bus.timer.divider().into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("memory.") {
            parse_address(rest).map(|addr| Value::U8(self.bus.peek(addr)))
        } else if let Some(rest) = path.strip_prefix("cartridge.") {
            let header = self.bus.cartridge().header();
            match rest {
                "title" => Some(header.title.as_str().into()),
                "type" => Some(header.cartridge_type.into()),
                "battery" => Some(header.has_battery.into()),
                _ => None,
            }
        } else {
            match path {
                "master_clock" => Some(self.cpu.total_ticks().get().into()),
                "frame_count" => Some(self.frame_count.into()),
                "timer" => {
                    let timer = &self.bus.timer;
                    let map = [("div", 0xFF04), ("tima", 0xFF05), ("tma", 0xFF06), ("tac", 0xFF07)]
                        .into_iter()
                        .map(|(name, addr)| (name.to_owned(), Value::U8(timer.read(addr))))
                        .collect();
                    Some(Value::Map(map))
                }
                "serial" => Some(String::from_utf8_lossy(self.serial_output()).into_owned().into()),
                "fault" => Some(self.fault.map_or_else(String::new, |f| f.to_string()).into()),
                _ => self.cpu.query(path),
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.<sm83_paths>",
            "ppu.ly",
            "ppu.dot",
            "ppu.mode",
            "ppu.lcdc",
            "timer.div",
            "timer.tima",
            "timer.divider",
            "timer",
            "memory.<address>",
            "cartridge.title",
            "cartridge.type",
            "cartridge.battery",
            "master_clock",
            "frame_count",
            "serial",
            "fault",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::blank_rom;
    use crate::input::GbButton;
    use emu_core::Bus;
    use crate::joypad::Buttons;

    /// Blank ROM (all NOPs) with `program` at the entry point and
    /// `handlers` placed at their addresses.
    fn make_gb(program: &[u8], handlers: &[(usize, &[u8])]) -> GameBoy {
        let mut rom = blank_rom(0x00, 0x00, 0x00);
        rom[0x100..0x100 + program.len()].copy_from_slice(program);
        for (addr, code) in handlers {
            rom[*addr..*addr + code.len()].copy_from_slice(code);
        }
        GameBoy::new(GbConfig {
            rom_data: rom,
            ..GbConfig::default()
        })
        .expect("valid ROM")
    }

    #[test]
    fn nop_frame_is_exact() {
        let mut gb = make_gb(&[], &[]);
        let frame = gb.run_frame().expect("frame");
        assert_eq!(frame.cycles(), CYCLES_PER_FRAME);
        assert_eq!(frame.frame_number(), 1);
        assert_eq!(gb.frame_count(), 1);
        assert_eq!(gb.query("cpu.pc"), Some(Value::U16(0x4594)));
    }

    #[test]
    fn overshoot_carries_into_next_frame() {
        // LD A,0 ; LD A,0 ; NOP ; JP $0100 = 36 cycles per loop
        let mut gb = make_gb(&[0x3E, 0x00, 0x3E, 0x00, 0x00, 0xC3, 0x00, 0x01], &[]);
        let cycles: Vec<u32> = (0..10)
            .map(|_| gb.run_frame().expect("frame").cycles())
            .collect();
        assert_eq!(&cycles[..3], &[70_236, 70_216, 70_220]);
        let total: u32 = cycles.iter().sum();
        assert_eq!(total - 10 * CYCLES_PER_FRAME, 12);
    }

    #[test]
    fn illegal_opcode_stops_the_machine() {
        let mut gb = make_gb(&[0xD3], &[]);
        let fault = ExecutionFault::IllegalInstruction {
            opcode: 0xD3,
            pc: 0x0100,
        };
        assert_eq!(gb.run_frame(), Err(fault));
        assert_eq!(gb.fault(), Some(fault));
        assert_eq!(gb.run_frame(), Err(fault));
        assert_eq!(gb.cpu().pc(), 0x0100);
    }

    #[test]
    fn dma_from_io_page_is_a_bus_fault() {
        // LD A,$E0 ; LDH ($46),A ; LD A,$FF ; LDH ($46),A
        let mut gb = make_gb(&[0x3E, 0xE0, 0xE0, 0x46, 0x3E, 0xFF, 0xE0, 0x46], &[]);
        assert_eq!(
            gb.run_frame(),
            Err(ExecutionFault::BusFault { address: 0xFF00 })
        );
        assert_eq!(gb.cpu().pc(), 0x0108);
    }

    #[test]
    fn timer_interrupt_is_dispatched() {
        let program = [
            0x3E, 0x04, // LD A,$04
            0xE0, 0xFF, // LDH ($FF),A  IE = timer
            0xAF, // XOR A
            0xE0, 0x0F, // LDH ($0F),A  IF = 0
            0x3E, 0xFF, // LD A,$FF
            0xE0, 0x05, // LDH ($05),A  TIMA = $FF
            0x3E, 0x05, // LD A,$05
            0xE0, 0x07, // LDH ($07),A  TAC = enabled, 16 cycles
            0xFB, // EI
            0x76, // HALT
            0x18, 0xFD, // JR -3
        ];
        let handler: &[u8] = &[0x3E, 0x42, 0xE0, 0x80, 0xD9]; // LD A,$42 ; LDH ($80),A ; RETI
        let mut gb = make_gb(&program, &[(0x50, handler)]);
        gb.run_frame().expect("frame");
        assert_eq!(gb.query("memory.0xFF80"), Some(Value::U8(0x42)));
    }

    #[test]
    fn serial_bytes_are_captured() {
        // LD A,'H' ; LDH ($01),A ; LD A,$81 ; LDH ($02),A ; HALT
        let mut gb = make_gb(&[0x3E, b'H', 0xE0, 0x01, 0x3E, 0x81, 0xE0, 0x02, 0x76], &[]);
        gb.run_frame().expect("frame");
        assert_eq!(gb.serial_output(), b"H");
        assert_eq!(gb.query("serial"), Some(Value::String("H".into())));
    }

    #[test]
    fn new_press_requests_joypad_interrupt() {
        let mut gb = make_gb(&[], &[]);
        gb.bus_mut().write(0xFF0F, 0);
        gb.latch().set(Buttons::A);
        gb.run_frame().expect("frame");
        assert_ne!(gb.bus().peek(0xFF0F) & interrupt::JOYPAD, 0);

        gb.bus_mut().write(0xFF0F, 0);
        gb.run_frame().expect("frame");
        assert_eq!(gb.bus().peek(0xFF0F) & interrupt::JOYPAD, 0);
    }

    #[test]
    fn input_queue_drives_latch() {
        let mut gb = make_gb(&[], &[]);
        gb.input_queue().enqueue_button(GbButton::Start, 0, 1);
        gb.run_frame().expect("frame");
        assert_eq!(gb.latch().get(), Buttons::START);
        gb.run_frame().expect("frame");
        assert_eq!(gb.latch().get(), Buttons::empty());
    }

    #[test]
    fn vblank_line_reached_each_frame() {
        let mut gb = make_gb(&[], &[]);
        gb.bus_mut().write(0xFF0F, 0);
        gb.run_frame().expect("frame");
        assert_ne!(gb.bus().peek(0xFF0F) & interrupt::VBLANK, 0);
    }

    #[test]
    fn observable_paths() {
        let gb = make_gb(&[], &[]);
        assert_eq!(gb.query("cpu.sp"), Some(Value::U16(0xFFFE)));
        assert_eq!(gb.query("sp"), Some(Value::U16(0xFFFE)));
        assert_eq!(gb.query("ppu.lcdc"), Some(Value::U8(0x91)));
        assert_eq!(gb.query("cartridge.type"), Some(Value::U8(0)));
        assert_eq!(gb.query("frame_count"), Some(Value::U64(0)));
        assert_eq!(gb.query("memory.$0100"), Some(Value::U8(0)));
        assert_eq!(gb.query("nonsense"), None);
        assert!((gb.frame_rate() - 59.73).abs() < 0.01);
        assert_eq!(
            gb.query("timer").map(|v| v.to_string()),
            Some("{div: $AB, tac: $F8, tima: $00, tma: $00}".to_owned())
        );
    }

    #[test]
    fn emulated_time_tracks_cycles() {
        let mut gb = make_gb(&[0xC3, 0x00, 0x01], &[]); // JP $0100
        for _ in 0..60 {
            gb.run_frame().expect("frame");
        }
        // 60 frames of 70,224 cycles at 4 MiHz is about 1.0046 s.
        assert_eq!(gb.emulated_micros(), 1_004_562);
    }
}

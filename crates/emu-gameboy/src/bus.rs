//! Game Boy bus: CPU address routing.
//!
//! Implements `emu_core::Bus` for the DMG. Routes CPU addresses to the
//! cartridge, VRAM/OAM in the PPU, work RAM, high RAM and the I/O
//! registers. Timer and PPU are advanced by the scheduler through
//! [`GbBus::tick`], which also collects their interrupt requests into IF.

#![allow(clippy::cast_possible_truncation)]

use std::sync::Arc;

use emu_core::{Bus, Ticks, Tickable};
use sharp_sm83::interrupt;

use crate::cartridge::Cartridge;
use crate::config::Palette;
use crate::error::ExecutionFault;
use crate::joypad::{InputLatch, Joypad};
use crate::mapper::OPEN_BUS;
use crate::ppu::Ppu;
use crate::serial::Serial;
use crate::timer::Timer;

const WRAM_SIZE: usize = 0x2000;
const HRAM_SIZE: usize = 0x7F;
/// Highest page OAM DMA may copy from.
const DMA_MAX_PAGE: u8 = 0xFD;
const OAM_SIZE: usize = 0xA0;

/// Decoded CPU address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Rom,
    VRam,
    ExtRam,
    WRam,
    Echo,
    Oam,
    Unusable,
    Io,
    HRam,
    Ie,
}

impl Region {
    const fn of(addr: u16) -> Self {
        match addr {
            0x0000..=0x7FFF => Self::Rom,
            0x8000..=0x9FFF => Self::VRam,
            0xA000..=0xBFFF => Self::ExtRam,
            0xC000..=0xDFFF => Self::WRam,
            0xE000..=0xFDFF => Self::Echo,
            0xFE00..=0xFE9F => Self::Oam,
            0xFEA0..=0xFEFF => Self::Unusable,
            0xFF00..=0xFF7F => Self::Io,
            0xFF80..=0xFFFE => Self::HRam,
            0xFFFF => Self::Ie,
        }
    }
}

/// The Game Boy bus, implementing `emu_core::Bus`.
pub struct GbBus {
    cartridge: Cartridge,
    wram: [u8; WRAM_SIZE],
    hram: [u8; HRAM_SIZE],
    pub ppu: Ppu,
    pub(crate) timer: Timer,
    pub(crate) joypad: Joypad,
    pub(crate) serial: Serial,
    /// Sound registers $FF10-$FF3F, stored without synthesis.
    sound: [u8; 0x30],
    /// Interrupt request flags ($FF0F, low five bits).
    if_reg: u8,
    /// Interrupt enable ($FFFF).
    ie: u8,
    /// Fault raised by the last access, if any.
    fault: Option<ExecutionFault>,
}

impl GbBus {
    /// Bus in its post-boot state around a loaded cartridge.
    #[must_use]
    pub fn new(cartridge: Cartridge, latch: Arc<InputLatch>, palette: Palette) -> Self {
        Self {
            cartridge,
            wram: [0; WRAM_SIZE],
            hram: [0; HRAM_SIZE],
            ppu: Ppu::post_boot(palette),
            timer: Timer::post_boot(),
            joypad: Joypad::new(latch),
            serial: Serial::new(),
            sound: [0; 0x30],
            if_reg: interrupt::VBLANK,
            ie: 0,
            fault: None,
        }
    }

    #[must_use]
    pub fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    /// Read a byte without side effects (for observation).
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        match Region::of(addr) {
            Region::Rom => self.cartridge.read_rom(addr),
            Region::VRam => self.ppu.read_vram(addr),
            Region::ExtRam => self.cartridge.read_ram(addr),
            Region::WRam => self.wram[usize::from(addr - 0xC000)],
            Region::Echo => self.wram[usize::from(addr - 0xE000)],
            Region::Oam => self.ppu.read_oam(addr),
            Region::Unusable => OPEN_BUS,
            Region::Io => self.read_io(addr),
            Region::HRam => self.hram[usize::from(addr - 0xFF80)],
            Region::Ie => self.ie,
        }
    }

    fn read_io(&self, addr: u16) -> u8 {
        match addr {
            0xFF00 => self.joypad.read(),
            0xFF01 | 0xFF02 => self.serial.read(addr),
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F => 0xE0 | self.if_reg,
            0xFF10..=0xFF3F => self.sound[usize::from(addr - 0xFF10)],
            0xFF40..=0xFF4B => self.ppu.read_register(addr),
            _ => OPEN_BUS,
        }
    }

    fn write_io(&mut self, addr: u16, value: u8) {
        match addr {
            0xFF00 => self.joypad.write(value),
            0xFF01 | 0xFF02 => {
                if self.serial.write(addr, value) {
                    self.request(interrupt::SERIAL);
                }
            }
            0xFF04..=0xFF07 => self.timer.write(addr, value),
            0xFF0F => self.if_reg = value & interrupt::ALL,
            0xFF10..=0xFF3F => self.sound[usize::from(addr - 0xFF10)] = value,
            0xFF46 => {
                self.ppu.write_register(addr, value);
                self.oam_dma(value);
            }
            0xFF40..=0xFF4B => self.ppu.write_register(addr, value),
            _ => {}
        }
    }

    /// Copy 160 bytes from `page << 8` into OAM.
    ///
    /// Echo pages read WRAM like any other access. Pages $FE and $FF lie
    /// outside the DMA source range and return different data between DMG
    /// revisions, so a copy from them is a bus fault.
    fn oam_dma(&mut self, page: u8) {
        if page > DMA_MAX_PAGE {
            self.fault = Some(ExecutionFault::BusFault {
                address: u16::from(page) << 8,
            });
            return;
        }
        let base = u16::from(page) << 8;
        for i in 0..OAM_SIZE {
            let byte = self.peek(base + i as u16);
            self.ppu.dma_write(i, byte);
        }
    }

    /// Set bits in IF.
    pub fn request(&mut self, bits: u8) {
        self.if_reg |= bits & interrupt::ALL;
    }

    /// Advance timer and PPU by `cycles` T-cycles and latch their
    /// interrupt requests.
    pub fn tick(&mut self, cycles: u32) {
        let ticks = Ticks::from(cycles);
        self.timer.tick_n(ticks);
        if self.timer.take_interrupt() {
            self.request(interrupt::TIMER);
        }
        self.ppu.tick_n(ticks);
        let requested = self.ppu.take_interrupts();
        self.request(requested);
    }

    /// Return and clear the fault raised by the last access.
    pub fn take_fault(&mut self) -> Option<ExecutionFault> {
        self.fault.take()
    }

    /// Battery-backed RAM contents, when the cartridge has any.
    #[must_use]
    pub fn save_data(&self) -> Option<Vec<u8>> {
        self.cartridge.save_data()
    }

    /// Bytes sent through the serial port.
    #[must_use]
    pub fn serial_output(&self) -> &[u8] {
        self.serial.output()
    }
}

impl Bus for GbBus {
    fn read(&mut self, addr: u16) -> u8 {
        self.peek(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        match Region::of(addr) {
            Region::Rom => self.cartridge.write_rom(addr, value),
            Region::VRam => self.ppu.write_vram(addr, value),
            Region::ExtRam => self.cartridge.write_ram(addr, value),
            Region::WRam => self.wram[usize::from(addr - 0xC000)] = value,
            Region::Echo => self.wram[usize::from(addr - 0xE000)] = value,
            Region::Oam => self.ppu.write_oam(addr, value),
            Region::Unusable => {}
            Region::Io => self.write_io(addr, value),
            Region::HRam => self.hram[usize::from(addr - 0xFF80)] = value,
            Region::Ie => self.ie = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::blank_rom;

    fn make_bus(cartridge_type: u8, ram_code: u8) -> GbBus {
        let rom = blank_rom(cartridge_type, 0x00, ram_code);
        let cartridge = Cartridge::load(rom, &[]).expect("valid ROM");
        GbBus::new(cartridge, Arc::new(InputLatch::new()), Palette::default())
    }

    #[test]
    fn wram_and_echo_alias() {
        let mut bus = make_bus(0x00, 0);
        bus.write(0xC123, 0xAB);
        assert_eq!(bus.read(0xE123), 0xAB);
        bus.write(0xFDFF, 0x5A);
        assert_eq!(bus.read(0xDDFF), 0x5A);
    }

    #[test]
    fn rom_writes_ignored_without_mapper() {
        let mut bus = make_bus(0x00, 0);
        let before = bus.read(0x0150);
        bus.write(0x0150, before.wrapping_add(1));
        assert_eq!(bus.read(0x0150), before);
    }

    #[test]
    fn unusable_and_unmapped_io_read_ff() {
        let mut bus = make_bus(0x00, 0);
        bus.write(0xFEA0, 0x12);
        assert_eq!(bus.read(0xFEA0), 0xFF);
        assert_eq!(bus.read(0xFF03), 0xFF);
        assert_eq!(bus.read(0xFF7F), 0xFF);
        assert_eq!(bus.read(0xA000), 0xFF);
    }

    #[test]
    fn hram_and_ie() {
        let mut bus = make_bus(0x00, 0);
        bus.write(0xFF80, 1);
        bus.write(0xFFFE, 2);
        bus.write(0xFFFF, 0x1F);
        assert_eq!(bus.read(0xFF80), 1);
        assert_eq!(bus.read(0xFFFE), 2);
        assert_eq!(bus.read(0xFFFF), 0x1F);
    }

    #[test]
    fn if_unused_bits_read_high() {
        let mut bus = make_bus(0x00, 0);
        assert_eq!(bus.read(0xFF0F), 0xE1);
        bus.write(0xFF0F, 0xFF);
        assert_eq!(bus.read(0xFF0F), 0xFF);
        bus.write(0xFF0F, 0);
        assert_eq!(bus.read(0xFF0F), 0xE0);
    }

    #[test]
    fn external_ram_through_mapper() {
        let mut bus = make_bus(0x03, 0x02);
        bus.write(0x0000, 0x0A);
        bus.write(0xA010, 0x42);
        assert_eq!(bus.read(0xA010), 0x42);
        assert_eq!(bus.save_data().map(|d| d[0x10]), Some(0x42));
    }

    #[test]
    fn oam_dma_copies_page() {
        let mut bus = make_bus(0x00, 0);
        for i in 0..0xA0u16 {
            bus.write(0xC100 + i, i as u8);
        }
        bus.write(0xFF46, 0xC1);
        assert_eq!(bus.read(0xFE00), 0);
        assert_eq!(bus.read(0xFE9F), 0x9F);
        assert_eq!(bus.read(0xFF46), 0xC1);
        assert!(bus.take_fault().is_none());
    }

    #[test]
    fn oam_dma_from_echo_page_reads_wram() {
        let mut bus = make_bus(0x00, 0);
        bus.write(0xDD00, 0x5A);
        bus.write(0xDD9F, 0xA5);
        bus.write(0xFF46, 0xFD);
        assert_eq!(bus.read(0xFE00), 0x5A);
        assert_eq!(bus.read(0xFE9F), 0xA5);
        assert!(bus.take_fault().is_none());
    }

    #[test]
    fn oam_dma_from_oam_or_io_page_faults() {
        let mut bus = make_bus(0x00, 0);
        bus.write(0xFF46, 0xFE);
        assert_eq!(
            bus.take_fault(),
            Some(ExecutionFault::BusFault { address: 0xFE00 })
        );
        assert!(bus.take_fault().is_none());
    }

    #[test]
    fn serial_transfer_requests_interrupt() {
        let mut bus = make_bus(0x00, 0);
        bus.write(0xFF0F, 0);
        bus.write(0xFF01, b'k');
        bus.write(0xFF02, 0x81);
        assert_eq!(bus.serial_output(), b"k");
        assert_eq!(bus.read(0xFF0F) & interrupt::SERIAL, interrupt::SERIAL);
    }

    #[test]
    fn sound_registers_are_storage() {
        let mut bus = make_bus(0x00, 0);
        bus.write(0xFF26, 0x80);
        bus.write(0xFF3F, 0x12);
        assert_eq!(bus.read(0xFF26), 0x80);
        assert_eq!(bus.read(0xFF3F), 0x12);
    }

    #[test]
    fn tick_collects_timer_interrupt() {
        let mut bus = make_bus(0x00, 0);
        bus.write(0xFF0F, 0);
        bus.write(0xFF06, 0x00);
        bus.write(0xFF05, 0xFF);
        bus.write(0xFF07, 0x05);
        bus.tick(32);
        assert_ne!(bus.read(0xFF0F) & interrupt::TIMER, 0);
    }

    #[test]
    fn joypad_register_reads_latch() {
        let latch = Arc::new(InputLatch::new());
        let rom = blank_rom(0x00, 0x00, 0);
        let cartridge = Cartridge::load(rom, &[]).expect("valid ROM");
        let mut bus = GbBus::new(cartridge, Arc::clone(&latch), Palette::default());
        bus.write(0xFF00, 0x10);
        latch.set(crate::joypad::Buttons::START);
        assert_eq!(bus.read(0xFF00), 0xD7);
    }
}

//! Memory bank controllers.
//!
//! Every mapper serves $0000-$7FFF (ROM, with control registers on write)
//! and $A000-$BFFF (external RAM). Bank numbers wrap modulo the number of
//! banks present. Disabled or absent RAM reads as open bus.

const ROM_BANK: usize = 0x4000;
const RAM_BANK: usize = 0x2000;

/// Value read from an unmapped or disabled location.
pub const OPEN_BUS: u8 = 0xFF;

/// Mapper trait: translates CPU addresses into cartridge ROM/RAM.
pub trait Mapper: Send {
    fn read_rom(&self, addr: u16) -> u8;
    fn write_rom(&mut self, addr: u16, value: u8);
    fn read_ram(&self, addr: u16) -> u8;
    fn write_ram(&mut self, addr: u16, value: u8);
    /// Raw external RAM contents, for battery saves.
    fn ram(&self) -> &[u8];
}

/// ROM and RAM storage with wrapping bank lookup.
struct Banks {
    rom: Vec<u8>,
    ram: Vec<u8>,
}

impl Banks {
    fn rom_byte(&self, bank: usize, addr: u16) -> u8 {
        let count = (self.rom.len() / ROM_BANK).max(1);
        let offset = (bank % count) * ROM_BANK + (addr as usize & (ROM_BANK - 1));
        self.rom[offset]
    }

    fn ram_offset(&self, bank: usize, addr: u16) -> Option<usize> {
        if self.ram.is_empty() {
            return None;
        }
        let offset = bank * RAM_BANK + (addr as usize & (RAM_BANK - 1));
        Some(offset % self.ram.len())
    }

    fn ram_byte(&self, bank: usize, addr: u16) -> u8 {
        self.ram_offset(bank, addr).map_or(OPEN_BUS, |i| self.ram[i])
    }

    fn set_ram_byte(&mut self, bank: usize, addr: u16, value: u8) {
        if let Some(i) = self.ram_offset(bank, addr) {
            self.ram[i] = value;
        }
    }
}

/// No controller: 32 KiB fixed ROM, optional 8 KiB RAM always enabled.
pub struct RomOnly {
    banks: Banks,
}

impl RomOnly {
    #[must_use]
    pub fn new(rom: Vec<u8>, ram: Vec<u8>) -> Self {
        Self {
            banks: Banks { rom, ram },
        }
    }
}

impl Mapper for RomOnly {
    fn read_rom(&self, addr: u16) -> u8 {
        self.banks.rom_byte(usize::from(addr >= 0x4000), addr)
    }

    fn write_rom(&mut self, _addr: u16, _value: u8) {}

    fn read_ram(&self, addr: u16) -> u8 {
        self.banks.ram_byte(0, addr)
    }

    fn write_ram(&mut self, addr: u16, value: u8) {
        self.banks.set_ram_byte(0, addr, value);
    }

    fn ram(&self) -> &[u8] {
        &self.banks.ram
    }
}

/// MBC1: 5-bit low bank register plus a 2-bit register that supplies
/// either the upper ROM bank bits or the RAM bank, depending on mode.
pub struct Mbc1 {
    banks: Banks,
    ram_enabled: bool,
    bank_lo: u8,
    bank_hi: u8,
    /// Mode 1: the 2-bit register also banks $0000-$3FFF and RAM.
    advanced: bool,
}

impl Mbc1 {
    #[must_use]
    pub fn new(rom: Vec<u8>, ram: Vec<u8>) -> Self {
        Self {
            banks: Banks { rom, ram },
            ram_enabled: false,
            bank_lo: 1,
            bank_hi: 0,
            advanced: false,
        }
    }

    fn ram_bank(&self) -> usize {
        if self.advanced { usize::from(self.bank_hi) } else { 0 }
    }
}

impl Mapper for Mbc1 {
    fn read_rom(&self, addr: u16) -> u8 {
        let bank = if addr < 0x4000 {
            if self.advanced { usize::from(self.bank_hi) << 5 } else { 0 }
        } else {
            usize::from(self.bank_hi) << 5 | usize::from(self.bank_lo)
        };
        self.banks.rom_byte(bank, addr)
    }

    fn write_rom(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enabled = value & 0x0F == 0x0A,
            0x2000..=0x3FFF => self.bank_lo = (value & 0x1F).max(1),
            0x4000..=0x5FFF => self.bank_hi = value & 0x03,
            _ => self.advanced = value & 0x01 != 0,
        }
    }

    fn read_ram(&self, addr: u16) -> u8 {
        if !self.ram_enabled {
            return OPEN_BUS;
        }
        self.banks.ram_byte(self.ram_bank(), addr)
    }

    fn write_ram(&mut self, addr: u16, value: u8) {
        if self.ram_enabled {
            self.banks.set_ram_byte(self.ram_bank(), addr, value);
        }
    }

    fn ram(&self) -> &[u8] {
        &self.banks.ram
    }
}

/// MBC2: 4-bit ROM bank and 512 half-bytes of built-in RAM.
///
/// Address bit 8 picks the register in $0000-$3FFF: clear for RAM enable,
/// set for ROM bank. RAM mirrors across $A000-$BFFF and the upper nibble
/// reads as 1s.
pub struct Mbc2 {
    banks: Banks,
    ram_enabled: bool,
    rom_bank: u8,
}

impl Mbc2 {
    #[must_use]
    pub fn new(rom: Vec<u8>, ram: Vec<u8>) -> Self {
        Self {
            banks: Banks { rom, ram },
            ram_enabled: false,
            rom_bank: 1,
        }
    }
}

impl Mapper for Mbc2 {
    fn read_rom(&self, addr: u16) -> u8 {
        let bank = if addr < 0x4000 { 0 } else { usize::from(self.rom_bank) };
        self.banks.rom_byte(bank, addr)
    }

    fn write_rom(&mut self, addr: u16, value: u8) {
        if addr >= 0x4000 {
            return;
        }
        if addr & 0x0100 == 0 {
            self.ram_enabled = value & 0x0F == 0x0A;
        } else {
            self.rom_bank = (value & 0x0F).max(1);
        }
    }

    fn read_ram(&self, addr: u16) -> u8 {
        if !self.ram_enabled {
            return OPEN_BUS;
        }
        0xF0 | self.banks.ram_byte(0, addr & 0x01FF)
    }

    fn write_ram(&mut self, addr: u16, value: u8) {
        if self.ram_enabled {
            self.banks.set_ram_byte(0, addr & 0x01FF, value & 0x0F);
        }
    }

    fn ram(&self) -> &[u8] {
        &self.banks.ram
    }
}

/// MBC3 without the real-time clock: 7-bit ROM bank, four RAM banks.
/// Selecting a clock register ($08-$0C) maps open bus into $A000-$BFFF.
pub struct Mbc3 {
    banks: Banks,
    ram_enabled: bool,
    rom_bank: u8,
    ram_select: u8,
}

impl Mbc3 {
    #[must_use]
    pub fn new(rom: Vec<u8>, ram: Vec<u8>) -> Self {
        Self {
            banks: Banks { rom, ram },
            ram_enabled: false,
            rom_bank: 1,
            ram_select: 0,
        }
    }

    fn ram_bank(&self) -> Option<usize> {
        (self.ram_enabled && self.ram_select <= 0x03).then_some(usize::from(self.ram_select))
    }
}

impl Mapper for Mbc3 {
    fn read_rom(&self, addr: u16) -> u8 {
        let bank = if addr < 0x4000 { 0 } else { usize::from(self.rom_bank) };
        self.banks.rom_byte(bank, addr)
    }

    fn write_rom(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enabled = value & 0x0F == 0x0A,
            0x2000..=0x3FFF => self.rom_bank = (value & 0x7F).max(1),
            0x4000..=0x5FFF => self.ram_select = value,
            // Clock latch; there is no clock to latch.
            _ => {}
        }
    }

    fn read_ram(&self, addr: u16) -> u8 {
        self.ram_bank()
            .map_or(OPEN_BUS, |bank| self.banks.ram_byte(bank, addr))
    }

    fn write_ram(&mut self, addr: u16, value: u8) {
        if let Some(bank) = self.ram_bank() {
            self.banks.set_ram_byte(bank, addr, value);
        }
    }

    fn ram(&self) -> &[u8] {
        &self.banks.ram
    }
}

/// MBC5: 9-bit ROM bank (bank 0 selectable in $4000-$7FFF), 4-bit RAM bank.
pub struct Mbc5 {
    banks: Banks,
    ram_enabled: bool,
    rom_bank: u16,
    ram_bank: u8,
}

impl Mbc5 {
    #[must_use]
    pub fn new(rom: Vec<u8>, ram: Vec<u8>) -> Self {
        Self {
            banks: Banks { rom, ram },
            ram_enabled: false,
            rom_bank: 1,
            ram_bank: 0,
        }
    }
}

impl Mapper for Mbc5 {
    fn read_rom(&self, addr: u16) -> u8 {
        let bank = if addr < 0x4000 { 0 } else { usize::from(self.rom_bank) };
        self.banks.rom_byte(bank, addr)
    }

    fn write_rom(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enabled = value & 0x0F == 0x0A,
            0x2000..=0x2FFF => self.rom_bank = (self.rom_bank & 0x100) | u16::from(value),
            0x3000..=0x3FFF => {
                self.rom_bank = (self.rom_bank & 0x0FF) | (u16::from(value & 0x01) << 8);
            }
            0x4000..=0x5FFF => self.ram_bank = value & 0x0F,
            _ => {}
        }
    }

    fn read_ram(&self, addr: u16) -> u8 {
        if !self.ram_enabled {
            return OPEN_BUS;
        }
        self.banks.ram_byte(usize::from(self.ram_bank), addr)
    }

    fn write_ram(&mut self, addr: u16, value: u8) {
        if self.ram_enabled {
            self.banks.set_ram_byte(usize::from(self.ram_bank), addr, value);
        }
    }

    fn ram(&self) -> &[u8] {
        &self.banks.ram
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ROM where every byte holds its bank number.
    fn banked_rom(banks: usize) -> Vec<u8> {
        (0..banks * ROM_BANK).map(|i| (i / ROM_BANK) as u8).collect()
    }

    #[test]
    fn rom_only_ignores_writes() {
        let mut m = RomOnly::new(banked_rom(2), Vec::new());
        m.write_rom(0x2000, 0x05);
        assert_eq!(m.read_rom(0x0000), 0);
        assert_eq!(m.read_rom(0x4000), 1);
        assert_eq!(m.read_ram(0xA000), OPEN_BUS);
    }

    #[test]
    fn mbc1_bank_zero_maps_to_one() {
        let mut m = Mbc1::new(banked_rom(8), Vec::new());
        m.write_rom(0x2000, 0x00);
        assert_eq!(m.read_rom(0x4000), 1);
        m.write_rom(0x2000, 0x05);
        assert_eq!(m.read_rom(0x4000), 5);
        // Bank 9 wraps to 1 on an 8-bank ROM.
        m.write_rom(0x2000, 0x09);
        assert_eq!(m.read_rom(0x4000), 1);
    }

    #[test]
    fn mbc1_upper_bits_and_mode() {
        let mut m = Mbc1::new(banked_rom(64), vec![0; 0x8000]);
        m.write_rom(0x2000, 0x02);
        m.write_rom(0x4000, 0x01);
        assert_eq!(m.read_rom(0x4000), 0x22);
        assert_eq!(m.read_rom(0x0000), 0);
        m.write_rom(0x6000, 0x01);
        assert_eq!(m.read_rom(0x0000), 0x20);

        m.write_rom(0x0000, 0x0A);
        m.write_ram(0xA000, 0x77);
        m.write_rom(0x6000, 0x00);
        assert_eq!(m.read_ram(0xA000), 0x00);
        m.write_rom(0x6000, 0x01);
        assert_eq!(m.read_ram(0xA000), 0x77);
    }

    #[test]
    fn mbc1_ram_disabled_reads_open_bus() {
        let mut m = Mbc1::new(banked_rom(2), vec![0; RAM_BANK]);
        m.write_ram(0xA000, 0x12);
        assert_eq!(m.read_ram(0xA000), OPEN_BUS);
        m.write_rom(0x0000, 0x0A);
        m.write_ram(0xA000, 0x12);
        assert_eq!(m.read_ram(0xA000), 0x12);
        m.write_rom(0x0000, 0x00);
        assert_eq!(m.read_ram(0xA000), OPEN_BUS);
    }

    #[test]
    fn mbc2_register_select_and_nibble_ram() {
        let mut m = Mbc2::new(banked_rom(16), vec![0; 512]);
        m.write_rom(0x2100, 0x03);
        assert_eq!(m.read_rom(0x4000), 3);
        // Bit 8 clear: RAM enable, not a bank write.
        m.write_rom(0x2000, 0x0A);
        assert_eq!(m.read_rom(0x4000), 3);
        m.write_ram(0xA005, 0xAB);
        assert_eq!(m.read_ram(0xA005), 0xFB);
        assert_eq!(m.read_ram(0xA205), 0xFB);
        assert_eq!(m.ram()[5], 0x0B);
    }

    #[test]
    fn mbc3_clock_select_reads_open_bus() {
        let mut m = Mbc3::new(banked_rom(128), vec![0; 0x8000]);
        m.write_rom(0x2000, 0x45);
        assert_eq!(m.read_rom(0x4000), 0x45);
        m.write_rom(0x0000, 0x0A);
        m.write_rom(0x4000, 0x02);
        m.write_ram(0xA000, 0x99);
        assert_eq!(m.read_ram(0xA000), 0x99);
        m.write_rom(0x4000, 0x08);
        assert_eq!(m.read_ram(0xA000), OPEN_BUS);
        m.write_ram(0xA000, 0x11);
        m.write_rom(0x4000, 0x02);
        assert_eq!(m.read_ram(0xA000), 0x99);
    }

    #[test]
    fn mbc5_nine_bit_bank_and_bank_zero() {
        let mut m = Mbc5::new(banked_rom(512), Vec::new());
        m.write_rom(0x2000, 0x00);
        assert_eq!(m.read_rom(0x4000), 0);
        m.write_rom(0x2000, 0x05);
        m.write_rom(0x3000, 0x01);
        // Bank 0x105; the test pattern stores the low byte.
        assert_eq!(m.read_rom(0x4000), 0x05);
        assert_eq!(m.rom_bank, 0x105);
    }
}

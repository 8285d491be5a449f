//! Game Boy cartridge header parsing and validation.
//!
//! The header occupies $0100-$014F of the ROM image. Loading checks the
//! declared ROM size against the image, verifies the header checksum and
//! picks a mapper from the cartridge type byte. The Nintendo logo is not
//! checked.

use tracing::debug;

use crate::error::{LoadError, RomDefect};
use crate::mapper::{Mapper, Mbc1, Mbc2, Mbc3, Mbc5, RomOnly};

/// Smallest valid image: two 16 KiB banks.
pub const MIN_ROM_SIZE: usize = 0x8000;

/// Size of MBC2's built-in 512 x 4-bit RAM.
pub const MBC2_RAM_SIZE: usize = 512;

const TITLE: std::ops::Range<usize> = 0x0134..0x0144;
const CARTRIDGE_TYPE: usize = 0x0147;
const ROM_SIZE: usize = 0x0148;
const RAM_SIZE: usize = 0x0149;
const HEADER_CHECKSUM: usize = 0x014D;

/// Memory controller family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapperKind {
    RomOnly,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
}

/// Parsed cartridge header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeHeader {
    pub title: String,
    pub cartridge_type: u8,
    pub kind: MapperKind,
    pub has_battery: bool,
    /// ROM size in bytes, as declared.
    pub rom_size: usize,
    /// External RAM size in bytes.
    pub ram_size: usize,
    pub header_checksum: u8,
}

impl CartridgeHeader {
    /// Parse and validate the header of a ROM image.
    pub fn parse(rom: &[u8]) -> Result<Self, RomDefect> {
        if rom.len() < MIN_ROM_SIZE {
            return Err(RomDefect::TooShort { len: rom.len() });
        }

        let size_code = rom[ROM_SIZE];
        if size_code > 0x08 {
            return Err(RomDefect::RomSizeCode { code: size_code });
        }
        let rom_size = MIN_ROM_SIZE << size_code;
        if rom.len() != rom_size {
            return Err(RomDefect::SizeMismatch {
                expected: rom_size,
                actual: rom.len(),
            });
        }

        let computed = header_checksum(rom);
        let stored = rom[HEADER_CHECKSUM];
        if computed != stored {
            return Err(RomDefect::HeaderChecksum { stored, computed });
        }

        let cartridge_type = rom[CARTRIDGE_TYPE];
        let (kind, has_battery) = match cartridge_type {
            0x00 | 0x08 => (MapperKind::RomOnly, false),
            0x09 => (MapperKind::RomOnly, true),
            0x01 | 0x02 => (MapperKind::Mbc1, false),
            0x03 => (MapperKind::Mbc1, true),
            0x05 => (MapperKind::Mbc2, false),
            0x06 => (MapperKind::Mbc2, true),
            0x11 | 0x12 => (MapperKind::Mbc3, false),
            0x0F | 0x10 | 0x13 => (MapperKind::Mbc3, true),
            0x19 | 0x1A | 0x1C | 0x1D => (MapperKind::Mbc5, false),
            0x1B | 0x1E => (MapperKind::Mbc5, true),
            code => return Err(RomDefect::CartridgeType { code }),
        };

        let ram_code = rom[RAM_SIZE];
        let declared_ram = match ram_code {
            0x00 => 0,
            0x02 => 0x2000,
            0x03 => 0x8000,
            0x04 => 0x2_0000,
            0x05 => 0x1_0000,
            code => return Err(RomDefect::RamSizeCode { code }),
        };
        let ram_size = if kind == MapperKind::Mbc2 {
            MBC2_RAM_SIZE
        } else {
            declared_ram
        };

        let title = rom[TITLE]
            .iter()
            .take_while(|&&b| b != 0)
            .filter(|b| b.is_ascii_graphic() || **b == b' ')
            .map(|&b| char::from(b))
            .collect::<String>()
            .trim_end()
            .to_string();

        Ok(Self {
            title,
            cartridge_type,
            kind,
            has_battery,
            rom_size,
            ram_size,
            header_checksum: stored,
        })
    }

    /// Bytes of save data a battery-backed cartridge persists; 0 without a battery.
    #[must_use]
    pub fn save_size(&self) -> usize {
        if self.has_battery { self.ram_size } else { 0 }
    }
}

/// Header checksum over $0134-$014C: `x = x - byte - 1`.
#[must_use]
pub fn header_checksum(rom: &[u8]) -> u8 {
    rom[0x0134..=0x014C]
        .iter()
        .fold(0u8, |x, &b| x.wrapping_sub(b).wrapping_sub(1))
}

/// A validated cartridge: header plus the mapper that serves its banks.
pub struct Cartridge {
    header: CartridgeHeader,
    mapper: Box<dyn Mapper>,
}

impl Cartridge {
    /// Validate `rom`, check `ram` against the expected save size and build
    /// the mapper around the ROM image. Empty `ram` always means fresh,
    /// zeroed RAM.
    pub fn load(rom: Vec<u8>, ram: &[u8]) -> Result<Self, LoadError> {
        let header = CartridgeHeader::parse(&rom)?;

        let expected = header.save_size();
        if !ram.is_empty() && ram.len() != expected {
            return Err(LoadError::InvalidRam {
                expected,
                actual: ram.len(),
            });
        }

        let mut ram_data = vec![0u8; header.ram_size];
        if !ram.is_empty() {
            ram_data.copy_from_slice(ram);
        }

        let mapper: Box<dyn Mapper> = match header.kind {
            MapperKind::RomOnly => Box::new(RomOnly::new(rom, ram_data)),
            MapperKind::Mbc1 => Box::new(Mbc1::new(rom, ram_data)),
            MapperKind::Mbc2 => Box::new(Mbc2::new(rom, ram_data)),
            MapperKind::Mbc3 => Box::new(Mbc3::new(rom, ram_data)),
            MapperKind::Mbc5 => Box::new(Mbc5::new(rom, ram_data)),
        };

        debug!(
            title = %header.title,
            cartridge_type = header.cartridge_type,
            kind = ?header.kind,
            rom_size = header.rom_size,
            ram_size = header.ram_size,
            battery = header.has_battery,
            "cartridge detected"
        );

        Ok(Self { header, mapper })
    }

    #[must_use]
    pub fn header(&self) -> &CartridgeHeader {
        &self.header
    }

    /// Read $0000-$7FFF.
    #[must_use]
    pub fn read_rom(&self, addr: u16) -> u8 {
        self.mapper.read_rom(addr)
    }

    /// Write $0000-$7FFF (mapper control registers).
    pub fn write_rom(&mut self, addr: u16, value: u8) {
        self.mapper.write_rom(addr, value);
    }

    /// Read $A000-$BFFF.
    #[must_use]
    pub fn read_ram(&self, addr: u16) -> u8 {
        self.mapper.read_ram(addr)
    }

    /// Write $A000-$BFFF.
    pub fn write_ram(&mut self, addr: u16, value: u8) {
        self.mapper.write_ram(addr, value);
    }

    /// Battery-backed RAM contents to persist, if the cartridge has a battery.
    #[must_use]
    pub fn save_data(&self) -> Option<Vec<u8>> {
        (self.header.save_size() > 0).then(|| self.mapper.ram().to_vec())
    }
}

/// Build a blank ROM image with a valid header. Shared by unit and
/// integration tests.
#[doc(hidden)]
#[must_use]
pub fn blank_rom(cartridge_type: u8, rom_size_code: u8, ram_size_code: u8) -> Vec<u8> {
    let mut rom = vec![0u8; MIN_ROM_SIZE << rom_size_code];
    rom[CARTRIDGE_TYPE] = cartridge_type;
    rom[ROM_SIZE] = rom_size_code;
    rom[RAM_SIZE] = ram_size_code;
    rom[HEADER_CHECKSUM] = header_checksum(&rom);
    rom
}

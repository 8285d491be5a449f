//! Game Boy configuration.

use serde::Deserialize;

/// Four ARGB colours for DMG shades 0 (lightest) to 3 (darkest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Palette(pub [u32; 4]);

impl Palette {
    /// Colour for a 2-bit shade.
    #[must_use]
    pub const fn shade(&self, shade: u8) -> u32 {
        self.0[(shade & 0x03) as usize]
    }
}

impl Default for Palette {
    /// Neutral greys.
    fn default() -> Self {
        Self([0xFFFF_FFFF, 0xFFAA_AAAA, 0xFF55_5555, 0xFF00_0000])
    }
}

/// Configuration for one machine.
#[derive(Debug, Clone, Default)]
pub struct GbConfig {
    /// Cartridge ROM image.
    pub rom_data: Vec<u8>,
    /// Battery save to restore. Empty for fresh RAM.
    pub ram_data: Vec<u8>,
    pub palette: Palette,
}

/// Configuration for a [`SessionTable`](crate::SessionTable).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Sessions that may hold a cartridge at the same time.
    pub max_loaded: usize,
    pub palette: Palette,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            max_loaded: 1,
            palette: Palette::default(),
        }
    }
}

//! DMG picture processing unit.
//!
//! Each of the 154 lines lasts 456 dots. Visible lines 0-143 run OAM scan
//! (mode 2, 80 dots), pixel transfer (mode 3, 172 dots) and HBlank
//! (mode 0, 204 dots); lines 144-153 are VBlank (mode 1). A line is drawn
//! into the LCD buffer in one pass when it enters HBlank.
//!
//! The PPU raises interrupt requests as it runs; the bus collects them
//! after every step with [`Ppu::take_interrupts`].

use bitflags::bitflags;
use emu_core::{Tickable, Ticks};
use sharp_sm83::interrupt;

use crate::config::Palette;

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

pub const DOTS_PER_LINE: u16 = 456;
pub const LINES_PER_FRAME: u8 = 154;

const OAM_SCAN_DOTS: u16 = 80;
const TRANSFER_DOTS: u16 = 172;
const HBLANK_START: u16 = OAM_SCAN_DOTS + TRANSFER_DOTS;

const SPRITES_PER_LINE: usize = 10;

bitflags! {
    /// $FF40 LCD control.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lcdc: u8 {
        const BG_ENABLE = 0x01;
        const OBJ_ENABLE = 0x02;
        const OBJ_TALL = 0x04;
        const BG_MAP_HIGH = 0x08;
        const TILE_DATA_LOW = 0x10;
        const WINDOW_ENABLE = 0x20;
        const WINDOW_MAP_HIGH = 0x40;
        const LCD_ENABLE = 0x80;
    }
}

bitflags! {
    /// Writable $FF41 STAT bits plus the LYC coincidence flag.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Stat: u8 {
        const LYC_EQUAL = 0x04;
        const HBLANK_INT = 0x08;
        const VBLANK_INT = 0x10;
        const OAM_INT = 0x20;
        const LYC_INT = 0x40;
    }
}

/// PPU mode as reported in STAT bits 0-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    HBlank = 0,
    VBlank = 1,
    OamScan = 2,
    Transfer = 3,
}

pub struct Ppu {
    vram: Box<[u8; 0x2000]>,
    oam: [u8; 0xA0],
    lcdc: Lcdc,
    stat: Stat,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    dma: u8,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,

    mode: Mode,
    /// Dot within the current line.
    dot: u16,
    /// Window lines drawn so far this frame.
    window_line: u8,
    /// Level of the combined STAT interrupt line; requests fire on its rising edge.
    stat_line: bool,
    /// Interrupt requests not yet collected by the bus.
    requests: u8,

    palette: Palette,
    /// Lines drawn so far in the current frame.
    lcd: Vec<u32>,
    /// Last complete picture, replaced on entry to VBlank.
    front: Vec<u32>,
}

impl Ppu {
    #[must_use]
    pub fn new(palette: Palette) -> Self {
        Self {
            vram: Box::new([0; 0x2000]),
            oam: [0; 0xA0],
            lcdc: Lcdc::empty(),
            stat: Stat::empty(),
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            dma: 0xFF,
            bgp: 0,
            obp0: 0,
            obp1: 0,
            wy: 0,
            wx: 0,
            mode: Mode::HBlank,
            dot: 0,
            window_line: 0,
            stat_line: false,
            requests: 0,
            palette,
            lcd: vec![palette.shade(0); SCREEN_WIDTH * SCREEN_HEIGHT],
            front: vec![palette.shade(0); SCREEN_WIDTH * SCREEN_HEIGHT],
        }
    }

    /// Register state after the boot ROM: LCD on, BG on, tile data at $8000.
    #[must_use]
    pub fn post_boot(palette: Palette) -> Self {
        let mut ppu = Self::new(palette);
        ppu.lcdc = Lcdc::LCD_ENABLE | Lcdc::TILE_DATA_LOW | Lcdc::BG_ENABLE;
        ppu.bgp = 0xFC;
        ppu.obp0 = 0xFF;
        ppu.obp1 = 0xFF;
        ppu.mode = Mode::OamScan;
        ppu
    }

    /// The 160x144 ARGB picture being drawn, complete up to the current line.
    #[must_use]
    pub fn lcd(&self) -> &[u32] {
        &self.lcd
    }

    /// The last picture finished at a VBlank, or blank while the LCD is off.
    #[must_use]
    pub fn frame(&self) -> &[u32] {
        &self.front
    }

    #[must_use]
    pub fn ly(&self) -> u8 {
        self.ly
    }

    #[must_use]
    pub fn dot(&self) -> u16 {
        self.dot
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn lcdc(&self) -> Lcdc {
        self.lcdc
    }

    /// Return and clear pending VBlank/STAT requests.
    pub fn take_interrupts(&mut self) -> u8 {
        std::mem::take(&mut self.requests)
    }

    // === CPU access ===

    #[must_use]
    pub fn read_vram(&self, addr: u16) -> u8 {
        self.vram[usize::from(addr & 0x1FFF)]
    }

    pub fn write_vram(&mut self, addr: u16, value: u8) {
        self.vram[usize::from(addr & 0x1FFF)] = value;
    }

    #[must_use]
    pub fn read_oam(&self, addr: u16) -> u8 {
        self.oam[usize::from(addr - 0xFE00)]
    }

    pub fn write_oam(&mut self, addr: u16, value: u8) {
        self.oam[usize::from(addr - 0xFE00)] = value;
    }

    /// Store one byte of an OAM DMA transfer.
    pub fn dma_write(&mut self, index: usize, value: u8) {
        self.oam[index] = value;
    }

    /// Read $FF40-$FF4B.
    #[must_use]
    pub fn read_register(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc.bits(),
            0xFF41 => {
                let mode = if self.lcdc.contains(Lcdc::LCD_ENABLE) {
                    self.mode as u8
                } else {
                    0
                };
                0x80 | self.stat.bits() | mode
            }
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF46 => self.dma,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            _ => self.wx,
        }
    }

    /// Write $FF40-$FF4B. LY is read-only; $FF46 only records the page, the
    /// bus performs the copy.
    pub fn write_register(&mut self, addr: u16, value: u8) {
        match addr {
            0xFF40 => self.write_lcdc(value),
            0xFF41 => {
                let writable = Stat::HBLANK_INT | Stat::VBLANK_INT | Stat::OAM_INT | Stat::LYC_INT;
                self.stat = (self.stat & Stat::LYC_EQUAL) | (Stat::from_bits_truncate(value) & writable);
                self.update_stat_line();
            }
            0xFF42 => self.scy = value,
            0xFF43 => self.scx = value,
            0xFF44 => {}
            0xFF45 => {
                self.lyc = value;
                self.compare_lyc();
            }
            0xFF46 => self.dma = value,
            0xFF47 => self.bgp = value,
            0xFF48 => self.obp0 = value,
            0xFF49 => self.obp1 = value,
            0xFF4A => self.wy = value,
            _ => self.wx = value,
        }
    }

    fn write_lcdc(&mut self, value: u8) {
        let was_on = self.lcdc.contains(Lcdc::LCD_ENABLE);
        self.lcdc = Lcdc::from_bits_retain(value);
        let is_on = self.lcdc.contains(Lcdc::LCD_ENABLE);

        if was_on && !is_on {
            self.ly = 0;
            self.dot = 0;
            self.window_line = 0;
            self.mode = Mode::HBlank;
            self.stat_line = false;
            self.lcd.fill(self.palette.shade(0));
            self.front.fill(self.palette.shade(0));
        } else if !was_on && is_on {
            self.ly = 0;
            self.dot = 0;
            self.window_line = 0;
            self.set_mode(Mode::OamScan);
            self.compare_lyc();
        }
    }

    // === Timing ===

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.update_stat_line();
    }

    fn compare_lyc(&mut self) {
        self.stat.set(Stat::LYC_EQUAL, self.ly == self.lyc);
        self.update_stat_line();
    }

    fn update_stat_line(&mut self) {
        if !self.lcdc.contains(Lcdc::LCD_ENABLE) {
            self.stat_line = false;
            return;
        }
        let line = (self.stat.contains(Stat::LYC_INT) && self.stat.contains(Stat::LYC_EQUAL))
            || match self.mode {
                Mode::HBlank => self.stat.contains(Stat::HBLANK_INT),
                Mode::VBlank => self.stat.contains(Stat::VBLANK_INT),
                Mode::OamScan => self.stat.contains(Stat::OAM_INT),
                Mode::Transfer => false,
            };
        if line && !self.stat_line {
            self.requests |= interrupt::STAT;
        }
        self.stat_line = line;
    }

    /// Dots until the next mode or line change.
    fn dots_to_next_event(&self) -> u16 {
        let boundary = match self.mode {
            Mode::OamScan => OAM_SCAN_DOTS,
            Mode::Transfer => HBLANK_START,
            Mode::HBlank | Mode::VBlank => DOTS_PER_LINE,
        };
        boundary - self.dot
    }

    fn advance(&mut self, mut dots: u64) {
        while dots > 0 {
            let step = u64::from(self.dots_to_next_event()).min(dots);
            self.dot += step as u16;
            dots -= step;
            self.on_dot();
        }
    }

    /// Handle a mode or line boundary at the current dot.
    fn on_dot(&mut self) {
        match self.mode {
            Mode::OamScan if self.dot == OAM_SCAN_DOTS => self.set_mode(Mode::Transfer),
            Mode::Transfer if self.dot == HBLANK_START => {
                self.render_line();
                self.set_mode(Mode::HBlank);
            }
            Mode::HBlank | Mode::VBlank if self.dot == DOTS_PER_LINE => self.next_line(),
            _ => {}
        }
    }

    fn next_line(&mut self) {
        self.dot = 0;
        self.ly += 1;

        if self.ly == LINES_PER_FRAME {
            self.ly = 0;
            self.window_line = 0;
        }

        if usize::from(self.ly) == SCREEN_HEIGHT {
            self.front.copy_from_slice(&self.lcd);
            self.requests |= interrupt::VBLANK;
            self.mode = Mode::VBlank;
        } else if usize::from(self.ly) < SCREEN_HEIGHT {
            self.mode = Mode::OamScan;
        }
        self.compare_lyc();
    }

    // === Rendering ===

    /// Fetch the two bit-planes for one row of a tile.
    fn tile_row(&self, tile: u8, row: u8, object: bool) -> (u8, u8) {
        let base = if object || self.lcdc.contains(Lcdc::TILE_DATA_LOW) {
            usize::from(tile) * 16
        } else {
            (0x1000 + i32::from(tile as i8) * 16) as usize
        };
        let offset = base + usize::from(row) * 2;
        (self.vram[offset], self.vram[offset + 1])
    }

    fn pixel_index(planes: (u8, u8), bit: u8) -> u8 {
        ((planes.0 >> bit) & 1) | (((planes.1 >> bit) & 1) << 1)
    }

    fn shade(&self, register: u8, index: u8) -> u32 {
        self.palette.shade((register >> (index * 2)) & 0x03)
    }

    fn render_line(&mut self) {
        let y = usize::from(self.ly);
        if y >= SCREEN_HEIGHT {
            return;
        }

        let mut colour_index = [0u8; SCREEN_WIDTH];
        let mut row = [self.palette.shade(0); SCREEN_WIDTH];

        if self.lcdc.contains(Lcdc::BG_ENABLE) {
            self.render_background(&mut row, &mut colour_index);
            self.render_window(&mut row, &mut colour_index);
        }
        if self.lcdc.contains(Lcdc::OBJ_ENABLE) {
            self.render_sprites(&mut row, &colour_index);
        }

        self.lcd[y * SCREEN_WIDTH..(y + 1) * SCREEN_WIDTH].copy_from_slice(&row);
    }

    fn render_background(&self, row: &mut [u32; SCREEN_WIDTH], index: &mut [u8; SCREEN_WIDTH]) {
        let map: usize = if self.lcdc.contains(Lcdc::BG_MAP_HIGH) { 0x1C00 } else { 0x1800 };
        let y = self.ly.wrapping_add(self.scy);
        for (x, (pixel, colour)) in row.iter_mut().zip(index.iter_mut()).enumerate() {
            let bx = (x as u8).wrapping_add(self.scx);
            let tile = self.vram[map + usize::from(y / 8) * 32 + usize::from(bx / 8)];
            let planes = self.tile_row(tile, y % 8, false);
            *colour = Self::pixel_index(planes, 7 - bx % 8);
            *pixel = self.shade(self.bgp, *colour);
        }
    }

    fn render_window(&mut self, row: &mut [u32; SCREEN_WIDTH], index: &mut [u8; SCREEN_WIDTH]) {
        if !self.lcdc.contains(Lcdc::WINDOW_ENABLE) || self.ly < self.wy || self.wx > 166 {
            return;
        }
        let map: usize = if self.lcdc.contains(Lcdc::WINDOW_MAP_HIGH) { 0x1C00 } else { 0x1800 };
        let start = usize::from(self.wx).saturating_sub(7);
        let skip = 7usize.saturating_sub(usize::from(self.wx));
        let wy = self.window_line;

        for x in start..SCREEN_WIDTH {
            let wx = (x - start + skip) as u8;
            let tile = self.vram[map + usize::from(wy / 8) * 32 + usize::from(wx / 8)];
            let planes = self.tile_row(tile, wy % 8, false);
            index[x] = Self::pixel_index(planes, 7 - wx % 8);
            row[x] = self.shade(self.bgp, index[x]);
        }
        self.window_line += 1;
    }

    fn render_sprites(&self, row: &mut [u32; SCREEN_WIDTH], bg_index: &[u8; SCREEN_WIDTH]) {
        let height: i16 = if self.lcdc.contains(Lcdc::OBJ_TALL) { 16 } else { 8 };
        let ly = i16::from(self.ly);

        let mut visible: Vec<(u8, usize)> = self
            .oam
            .chunks_exact(4)
            .enumerate()
            .filter(|(_, s)| {
                let top = i16::from(s[0]) - 16;
                ly >= top && ly < top + height
            })
            .take(SPRITES_PER_LINE)
            .map(|(i, s)| (s[1], i))
            .collect();
        // Lower X wins; ties go to the earlier OAM entry.
        visible.sort_unstable();

        let mut claimed = [false; SCREEN_WIDTH];
        for &(x_pos, i) in &visible {
            let entry = &self.oam[i * 4..i * 4 + 4];
            let attrs = entry[3];
            let behind_bg = attrs & 0x80 != 0;
            let y_flip = attrs & 0x40 != 0;
            let x_flip = attrs & 0x20 != 0;
            let palette = if attrs & 0x10 != 0 { self.obp1 } else { self.obp0 };

            let mut line = (ly - (i16::from(entry[0]) - 16)) as u8;
            if y_flip {
                line = (height as u8 - 1) - line;
            }
            let mut tile = entry[2];
            if height == 16 {
                tile &= 0xFE;
            }
            let planes = self.tile_row(tile.wrapping_add(line / 8), line % 8, true);

            for px in 0..8u8 {
                let screen_x = i16::from(x_pos) - 8 + i16::from(px);
                if !(0..SCREEN_WIDTH as i16).contains(&screen_x) {
                    continue;
                }
                let sx = screen_x as usize;
                if claimed[sx] {
                    continue;
                }
                let bit = if x_flip { px } else { 7 - px };
                let colour = Self::pixel_index(planes, bit);
                if colour == 0 {
                    continue;
                }
                claimed[sx] = true;
                if behind_bg && bg_index[sx] != 0 {
                    continue;
                }
                row[sx] = self.shade(palette, colour);
            }
        }
    }
}

impl Tickable for Ppu {
    fn tick(&mut self) {
        self.tick_n(Ticks::new(1));
    }

    /// Advances in jumps between mode boundaries rather than dot by dot.
    fn tick_n(&mut self, count: Ticks) {
        if self.lcdc.contains(Lcdc::LCD_ENABLE) {
            self.advance(count.get());
        }
    }
}

//! Rendered frames handed to the caller.

use crate::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// One emulated frame: 160x144 ARGB pixels plus timing.
///
/// The caller owns the buffer; the next frame is a fresh allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pixels: Vec<u32>,
    cycles: u32,
    frame_number: u64,
}

impl FrameBuffer {
    pub(crate) fn new(pixels: Vec<u32>, cycles: u32, frame_number: u64) -> Self {
        debug_assert_eq!(pixels.len(), SCREEN_WIDTH * SCREEN_HEIGHT);
        Self {
            pixels,
            cycles,
            frame_number,
        }
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        SCREEN_WIDTH as u32
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        SCREEN_HEIGHT as u32
    }

    /// Row-major ARGB pixels.
    #[must_use]
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    #[must_use]
    pub fn into_pixels(self) -> Vec<u32> {
        self.pixels
    }

    /// Pixel at (x, y), or `None` off screen.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        (x < SCREEN_WIDTH && y < SCREEN_HEIGHT).then(|| self.pixels[y * SCREEN_WIDTH + x])
    }

    /// T-cycles executed to produce this frame.
    #[must_use]
    pub const fn cycles(&self) -> u32 {
        self.cycles
    }

    /// 1-based count of frames rendered by the machine.
    #[must_use]
    pub const fn frame_number(&self) -> u64 {
        self.frame_number
    }
}

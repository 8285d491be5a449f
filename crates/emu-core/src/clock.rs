//! Master clock configuration.

use crate::Ticks;

/// Master clock configuration for a system.
///
/// Each system has a master crystal that drives all timing. Components may
/// run at divided rates, but everything derives from this frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterClock {
    /// Crystal frequency in Hz (e.g., `4_194_304` for the DMG Game Boy).
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Frame rate produced by a frame of the given length.
    ///
    /// Systems whose frame length is fixed in dots (rather than derived
    /// from a nominal refresh rate) use this to report their real rate.
    #[must_use]
    pub fn frames_per_second(&self, ticks_per_frame: Ticks) -> f64 {
        if ticks_per_frame == Ticks::ZERO {
            return 0.0;
        }
        self.frequency_hz as f64 / ticks_per_frame.get() as f64
    }

    /// Wall-clock duration of `ticks`, in microseconds.
    #[must_use]
    pub const fn micros(&self, ticks: Ticks) -> u64 {
        ticks.get() * 1_000_000 / self.frequency_hz
    }
}

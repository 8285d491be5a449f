//! DIV/TIMA timer.
//!
//! A 16-bit divider counts every T-cycle; DIV is its upper byte. TIMA
//! increments on the falling edge of the divider bit chosen by TAC, so the
//! rates are 4096, 262144, 65536 and 16384 Hz for TAC 00/01/10/11.

use emu_core::Tickable;

/// Divider bit watched for each TAC clock select.
const TAC_BITS: [u16; 4] = [9, 3, 5, 7];

pub struct Timer {
    divider: u16,
    tima: u8,
    tma: u8,
    tac: u8,
    /// Timer interrupt requested since the last `take_interrupt`.
    overflowed: bool,
}

impl Timer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            divider: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            overflowed: false,
        }
    }

    /// Timer state after the boot ROM.
    #[must_use]
    pub fn post_boot() -> Self {
        Self {
            divider: 0xABCC,
            ..Self::new()
        }
    }

    fn enabled(&self) -> bool {
        self.tac & 0x04 != 0
    }

    /// Current level of the watched divider bit, gated by the enable bit.
    fn signal(&self) -> bool {
        self.enabled() && self.divider & (1 << TAC_BITS[usize::from(self.tac & 0x03)]) != 0
    }

    fn increment(&mut self) {
        let (next, overflow) = self.tima.overflowing_add(1);
        if overflow {
            self.tima = self.tma;
            self.overflowed = true;
        } else {
            self.tima = next;
        }
    }

    /// Read $FF04-$FF07.
    #[must_use]
    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF04 => (self.divider >> 8) as u8,
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            _ => 0xF8 | self.tac,
        }
    }

    /// Write $FF04-$FF07.
    ///
    /// Resetting the divider or changing TAC can drop the watched signal
    /// from 1 to 0, which counts as a falling edge.
    pub fn write(&mut self, addr: u16, value: u8) {
        let before = self.signal();
        match addr {
            0xFF04 => self.divider = 0,
            0xFF05 => self.tima = value,
            0xFF06 => self.tma = value,
            _ => self.tac = value & 0x07,
        }
        if before && !self.signal() {
            self.increment();
        }
    }

    /// Return and clear the pending timer interrupt request.
    pub fn take_interrupt(&mut self) -> bool {
        std::mem::take(&mut self.overflowed)
    }

    #[must_use]
    pub fn divider(&self) -> u16 {
        self.divider
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tickable for Timer {
    fn tick(&mut self) {
        let before = self.signal();
        self.divider = self.divider.wrapping_add(1);
        if before && !self.signal() {
            self.increment();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::Ticks;

    #[test]
    fn div_counts_every_256_cycles() {
        let mut timer = Timer::new();
        timer.tick_n(Ticks::new(255));
        assert_eq!(timer.read(0xFF04), 0);
        timer.tick();
        assert_eq!(timer.read(0xFF04), 1);
        timer.write(0xFF04, 0x99);
        assert_eq!(timer.read(0xFF04), 0);
    }

    #[test]
    fn tima_rate_follows_tac() {
        let mut timer = Timer::new();
        timer.write(0xFF07, 0x05); // enabled, 16 cycles
        timer.tick_n(Ticks::new(64));
        assert_eq!(timer.read(0xFF05), 4);

        let mut timer = Timer::new();
        timer.write(0xFF07, 0x04); // enabled, 1024 cycles
        timer.tick_n(Ticks::new(1023));
        assert_eq!(timer.read(0xFF05), 0);
        timer.tick();
        assert_eq!(timer.read(0xFF05), 1);
    }

    #[test]
    fn disabled_timer_does_not_count() {
        let mut timer = Timer::new();
        timer.write(0xFF07, 0x01);
        timer.tick_n(Ticks::new(1024));
        assert_eq!(timer.read(0xFF05), 0);
        assert_eq!(timer.read(0xFF07), 0xF9);
    }

    #[test]
    fn overflow_reloads_and_requests_interrupt() {
        let mut timer = Timer::new();
        timer.write(0xFF06, 0xF0);
        timer.write(0xFF05, 0xFF);
        timer.write(0xFF07, 0x05);
        timer.tick_n(Ticks::new(16));
        assert_eq!(timer.read(0xFF05), 0xF0);
        assert!(timer.take_interrupt());
        assert!(!timer.take_interrupt());
    }

    #[test]
    fn div_reset_on_high_bit_counts_an_edge() {
        let mut timer = Timer::new();
        timer.write(0xFF07, 0x05);
        timer.tick_n(Ticks::new(8)); // bit 3 now set
        timer.write(0xFF04, 0);
        assert_eq!(timer.read(0xFF05), 1);
    }
}

//! The fundamental unit of time in the emulator.

/// A count of master clock ticks.
///
/// All timing is expressed in ticks of the master crystal oscillator. On
/// the Game Boy one tick is one T-cycle (one PPU dot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(pub u64);

impl Ticks {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u32> for Ticks {
    fn from(count: u32) -> Self {
        Self(u64::from(count))
    }
}

impl core::ops::Add for Ticks {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl core::ops::AddAssign for Ticks {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl core::ops::Sub for Ticks {
    type Output = Self;

    /// Saturating: time never runs backwards.
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtraction_saturates() {
        assert_eq!(Ticks::new(4) - Ticks::new(8), Ticks::ZERO);
    }

    #[test]
    fn from_step_cycles() {
        let mut total = Ticks::ZERO;
        total += Ticks::from(12u32);
        total += Ticks::from(4u32);
        assert_eq!(total.get(), 16);
    }
}

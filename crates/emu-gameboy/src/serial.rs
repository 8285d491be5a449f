//! Serial port with no link partner.
//!
//! A transfer started with the internal clock completes at once: the
//! outgoing byte is captured, SB fills with 1s as if nothing were
//! connected, and the serial interrupt is requested. Test ROMs print
//! their results this way.

use tracing::trace;

#[derive(Default)]
pub struct Serial {
    sb: u8,
    sc: u8,
    output: Vec<u8>,
}

impl Serial {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn read(&self, addr: u16) -> u8 {
        if addr == 0xFF01 { self.sb } else { 0x7E | self.sc }
    }

    /// Write SB or SC. Returns true when a transfer completed.
    pub fn write(&mut self, addr: u16, value: u8) -> bool {
        if addr == 0xFF01 {
            self.sb = value;
            return false;
        }
        self.sc = value & 0x81;
        if self.sc == 0x81 {
            trace!(byte = self.sb, "serial out");
            self.output.push(self.sb);
            self.sb = 0xFF;
            self.sc &= 0x7F;
            return true;
        }
        false
    }

    /// Bytes sent so far.
    #[must_use]
    pub fn output(&self) -> &[u8] {
        &self.output
    }
}

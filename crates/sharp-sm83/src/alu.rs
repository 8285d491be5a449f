//! ALU operations for the SM83.
//!
//! Every function returns the result together with the complete flag byte
//! it produces. Callers that leave some flags untouched (INC/DEC keep C,
//! 16-bit ADD keeps Z) merge with the old F themselves.

use crate::flags::{CF, NF, ZF, c, h, z};

/// Result of an ALU operation with flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u8,
    pub flags: u8,
}

/// ADD / ADC.
#[must_use]
pub fn add8(a: u8, b: u8, carry: bool) -> AluResult {
    let cin = u8::from(carry);
    let wide = u16::from(a) + u16::from(b) + u16::from(cin);
    let value = wide as u8;
    AluResult {
        value,
        flags: z(value) | h((a & 0x0F) + (b & 0x0F) + cin > 0x0F) | c(wide > 0xFF),
    }
}

/// SUB / SBC / CP.
#[must_use]
pub fn sub8(a: u8, b: u8, carry: bool) -> AluResult {
    let cin = u8::from(carry);
    let value = a.wrapping_sub(b).wrapping_sub(cin);
    AluResult {
        value,
        flags: z(value)
            | NF
            | h((a & 0x0F) < (b & 0x0F) + cin)
            | c(u16::from(a) < u16::from(b) + u16::from(cin)),
    }
}

#[must_use]
pub fn and8(a: u8, b: u8) -> AluResult {
    let value = a & b;
    AluResult {
        value,
        flags: z(value) | h(true),
    }
}

#[must_use]
pub fn xor8(a: u8, b: u8) -> AluResult {
    let value = a ^ b;
    AluResult {
        value,
        flags: z(value),
    }
}

#[must_use]
pub fn or8(a: u8, b: u8) -> AluResult {
    let value = a | b;
    AluResult {
        value,
        flags: z(value),
    }
}

/// INC r. Carry is not part of the returned flags.
#[must_use]
pub fn inc8(v: u8) -> AluResult {
    let value = v.wrapping_add(1);
    AluResult {
        value,
        flags: z(value) | h(v & 0x0F == 0x0F),
    }
}

/// DEC r. Carry is not part of the returned flags.
#[must_use]
pub fn dec8(v: u8) -> AluResult {
    let value = v.wrapping_sub(1);
    AluResult {
        value,
        flags: z(value) | NF | h(v & 0x0F == 0),
    }
}

/// ADD HL, rr. Returns the result and the N/H/C flags (Z untouched).
#[must_use]
pub fn add16(hl: u16, rr: u16) -> (u16, u8) {
    let (value, carry) = hl.overflowing_add(rr);
    (value, h((hl & 0x0FFF) + (rr & 0x0FFF) > 0x0FFF) | c(carry))
}

/// SP + e8, shared by `ADD SP, e8` and `LD HL, SP+e8`.
///
/// H and C come from the unsigned addition of the low byte; Z and N are
/// always clear.
#[must_use]
pub fn add_sp(sp: u16, offset: i8) -> (u16, u8) {
    let e = offset as i16 as u16;
    let value = sp.wrapping_add(e);
    let flags = h((sp & 0x000F) + (e & 0x000F) > 0x000F) | c((sp & 0x00FF) + (e & 0x00FF) > 0x00FF);
    (value, flags)
}

/// Decimal adjust after BCD add or subtract.
///
/// `flags` is the current F; N is preserved, H cleared.
#[must_use]
pub fn daa(a: u8, flags: u8) -> AluResult {
    let subtract = flags & NF != 0;
    let half = flags & crate::flags::HF != 0;
    let mut carry = flags & CF != 0;
    let mut correction = 0u8;

    let value = if subtract {
        if half {
            correction |= 0x06;
        }
        if carry {
            correction |= 0x60;
        }
        a.wrapping_sub(correction)
    } else {
        if half || a & 0x0F > 0x09 {
            correction |= 0x06;
        }
        if carry || a > 0x99 {
            correction |= 0x60;
            carry = true;
        }
        a.wrapping_add(correction)
    };

    AluResult {
        value,
        flags: z(value) | (flags & NF) | c(carry),
    }
}

/// CB-prefixed rotate/shift group, selected by bits 5-3 of the opcode.
///
/// 0 RLC, 1 RRC, 2 RL, 3 RR, 4 SLA, 5 SRA, 6 SWAP, 7 SRL.
#[must_use]
pub fn rotate(op: u8, v: u8, carry_in: bool) -> AluResult {
    let cin = u8::from(carry_in);
    let (value, carry) = match op & 7 {
        0 => (v.rotate_left(1), v & 0x80 != 0),
        1 => (v.rotate_right(1), v & 0x01 != 0),
        2 => ((v << 1) | cin, v & 0x80 != 0),
        3 => ((v >> 1) | (cin << 7), v & 0x01 != 0),
        4 => (v << 1, v & 0x80 != 0),
        5 => ((v >> 1) | (v & 0x80), v & 0x01 != 0),
        6 => (v.rotate_left(4), false),
        _ => (v >> 1, v & 0x01 != 0),
    };
    AluResult {
        value,
        flags: z(value) | c(carry),
    }
}

/// Accumulator rotates (RLCA, RRCA, RLA, RRA) clear Z, unlike the CB forms.
#[must_use]
pub fn rotate_a(op: u8, a: u8, carry_in: bool) -> AluResult {
    let result = rotate(op, a, carry_in);
    AluResult {
        value: result.value,
        flags: result.flags & !ZF,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::HF;

    #[test]
    fn add_half_and_full_carry() {
        let r = add8(0x0F, 0x01, false);
        assert_eq!(r.value, 0x10);
        assert_eq!(r.flags, HF);

        let r = add8(0xFF, 0x01, false);
        assert_eq!(r.value, 0x00);
        assert_eq!(r.flags, ZF | HF | CF);

        let r = add8(0x0E, 0x01, true);
        assert_eq!(r.value, 0x10);
        assert_eq!(r.flags, HF);
    }

    #[test]
    fn sub_borrow() {
        let r = sub8(0x10, 0x01, false);
        assert_eq!(r.value, 0x0F);
        assert_eq!(r.flags, NF | HF);

        let r = sub8(0x00, 0x01, false);
        assert_eq!(r.value, 0xFF);
        assert_eq!(r.flags, NF | HF | CF);

        let r = sub8(0x05, 0x05, false);
        assert_eq!(r.flags, ZF | NF);
    }

    #[test]
    fn sbc_includes_carry_in_borrow() {
        let r = sub8(0x00, 0xFF, true);
        assert_eq!(r.value, 0x00);
        assert_eq!(r.flags, ZF | NF | HF | CF);
    }

    #[test]
    fn logic_flags() {
        assert_eq!(and8(0xF0, 0x0F).flags, ZF | HF);
        assert_eq!(xor8(0xAA, 0xAA).flags, ZF);
        assert_eq!(or8(0x00, 0x01).flags, 0);
    }

    #[test]
    fn inc_dec_half_carry() {
        assert_eq!(inc8(0x0F).flags, HF);
        assert_eq!(inc8(0xFF).flags, ZF | HF);
        assert_eq!(dec8(0x10).flags, NF | HF);
        assert_eq!(dec8(0x01).flags, ZF | NF);
    }

    #[test]
    fn add16_carries() {
        assert_eq!(add16(0x0FFF, 0x0001), (0x1000, HF));
        assert_eq!(add16(0xFFFF, 0x0001), (0x0000, HF | CF));
    }

    #[test]
    fn add_sp_negative_offset() {
        // 0xFFF8 + (-1): low byte 0xF8 + 0xFF carries, low nibble 8 + F carries.
        assert_eq!(add_sp(0xFFF8, -1), (0xFFF7, HF | CF));
        assert_eq!(add_sp(0x0000, 1), (0x0001, 0));
    }

    #[test]
    fn daa_after_add() {
        // 0x45 + 0x38 = 0x7D, adjusted to 0x83.
        let sum = add8(0x45, 0x38, false);
        let r = daa(sum.value, sum.flags);
        assert_eq!(r.value, 0x83);
        assert_eq!(r.flags, 0);
    }

    #[test]
    fn daa_after_sub() {
        // 0x83 - 0x38 = 0x4B, adjusted to 0x45.
        let diff = sub8(0x83, 0x38, false);
        let r = daa(diff.value, diff.flags);
        assert_eq!(r.value, 0x45);
        assert_eq!(r.flags, NF);
    }

    #[test]
    fn rotate_group() {
        assert_eq!(rotate(0, 0x80, false), AluResult { value: 0x01, flags: CF });
        assert_eq!(rotate(3, 0x01, false), AluResult { value: 0x00, flags: ZF | CF });
        assert_eq!(rotate(5, 0x81, false), AluResult { value: 0xC0, flags: CF });
        assert_eq!(rotate(6, 0xA5, true), AluResult { value: 0x5A, flags: 0 });
        assert_eq!(rotate_a(2, 0x80, false), AluResult { value: 0x00, flags: CF });
    }
}

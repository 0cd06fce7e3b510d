// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Barrel shifter (addressing mode 1).
//!
//! Evaluating an operand leaves its value in `shifter_operand` and its
//! carry in `shifter_carry_out` on the core, where the data-processing
//! executors pick them up.

use crate::cpu::registers::PC;
use crate::cpu::ArmCore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftKind {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

impl ShiftKind {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0x3 {
            0 => ShiftKind::Lsl,
            1 => ShiftKind::Lsr,
            2 => ShiftKind::Asr,
            _ => ShiftKind::Ror,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShifterOperand {
    /// 8-bit immediate with a zero rotation. Carry passes through.
    Immediate(u32),
    /// Immediate already rotated at decode time. Carry is its bit 31.
    RotatedImmediate(u32),
    ShiftImmediate { kind: ShiftKind, rm: u8, amount: u8 },
    ShiftRegister { kind: ShiftKind, rm: u8, rs: u8 },
}

#[inline]
fn bit(value: u32, n: u32) -> bool {
    (value >> n) & 1 != 0
}

/// Shift by a 5-bit immediate. An amount of zero encodes the special
/// forms: LSL #0 (no shift), LSR #32, ASR #32 and RRX.
pub fn shift_by_immediate(kind: ShiftKind, value: u32, amount: u32, carry: bool) -> (u32, bool) {
    match (kind, amount) {
        (ShiftKind::Lsl, 0) => (value, carry),
        (ShiftKind::Lsl, n) => (value << n, bit(value, 32 - n)),
        (ShiftKind::Lsr, 0) => (0, bit(value, 31)),
        (ShiftKind::Lsr, n) => (value >> n, bit(value, n - 1)),
        (ShiftKind::Asr, 0) => (((value as i32) >> 31) as u32, bit(value, 31)),
        (ShiftKind::Asr, n) => (((value as i32) >> n) as u32, bit(value, n - 1)),
        (ShiftKind::Ror, 0) => (((carry as u32) << 31) | (value >> 1), bit(value, 0)),
        (ShiftKind::Ror, n) => (value.rotate_right(n), bit(value, n - 1)),
    }
}

/// Shift by the bottom byte of a register. Zero leaves both the value and
/// the carry untouched; amounts of 32 and above saturate.
pub fn shift_by_register(kind: ShiftKind, value: u32, amount: u32, carry: bool) -> (u32, bool) {
    let amount = amount & 0xFF;
    if amount == 0 {
        return (value, carry);
    }

    match kind {
        ShiftKind::Lsl => match amount {
            1..=31 => (value << amount, bit(value, 32 - amount)),
            32 => (0, bit(value, 0)),
            _ => (0, false),
        },
        ShiftKind::Lsr => match amount {
            1..=31 => (value >> amount, bit(value, amount - 1)),
            32 => (0, bit(value, 31)),
            _ => (0, false),
        },
        ShiftKind::Asr => {
            if amount < 32 {
                (((value as i32) >> amount) as u32, bit(value, amount - 1))
            } else {
                (((value as i32) >> 31) as u32, bit(value, 31))
            }
        }
        ShiftKind::Ror => {
            let rotate = amount & 0x1F;
            if rotate != 0 {
                (value.rotate_right(rotate), bit(value, rotate - 1))
            } else {
                (value, bit(value, 31))
            }
        }
    }
}

impl ArmCore {
    /// Evaluates `operand` into `shifter_operand` / `shifter_carry_out`.
    pub(crate) fn shift(&mut self, operand: ShifterOperand) {
        let carry = self.regs.flags.c;
        let (value, carry_out) = match operand {
            ShifterOperand::Immediate(imm) => (imm, carry),
            ShifterOperand::RotatedImmediate(imm) => (imm, bit(imm, 31)),
            ShifterOperand::ShiftImmediate { kind, rm, amount } => {
                shift_by_immediate(kind, self.reg(rm), amount as u32, carry)
            }
            ShifterOperand::ShiftRegister { kind, rm, rs } => {
                // The extra internal cycle also moves PC one more word ahead.
                self.cycles += 1;
                let mut value = self.reg(rm);
                if rm as usize == PC {
                    value = value.wrapping_add(4);
                }
                let mut amount = self.reg(rs);
                if rs as usize == PC {
                    amount = amount.wrapping_add(4);
                }
                shift_by_register(kind, value, amount, carry)
            }
        };
        self.shifter_operand = value;
        self.shifter_carry_out = carry_out;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_zero_special_forms() {
        assert_eq!(
            shift_by_immediate(ShiftKind::Lsl, 0x8000_0001, 0, true),
            (0x8000_0001, true)
        );
        assert_eq!(
            shift_by_immediate(ShiftKind::Lsr, 0x8000_0000, 0, false),
            (0, true)
        );
        assert_eq!(
            shift_by_immediate(ShiftKind::Asr, 0x8000_0000, 0, false),
            (0xFFFF_FFFF, true)
        );
        assert_eq!(
            shift_by_immediate(ShiftKind::Asr, 0x7000_0000, 0, true),
            (0, false)
        );
        // RRX
        assert_eq!(
            shift_by_immediate(ShiftKind::Ror, 0x0000_0003, 0, true),
            (0x8000_0001, true)
        );
    }

    #[test]
    fn test_immediate_carry_out() {
        assert_eq!(
            shift_by_immediate(ShiftKind::Lsl, 0x4000_0000, 2, false),
            (0, true)
        );
        assert_eq!(
            shift_by_immediate(ShiftKind::Lsr, 0x0000_0003, 1, false),
            (1, true)
        );
        assert_eq!(
            shift_by_immediate(ShiftKind::Ror, 0x0000_00F0, 4, false),
            (0x0000_000F, false)
        );
        assert_eq!(
            shift_by_immediate(ShiftKind::Ror, 0x0000_0001, 1, false),
            (0x8000_0000, true)
        );
    }

    #[test]
    fn test_register_saturation() {
        assert_eq!(shift_by_register(ShiftKind::Lsl, 1, 32, false), (0, true));
        assert_eq!(shift_by_register(ShiftKind::Lsl, 1, 33, true), (0, false));
        assert_eq!(
            shift_by_register(ShiftKind::Lsr, 0x8000_0000, 32, false),
            (0, true)
        );
        assert_eq!(
            shift_by_register(ShiftKind::Lsr, 0xFFFF_FFFF, 40, true),
            (0, false)
        );
        assert_eq!(
            shift_by_register(ShiftKind::Asr, 0x8000_0000, 100, false),
            (0xFFFF_FFFF, true)
        );
        assert_eq!(
            shift_by_register(ShiftKind::Ror, 0x8000_0001, 64, false),
            (0x8000_0001, true)
        );
    }

    #[test]
    fn test_register_zero_keeps_carry() {
        for kind in [ShiftKind::Lsl, ShiftKind::Lsr, ShiftKind::Asr, ShiftKind::Ror] {
            assert_eq!(shift_by_register(kind, 0x1234, 0x100, true), (0x1234, true));
            assert_eq!(shift_by_register(kind, 0x1234, 0, false), (0x1234, false));
        }
    }

    #[test]
    fn test_shift_round_trip_keeps_low_bits() {
        let x = 0xDEAD_BEEF;
        for n in 0..32 {
            let (left, _) = shift_by_register(ShiftKind::Lsl, x, n, false);
            let (back, _) = shift_by_register(ShiftKind::Lsr, left, n, false);
            let mask = if n == 0 { u32::MAX } else { u32::MAX >> n };
            assert_eq!(back, x & mask, "n = {}", n);
        }
    }
}

// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Arithmetic helpers returning `(result, carry, overflow)`.
//!
//! Carry follows the ARM convention: for additions it is the unsigned
//! carry out of bit 31, for subtractions it is NOT borrow.

pub fn add_with_flags(op1: u32, op2: u32) -> (u32, bool, bool) {
    let (res, carry) = op1.overflowing_add(op2);
    let overflow = (!(op1 ^ op2) & (op1 ^ res)) >> 31 != 0;
    (res, carry, overflow)
}

pub fn adc_with_flags(op1: u32, op2: u32, carry_in: bool) -> (u32, bool, bool) {
    let (res1, c1) = op1.overflowing_add(op2);
    let (res, c2) = res1.overflowing_add(carry_in as u32);
    let overflow = (!(op1 ^ op2) & (op1 ^ res)) >> 31 != 0;
    (res, c1 || c2, overflow)
}

pub fn sub_with_flags(op1: u32, op2: u32) -> (u32, bool, bool) {
    let (res, borrow) = op1.overflowing_sub(op2);
    let overflow = ((op1 ^ op2) & (op1 ^ res)) >> 31 != 0;
    (res, !borrow, overflow)
}

/// `op1 - op2 - NOT(carry_in)`.
pub fn sbc_with_flags(op1: u32, op2: u32, carry_in: bool) -> (u32, bool, bool) {
    let (res1, b1) = op1.overflowing_sub(op2);
    let (res, b2) = res1.overflowing_sub(!carry_in as u32);
    let overflow = ((op1 ^ op2) & (op1 ^ res)) >> 31 != 0;
    (res, !(b1 || b2), overflow)
}

// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! High-level emulation of the arithmetic BIOS services.

use crate::cpu::ArmCore;
use crate::memory::Memory;
use crate::{SimResult, SimulationError};
use std::f64::consts::{FRAC_PI_2, PI};

pub const SWI_HALT: u8 = 0x02;
pub const SWI_DIV: u8 = 0x06;
pub const SWI_DIV_ARM: u8 = 0x07;
pub const SWI_SQRT: u8 = 0x08;
pub const SWI_ARCTAN: u8 = 0x09;
pub const SWI_ARCTAN2: u8 = 0x0A;

/// Runs service `comment` against r0-r3.
pub fn dispatch(core: &mut ArmCore, _mem: &mut dyn Memory, comment: u8) -> SimResult<()> {
    let (r0, r1) = (core.reg(0), core.reg(1));
    match comment {
        SWI_HALT => core.halt(),
        SWI_DIV => divide(core, r0, r1),
        SWI_DIV_ARM => divide(core, r1, r0),
        SWI_SQRT => {
            core.set_reg(0, (r0 as f64).sqrt() as u32);
        }
        SWI_ARCTAN => {
            core.set_reg(0, arctan(r0 as i32) as u32);
        }
        SWI_ARCTAN2 => {
            core.set_reg(0, arctan2(r0 as i32, r1 as i32));
        }
        _ => return Err(SimulationError::UnimplementedSwi(comment)),
    }
    Ok(())
}

/// Signed division: r0 quotient, r1 remainder, r3 absolute quotient.
fn divide(core: &mut ArmCore, numerator: u32, denominator: u32) {
    let (n, d) = (numerator as i32, denominator as i32);
    if d == 0 {
        tracing::warn!("BIOS Div by zero ({} / 0), returning zeros", n);
        core.set_reg(0, 0);
        core.set_reg(1, 0);
        core.set_reg(3, 0);
        return;
    }
    let quotient = n.wrapping_div(d);
    core.set_reg(0, quotient as u32);
    core.set_reg(1, n.wrapping_rem(d) as u32);
    core.set_reg(3, quotient.unsigned_abs());
}

/// Tangent in 1.14 fixed point to an angle where 0x4000 is a quarter turn.
fn arctan(tan: i32) -> i32 {
    let x = tan as f64 / 16384.0;
    (x.atan() / FRAC_PI_2 * 16384.0) as i32
}

/// Angle of (x, y) in [0, 0x10000).
fn arctan2(x: i32, y: i32) -> u32 {
    let mut turns = (y as f64).atan2(x as f64) / (2.0 * PI);
    if turns < 0.0 {
        turns += 1.0;
    }
    ((turns * 65536.0) as u32) & 0xFFFF
}

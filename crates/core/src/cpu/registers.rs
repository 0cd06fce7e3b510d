// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! General-purpose registers, processor modes and the banked copies of
//! SP, LR, SPSR and (for FIQ) r8-r12.

use crate::{SimResult, SimulationError};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

pub const SP: usize = 13;
pub const LR: usize = 14;
pub const PC: usize = 15;

/// Number of register banks: one shared by User/System plus one per
/// exception mode.
pub const BANK_COUNT: usize = 6;

/// Banked slot layout: `[sp, lr, r8, r9, r10, r11, r12]`. Only the FIQ and
/// User/System banks use the r8-r12 slots.
pub const BANK_SLOTS: usize = 7;

bitflags! {
    /// Bit positions inside a packed program status register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PsrBits: u32 {
        const N = 1 << 31;
        const Z = 1 << 30;
        const C = 1 << 29;
        const V = 1 << 28;
        const I = 1 << 7;
        const F = 1 << 6;
        const T = 1 << 5;
        const MODE = 0x1F;
    }
}

/// Condition flag byte, writable from any mode through MSR.
pub const PSR_USER_MASK: u32 = 0xF000_0000;
/// Interrupt masks and mode bits, writable only from privileged modes.
pub const PSR_PRIV_MASK: u32 = 0x0000_00CF;
/// The Thumb state bit.
pub const PSR_STATE_MASK: u32 = 0x0000_0020;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum Mode {
    User = 0x10,
    Fiq = 0x11,
    Irq = 0x12,
    Supervisor = 0x13,
    Abort = 0x17,
    Undefined = 0x1B,
    System = 0x1F,
}

impl Mode {
    pub fn from_bits(bits: u32) -> SimResult<Self> {
        match bits & 0x1F {
            0x10 => Ok(Mode::User),
            0x11 => Ok(Mode::Fiq),
            0x12 => Ok(Mode::Irq),
            0x13 => Ok(Mode::Supervisor),
            0x17 => Ok(Mode::Abort),
            0x1B => Ok(Mode::Undefined),
            0x1F => Ok(Mode::System),
            other => Err(SimulationError::InvalidMode(other)),
        }
    }

    pub fn bits(self) -> u32 {
        self as u32
    }

    /// Index of the register bank this mode selects.
    pub fn bank(self) -> usize {
        match self {
            Mode::User | Mode::System => 0,
            Mode::Fiq => 1,
            Mode::Irq => 2,
            Mode::Supervisor => 3,
            Mode::Abort => 4,
            Mode::Undefined => 5,
        }
    }

    /// User and System share a bank and have no saved status register.
    pub fn has_spsr(self) -> bool {
        !matches!(self, Mode::User | Mode::System)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecState {
    #[default]
    Arm,
    Thumb,
}

impl ExecState {
    /// Instruction width in bytes.
    pub fn width(self) -> u32 {
        match self {
            ExecState::Arm => 4,
            ExecState::Thumb => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusFlags {
    pub n: bool,
    pub z: bool,
    pub c: bool,
    pub v: bool,
    /// IRQ disable.
    pub i: bool,
    /// FIQ disable.
    pub f: bool,
}

impl StatusFlags {
    pub fn set_nz(&mut self, result: u32) {
        self.n = (result >> 31) != 0;
        self.z = result == 0;
    }
}

#[derive(Debug, Clone)]
pub struct RegisterFile {
    pub gprs: [u32; 16],
    pub mode: Mode,
    pub exec_state: ExecState,
    pub flags: StatusFlags,
    /// SPSR of the current mode. Meaningless in User/System.
    pub spsr: u32,
    pub(crate) banked: [[u32; BANK_SLOTS]; BANK_COUNT],
    pub(crate) banked_spsrs: [u32; BANK_COUNT],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            gprs: [0; 16],
            mode: Mode::System,
            exec_state: ExecState::Arm,
            flags: StatusFlags::default(),
            spsr: 0,
            banked: [[0; BANK_SLOTS]; BANK_COUNT],
            banked_spsrs: [0; BANK_COUNT],
        }
    }

    pub fn read(&self, reg: usize) -> u32 {
        self.gprs[reg & 0xF]
    }

    pub fn write(&mut self, reg: usize, value: u32) {
        self.gprs[reg & 0xF] = value;
    }

    /// Saves the visible banked registers of the current mode and restores
    /// those of `new_mode`. r8-r12 only move when FIQ is involved.
    pub fn switch_mode(&mut self, new_mode: Mode) {
        if new_mode == self.mode {
            return;
        }

        let old_bank = self.mode.bank();
        let new_bank = new_mode.bank();
        if old_bank != new_bank {
            if new_mode == Mode::Fiq || self.mode == Mode::Fiq {
                let old_set = (self.mode == Mode::Fiq) as usize;
                let new_set = (new_mode == Mode::Fiq) as usize;
                self.banked[old_set][2..].copy_from_slice(&self.gprs[8..13]);
                self.gprs[8..13].copy_from_slice(&self.banked[new_set][2..]);
            }

            self.banked[old_bank][0] = self.gprs[SP];
            self.banked[old_bank][1] = self.gprs[LR];
            self.banked_spsrs[old_bank] = self.spsr;

            self.gprs[SP] = self.banked[new_bank][0];
            self.gprs[LR] = self.banked[new_bank][1];
            self.spsr = self.banked_spsrs[new_bank];
        }

        self.mode = new_mode;
    }

    pub fn switch_exec_state(&mut self, state: ExecState) {
        self.exec_state = state;
    }

    pub fn pack_status(&self) -> u32 {
        let mut psr = PsrBits::from_bits_retain(self.mode.bits());
        psr.set(PsrBits::T, self.exec_state == ExecState::Thumb);
        psr.set(PsrBits::F, self.flags.f);
        psr.set(PsrBits::I, self.flags.i);
        psr.set(PsrBits::V, self.flags.v);
        psr.set(PsrBits::C, self.flags.c);
        psr.set(PsrBits::Z, self.flags.z);
        psr.set(PsrBits::N, self.flags.n);
        psr.bits()
    }

    /// Applies a packed status word. The mode is validated before anything
    /// is modified.
    pub fn load_status(&mut self, value: u32) -> SimResult<()> {
        let mode = Mode::from_bits(value)?;
        let psr = PsrBits::from_bits_retain(value);

        self.switch_mode(mode);
        self.switch_exec_state(if psr.contains(PsrBits::T) {
            ExecState::Thumb
        } else {
            ExecState::Arm
        });
        self.flags = StatusFlags {
            n: psr.contains(PsrBits::N),
            z: psr.contains(PsrBits::Z),
            c: psr.contains(PsrBits::C),
            v: psr.contains(PsrBits::V),
            i: psr.contains(PsrBits::I),
            f: psr.contains(PsrBits::F),
        };
        Ok(())
    }

    /// Clears every register, bank and flag and enters System mode in ARM
    /// state.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

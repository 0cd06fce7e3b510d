// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Address generation for single transfers (modes 2 and 3) and block
//! transfers (mode 4). Generators may write the base register back.

use crate::cpu::registers::PC;
use crate::cpu::shifter::ShifterOperand;
use crate::cpu::ArmCore;
use crate::memory::Memory;
use crate::SimResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indexing {
    /// Use the base, then write `base ± offset` back.
    Post,
    /// Use `base ± offset`, base untouched.
    Pre,
    /// Use `base ± offset` and write it back.
    PreWriteback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offset {
    Immediate(u32),
    Register(u8),
    /// Register shifted by an immediate (mode 2 only).
    Shifted(ShifterOperand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleAddress {
    pub rn: u8,
    pub offset: Offset,
    pub up: bool,
    pub indexing: Indexing,
}

impl SingleAddress {
    pub fn writes_pc(&self) -> bool {
        self.rn as usize == PC && self.indexing != Indexing::Pre
    }
}

/// Precomputed block-transfer addressing.
///
/// `start` is the offset of the first transferred word from the base and
/// `delta` the total writeback adjustment. When the base register was the
/// lowest register of a store list it is removed from the list and
/// `overlap` is set so the original base is stored in its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAddress {
    pub rn: u8,
    pub start: i32,
    pub delta: i32,
    pub writeback: bool,
    pub overlap: bool,
}

impl BlockAddress {
    /// Builds the generator and returns the (possibly reduced) register
    /// list alongside it.
    pub fn new(
        rn: u8,
        registers: u16,
        pre: bool,
        up: bool,
        writeback: bool,
        store: bool,
    ) -> (Self, u16) {
        let mut list = registers;
        let mut start: i32 = if up == pre { 4 } else { 0 };
        let mut delta: i32 = 0;
        let mut overlap = false;

        for reg in 0..16u8 {
            if registers & (1 << reg) == 0 {
                continue;
            }
            if up {
                delta += 4;
            } else {
                start -= 4;
                delta -= 4;
            }
            if store && writeback && reg == rn && delta.abs() == 4 {
                list &= !(1 << reg);
                start += 4;
                overlap = true;
            }
        }

        (
            Self {
                rn,
                start,
                delta,
                writeback,
                overlap,
            },
            list,
        )
    }

    pub fn writes_pc(&self) -> bool {
        self.rn as usize == PC && self.writeback
    }
}

impl ArmCore {
    pub(crate) fn single_address(&mut self, mode: &SingleAddress) -> u32 {
        let offset = match mode.offset {
            Offset::Immediate(imm) => imm,
            Offset::Register(rm) => self.reg(rm),
            Offset::Shifted(operand) => {
                self.shift(operand);
                self.shifter_operand
            }
        };
        let base = self.reg(mode.rn);
        let indexed = if mode.up {
            base.wrapping_add(offset)
        } else {
            base.wrapping_sub(offset)
        };

        match mode.indexing {
            Indexing::Post => {
                self.set_reg(mode.rn, indexed);
                base
            }
            Indexing::Pre => indexed,
            Indexing::PreWriteback => {
                self.set_reg(mode.rn, indexed);
                indexed
            }
        }
    }

    /// Returns the first transfer address. With writeback the base is
    /// updated before any transfer happens; `write_initial` stores the
    /// original base into its slot when it was dropped from a store list.
    pub(crate) fn block_address(
        &mut self,
        mode: &BlockAddress,
        mem: &mut dyn Memory,
        write_initial: bool,
    ) -> SimResult<u32> {
        let base = self.reg(mode.rn);
        let addr = base.wrapping_add(mode.start as u32);
        if mode.writeback {
            if write_initial && mode.overlap {
                mem.store32(addr.wrapping_sub(4), base)?;
            }
            self.set_reg(mode.rn, base.wrapping_add(mode.delta as u32));
        }
        Ok(addr)
    }
}

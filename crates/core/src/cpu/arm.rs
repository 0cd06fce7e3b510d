// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! ARM state executor.
//!
//! Loads and ALU operations charge the opcode prefetch before testing the
//! condition. Stores, branches and SWI test first and charge the prefetch
//! themselves on the not-taken path, matching the bus timing of each form.

use crate::cpu::addressing::{BlockAddress, SingleAddress};
use crate::cpu::alu::{add_with_flags, adc_with_flags, sbc_with_flags, sub_with_flags};
use crate::cpu::registers::{ExecState, Mode, LR, PC, PSR_PRIV_MASK, PSR_STATE_MASK, PSR_USER_MASK};
use crate::cpu::shifter::ShifterOperand;
use crate::cpu::ArmCore;
use crate::decoder::arm::{AluOp, ArmInstruction, ArmOp, HalfwordOp, MsrOperand};
use crate::interrupt::InterruptController;
use crate::memory::Memory;
use crate::{SimResult, SimulationError};

impl ArmCore {
    pub(crate) fn execute_arm(
        &mut self,
        instr: ArmInstruction,
        address: u32,
        mem: &mut dyn Memory,
        irq: &mut dyn InterruptController,
    ) -> SimResult<()> {
        let cond = instr.cond;
        match instr.op {
            ArmOp::DataProcessing {
                op,
                set_flags,
                rd,
                rn,
                operand,
            } => {
                self.prefetch32(mem);
                if !self.check_condition(cond) {
                    return Ok(());
                }
                self.data_processing(op, set_flags, rd, rn, operand, irq)
            }
            ArmOp::Mrs { rd, spsr } => {
                self.prefetch32(mem);
                if !self.check_condition(cond) {
                    return Ok(());
                }
                let value = if spsr {
                    self.regs.spsr
                } else {
                    self.regs.pack_status()
                };
                self.set_reg(rd, value);
                Ok(())
            }
            ArmOp::Msr {
                spsr,
                mask,
                operand,
            } => {
                self.prefetch32(mem);
                if !self.check_condition(cond) {
                    return Ok(());
                }
                let value = match operand {
                    MsrOperand::Register(rm) => self.reg(rm),
                    MsrOperand::Immediate(imm) => imm,
                };
                self.move_to_status(spsr, mask, value, irq)
            }
            ArmOp::Multiply {
                accumulate,
                set_flags,
                rd,
                rn,
                rs,
                rm,
            } => {
                self.prefetch32(mem);
                if !self.check_condition(cond) {
                    return Ok(());
                }
                let multiplier = self.reg(rs);
                self.charge(mem.wait_multiply(multiplier));
                let mut result = self.reg(rm).wrapping_mul(multiplier);
                if accumulate {
                    result = result.wrapping_add(self.reg(rn));
                    self.cycles += 1;
                }
                if set_flags {
                    self.regs.flags.set_nz(result);
                }
                self.set_reg(rd, result);
                Ok(())
            }
            ArmOp::MultiplyLong {
                signed,
                accumulate,
                set_flags,
                rd_hi,
                rd_lo,
                rs,
                rm,
            } => {
                self.prefetch32(mem);
                if !self.check_condition(cond) {
                    return Ok(());
                }
                let multiplier = self.reg(rs);
                self.charge(mem.wait_multiply(multiplier) + 1);
                let mut result = if signed {
                    (self.reg(rm) as i32 as i64).wrapping_mul(multiplier as i32 as i64) as u64
                } else {
                    (self.reg(rm) as u64) * (multiplier as u64)
                };
                if accumulate {
                    let acc = ((self.reg(rd_hi) as u64) << 32) | self.reg(rd_lo) as u64;
                    result = result.wrapping_add(acc);
                    self.cycles += 1;
                }
                if set_flags {
                    self.regs.flags.n = result >> 63 != 0;
                    self.regs.flags.z = result == 0;
                }
                self.set_reg(rd_lo, result as u32);
                self.set_reg(rd_hi, (result >> 32) as u32);
                Ok(())
            }
            ArmOp::Swap { byte, rd, rn, rm } => {
                self.prefetch32(mem);
                if !self.check_condition(cond) {
                    return Ok(());
                }
                let addr = self.reg(rn);
                let value = self.reg(rm);
                let old = if byte {
                    self.charge(mem.wait(addr) * 2);
                    let old = mem.load_u8(addr)?;
                    mem.store8(addr, value)?;
                    old
                } else {
                    self.charge(mem.wait32(addr) * 2);
                    let old = mem.load32(addr)?;
                    mem.store32(addr, value)?;
                    old
                };
                self.set_reg(rd, old);
                self.cycles += 1;
                Ok(())
            }
            ArmOp::Transfer {
                load: true,
                byte,
                rd,
                address: mode,
            } => {
                self.prefetch32(mem);
                if !self.check_condition(cond) {
                    return Ok(());
                }
                let addr = self.single_address(&mode);
                let value = if byte {
                    self.charge(mem.wait(addr));
                    mem.load_u8(addr)?
                } else {
                    self.charge(mem.wait32(addr));
                    mem.load32(addr)?
                };
                self.cycles += 1;
                self.set_reg(rd, value);
                Ok(())
            }
            ArmOp::Transfer {
                load: false,
                byte,
                rd,
                address: mode,
            } => {
                if !self.check_condition(cond) {
                    self.prefetch32(mem);
                    return Ok(());
                }
                let value = self.store_value(rd);
                let addr = self.single_address(&mode);
                if byte {
                    mem.store8(addr, value)?;
                    self.charge(mem.wait(addr));
                } else {
                    mem.store32(addr, value)?;
                    self.charge(mem.wait32(addr));
                }
                self.charge(mem.wait32(self.pc()));
                Ok(())
            }
            ArmOp::TransferHalf {
                op: HalfwordOp::Store,
                rd,
                address: mode,
            } => {
                if !self.check_condition(cond) {
                    self.prefetch32(mem);
                    return Ok(());
                }
                let value = self.store_value(rd);
                let addr = self.single_address(&mode);
                mem.store16(addr, value)?;
                self.charge(mem.wait(addr));
                self.charge(mem.wait32(self.pc()));
                Ok(())
            }
            ArmOp::TransferHalf {
                op,
                rd,
                address: mode,
            } => {
                self.prefetch32(mem);
                if !self.check_condition(cond) {
                    return Ok(());
                }
                self.load_half(op, rd, &mode, mem)
            }
            ArmOp::TransferMultiple {
                load: true,
                user_bank,
                registers,
                address: mode,
            } => {
                self.prefetch32(mem);
                if !self.check_condition(cond) {
                    return Ok(());
                }
                self.load_multiple(user_bank, registers, &mode, mem, irq)
            }
            ArmOp::TransferMultiple {
                load: false,
                user_bank,
                registers,
                address: mode,
            } => {
                if !self.check_condition(cond) {
                    self.prefetch32(mem);
                    return Ok(());
                }
                self.store_multiple(user_bank, registers, &mode, mem)
            }
            ArmOp::Branch { link, offset } => {
                if !self.check_condition(cond) {
                    self.prefetch32(mem);
                    return Ok(());
                }
                self.prefetch32(mem);
                let pc = self.pc();
                if link {
                    self.regs.write(LR, pc.wrapping_sub(4));
                }
                self.regs.write(PC, pc.wrapping_add(offset as u32));
                Ok(())
            }
            ArmOp::Bx { rm } => {
                self.prefetch32(mem);
                if !self.check_condition(cond) {
                    return Ok(());
                }
                let target = self.reg(rm);
                self.regs.switch_exec_state(if target & 1 != 0 {
                    ExecState::Thumb
                } else {
                    ExecState::Arm
                });
                self.regs.write(PC, target & !1);
                Ok(())
            }
            ArmOp::Swi { comment } => {
                if !self.check_condition(cond) {
                    self.prefetch32(mem);
                    return Ok(());
                }
                irq.software_interrupt(self, mem, ((comment >> 16) & 0xFF) as u8)?;
                self.prefetch32(mem);
                Ok(())
            }
            ArmOp::Unknown(opcode) => Err(SimulationError::IllegalInstruction {
                address,
                opcode,
                thumb: false,
            }),
        }
    }

    /// Value a store writes for `rd`. R15 is stored as the instruction
    /// address plus 12.
    fn store_value(&self, rd: u8) -> u32 {
        let value = self.reg(rd);
        if rd as usize == PC {
            value.wrapping_add(4)
        } else {
            value
        }
    }

    fn data_processing(
        &mut self,
        op: AluOp,
        set_flags: bool,
        rd: u8,
        rn: u8,
        operand: ShifterOperand,
        irq: &mut dyn InterruptController,
    ) -> SimResult<()> {
        self.shift(operand);
        let op1 = self.reg(rn);
        let op2 = self.shifter_operand;
        let carry = self.regs.flags.c;
        let logical = |result: u32| (result, self.shifter_carry_out, self.regs.flags.v);

        let (result, c, v) = match op {
            AluOp::And | AluOp::Tst => logical(op1 & op2),
            AluOp::Eor | AluOp::Teq => logical(op1 ^ op2),
            AluOp::Orr => logical(op1 | op2),
            AluOp::Bic => logical(op1 & !op2),
            AluOp::Mov => logical(op2),
            AluOp::Mvn => logical(!op2),
            AluOp::Sub | AluOp::Cmp => sub_with_flags(op1, op2),
            AluOp::Rsb => sub_with_flags(op2, op1),
            AluOp::Add | AluOp::Cmn => add_with_flags(op1, op2),
            AluOp::Adc => adc_with_flags(op1, op2, carry),
            AluOp::Sbc => sbc_with_flags(op1, op2, carry),
            AluOp::Rsc => sbc_with_flags(op2, op1, carry),
        };

        if set_flags {
            if rd as usize == PC && self.regs.mode.has_spsr() {
                let spsr = self.regs.spsr;
                self.unpack_status(spsr, irq)?;
            } else {
                self.regs.flags.set_nz(result);
                self.regs.flags.c = c;
                self.regs.flags.v = v;
            }
        }
        if !op.is_test() {
            self.set_reg(rd, result);
        }
        Ok(())
    }

    fn move_to_status(
        &mut self,
        spsr: bool,
        mask: u32,
        value: u32,
        irq: &mut dyn InterruptController,
    ) -> SimResult<()> {
        if spsr {
            if self.regs.mode.has_spsr() {
                let mask = mask & (PSR_USER_MASK | PSR_PRIV_MASK | PSR_STATE_MASK);
                self.regs.spsr = (self.regs.spsr & !mask) | (value & mask);
            }
            return Ok(());
        }

        // Resolve the new mode before anything is committed.
        let mode = if self.regs.mode != Mode::User && mask & PSR_PRIV_MASK != 0 {
            Some(Mode::from_bits((value & 0xF) | 0x10)?)
        } else {
            None
        };

        if mask & PSR_USER_MASK != 0 {
            let flags = &mut self.regs.flags;
            flags.n = value & 0x8000_0000 != 0;
            flags.z = value & 0x4000_0000 != 0;
            flags.c = value & 0x2000_0000 != 0;
            flags.v = value & 0x1000_0000 != 0;
        }
        if let Some(mode) = mode {
            self.regs.switch_mode(mode);
            self.regs.flags.i = value & 0x80 != 0;
            self.regs.flags.f = value & 0x40 != 0;
        }
        irq.test_irq(self);
        Ok(())
    }

    fn load_half(
        &mut self,
        op: HalfwordOp,
        rd: u8,
        mode: &SingleAddress,
        mem: &mut dyn Memory,
    ) -> SimResult<()> {
        let addr = self.single_address(mode);
        let value = match op {
            HalfwordOp::LoadSb => mem.load8(addr)?,
            HalfwordOp::LoadSh => mem.load16(addr)?,
            _ => mem.load_u16(addr)?,
        };
        self.charge(mem.wait(addr));
        self.cycles += 1;
        self.set_reg(rd, value);
        Ok(())
    }

    fn load_multiple(
        &mut self,
        user_bank: bool,
        registers: u16,
        mode: &BlockAddress,
        mem: &mut dyn Memory,
        irq: &mut dyn InterruptController,
    ) -> SimResult<()> {
        let start = self.block_address(mode, mem, false)?;
        let loads_pc = registers & (1 << PC) != 0;
        let previous = self.regs.mode;
        let user_transfer = user_bank && !loads_pc;
        if user_transfer {
            self.regs.switch_mode(Mode::System);
        }

        let mut addr = start;
        for reg in 0..16 {
            if registers & (1 << reg) != 0 {
                let value = mem.load32(addr & !3)?;
                self.regs.write(reg, value);
                addr = addr.wrapping_add(4);
            }
        }

        if user_transfer {
            self.regs.switch_mode(previous);
        }
        self.charge(mem.wait_multiple32(start, registers.count_ones()));
        self.cycles += 1;

        if user_bank && loads_pc && self.regs.mode.has_spsr() {
            let spsr = self.regs.spsr;
            self.unpack_status(spsr, irq)?;
        }
        Ok(())
    }

    fn store_multiple(
        &mut self,
        user_bank: bool,
        registers: u16,
        mode: &BlockAddress,
        mem: &mut dyn Memory,
    ) -> SimResult<()> {
        self.charge(mem.wait32(self.pc()));
        let start = self.block_address(mode, mem, true)?;
        let previous = self.regs.mode;
        if user_bank {
            self.regs.switch_mode(Mode::System);
        }

        let mut addr = start;
        for reg in 0..16u8 {
            if registers & (1 << reg) != 0 {
                mem.store32(addr, self.store_value(reg))?;
                addr = addr.wrapping_add(4);
            }
        }

        if user_bank {
            self.regs.switch_mode(previous);
        }
        // The original base already went to the slot in front of `start`.
        let (first, count) = if mode.overlap && mode.writeback {
            (start.wrapping_sub(4), registers.count_ones() + 1)
        } else {
            (start, registers.count_ones())
        };
        self.charge(mem.wait_multiple32(first, count));
        Ok(())
    }
}

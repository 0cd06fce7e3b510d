// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Thumb state executor. Every data-processing form updates flags.

use crate::cpu::alu::{add_with_flags, adc_with_flags, sbc_with_flags, sub_with_flags};
use crate::cpu::registers::{ExecState, LR, PC, SP};
use crate::cpu::shifter::{shift_by_immediate, shift_by_register, ShiftKind};
use crate::cpu::ArmCore;
use crate::decoder::thumb::ThumbInstruction;
use crate::interrupt::InterruptController;
use crate::memory::Memory;
use crate::{SimResult, SimulationError};

#[derive(Debug, Clone, Copy)]
enum Width {
    Byte,
    Half,
    Word,
}

#[derive(Debug, Clone, Copy)]
enum Load {
    Byte,
    SignedByte,
    Half,
    SignedHalf,
    Word,
}

impl ArmCore {
    fn set_nzcv(&mut self, (result, carry, overflow): (u32, bool, bool)) -> u32 {
        self.regs.flags.set_nz(result);
        self.regs.flags.c = carry;
        self.regs.flags.v = overflow;
        result
    }

    fn thumb_shift_imm(&mut self, kind: ShiftKind, rd: u8, rm: u8, imm: u8) {
        let (value, carry) =
            shift_by_immediate(kind, self.reg(rm), imm as u32, self.regs.flags.c);
        self.regs.flags.set_nz(value);
        self.regs.flags.c = carry;
        self.set_reg(rd, value);
    }

    fn thumb_shift_reg(&mut self, kind: ShiftKind, rd: u8, rs: u8) {
        let (value, carry) =
            shift_by_register(kind, self.reg(rd), self.reg(rs), self.regs.flags.c);
        self.cycles += 1;
        self.regs.flags.set_nz(value);
        self.regs.flags.c = carry;
        self.set_reg(rd, value);
    }

    fn thumb_load(&mut self, kind: Load, rd: u8, addr: u32, mem: &mut dyn Memory) -> SimResult<()> {
        let value = match kind {
            Load::Byte => mem.load_u8(addr)?,
            Load::SignedByte => mem.load8(addr)?,
            Load::Half => mem.load_u16(addr)?,
            Load::SignedHalf => mem.load16(addr)?,
            Load::Word => mem.load32(addr)?,
        };
        let wait = match kind {
            Load::Word => mem.wait32(addr),
            _ => mem.wait(addr),
        };
        self.charge(wait);
        self.cycles += 1;
        self.set_reg(rd, value);
        Ok(())
    }

    fn thumb_store(&mut self, width: Width, rd: u8, addr: u32, mem: &mut dyn Memory) -> SimResult<()> {
        let value = self.reg(rd);
        let wait = match width {
            Width::Byte => {
                mem.store8(addr, value)?;
                mem.wait(addr)
            }
            Width::Half => {
                mem.store16(addr, value)?;
                mem.wait(addr)
            }
            Width::Word => {
                mem.store32(addr, value)?;
                mem.wait32(addr)
            }
        };
        self.charge(mem.wait(self.pc()));
        self.charge(wait);
        Ok(())
    }

    pub(crate) fn execute_thumb(
        &mut self,
        instr: ThumbInstruction,
        address: u32,
        mem: &mut dyn Memory,
        irq: &mut dyn InterruptController,
    ) -> SimResult<()> {
        use ThumbInstruction as T;

        // Stores charge the fetch on the data path and SWI at its target.
        let deferred_fetch = matches!(
            instr,
            T::StrReg { .. }
                | T::StrhReg { .. }
                | T::StrbReg { .. }
                | T::StrImm { .. }
                | T::StrbImm { .. }
                | T::StrhImm { .. }
                | T::StrSp { .. }
                | T::Stm { .. }
                | T::Swi { .. }
        );
        if !deferred_fetch {
            self.prefetch16(mem);
        }

        match instr {
            T::Lsl { rd, rm, imm } => self.thumb_shift_imm(ShiftKind::Lsl, rd, rm, imm),
            T::Lsr { rd, rm, imm } => self.thumb_shift_imm(ShiftKind::Lsr, rd, rm, imm),
            T::Asr { rd, rm, imm } => self.thumb_shift_imm(ShiftKind::Asr, rd, rm, imm),

            T::AddReg { rd, rn, rm } => {
                let result = self.set_nzcv(add_with_flags(self.reg(rn), self.reg(rm)));
                self.set_reg(rd, result);
            }
            T::SubReg { rd, rn, rm } => {
                let result = self.set_nzcv(sub_with_flags(self.reg(rn), self.reg(rm)));
                self.set_reg(rd, result);
            }
            T::AddImm3 { rd, rn, imm } => {
                let result = self.set_nzcv(add_with_flags(self.reg(rn), imm as u32));
                self.set_reg(rd, result);
            }
            T::SubImm3 { rd, rn, imm } => {
                let result = self.set_nzcv(sub_with_flags(self.reg(rn), imm as u32));
                self.set_reg(rd, result);
            }
            T::MovLow { rd, rn } => {
                let value = self.reg(rn);
                self.set_nzcv((value, false, false));
                self.set_reg(rd, value);
            }

            T::MovImm { rd, imm } => {
                self.regs.flags.set_nz(imm as u32);
                self.set_reg(rd, imm as u32);
            }
            T::CmpImm { rn, imm } => {
                self.set_nzcv(sub_with_flags(self.reg(rn), imm as u32));
            }
            T::AddImm8 { rd, imm } => {
                let result = self.set_nzcv(add_with_flags(self.reg(rd), imm as u32));
                self.set_reg(rd, result);
            }
            T::SubImm8 { rd, imm } => {
                let result = self.set_nzcv(sub_with_flags(self.reg(rd), imm as u32));
                self.set_reg(rd, result);
            }

            T::And { rd, rm } => self.thumb_logical(rd, self.reg(rd) & self.reg(rm)),
            T::Eor { rd, rm } => self.thumb_logical(rd, self.reg(rd) ^ self.reg(rm)),
            T::Orr { rd, rm } => self.thumb_logical(rd, self.reg(rd) | self.reg(rm)),
            T::Bic { rd, rm } => self.thumb_logical(rd, self.reg(rd) & !self.reg(rm)),
            T::Mvn { rd, rm } => self.thumb_logical(rd, !self.reg(rm)),
            T::Tst { rn, rm } => {
                self.regs.flags.set_nz(self.reg(rn) & self.reg(rm));
            }
            T::LslReg { rd, rs } => self.thumb_shift_reg(ShiftKind::Lsl, rd, rs),
            T::LsrReg { rd, rs } => self.thumb_shift_reg(ShiftKind::Lsr, rd, rs),
            T::AsrReg { rd, rs } => self.thumb_shift_reg(ShiftKind::Asr, rd, rs),
            T::Ror { rd, rs } => self.thumb_shift_reg(ShiftKind::Ror, rd, rs),
            T::Adc { rd, rm } => {
                let carry = self.regs.flags.c;
                let result = self.set_nzcv(adc_with_flags(self.reg(rd), self.reg(rm), carry));
                self.set_reg(rd, result);
            }
            T::Sbc { rd, rm } => {
                let carry = self.regs.flags.c;
                let result = self.set_nzcv(sbc_with_flags(self.reg(rd), self.reg(rm), carry));
                self.set_reg(rd, result);
            }
            T::Neg { rd, rm } => {
                let result = self.set_nzcv(sub_with_flags(0, self.reg(rm)));
                self.set_reg(rd, result);
            }
            T::CmpReg { rn, rm } | T::CmpRegHigh { rn, rm } => {
                self.set_nzcv(sub_with_flags(self.reg(rn), self.reg(rm)));
            }
            T::Cmn { rn, rm } => {
                self.set_nzcv(add_with_flags(self.reg(rn), self.reg(rm)));
            }
            T::Mul { rd, rm } => {
                let multiplier = self.reg(rm);
                self.charge(mem.wait_multiply(multiplier));
                let result = self.reg(rd).wrapping_mul(multiplier);
                self.regs.flags.set_nz(result);
                self.set_reg(rd, result);
            }

            T::AddRegHigh { rd, rm } => {
                let result = self.reg(rd).wrapping_add(self.reg(rm));
                self.set_reg(rd, result);
            }
            T::MovReg { rd, rm } => {
                let value = self.reg(rm);
                self.set_reg(rd, value);
            }
            T::Bx { rm } => {
                let mut target = self.reg(rm);
                if rm as usize == PC {
                    target &= !2;
                }
                self.regs.switch_exec_state(if target & 1 != 0 {
                    ExecState::Thumb
                } else {
                    ExecState::Arm
                });
                self.regs.write(PC, target & !1);
            }

            T::LdrLit { rd, imm } => {
                let addr = (self.pc() & !3).wrapping_add(imm);
                self.thumb_load(Load::Word, rd, addr, mem)?;
            }
            T::StrReg { rd, rn, rm } => {
                let addr = self.reg(rn).wrapping_add(self.reg(rm));
                self.thumb_store(Width::Word, rd, addr, mem)?;
            }
            T::StrhReg { rd, rn, rm } => {
                let addr = self.reg(rn).wrapping_add(self.reg(rm));
                self.thumb_store(Width::Half, rd, addr, mem)?;
            }
            T::StrbReg { rd, rn, rm } => {
                let addr = self.reg(rn).wrapping_add(self.reg(rm));
                self.thumb_store(Width::Byte, rd, addr, mem)?;
            }
            T::LdrsbReg { rd, rn, rm } => {
                let addr = self.reg(rn).wrapping_add(self.reg(rm));
                self.thumb_load(Load::SignedByte, rd, addr, mem)?;
            }
            T::LdrReg { rd, rn, rm } => {
                let addr = self.reg(rn).wrapping_add(self.reg(rm));
                self.thumb_load(Load::Word, rd, addr, mem)?;
            }
            T::LdrhReg { rd, rn, rm } => {
                let addr = self.reg(rn).wrapping_add(self.reg(rm));
                self.thumb_load(Load::Half, rd, addr, mem)?;
            }
            T::LdrbReg { rd, rn, rm } => {
                let addr = self.reg(rn).wrapping_add(self.reg(rm));
                self.thumb_load(Load::Byte, rd, addr, mem)?;
            }
            T::LdrshReg { rd, rn, rm } => {
                let addr = self.reg(rn).wrapping_add(self.reg(rm));
                self.thumb_load(Load::SignedHalf, rd, addr, mem)?;
            }
            T::StrImm { rd, rn, imm } => {
                let addr = self.reg(rn).wrapping_add(imm);
                self.thumb_store(Width::Word, rd, addr, mem)?;
            }
            T::LdrImm { rd, rn, imm } => {
                let addr = self.reg(rn).wrapping_add(imm);
                self.thumb_load(Load::Word, rd, addr, mem)?;
            }
            T::StrbImm { rd, rn, imm } => {
                let addr = self.reg(rn).wrapping_add(imm);
                self.thumb_store(Width::Byte, rd, addr, mem)?;
            }
            T::LdrbImm { rd, rn, imm } => {
                let addr = self.reg(rn).wrapping_add(imm);
                self.thumb_load(Load::Byte, rd, addr, mem)?;
            }
            T::StrhImm { rd, rn, imm } => {
                let addr = self.reg(rn).wrapping_add(imm);
                self.thumb_store(Width::Half, rd, addr, mem)?;
            }
            T::LdrhImm { rd, rn, imm } => {
                let addr = self.reg(rn).wrapping_add(imm);
                self.thumb_load(Load::Half, rd, addr, mem)?;
            }
            T::StrSp { rd, imm } => {
                let addr = self.regs.read(SP).wrapping_add(imm);
                self.thumb_store(Width::Word, rd, addr, mem)?;
            }
            T::LdrSp { rd, imm } => {
                let addr = self.regs.read(SP).wrapping_add(imm);
                self.thumb_load(Load::Word, rd, addr, mem)?;
            }

            T::Adr { rd, imm } => {
                let value = (self.pc() & !3).wrapping_add(imm);
                self.set_reg(rd, value);
            }
            T::AddSpReg { rd, imm } => {
                let value = self.regs.read(SP).wrapping_add(imm);
                self.set_reg(rd, value);
            }
            T::AddSp { imm } => {
                let sp = self.regs.read(SP).wrapping_add(imm);
                self.regs.write(SP, sp);
            }
            T::SubSp { imm } => {
                let sp = self.regs.read(SP).wrapping_sub(imm);
                self.regs.write(SP, sp);
            }

            T::Push { registers, m } => self.push(registers, m, mem)?,
            T::Pop { registers, p } => self.pop(registers, p, mem)?,
            T::Stm { rn, registers } => {
                self.charge(mem.wait(self.pc()));
                let base = self.reg(rn);
                let count = registers.count_ones();
                let end = base.wrapping_add(count * 4);
                let first = registers.trailing_zeros() as u8;
                let mut addr = base;
                for reg in 0..8u8 {
                    if registers & (1 << reg) == 0 {
                        continue;
                    }
                    // A base that is not the lowest register stores its
                    // written-back value.
                    let value = if reg == rn && reg != first {
                        end
                    } else {
                        self.reg(reg)
                    };
                    mem.store32(addr, value)?;
                    addr = addr.wrapping_add(4);
                }
                self.charge(mem.wait_multiple32(base, count));
                self.set_reg(rn, end);
            }
            T::Ldm { rn, registers } => {
                let base = self.reg(rn);
                let mut addr = base;
                for reg in 0..8u8 {
                    if registers & (1 << reg) != 0 {
                        let value = mem.load32(addr)?;
                        self.set_reg(reg, value);
                        addr = addr.wrapping_add(4);
                    }
                }
                self.charge(mem.wait_multiple32(base, registers.count_ones()));
                if registers & (1 << rn) == 0 {
                    self.set_reg(rn, addr);
                }
            }

            T::BranchCond { cond, offset } => {
                if self.check_condition(cond) {
                    let target = self.pc().wrapping_add(offset as u32);
                    self.regs.write(PC, target);
                }
            }
            T::Swi { comment } => {
                irq.software_interrupt(self, mem, comment)?;
                self.prefetch16(mem);
            }
            T::Branch { offset } => {
                let target = self.pc().wrapping_add(offset as u32);
                self.regs.write(PC, target);
            }
            T::BlPrefix { offset } => {
                let partial = self.pc().wrapping_add(offset as u32);
                self.regs.write(LR, partial);
            }
            T::BlSuffix { offset } => {
                let pc = self.pc();
                let target = self.regs.read(LR).wrapping_add(offset);
                self.regs.write(PC, target);
                self.regs.write(LR, pc.wrapping_sub(1));
            }

            T::Unknown(opcode) => {
                return Err(SimulationError::IllegalInstruction {
                    address,
                    opcode: opcode as u32,
                    thumb: true,
                })
            }
        }
        Ok(())
    }

    fn thumb_logical(&mut self, rd: u8, result: u32) {
        self.regs.flags.set_nz(result);
        self.set_reg(rd, result);
    }

    fn push(&mut self, registers: u8, lr: bool, mem: &mut dyn Memory) -> SimResult<()> {
        let mut addr = self.regs.read(SP).wrapping_sub(4);
        let mut count = 0;
        if lr {
            mem.store32(addr, self.regs.read(LR))?;
            addr = addr.wrapping_sub(4);
            count += 1;
        }
        for reg in (0..8u8).rev() {
            if registers & (1 << reg) != 0 {
                mem.store32(addr, self.reg(reg))?;
                addr = addr.wrapping_sub(4);
                count += 1;
            }
        }
        let sp = addr.wrapping_add(4);
        self.charge(mem.wait_multiple32(sp, count));
        self.regs.write(SP, sp);
        Ok(())
    }

    fn pop(&mut self, registers: u8, pc: bool, mem: &mut dyn Memory) -> SimResult<()> {
        self.cycles += 1;
        let start = self.regs.read(SP);
        let mut addr = start;
        let mut count = 0;
        for reg in 0..8u8 {
            if registers & (1 << reg) != 0 {
                self.charge(mem.wait_seq32(addr));
                let value = mem.load32(addr)?;
                self.set_reg(reg, value);
                addr = addr.wrapping_add(4);
                count += 1;
            }
        }
        if pc {
            let target = mem.load32(addr)? & !1;
            self.regs.write(PC, target);
            addr = addr.wrapping_add(4);
            count += 1;
        }
        self.charge(mem.wait_multiple32(start, count));
        self.regs.write(SP, addr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SystemBus;
    use crate::cpu::registers::Mode;
    use crate::decoder::decode_thumb;
    use crate::interrupt::InterruptLines;

    const IWRAM: u32 = 0x0300_0000;

    struct Rig {
        core: ArmCore,
        bus: SystemBus,
        irq: InterruptLines,
    }

    impl Rig {
        fn new() -> Self {
            let mut core = ArmCore::new();
            core.regs.switch_exec_state(ExecState::Thumb);
            Self {
                core,
                bus: SystemBus::new(),
                irq: InterruptLines::new(),
            }
        }

        /// Executes `opcode` as if it sat at `addr`.
        fn exec_at(&mut self, addr: u32, opcode: u16) -> SimResult<()> {
            self.core.regs.write(PC, addr + 4);
            self.core.condition_passed = true;
            self.core
                .execute_thumb(decode_thumb(opcode), addr, &mut self.bus, &mut self.irq)
        }

        fn exec(&mut self, opcode: u16) -> SimResult<()> {
            self.exec_at(IWRAM, opcode)
        }
    }

    #[test]
    fn test_mov_and_add_immediate_set_flags() {
        let mut rig = Rig::new();
        rig.exec(0x2000).unwrap(); // MOVS r0, #0
        assert!(rig.core.regs.flags.z);
        rig.exec(0x30FF).unwrap(); // ADDS r0, #255
        assert_eq!(rig.core.reg(0), 255);
        assert!(!rig.core.regs.flags.z);
        rig.exec(0x28FF).unwrap(); // CMP r0, #255
        assert!(rig.core.regs.flags.z && rig.core.regs.flags.c);
    }

    #[test]
    fn test_shift_immediate_carry() {
        let mut rig = Rig::new();
        rig.core.set_reg(1, 0x8000_0001);
        rig.exec(0x0048).unwrap(); // LSLS r0, r1, #1
        assert_eq!(rig.core.reg(0), 2);
        assert!(rig.core.regs.flags.c);
        rig.exec(0x0808).unwrap(); // LSRS r0, r1, #32
        assert_eq!(rig.core.reg(0), 0);
        assert!(rig.core.regs.flags.c && rig.core.regs.flags.z);
        rig.exec(0x1008).unwrap(); // ASRS r0, r1, #32
        assert_eq!(rig.core.reg(0), 0xFFFF_FFFF);
    }

    #[test]
    fn test_register_shift_costs_extra_cycle() {
        let mut rig = Rig::new();
        rig.core.set_reg(0, 1);
        rig.core.set_reg(1, 4);
        rig.exec(0x4088).unwrap(); // LSLS r0, r1
        assert_eq!(rig.core.reg(0), 16);
        assert_eq!(rig.core.cycles, 2);
    }

    #[test]
    fn test_neg_and_mul() {
        let mut rig = Rig::new();
        rig.core.set_reg(1, 5);
        rig.exec(0x4248).unwrap(); // NEGS r0, r1
        assert_eq!(rig.core.reg(0) as i32, -5);
        assert!(rig.core.regs.flags.n && !rig.core.regs.flags.c);

        rig.exec(0x4348).unwrap(); // MULS r0, r1
        assert_eq!(rig.core.reg(0) as i32, -25);
    }

    #[test]
    fn test_high_register_add_reads_pc() {
        let mut rig = Rig::new();
        rig.core.set_reg(8, 0x10);
        rig.exec(0x4478).unwrap(); // ADD r0, pc
        assert_eq!(rig.core.reg(0), IWRAM + 4);
        rig.exec(0x4440).unwrap(); // ADD r0, r8
        assert_eq!(rig.core.reg(0), IWRAM + 0x14);
    }

    #[test]
    fn test_bx_to_arm() {
        let mut rig = Rig::new();
        rig.core.set_reg(14, 0x0800_0100);
        rig.exec(0x4770).unwrap(); // BX lr
        assert_eq!(rig.core.regs.exec_state, ExecState::Arm);
        assert_eq!(rig.core.pc(), 0x0800_0100);
    }

    #[test]
    fn test_bx_pc_word_aligns() {
        let mut rig = Rig::new();
        rig.exec_at(IWRAM + 2, 0x4778).unwrap(); // BX pc
        assert_eq!(rig.core.regs.exec_state, ExecState::Arm);
        assert_eq!(rig.core.pc(), IWRAM + 4);
    }

    #[test]
    fn test_pc_relative_load_aligns() {
        let mut rig = Rig::new();
        rig.bus.store32(IWRAM + 0x8, 0xCAFE_BABE).unwrap();
        rig.exec_at(IWRAM + 2, 0x4801).unwrap(); // LDR r0, [pc, #4]
        assert_eq!(rig.core.reg(0), 0xCAFE_BABE);
    }

    #[test]
    fn test_load_store_forms() {
        let mut rig = Rig::new();
        rig.core.set_reg(1, IWRAM + 0x100);
        rig.core.set_reg(2, 4);
        rig.core.set_reg(0, 0xFFFF_8180);
        rig.exec(0x5088).unwrap(); // STR r0, [r1, r2]
        rig.exec(0x7048).unwrap(); // STRB r0, [r1, #1]
        assert_eq!(rig.bus.load32(IWRAM + 0x104).unwrap(), 0xFFFF_8180);
        assert_eq!(rig.bus.load_u8(IWRAM + 0x101).unwrap(), 0x80);

        rig.exec(0x5E88).unwrap(); // LDRSH r0, [r1, r2]
        assert_eq!(rig.core.reg(0), 0xFFFF_8180);
        rig.exec(0x5A88).unwrap(); // LDRH r0, [r1, r2]
        assert_eq!(rig.core.reg(0), 0x8180);
        rig.exec(0x5688).unwrap(); // LDRSB r0, [r1, r2]
        assert_eq!(rig.core.reg(0), 0xFFFF_FF80);
        rig.exec(0x6848).unwrap(); // LDR r0, [r1, #4]
        assert_eq!(rig.core.reg(0), 0xFFFF_8180);
    }

    #[test]
    fn test_push_pop_round_trip() {
        let mut rig = Rig::new();
        rig.core.regs.write(SP, IWRAM + 0x7F00);
        rig.core.set_reg(4, 0x44);
        rig.core.set_reg(5, 0x55);
        rig.core.regs.write(LR, 0x0800_0201);
        rig.exec(0xB530).unwrap(); // PUSH {r4, r5, lr}
        assert_eq!(rig.core.regs.read(SP), IWRAM + 0x7EF4);
        assert_eq!(rig.bus.load32(IWRAM + 0x7EF4).unwrap(), 0x44);
        assert_eq!(rig.bus.load32(IWRAM + 0x7EFC).unwrap(), 0x0800_0201);

        rig.core.set_reg(4, 0);
        rig.core.set_reg(5, 0);
        rig.exec(0xBD30).unwrap(); // POP {r4, r5, pc}
        assert_eq!(rig.core.reg(4), 0x44);
        assert_eq!(rig.core.reg(5), 0x55);
        assert_eq!(rig.core.pc(), 0x0800_0200);
        assert_eq!(rig.core.regs.read(SP), IWRAM + 0x7F00);
    }

    #[test]
    fn test_stmia_with_base_in_list() {
        let mut rig = Rig::new();
        rig.core.set_reg(0, 0xAA);
        rig.core.set_reg(1, IWRAM + 0x200);
        rig.exec(0xC103).unwrap(); // STMIA r1!, {r0, r1}
        assert_eq!(rig.bus.load32(IWRAM + 0x200).unwrap(), 0xAA);
        assert_eq!(rig.bus.load32(IWRAM + 0x204).unwrap(), IWRAM + 0x208);
        assert_eq!(rig.core.reg(1), IWRAM + 0x208);

        rig.core.set_reg(1, IWRAM + 0x300);
        rig.exec(0xC106).unwrap(); // STMIA r1!, {r1, r2}
        assert_eq!(rig.bus.load32(IWRAM + 0x300).unwrap(), IWRAM + 0x300);
    }

    #[test]
    fn test_ldmia_base_in_list_keeps_loaded_value() {
        let mut rig = Rig::new();
        rig.bus.store32(IWRAM + 0x400, 7).unwrap();
        rig.bus.store32(IWRAM + 0x404, 9).unwrap();
        rig.core.set_reg(0, IWRAM + 0x400);
        rig.exec(0xC803).unwrap(); // LDMIA r0!, {r0, r1}
        assert_eq!(rig.core.reg(0), 7);
        assert_eq!(rig.core.reg(1), 9);

        rig.core.set_reg(2, IWRAM + 0x400);
        rig.exec(0xCA01).unwrap(); // LDMIA r2!, {r0}
        assert_eq!(rig.core.reg(2), IWRAM + 0x404);
    }

    #[test]
    fn test_conditional_branch() {
        let mut rig = Rig::new();
        rig.core.regs.flags.z = true;
        rig.exec(0xD0FE).unwrap(); // BEQ .
        assert_eq!(rig.core.pc(), IWRAM);
        assert!(rig.core.condition_passed);

        rig.core.regs.flags.z = false;
        rig.exec(0xD0FE).unwrap();
        assert_eq!(rig.core.pc(), IWRAM + 4);
        assert!(!rig.core.condition_passed);
    }

    #[test]
    fn test_long_branch_with_link() {
        let mut rig = Rig::new();
        rig.exec_at(0x0800_0000, 0xF000).unwrap(); // BL prefix, high offset 0
        rig.exec_at(0x0800_0002, 0xF840).unwrap(); // BL suffix, +0x80
        assert_eq!(rig.core.pc(), 0x0800_0084);
        assert_eq!(rig.core.reg(14), 0x0800_0005);
    }

    #[test]
    fn test_sp_adjust_and_address_generation() {
        let mut rig = Rig::new();
        rig.core.regs.write(SP, 0x0300_7F00);
        rig.exec(0xB082).unwrap(); // SUB sp, #8
        assert_eq!(rig.core.regs.read(SP), 0x0300_7EF8);
        rig.exec(0xA901).unwrap(); // ADD r1, sp, #4
        assert_eq!(rig.core.reg(1), 0x0300_7EFC);
        rig.exec_at(IWRAM + 2, 0xA001).unwrap(); // ADR r0, #4
        assert_eq!(rig.core.reg(0), IWRAM + 8);
    }

    #[test]
    fn test_swi_enters_arm_supervisor() {
        let mut rig = Rig::new();
        rig.exec_at(0x0800_0010, 0xDF05).unwrap(); // SWI 5
        assert_eq!(rig.core.regs.mode, Mode::Supervisor);
        assert_eq!(rig.core.regs.exec_state, ExecState::Arm);
        assert_eq!(rig.core.reg(14), 0x0800_0012);
        assert_ne!(rig.core.regs.spsr & 0x20, 0);
        // Fetch charged at the BIOS vector, not at the ROM slot.
        assert_eq!(rig.core.cycles, 1);
    }

    #[test]
    fn test_unknown_thumb_opcode_is_fatal() {
        let mut rig = Rig::new();
        assert!(matches!(
            rig.exec(0xDE00),
            Err(SimulationError::IllegalInstruction {
                opcode: 0xDE00,
                thumb: true,
                ..
            })
        ));
    }
}

// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::cpu::addressing::{BlockAddress, Indexing, Offset, SingleAddress};
use crate::cpu::condition::Condition;
use crate::cpu::shifter::{ShiftKind, ShifterOperand};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AluOp {
    And,
    Eor,
    Sub,
    Rsb,
    Add,
    Adc,
    Sbc,
    Rsc,
    Tst,
    Teq,
    Cmp,
    Cmn,
    Orr,
    Mov,
    Bic,
    Mvn,
}

impl AluOp {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0xF {
            0x0 => AluOp::And,
            0x1 => AluOp::Eor,
            0x2 => AluOp::Sub,
            0x3 => AluOp::Rsb,
            0x4 => AluOp::Add,
            0x5 => AluOp::Adc,
            0x6 => AluOp::Sbc,
            0x7 => AluOp::Rsc,
            0x8 => AluOp::Tst,
            0x9 => AluOp::Teq,
            0xA => AluOp::Cmp,
            0xB => AluOp::Cmn,
            0xC => AluOp::Orr,
            0xD => AluOp::Mov,
            0xE => AluOp::Bic,
            _ => AluOp::Mvn,
        }
    }

    /// TST, TEQ, CMP and CMN only update flags.
    pub fn is_test(self) -> bool {
        matches!(self, AluOp::Tst | AluOp::Teq | AluOp::Cmp | AluOp::Cmn)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MsrOperand {
    Register(u8),
    Immediate(u32),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum HalfwordOp {
    Store,  // STRH
    Load,   // LDRH
    LoadSb, // LDRSB
    LoadSh, // LDRSH
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ArmOp {
    DataProcessing {
        op: AluOp,
        set_flags: bool,
        rd: u8,
        rn: u8,
        operand: ShifterOperand,
    },
    Mrs {
        rd: u8,
        spsr: bool,
    },
    Msr {
        spsr: bool,
        mask: u32,
        operand: MsrOperand,
    },
    Multiply {
        accumulate: bool,
        set_flags: bool,
        rd: u8,
        rn: u8,
        rs: u8,
        rm: u8,
    },
    MultiplyLong {
        signed: bool,
        accumulate: bool,
        set_flags: bool,
        rd_hi: u8,
        rd_lo: u8,
        rs: u8,
        rm: u8,
    },
    Swap {
        byte: bool,
        rd: u8,
        rn: u8,
        rm: u8,
    },
    TransferHalf {
        op: HalfwordOp,
        rd: u8,
        address: SingleAddress,
    },
    Transfer {
        load: bool,
        byte: bool,
        rd: u8,
        address: SingleAddress,
    },
    TransferMultiple {
        load: bool,
        user_bank: bool,
        registers: u16,
        address: BlockAddress,
    },
    Branch {
        link: bool,
        offset: i32,
    },
    Bx {
        rm: u8,
    },
    Swi {
        comment: u32,
    },
    Unknown(u32),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ArmInstruction {
    pub cond: Condition,
    pub op: ArmOp,
}

impl ArmInstruction {
    pub fn writes_pc(&self) -> bool {
        match self.op {
            ArmOp::DataProcessing { op, rd, .. } => rd == 15 && !op.is_test(),
            ArmOp::Mrs { rd, .. } => rd == 15,
            ArmOp::Msr { .. } | ArmOp::Swi { .. } => false,
            ArmOp::Multiply { rd, .. } => rd == 15,
            ArmOp::MultiplyLong { rd_hi, rd_lo, .. } => rd_hi == 15 || rd_lo == 15,
            ArmOp::Swap { rd, .. } => rd == 15,
            ArmOp::TransferHalf { op, rd, address } => {
                (rd == 15 && op != HalfwordOp::Store) || address.writes_pc()
            }
            ArmOp::Transfer { load, rd, address, .. } => (load && rd == 15) || address.writes_pc(),
            ArmOp::TransferMultiple {
                load,
                registers,
                address,
                ..
            } => (load && registers & 0x8000 != 0) || address.writes_pc(),
            ArmOp::Branch { .. } | ArmOp::Bx { .. } | ArmOp::Unknown(_) => true,
        }
    }

    /// Branches whose target is known once decoded.
    pub fn is_fixed_jump(&self) -> bool {
        matches!(self.op, ArmOp::Branch { .. })
    }
}

#[inline]
fn reg(opcode: u32, shift: u32) -> u8 {
    ((opcode >> shift) & 0xF) as u8
}

/// Decodes a 32-bit ARM instruction
pub fn decode_arm(opcode: u32) -> ArmInstruction {
    ArmInstruction {
        cond: Condition::from_bits(opcode >> 28),
        op: decode_op(opcode),
    }
}

fn decode_op(opcode: u32) -> ArmOp {
    // BX: cccc 0001 0010 1111 1111 1111 0001 mmmm
    if (opcode & 0x0FFF_FFF0) == 0x012F_FF10 {
        return ArmOp::Bx { rm: reg(opcode, 0) };
    }

    // Data processing and PSR transfer: cccc 00I ...
    let immediate = (opcode & 0x0200_0000) != 0;
    if (opcode & 0x0C00_0000) == 0 && (immediate || (opcode & 0x90) != 0x90) {
        return decode_data_processing(opcode);
    }

    // SWP/SWPB: cccc 0001 0B00 nnnn dddd 0000 1001 mmmm
    if (opcode & 0x0FB0_0FF0) == 0x0100_0090 {
        return ArmOp::Swap {
            byte: (opcode & 0x0040_0000) != 0,
            rd: reg(opcode, 12),
            rn: reg(opcode, 16),
            rm: reg(opcode, 0),
        };
    }

    match opcode & 0x0E00_0000 {
        0x0000_0000 => {
            if (opcode & 0x0100_00F0) == 0x0000_0090 {
                decode_multiply(opcode)
            } else {
                decode_halfword(opcode)
            }
        }
        0x0400_0000 | 0x0600_0000 => decode_transfer(opcode),
        0x0800_0000 => decode_block(opcode),
        0x0A00_0000 => ArmOp::Branch {
            link: (opcode & 0x0100_0000) != 0,
            offset: (((opcode & 0x00FF_FFFF) << 8) as i32) >> 6,
        },
        0x0E00_0000 if (opcode & 0x0F00_0000) == 0x0F00_0000 => ArmOp::Swi {
            comment: opcode & 0x00FF_FFFF,
        },
        // Coprocessor space
        _ => ArmOp::Unknown(opcode),
    }
}

fn decode_data_processing(opcode: u32) -> ArmOp {
    let op = AluOp::from_bits(opcode >> 21);
    let set_flags = (opcode & 0x0010_0000) != 0;

    // TST/TEQ/CMP/CMN without S encode the PSR transfers.
    if op.is_test() && !set_flags {
        let spsr = (opcode & 0x0040_0000) != 0;
        if (opcode & 0x00B0_F000) == 0x0020_F000 {
            let mut mask = 0;
            if (opcode & 0x0001_0000) != 0 {
                mask |= 0x0000_00FF;
            }
            if (opcode & 0x0008_0000) != 0 {
                mask |= 0xFF00_0000;
            }
            let operand = if (opcode & 0x0200_0000) != 0 {
                let rotate = (opcode & 0xF00) >> 7;
                MsrOperand::Immediate((opcode & 0xFF).rotate_right(rotate))
            } else {
                MsrOperand::Register(reg(opcode, 0))
            };
            return ArmOp::Msr {
                spsr,
                mask,
                operand,
            };
        }
        if (opcode & 0x00BF_0000) == 0x000F_0000 {
            return ArmOp::Mrs {
                rd: reg(opcode, 12),
                spsr,
            };
        }
        return ArmOp::Unknown(opcode);
    }

    ArmOp::DataProcessing {
        op,
        set_flags,
        rd: reg(opcode, 12),
        rn: reg(opcode, 16),
        operand: decode_shifter_operand(opcode),
    }
}

/// Addressing mode 1 operand.
pub fn decode_shifter_operand(opcode: u32) -> ShifterOperand {
    if (opcode & 0x0200_0000) != 0 {
        let imm = opcode & 0xFF;
        let rotate = (opcode & 0xF00) >> 7;
        if rotate == 0 {
            ShifterOperand::Immediate(imm)
        } else {
            ShifterOperand::RotatedImmediate(imm.rotate_right(rotate))
        }
    } else {
        let kind = ShiftKind::from_bits(opcode >> 5);
        let rm = reg(opcode, 0);
        if (opcode & 0x10) != 0 {
            ShifterOperand::ShiftRegister {
                kind,
                rm,
                rs: reg(opcode, 8),
            }
        } else {
            ShifterOperand::ShiftImmediate {
                kind,
                rm,
                amount: ((opcode >> 7) & 0x1F) as u8,
            }
        }
    }
}

fn decode_multiply(opcode: u32) -> ArmOp {
    let set_flags = (opcode & 0x0010_0000) != 0;
    let rs = reg(opcode, 8);
    let rm = reg(opcode, 0);
    match (opcode >> 21) & 0x7 {
        0 | 1 => ArmOp::Multiply {
            accumulate: (opcode & 0x0020_0000) != 0,
            set_flags,
            rd: reg(opcode, 16),
            rn: reg(opcode, 12),
            rs,
            rm,
        },
        4..=7 => ArmOp::MultiplyLong {
            signed: (opcode & 0x0040_0000) != 0,
            accumulate: (opcode & 0x0020_0000) != 0,
            set_flags,
            rd_hi: reg(opcode, 16),
            rd_lo: reg(opcode, 12),
            rs,
            rm,
        },
        _ => ArmOp::Unknown(opcode),
    }
}

fn indexing(opcode: u32) -> Indexing {
    let pre = (opcode & 0x0100_0000) != 0;
    let writeback = (opcode & 0x0020_0000) != 0;
    match (pre, writeback) {
        (false, _) => Indexing::Post,
        (true, false) => Indexing::Pre,
        (true, true) => Indexing::PreWriteback,
    }
}

fn decode_halfword(opcode: u32) -> ArmOp {
    let load = (opcode & 0x0010_0000) != 0;
    let signed = (opcode & 0x40) != 0;
    let half = (opcode & 0x20) != 0;
    let op = match (load, signed, half) {
        (false, false, true) => HalfwordOp::Store,
        (true, false, true) => HalfwordOp::Load,
        (true, true, false) => HalfwordOp::LoadSb,
        (true, true, true) => HalfwordOp::LoadSh,
        _ => return ArmOp::Unknown(opcode),
    };

    // Post-indexed with W set has no meaning in mode 3.
    if (opcode & 0x0120_0000) == 0x0020_0000 {
        return ArmOp::Unknown(opcode);
    }

    let offset = if (opcode & 0x0040_0000) != 0 {
        Offset::Immediate(((opcode & 0xF00) >> 4) | (opcode & 0xF))
    } else {
        Offset::Register(reg(opcode, 0))
    };

    ArmOp::TransferHalf {
        op,
        rd: reg(opcode, 12),
        address: SingleAddress {
            rn: reg(opcode, 16),
            offset,
            up: (opcode & 0x0080_0000) != 0,
            indexing: indexing(opcode),
        },
    }
}

fn decode_transfer(opcode: u32) -> ArmOp {
    let register_offset = (opcode & 0x0200_0000) != 0;
    if register_offset && (opcode & 0x10) != 0 {
        return ArmOp::Unknown(opcode);
    }

    let offset = if register_offset {
        let kind = ShiftKind::from_bits(opcode >> 5);
        let amount = ((opcode >> 7) & 0x1F) as u8;
        let rm = reg(opcode, 0);
        if kind == ShiftKind::Lsl && amount == 0 {
            Offset::Register(rm)
        } else {
            Offset::Shifted(ShifterOperand::ShiftImmediate { kind, rm, amount })
        }
    } else {
        Offset::Immediate(opcode & 0xFFF)
    };

    ArmOp::Transfer {
        load: (opcode & 0x0010_0000) != 0,
        byte: (opcode & 0x0040_0000) != 0,
        rd: reg(opcode, 12),
        address: SingleAddress {
            rn: reg(opcode, 16),
            offset,
            up: (opcode & 0x0080_0000) != 0,
            indexing: indexing(opcode),
        },
    }
}

fn decode_block(opcode: u32) -> ArmOp {
    let load = (opcode & 0x0010_0000) != 0;
    let (address, registers) = BlockAddress::new(
        reg(opcode, 16),
        (opcode & 0xFFFF) as u16,
        (opcode & 0x0100_0000) != 0,
        (opcode & 0x0080_0000) != 0,
        (opcode & 0x0020_0000) != 0,
        !load,
    );
    ArmOp::TransferMultiple {
        load,
        user_bank: (opcode & 0x0040_0000) != 0,
        registers,
        address,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_mov_immediate() {
        // MOV r0, #1
        let instr = decode_arm(0xE3A0_0001);
        assert_eq!(instr.cond, Condition::Al);
        assert_eq!(
            instr.op,
            ArmOp::DataProcessing {
                op: AluOp::Mov,
                set_flags: false,
                rd: 0,
                rn: 0,
                operand: ShifterOperand::Immediate(1),
            }
        );
        assert!(!instr.writes_pc());
    }

    #[test]
    fn test_decode_rotated_immediate() {
        // MOV r0, #0x04000000
        let instr = decode_arm(0xE3A0_0301);
        assert!(matches!(
            instr.op,
            ArmOp::DataProcessing {
                operand: ShifterOperand::RotatedImmediate(0x0400_0000),
                ..
            }
        ));
    }

    #[test]
    fn test_decode_branch_with_link() {
        let instr = decode_arm(0xEB00_003E);
        assert_eq!(
            instr.op,
            ArmOp::Branch {
                link: true,
                offset: 0xF8
            }
        );
        assert!(instr.writes_pc());
        assert!(instr.is_fixed_jump());

        // B . (offset -8)
        assert_eq!(
            decode_arm(0xEAFF_FFFE).op,
            ArmOp::Branch {
                link: false,
                offset: -8
            }
        );
    }

    #[test]
    fn test_decode_psr_transfers() {
        // MRS r0, CPSR
        assert_eq!(
            decode_arm(0xE10F_0000).op,
            ArmOp::Mrs { rd: 0, spsr: false }
        );
        // MSR CPSR_c, r0
        assert_eq!(
            decode_arm(0xE121_F000).op,
            ArmOp::Msr {
                spsr: false,
                mask: 0xFF,
                operand: MsrOperand::Register(0)
            }
        );
        // MSR SPSR_f, #0xF0000000
        assert_eq!(
            decode_arm(0xE368_F20F).op,
            ArmOp::Msr {
                spsr: true,
                mask: 0xFF00_0000,
                operand: MsrOperand::Immediate(0xF000_0000)
            }
        );
    }

    #[test]
    fn test_decode_bx_and_swi() {
        let bx = decode_arm(0xE12F_FF1E);
        assert_eq!(bx.op, ArmOp::Bx { rm: 14 });
        assert!(bx.writes_pc());
        assert!(!bx.is_fixed_jump());

        let swi = decode_arm(0xEF06_0000);
        assert_eq!(swi.op, ArmOp::Swi { comment: 0x06_0000 });
        assert!(!swi.writes_pc());
    }

    #[test]
    fn test_decode_multiply_family() {
        // MUL r0, r1, r2
        assert_eq!(
            decode_arm(0xE000_0291).op,
            ArmOp::Multiply {
                accumulate: false,
                set_flags: false,
                rd: 0,
                rn: 0,
                rs: 2,
                rm: 1
            }
        );
        // UMULL r0, r1, r2, r3
        assert_eq!(
            decode_arm(0xE081_0392).op,
            ArmOp::MultiplyLong {
                signed: false,
                accumulate: false,
                set_flags: false,
                rd_hi: 1,
                rd_lo: 0,
                rs: 3,
                rm: 2
            }
        );
        // SWP r0, r1, [r2]
        assert_eq!(
            decode_arm(0xE102_0091).op,
            ArmOp::Swap {
                byte: false,
                rd: 0,
                rn: 2,
                rm: 1
            }
        );
    }

    #[test]
    fn test_decode_transfers() {
        // LDR r0, [r1, #4]!
        let ldr = decode_arm(0xE5B1_0004);
        assert_eq!(
            ldr.op,
            ArmOp::Transfer {
                load: true,
                byte: false,
                rd: 0,
                address: SingleAddress {
                    rn: 1,
                    offset: Offset::Immediate(4),
                    up: true,
                    indexing: Indexing::PreWriteback,
                }
            }
        );
        // LDRH r0, [r1, #0x12]
        assert!(matches!(
            decode_arm(0xE1D1_01B2).op,
            ArmOp::TransferHalf {
                op: HalfwordOp::Load,
                address: SingleAddress {
                    offset: Offset::Immediate(0x12),
                    indexing: Indexing::Pre,
                    ..
                },
                ..
            }
        ));
        // Register-shifted offsets are undefined in mode 2.
        assert_eq!(decode_arm(0xE791_0012).op, ArmOp::Unknown(0xE791_0012));
    }

    #[test]
    fn test_decode_block_transfers() {
        // LDMIA sp!, {r0-r3, pc}
        let ldm = decode_arm(0xE8BD_800F);
        assert!(ldm.writes_pc());
        // STMDB sp!, {r4, lr}
        let stm = decode_arm(0xE92D_4010);
        assert!(!stm.writes_pc());
        assert!(matches!(
            stm.op,
            ArmOp::TransferMultiple {
                load: false,
                registers: 0x4010,
                ..
            }
        ));
    }
}

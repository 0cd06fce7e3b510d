// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::cpu::condition::Condition;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ThumbInstruction {
    // Shift by immediate
    Lsl { rd: u8, rm: u8, imm: u8 }, // LSL Rd, Rm, #imm5
    Lsr { rd: u8, rm: u8, imm: u8 }, // LSR Rd, Rm, #imm5 (0 = 32)
    Asr { rd: u8, rm: u8, imm: u8 }, // ASR Rd, Rm, #imm5 (0 = 32)

    // Add/subtract
    AddReg { rd: u8, rn: u8, rm: u8 },  // ADD Rd, Rn, Rm
    SubReg { rd: u8, rn: u8, rm: u8 },  // SUB Rd, Rn, Rm
    AddImm3 { rd: u8, rn: u8, imm: u8 }, // ADD Rd, Rn, #imm3
    SubImm3 { rd: u8, rn: u8, imm: u8 }, // SUB Rd, Rn, #imm3
    MovLow { rd: u8, rn: u8 },          // MOV Rd, Rn (ADD #0)

    // Immediate
    MovImm { rd: u8, imm: u8 },  // MOV Rd, #imm8
    CmpImm { rn: u8, imm: u8 },  // CMP Rn, #imm8
    AddImm8 { rd: u8, imm: u8 }, // ADD Rd, #imm8
    SubImm8 { rd: u8, imm: u8 }, // SUB Rd, #imm8

    // Data processing, low registers
    And { rd: u8, rm: u8 },
    Eor { rd: u8, rm: u8 },
    LslReg { rd: u8, rs: u8 },
    LsrReg { rd: u8, rs: u8 },
    AsrReg { rd: u8, rs: u8 },
    Adc { rd: u8, rm: u8 },
    Sbc { rd: u8, rm: u8 },
    Ror { rd: u8, rs: u8 },
    Tst { rn: u8, rm: u8 },
    Neg { rd: u8, rm: u8 },
    CmpReg { rn: u8, rm: u8 },
    Cmn { rn: u8, rm: u8 },
    Orr { rd: u8, rm: u8 },
    Mul { rd: u8, rm: u8 },
    Bic { rd: u8, rm: u8 },
    Mvn { rd: u8, rm: u8 },

    // High registers
    AddRegHigh { rd: u8, rm: u8 },
    CmpRegHigh { rn: u8, rm: u8 },
    MovReg { rd: u8, rm: u8 },
    Bx { rm: u8 },

    // Memory
    LdrLit { rd: u8, imm: u32 }, // LDR Rd, [PC, #imm8*4]
    StrReg { rd: u8, rn: u8, rm: u8 },
    StrhReg { rd: u8, rn: u8, rm: u8 },
    StrbReg { rd: u8, rn: u8, rm: u8 },
    LdrsbReg { rd: u8, rn: u8, rm: u8 },
    LdrReg { rd: u8, rn: u8, rm: u8 },
    LdrhReg { rd: u8, rn: u8, rm: u8 },
    LdrbReg { rd: u8, rn: u8, rm: u8 },
    LdrshReg { rd: u8, rn: u8, rm: u8 },
    StrImm { rd: u8, rn: u8, imm: u32 },
    LdrImm { rd: u8, rn: u8, imm: u32 },
    StrbImm { rd: u8, rn: u8, imm: u32 },
    LdrbImm { rd: u8, rn: u8, imm: u32 },
    StrhImm { rd: u8, rn: u8, imm: u32 },
    LdrhImm { rd: u8, rn: u8, imm: u32 },
    StrSp { rd: u8, imm: u32 },
    LdrSp { rd: u8, imm: u32 },

    // Address generation
    Adr { rd: u8, imm: u32 },      // ADD Rd, PC, #imm8*4
    AddSpReg { rd: u8, imm: u32 }, // ADD Rd, SP, #imm8*4
    AddSp { imm: u32 },
    SubSp { imm: u32 },

    // Stack and multiple
    Push { registers: u8, m: bool }, // m: LR included
    Pop { registers: u8, p: bool },  // p: PC included
    Stm { rn: u8, registers: u8 },
    Ldm { rn: u8, registers: u8 },

    // Control flow
    BranchCond { cond: Condition, offset: i32 },
    Swi { comment: u8 },
    Branch { offset: i32 },
    BlPrefix { offset: i32 }, // LR = PC + (offset << 12)
    BlSuffix { offset: u32 }, // PC = LR + offset

    Unknown(u16),
}

impl ThumbInstruction {
    pub fn writes_pc(&self) -> bool {
        match *self {
            ThumbInstruction::AddRegHigh { rd, .. } | ThumbInstruction::MovReg { rd, .. } => {
                rd == 15
            }
            ThumbInstruction::Pop { p, .. } => p,
            ThumbInstruction::Bx { .. }
            | ThumbInstruction::BranchCond { .. }
            | ThumbInstruction::Branch { .. }
            | ThumbInstruction::BlSuffix { .. }
            | ThumbInstruction::Unknown(_) => true,
            _ => false,
        }
    }

    /// Branches whose target is known once decoded.
    pub fn is_fixed_jump(&self) -> bool {
        matches!(
            self,
            ThumbInstruction::BranchCond { .. } | ThumbInstruction::Branch { .. }
        )
    }
}

/// Decodes a 16-bit Thumb instruction
pub fn decode_thumb(opcode: u16) -> ThumbInstruction {
    let low3 = |shift: u16| ((opcode >> shift) & 0x7) as u8;

    // Data processing (register): 0100 00oo oomm mddd
    if (opcode & 0xFC00) == 0x4000 {
        let rm = low3(3);
        let rd = low3(0);
        return match (opcode >> 6) & 0xF {
            0x0 => ThumbInstruction::And { rd, rm },
            0x1 => ThumbInstruction::Eor { rd, rm },
            0x2 => ThumbInstruction::LslReg { rd, rs: rm },
            0x3 => ThumbInstruction::LsrReg { rd, rs: rm },
            0x4 => ThumbInstruction::AsrReg { rd, rs: rm },
            0x5 => ThumbInstruction::Adc { rd, rm },
            0x6 => ThumbInstruction::Sbc { rd, rm },
            0x7 => ThumbInstruction::Ror { rd, rs: rm },
            0x8 => ThumbInstruction::Tst { rn: rd, rm },
            0x9 => ThumbInstruction::Neg { rd, rm },
            0xA => ThumbInstruction::CmpReg { rn: rd, rm },
            0xB => ThumbInstruction::Cmn { rn: rd, rm },
            0xC => ThumbInstruction::Orr { rd, rm },
            0xD => ThumbInstruction::Mul { rd, rm },
            0xE => ThumbInstruction::Bic { rd, rm },
            _ => ThumbInstruction::Mvn { rd, rm },
        };
    }

    // High register operations / BX: 0100 01oo hHmm mddd
    if (opcode & 0xFC00) == 0x4400 {
        let rd = ((opcode & 0x7) | ((opcode & 0x80) >> 4)) as u8;
        let rm = ((opcode >> 3) & 0xF) as u8;
        return match (opcode >> 8) & 0x3 {
            0 => ThumbInstruction::AddRegHigh { rd, rm },
            1 => ThumbInstruction::CmpRegHigh { rn: rd, rm },
            2 => ThumbInstruction::MovReg { rd, rm },
            _ => ThumbInstruction::Bx { rm },
        };
    }

    // Add/subtract (register or imm3): 0001 1Iom mmnn nddd
    if (opcode & 0xF800) == 0x1800 {
        let rm_imm = low3(6);
        let rn = low3(3);
        let rd = low3(0);
        return match (opcode >> 9) & 0x3 {
            0 => ThumbInstruction::AddReg { rd, rn, rm: rm_imm },
            1 => ThumbInstruction::SubReg { rd, rn, rm: rm_imm },
            2 if rm_imm == 0 => ThumbInstruction::MovLow { rd, rn },
            2 => ThumbInstruction::AddImm3 { rd, rn, imm: rm_imm },
            _ => ThumbInstruction::SubImm3 { rd, rn, imm: rm_imm },
        };
    }

    // Shift by immediate: 000o oiii iimm mddd
    if (opcode & 0xE000) == 0x0000 {
        let imm = ((opcode >> 6) & 0x1F) as u8;
        let rm = low3(3);
        let rd = low3(0);
        return match (opcode >> 11) & 0x3 {
            0 => ThumbInstruction::Lsl { rd, rm, imm },
            1 => ThumbInstruction::Lsr { rd, rm, imm },
            _ => ThumbInstruction::Asr { rd, rm, imm },
        };
    }

    // Move/compare/add/subtract immediate: 001o oddd iiii iiii
    if (opcode & 0xE000) == 0x2000 {
        let rd = low3(8);
        let imm = (opcode & 0xFF) as u8;
        return match (opcode >> 11) & 0x3 {
            0 => ThumbInstruction::MovImm { rd, imm },
            1 => ThumbInstruction::CmpImm { rn: rd, imm },
            2 => ThumbInstruction::AddImm8 { rd, imm },
            _ => ThumbInstruction::SubImm8 { rd, imm },
        };
    }

    // PC-relative load: 0100 1ddd iiii iiii
    if (opcode & 0xF800) == 0x4800 {
        return ThumbInstruction::LdrLit {
            rd: low3(8),
            imm: ((opcode & 0xFF) as u32) << 2,
        };
    }

    // Load/store with register offset: 0101 ooom mmnn nddd
    if (opcode & 0xF000) == 0x5000 {
        let rm = low3(6);
        let rn = low3(3);
        let rd = low3(0);
        return match (opcode >> 9) & 0x7 {
            0 => ThumbInstruction::StrReg { rd, rn, rm },
            1 => ThumbInstruction::StrhReg { rd, rn, rm },
            2 => ThumbInstruction::StrbReg { rd, rn, rm },
            3 => ThumbInstruction::LdrsbReg { rd, rn, rm },
            4 => ThumbInstruction::LdrReg { rd, rn, rm },
            5 => ThumbInstruction::LdrhReg { rd, rn, rm },
            6 => ThumbInstruction::LdrbReg { rd, rn, rm },
            _ => ThumbInstruction::LdrshReg { rd, rn, rm },
        };
    }

    // Load/store word or byte with immediate offset: 011B Liii iinn nddd
    if (opcode & 0xE000) == 0x6000 {
        let imm5 = ((opcode >> 6) & 0x1F) as u32;
        let rn = low3(3);
        let rd = low3(0);
        let load = (opcode & 0x0800) != 0;
        return match ((opcode & 0x1000) != 0, load) {
            (false, false) => ThumbInstruction::StrImm { rd, rn, imm: imm5 << 2 },
            (false, true) => ThumbInstruction::LdrImm { rd, rn, imm: imm5 << 2 },
            (true, false) => ThumbInstruction::StrbImm { rd, rn, imm: imm5 },
            (true, true) => ThumbInstruction::LdrbImm { rd, rn, imm: imm5 },
        };
    }

    // PUSH: 1011 010M rrrr rrrr, POP: 1011 110P rrrr rrrr
    if (opcode & 0xF600) == 0xB400 {
        let registers = (opcode & 0xFF) as u8;
        let extra = (opcode & 0x0100) != 0;
        if (opcode & 0x0800) != 0 {
            return ThumbInstruction::Pop { registers, p: extra };
        }
        return ThumbInstruction::Push { registers, m: extra };
    }

    // Load/store halfword with immediate offset: 1000 Liii iinn nddd
    if (opcode & 0xF000) == 0x8000 {
        let imm = ((opcode >> 5) & 0x3E) as u32;
        let rn = low3(3);
        let rd = low3(0);
        if (opcode & 0x0800) != 0 {
            return ThumbInstruction::LdrhImm { rd, rn, imm };
        }
        return ThumbInstruction::StrhImm { rd, rn, imm };
    }

    // SP-relative load/store: 1001 Lddd iiii iiii
    if (opcode & 0xF000) == 0x9000 {
        let rd = low3(8);
        let imm = ((opcode & 0xFF) as u32) << 2;
        if (opcode & 0x0800) != 0 {
            return ThumbInstruction::LdrSp { rd, imm };
        }
        return ThumbInstruction::StrSp { rd, imm };
    }

    // Load address: 1010 Sddd iiii iiii
    if (opcode & 0xF000) == 0xA000 {
        let rd = low3(8);
        let imm = ((opcode & 0xFF) as u32) << 2;
        if (opcode & 0x0800) != 0 {
            return ThumbInstruction::AddSpReg { rd, imm };
        }
        return ThumbInstruction::Adr { rd, imm };
    }

    // Adjust stack pointer: 1011 0000 Siii iiii
    if (opcode & 0xFF00) == 0xB000 {
        let imm = ((opcode & 0x7F) as u32) << 2;
        if (opcode & 0x0080) != 0 {
            return ThumbInstruction::SubSp { imm };
        }
        return ThumbInstruction::AddSp { imm };
    }

    // Multiple load/store: 1100 Lnnn rrrr rrrr
    if (opcode & 0xF000) == 0xC000 {
        let rn = low3(8);
        let registers = (opcode & 0xFF) as u8;
        if (opcode & 0x0800) != 0 {
            return ThumbInstruction::Ldm { rn, registers };
        }
        return ThumbInstruction::Stm { rn, registers };
    }

    // Conditional branch / SWI: 1101 cccc iiii iiii
    if (opcode & 0xF000) == 0xD000 {
        let cond = ((opcode >> 8) & 0xF) as u32;
        return match cond {
            0xF => ThumbInstruction::Swi {
                comment: (opcode & 0xFF) as u8,
            },
            0xE => ThumbInstruction::Unknown(opcode),
            _ => ThumbInstruction::BranchCond {
                cond: Condition::from_bits(cond),
                offset: ((opcode & 0xFF) as u8 as i8 as i32) << 1,
            },
        };
    }

    // Unconditional branch: 1110 0iii iiii iiii
    if (opcode & 0xF800) == 0xE000 {
        return ThumbInstruction::Branch {
            offset: sign_extend_11(opcode) << 1,
        };
    }

    // Long branch with link, first half: 1111 0iii iiii iiii
    if (opcode & 0xF800) == 0xF000 {
        return ThumbInstruction::BlPrefix {
            offset: sign_extend_11(opcode) << 12,
        };
    }

    // Long branch with link, second half: 1111 1iii iiii iiii
    if (opcode & 0xF800) == 0xF800 {
        return ThumbInstruction::BlSuffix {
            offset: ((opcode & 0x7FF) as u32) << 1,
        };
    }

    ThumbInstruction::Unknown(opcode)
}

fn sign_extend_11(opcode: u16) -> i32 {
    (((opcode & 0x7FF) as i32) << 21) >> 21
}

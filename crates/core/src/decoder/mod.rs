// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod arm;
pub mod thumb;

pub use arm::{decode_arm, ArmInstruction, ArmOp};
pub use thumb::{decode_thumb, ThumbInstruction};

use crate::cache::HandleId;
use crate::cpu::registers::ExecState;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Instruction {
    Arm(ArmInstruction),
    Thumb(ThumbInstruction),
}

/// A decoded instruction together with the metadata the driver needs to
/// sequence execution.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct InstructionHandle {
    pub instruction: Instruction,
    pub address: u32,
    pub opcode: u32,
    /// Execution may redirect PC.
    pub writes_pc: bool,
    /// The target of a taken branch is fixed, so `next` may cache it.
    pub fixed_jump: bool,
    /// Successor: the sequential instruction, or the branch target when
    /// `fixed_jump` is set.
    pub next: Option<HandleId>,
}

impl InstructionHandle {
    pub fn exec_state(&self) -> ExecState {
        match self.instruction {
            Instruction::Arm(_) => ExecState::Arm,
            Instruction::Thumb(_) => ExecState::Thumb,
        }
    }
}

pub fn compile_arm(opcode: u32, address: u32) -> InstructionHandle {
    let instr = decode_arm(opcode);
    if matches!(instr.op, ArmOp::Unknown(_)) {
        tracing::warn!("Undefined ARM opcode {:#010x} at {:#010x}", opcode, address);
    }
    InstructionHandle {
        instruction: Instruction::Arm(instr),
        address,
        opcode,
        writes_pc: instr.writes_pc(),
        fixed_jump: instr.is_fixed_jump(),
        next: None,
    }
}

pub fn compile_thumb(opcode: u16, address: u32) -> InstructionHandle {
    let instr = decode_thumb(opcode);
    if matches!(instr, ThumbInstruction::Unknown(_)) {
        tracing::warn!("Undefined Thumb opcode {:#06x} at {:#010x}", opcode, address);
    }
    InstructionHandle {
        instruction: Instruction::Thumb(instr),
        address,
        opcode: opcode as u32,
        writes_pc: instr.writes_pc(),
        fixed_jump: instr.is_fixed_jump(),
        next: None,
    }
}

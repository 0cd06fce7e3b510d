// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::cpu::registers::{ExecState, Mode, StatusFlags, BANK_COUNT, BANK_SLOTS};
use crate::cpu::ArmCore;
use crate::{SimResult, SimulationError};
use serde::{Deserialize, Serialize};

/// Banked register slots saved per bank: the shared User/System bank and
/// FIQ keep r8-r14, the other modes only SP and LR.
pub const BANK_LENGTHS: [usize; BANK_COUNT] = [7, 7, 2, 2, 2, 2];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MachineSnapshot {
    pub cpu: CpuSnapshot,
    pub total_cycles: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CpuSnapshot {
    pub registers: Vec<u32>,
    pub mode: Mode,
    pub exec_state: ExecState,
    pub flags: StatusFlags,
    pub banked: Vec<Vec<u32>>,
    pub spsr: u32,
    pub banked_spsrs: Vec<u32>,
    pub cycles: u64,
    pub halted: bool,
}

impl ArmCore {
    /// Captures the architectural state. Cached decodes are not part of it.
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            registers: self.regs.gprs.to_vec(),
            mode: self.regs.mode,
            exec_state: self.regs.exec_state,
            flags: self.regs.flags,
            banked: self
                .regs
                .banked
                .iter()
                .zip(BANK_LENGTHS)
                .map(|(bank, len)| bank[..len].to_vec())
                .collect(),
            spsr: self.regs.spsr,
            banked_spsrs: self.regs.banked_spsrs.to_vec(),
            cycles: self.cycles,
            halted: self.halted,
        }
    }

    /// Replaces the architectural state with `snapshot`. Nothing is changed
    /// if the snapshot is malformed.
    pub fn restore(&mut self, snapshot: &CpuSnapshot) -> SimResult<()> {
        if snapshot.registers.len() != 16 {
            return Err(SimulationError::InvalidSnapshot(format!(
                "expected 16 registers, found {}",
                snapshot.registers.len()
            )));
        }
        if snapshot.banked.len() != BANK_COUNT
            || snapshot
                .banked
                .iter()
                .zip(BANK_LENGTHS)
                .any(|(bank, len)| bank.len() != len)
        {
            return Err(SimulationError::InvalidSnapshot(
                "banked register lengths must be 7, 7, 2, 2, 2, 2".to_string(),
            ));
        }
        if snapshot.banked_spsrs.len() != BANK_COUNT {
            return Err(SimulationError::InvalidSnapshot(format!(
                "expected {} banked SPSRs, found {}",
                BANK_COUNT,
                snapshot.banked_spsrs.len()
            )));
        }

        self.regs.gprs.copy_from_slice(&snapshot.registers);
        self.regs.mode = snapshot.mode;
        self.regs.exec_state = snapshot.exec_state;
        self.regs.flags = snapshot.flags;
        self.regs.banked = [[0; BANK_SLOTS]; BANK_COUNT];
        for (bank, saved) in self.regs.banked.iter_mut().zip(&snapshot.banked) {
            bank[..saved.len()].copy_from_slice(saved);
        }
        self.regs.spsr = snapshot.spsr;
        self.regs.banked_spsrs.copy_from_slice(&snapshot.banked_spsrs);
        self.cycles = snapshot.cycles;
        self.halted = snapshot.halted;
        self.current = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::registers::SP;

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut core = ArmCore::new();
        core.set_reg(0, 0x1234);
        core.regs.write(SP, 0x0300_7F00);
        core.regs.switch_mode(Mode::Fiq);
        core.set_reg(8, 0x8888);
        core.regs.flags.c = true;
        core.cycles = 99;

        let snap = core.snapshot();
        assert_eq!(snap.banked[0][0], 0x0300_7F00);

        let mut other = ArmCore::new();
        other.restore(&snap).unwrap();
        assert_eq!(other.snapshot(), snap);

        other.regs.switch_mode(Mode::System);
        assert_eq!(other.reg(8), 0);
        assert_eq!(other.regs.read(SP), 0x0300_7F00);
    }

    #[test]
    fn test_restore_rejects_bad_lengths() {
        let mut core = ArmCore::new();
        let mut snap = core.snapshot();
        snap.banked[2].push(0);
        assert!(matches!(
            core.restore(&snap),
            Err(SimulationError::InvalidSnapshot(_))
        ));

        let mut snap = core.snapshot();
        snap.registers.pop();
        assert!(core.restore(&snap).is_err());
    }
}

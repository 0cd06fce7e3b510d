// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! ARM7TDMI execution core.
//!
//! PC follows the pipeline convention: while an instruction executes it
//! reads as the instruction address plus two instruction widths. Between
//! steps it holds the address of the next instruction plus one width.

pub mod addressing;
pub mod alu;
pub mod arm;
pub mod condition;
pub mod registers;
pub mod shifter;
pub mod thumb;

use crate::cache::HandleId;
use crate::config::SimulationConfig;
use crate::decoder::{compile_arm, compile_thumb, Instruction, InstructionHandle};
use crate::interrupt::InterruptController;
use crate::memory::Memory;
use crate::SimResult;
use condition::Condition;
use registers::{ExecState, Mode, RegisterFile, LR, PC};

pub const RESET_VECTOR: u32 = 0x00;
pub const SWI_VECTOR: u32 = 0x08;
pub const IRQ_VECTOR: u32 = 0x18;

#[derive(Debug, Clone)]
pub struct ArmCore {
    pub regs: RegisterFile,
    pub cycles: u64,
    /// Output of the last barrel shifter evaluation.
    pub shifter_operand: u32,
    pub shifter_carry_out: bool,
    /// Whether the condition of the executing instruction held.
    pub condition_passed: bool,
    pub halted: bool,
    pub(crate) current: Option<HandleId>,
    config: SimulationConfig,
}

impl Default for ArmCore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArmCore {
    pub fn new() -> Self {
        Self::with_config(SimulationConfig::default())
    }

    pub fn with_config(config: SimulationConfig) -> Self {
        Self {
            regs: RegisterFile::new(),
            cycles: 0,
            shifter_operand: 0,
            shifter_carry_out: false,
            condition_passed: true,
            halted: false,
            current: None,
            config,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[inline]
    pub fn reg(&self, reg: u8) -> u32 {
        self.regs.read(reg as usize)
    }

    #[inline]
    pub fn set_reg(&mut self, reg: u8, value: u32) {
        self.regs.write(reg as usize, value);
    }

    #[inline]
    pub fn pc(&self) -> u32 {
        self.regs.read(PC)
    }

    /// Redirects execution to `addr` in the current state.
    pub fn set_pc(&mut self, addr: u32) {
        let width = self.instruction_width();
        self.regs.write(PC, (addr & !(width - 1)).wrapping_add(width));
        self.current = None;
    }

    /// Address of the instruction the next step executes.
    pub fn next_address(&self) -> u32 {
        self.pc().wrapping_sub(self.instruction_width())
    }

    #[inline]
    pub fn instruction_width(&self) -> u32 {
        self.regs.exec_state.width()
    }

    #[inline]
    pub(crate) fn charge(&mut self, cycles: u32) {
        self.cycles += cycles as u64;
    }

    pub(crate) fn prefetch32(&mut self, mem: &dyn Memory) {
        self.charge(mem.wait_prefetch32(self.pc()));
    }

    pub(crate) fn prefetch16(&mut self, mem: &dyn Memory) {
        self.charge(mem.wait_prefetch(self.pc()));
    }

    /// Evaluates `cond` and records the outcome in `condition_passed`.
    pub(crate) fn check_condition(&mut self, cond: Condition) -> bool {
        if cond == Condition::Al {
            return true;
        }
        self.condition_passed = cond.passes(&self.regs.flags);
        self.condition_passed
    }

    /// Loads a packed status word into CPSR, then lets the interrupt
    /// controller see the possibly unmasked I bit. A change of exec state
    /// drops the cached handle, which was decoded for the old state.
    pub fn unpack_status(
        &mut self,
        value: u32,
        irq: &mut dyn InterruptController,
    ) -> SimResult<()> {
        let state = self.regs.exec_state;
        self.regs.load_status(value)?;
        if self.regs.exec_state != state {
            self.current = None;
        }
        irq.test_irq(self);
        Ok(())
    }

    /// Clears the core and starts execution at `entry` in System mode, ARM
    /// state. Every cached decode is discarded.
    pub fn reset(&mut self, mem: &mut dyn Memory, entry: u32) {
        self.regs.clear();
        self.regs.write(PC, entry.wrapping_add(ExecState::Arm.width()));
        self.cycles = 0;
        self.shifter_operand = 0;
        self.shifter_carry_out = false;
        self.condition_passed = true;
        self.halted = false;
        self.current = None;
        mem.instruction_cache().clear();
    }

    fn enter_exception(&mut self, mode: Mode, vector: u32, return_address: u32) {
        let cpsr = self.regs.pack_status();
        self.regs.switch_mode(mode);
        self.regs.spsr = cpsr;
        self.regs.write(LR, return_address);
        self.regs.switch_exec_state(ExecState::Arm);
        self.regs.write(PC, vector.wrapping_add(ExecState::Arm.width()));
        self.regs.flags.i = true;
        self.current = None;
    }

    /// Takes the IRQ exception unless IRQs are masked.
    pub fn raise_irq(&mut self) {
        if self.regs.flags.i {
            return;
        }
        let return_address = self
            .pc()
            .wrapping_sub(self.instruction_width())
            .wrapping_add(4);
        self.enter_exception(Mode::Irq, IRQ_VECTOR, return_address);
        self.halted = false;
        tracing::info!("IRQ taken, returning to {:#010x}", return_address);
    }

    /// Enters the Supervisor vector for a software interrupt.
    pub fn raise_trap(&mut self) {
        let return_address = self.pc().wrapping_sub(self.instruction_width());
        self.enter_exception(Mode::Supervisor, SWI_VECTOR, return_address);
        tracing::info!("SWI trap, returning to {:#010x}", return_address);
    }

    pub fn halt(&mut self) {
        if !self.halted {
            tracing::info!("Core halted at {:#010x}", self.next_address());
        }
        self.halted = true;
    }

    pub fn resume(&mut self) {
        self.halted = false;
    }

    /// Handle for the instruction at `address` in the current state,
    /// compiled and cached on a miss.
    fn load_instruction(
        &mut self,
        mem: &mut dyn Memory,
        address: u32,
    ) -> SimResult<(HandleId, InstructionHandle)> {
        let state = self.regs.exec_state;
        if self.config.decode_cache_enabled {
            if let Some(hit) = mem.instruction_cache().lookup(address, state) {
                return Ok(hit);
            }
        }

        let handle = match state {
            ExecState::Arm => compile_arm(mem.load32(address)?, address),
            ExecState::Thumb => compile_thumb(mem.load_u16(address)? as u16, address),
        };
        let id = mem.instruction_cache().insert(handle);
        Ok((id, handle))
    }

    /// The instruction the next step will execute, fetching it if there is
    /// no live cached handle.
    pub fn current_instruction(&mut self, mem: &mut dyn Memory) -> SimResult<InstructionHandle> {
        if let Some(id) = self.current {
            if let Some(handle) = mem.instruction_cache().get(id) {
                return Ok(handle);
            }
        }
        let (id, handle) = self.load_instruction(mem, self.next_address())?;
        self.current = Some(id);
        Ok(handle)
    }

    /// Moves `current` to the successor of `from`, linking a fresh decode
    /// when the cached link is missing or stale.
    fn follow(
        &mut self,
        mem: &mut dyn Memory,
        from: HandleId,
        next: Option<HandleId>,
    ) -> SimResult<()> {
        if let Some(next) = next {
            if mem.instruction_cache().get(next).is_some() {
                self.current = Some(next);
                return Ok(());
            }
        }
        let (next, _) = self.load_instruction(mem, self.next_address())?;
        mem.instruction_cache().link_next(from, next);
        self.current = Some(next);
        Ok(())
    }

    fn execute(
        &mut self,
        handle: &InstructionHandle,
        mem: &mut dyn Memory,
        irq: &mut dyn InterruptController,
    ) -> SimResult<()> {
        match handle.instruction {
            Instruction::Arm(instr) => self.execute_arm(instr, handle.address, mem, irq),
            Instruction::Thumb(instr) => self.execute_thumb(instr, handle.address, mem, irq),
        }
    }

    /// Executes one instruction, then gives the interrupt controller its
    /// per-step update. A halted core only runs the update.
    pub fn step(
        &mut self,
        mem: &mut dyn Memory,
        irq: &mut dyn InterruptController,
    ) -> SimResult<()> {
        if self.halted {
            return irq.update_timers(self, mem);
        }

        let handle = self.current_instruction(mem)?;
        let width = handle.exec_state().width();
        self.regs.write(PC, self.pc().wrapping_add(width));
        self.condition_passed = true;

        #[cfg(debug_assertions)]
        tracing::debug!(
            "PC={:#010x}, Opcode={:#010x}, Instr={:?}",
            handle.address,
            handle.opcode,
            handle.instruction
        );

        self.execute(&handle, mem, irq)?;

        let cached = self.config.decode_cache_enabled;
        if !handle.writes_pc {
            match self.current {
                Some(id) if cached => self.follow(mem, id, handle.next)?,
                _ => self.current = None,
            }
        } else if self.condition_passed {
            let state = self.regs.exec_state;
            let width = state.width();
            let target = self.pc() & !(width - 1);
            let cost = match state {
                ExecState::Arm => mem.wait32(target) + mem.wait_prefetch32(target),
                ExecState::Thumb => mem.wait(target) + mem.wait_prefetch(target),
            };
            self.charge(cost);
            self.regs.write(PC, target.wrapping_add(width));

            match self.current {
                Some(id) if cached && handle.fixed_jump => self.follow(mem, id, handle.next)?,
                _ => self.current = None,
            }
        } else {
            self.current = None;
        }

        irq.update_timers(self, mem)
    }
}

// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bios;
pub mod bus;
pub mod cache;
pub mod config;
pub mod cpu;
pub mod decoder;
pub mod interrupt;
pub mod memory;
pub mod metrics;
pub mod snapshot;

pub use bus::SystemBus;
pub use config::SimulationConfig;
pub use cpu::ArmCore;
pub use interrupt::{InterruptController, InterruptLines};
pub use memory::Memory;

use std::collections::HashSet;
use std::sync::Arc;


#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Illegal instruction {opcode:#x} at {address:#010x} (thumb: {thumb})")]
    IllegalInstruction {
        address: u32,
        opcode: u32,
        thumb: bool,
    },
    #[error("Invalid processor mode {0:#07b}")]
    InvalidMode(u32),
    #[error("Memory access violation at {0:#010x}")]
    MemoryViolation(u32),
    #[error("Unimplemented software interrupt {0:#04x}")]
    UnimplementedSwi(u8),
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Trait for observing simulation events in a modular way.
pub trait SimulationObserver: std::fmt::Debug + Send + Sync {
    fn on_simulation_start(&self) {}
    fn on_simulation_stop(&self) {}
    /// Called with the address and opcode of the instruction about to run.
    fn on_step_start(&self, _pc: u32, _opcode: u32) {}
    fn on_step_end(&self, _cycles: u32) {}
}

/// Trait for controlling the machine in debug mode
pub trait DebugControl {
    fn add_breakpoint(&mut self, addr: u32);
    fn remove_breakpoint(&mut self, addr: u32);
    fn clear_breakpoints(&mut self);

    /// Run until breakpoint or steps limit
    fn run(&mut self, max_steps: Option<u32>) -> SimResult<StopReason>;

    /// Step a single instruction
    fn step_single(&mut self) -> SimResult<StopReason>;

    /// Registers 0-15 of the current mode, 16 is the packed CPSR.
    fn read_core_reg(&self, id: u8) -> u32;
    fn write_core_reg(&mut self, id: u8, val: u32) -> SimResult<()>;

    fn read_memory(&mut self, addr: u32, len: usize) -> SimResult<Vec<u8>>;
    fn write_memory(&mut self, addr: u32, data: &[u8]) -> SimResult<()>;

    /// Address of the next instruction to execute.
    fn get_pc(&self) -> u32;
    fn set_pc(&mut self, addr: u32);
    fn get_cycle_count(&self) -> u64;
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    Breakpoint(u32),
    StepDone,
    MaxStepsReached,
}

pub const CPSR_REGISTER: u8 = 16;

pub struct Machine<M: Memory = SystemBus, I: InterruptController = InterruptLines> {
    pub cpu: ArmCore,
    pub bus: M,
    pub irq: I,
    pub observers: Vec<Arc<dyn SimulationObserver>>,

    // Debug state
    pub breakpoints: HashSet<u32>,
    pub total_cycles: u64,
}

impl<M: Memory, I: InterruptController> Machine<M, I> {
    pub fn new(cpu: ArmCore, bus: M, irq: I) -> Self {
        Self {
            cpu,
            bus,
            irq,
            observers: Vec::new(),
            breakpoints: HashSet::new(),
            total_cycles: 0,
        }
    }

    /// Resets the core to `entry` and clears pending interrupt state.
    pub fn reset(&mut self, entry: u32) {
        self.cpu.reset(&mut self.bus, entry);
        self.irq.clear();
        self.total_cycles = 0;
        for observer in &self.observers {
            observer.on_simulation_start();
        }
    }

    pub fn step(&mut self) -> SimResult<()> {
        if !self.cpu.halted && !self.observers.is_empty() {
            let handle = self.cpu.current_instruction(&mut self.bus)?;
            for observer in &self.observers {
                observer.on_step_start(handle.address, handle.opcode);
            }
        }

        let before = self.cpu.cycles;
        let res = self.cpu.step(&mut self.bus, &mut self.irq);
        let spent = self.cpu.cycles.saturating_sub(before);
        self.total_cycles += spent;

        for observer in &self.observers {
            observer.on_step_end(spent as u32);
        }
        res
    }

    pub fn snapshot(&self) -> snapshot::MachineSnapshot {
        snapshot::MachineSnapshot {
            cpu: self.cpu.snapshot(),
            total_cycles: self.total_cycles,
        }
    }

    /// Restores core state. Every cached decode is discarded since the
    /// restored PC may point at code the cache never saw.
    pub fn apply_snapshot(&mut self, snapshot: &snapshot::MachineSnapshot) -> SimResult<()> {
        self.cpu.restore(&snapshot.cpu)?;
        self.total_cycles = snapshot.total_cycles;
        self.bus.instruction_cache().clear();
        Ok(())
    }
}

impl<M: Memory, I: InterruptController> DebugControl for Machine<M, I> {
    fn add_breakpoint(&mut self, addr: u32) {
        self.breakpoints.insert(addr & !1);
    }

    fn remove_breakpoint(&mut self, addr: u32) {
        self.breakpoints.remove(&(addr & !1));
    }

    fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    fn run(&mut self, max_steps: Option<u32>) -> SimResult<StopReason> {
        let mut steps = 0;
        let reason = loop {
            // Checked before stepping. A run always executes the
            // instruction it starts on.
            let pc = self.cpu.next_address();
            if steps > 0 && self.breakpoints.contains(&(pc & !1)) {
                break StopReason::Breakpoint(pc);
            }

            if let Some(max) = max_steps {
                if steps >= max {
                    break StopReason::MaxStepsReached;
                }
            }

            if let Err(e) = self.step() {
                for observer in &self.observers {
                    observer.on_simulation_stop();
                }
                return Err(e);
            }
            steps += 1;
        };

        for observer in &self.observers {
            observer.on_simulation_stop();
        }
        Ok(reason)
    }

    fn step_single(&mut self) -> SimResult<StopReason> {
        self.step()?;
        Ok(StopReason::StepDone)
    }

    fn read_core_reg(&self, id: u8) -> u32 {
        if id == CPSR_REGISTER {
            self.cpu.regs.pack_status()
        } else {
            self.cpu.reg(id)
        }
    }

    fn write_core_reg(&mut self, id: u8, val: u32) -> SimResult<()> {
        match id {
            CPSR_REGISTER => {
                // Keep the next instruction address across a T bit flip.
                let next = self.cpu.next_address();
                let state = self.cpu.regs.exec_state;
                self.cpu.unpack_status(val, &mut self.irq)?;
                if self.cpu.regs.exec_state != state {
                    self.cpu.set_pc(next);
                }
                Ok(())
            }
            15 => {
                self.cpu.set_pc(val);
                Ok(())
            }
            _ => {
                self.cpu.set_reg(id, val);
                Ok(())
            }
        }
    }

    fn read_memory(&mut self, addr: u32, len: usize) -> SimResult<Vec<u8>> {
        let mut data = Vec::with_capacity(len);
        for i in 0..len {
            let byte = self.bus.load_u8(addr.wrapping_add(i as u32))?;
            data.push(byte as u8);
        }
        Ok(data)
    }

    fn write_memory(&mut self, addr: u32, data: &[u8]) -> SimResult<()> {
        for (i, byte) in data.iter().enumerate() {
            self.bus.store8(addr.wrapping_add(i as u32), *byte as u32)?;
        }
        Ok(())
    }

    fn get_pc(&self) -> u32 {
        self.cpu.next_address()
    }

    fn set_pc(&mut self, addr: u32) {
        self.cpu.set_pc(addr);
    }

    fn get_cycle_count(&self) -> u64 {
        self.total_cycles
    }
}

// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bios;
use crate::cpu::ArmCore;
use crate::memory::Memory;
use crate::SimResult;
use std::fmt::Debug;

/// Interrupt and event source the core consults.
///
/// The core calls `test_irq` whenever the I bit may have been cleared and
/// `update_timers` at the end of every step; an implementation raises the
/// IRQ exception from there with [`ArmCore::raise_irq`].
pub trait InterruptController: Debug + Send {
    /// Per-step hook for timers, DMA and video events. May raise an IRQ or
    /// wake a halted core.
    fn update_timers(&mut self, core: &mut ArmCore, mem: &mut dyn Memory) -> SimResult<()>;

    /// Re-checks pending interrupts after CPSR changed.
    fn test_irq(&mut self, core: &mut ArmCore);

    /// Services `SWI comment`. The default takes the Supervisor trap.
    fn software_interrupt(
        &mut self,
        core: &mut ArmCore,
        _mem: &mut dyn Memory,
        _comment: u8,
    ) -> SimResult<()> {
        core.raise_trap();
        Ok(())
    }

    /// Drops all pending state.
    fn clear(&mut self) {}
}

pub const LINE_COUNT: u32 = 16;

pub const LINE_VBLANK: u32 = 0;
pub const LINE_HBLANK: u32 = 1;
pub const LINE_VCOUNT: u32 = 2;
pub const LINE_TIMER0: u32 = 3;
pub const LINE_TIMER1: u32 = 4;
pub const LINE_TIMER2: u32 = 5;
pub const LINE_TIMER3: u32 = 6;
pub const LINE_SERIAL: u32 = 7;
pub const LINE_DMA0: u32 = 8;
pub const LINE_DMA1: u32 = 9;
pub const LINE_DMA2: u32 = 10;
pub const LINE_DMA3: u32 = 11;
pub const LINE_KEYPAD: u32 = 12;
pub const LINE_GAMEPAK: u32 = 13;

/// Sixteen request lines behind an enable mask and a master enable.
///
/// An eligible request is not taken immediately: it arms a raise that the
/// next `update_timers` performs, after the current instruction retires.
#[derive(Debug, Default, Clone)]
pub struct InterruptLines {
    pub master_enable: bool,
    pub enabled: u16,
    pub flags: u16,
    spring_irq: bool,
    /// Service selected SWIs in Rust instead of entering the BIOS.
    pub hle_bios: bool,
}

impl InterruptLines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hle_bios(mut self, enabled: bool) -> Self {
        self.hle_bios = enabled;
        self
    }

    pub fn pending(&self) -> u16 {
        self.enabled & self.flags
    }

    pub fn irq_armed(&self) -> bool {
        self.spring_irq
    }

    /// Latches a request on `line` and arms an IRQ if it is eligible.
    pub fn request(&mut self, core: &mut ArmCore, line: u32) {
        if line >= LINE_COUNT {
            tracing::warn!("Ignoring request on nonexistent interrupt line {}", line);
            return;
        }
        self.flags |= 1 << line;
        self.test_irq(core);
    }

    /// Clears the flags set in `mask`, as a write to the request register
    /// does.
    pub fn acknowledge(&mut self, mask: u16) {
        self.flags &= !mask;
    }
}

impl InterruptController for InterruptLines {
    fn update_timers(&mut self, core: &mut ArmCore, _mem: &mut dyn Memory) -> SimResult<()> {
        if core.halted && self.pending() != 0 {
            core.resume();
        }
        if self.spring_irq {
            self.spring_irq = false;
            core.raise_irq();
        }
        Ok(())
    }

    fn test_irq(&mut self, core: &mut ArmCore) {
        if self.master_enable && self.pending() != 0 && !core.regs.flags.i {
            self.spring_irq = true;
        }
    }

    fn software_interrupt(
        &mut self,
        core: &mut ArmCore,
        mem: &mut dyn Memory,
        comment: u8,
    ) -> SimResult<()> {
        if !self.hle_bios {
            core.raise_trap();
            return Ok(());
        }
        if comment == bios::SWI_HALT && !self.master_enable {
            tracing::warn!("Halt requested with interrupts disabled, ignoring");
            return Ok(());
        }
        bios::dispatch(core, mem, comment)
    }

    fn clear(&mut self) {
        self.master_enable = false;
        self.enabled = 0;
        self.flags = 0;
        self.spring_irq = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SystemBus;
    use crate::cpu::registers::{Mode, LR, PC};

    fn core_at(pc: u32) -> ArmCore {
        let mut core = ArmCore::new();
        core.regs.write(PC, pc);
        core
    }

    #[test]
    fn test_masked_request_does_not_arm() {
        let mut core = core_at(0x0800_0004);
        let mut irq = InterruptLines::new();
        irq.request(&mut core, LINE_VBLANK);
        assert!(!irq.irq_armed());

        irq.master_enable = true;
        irq.request(&mut core, LINE_VBLANK);
        assert!(!irq.irq_armed());

        irq.enabled = 1 << LINE_VBLANK;
        irq.request(&mut core, LINE_VBLANK);
        assert!(irq.irq_armed());
    }

    #[test]
    fn test_update_raises_deferred_irq() {
        let mut core = core_at(0x0800_0104);
        let mut bus = SystemBus::new();
        let mut irq = InterruptLines {
            master_enable: true,
            enabled: 1 << LINE_TIMER0,
            ..Default::default()
        };
        irq.request(&mut core, LINE_TIMER0);
        irq.update_timers(&mut core, &mut bus).unwrap();

        assert_eq!(core.regs.mode, Mode::Irq);
        assert_eq!(core.regs.read(LR), 0x0800_0104);
        assert_eq!(core.regs.read(PC), 0x18 + 4);
        assert!(core.regs.flags.i);
        assert!(!irq.irq_armed());
    }

    #[test]
    fn test_pending_line_wakes_halted_core() {
        let mut core = core_at(0x0800_0004);
        core.regs.flags.i = true;
        core.halt();
        let mut bus = SystemBus::new();
        let mut irq = InterruptLines {
            enabled: 1 << LINE_KEYPAD,
            ..Default::default()
        };
        irq.update_timers(&mut core, &mut bus).unwrap();
        assert!(core.halted);

        irq.request(&mut core, LINE_KEYPAD);
        irq.update_timers(&mut core, &mut bus).unwrap();
        assert!(!core.halted);
        assert_eq!(core.regs.mode, Mode::System);
    }

    #[test]
    fn test_acknowledge_clears_flags() {
        let mut core = ArmCore::new();
        let mut irq = InterruptLines::new();
        irq.request(&mut core, LINE_DMA0);
        irq.request(&mut core, LINE_DMA1);
        irq.acknowledge(1 << LINE_DMA0);
        assert_eq!(irq.flags, 1 << LINE_DMA1);
    }

    #[test]
    fn test_swi_without_hle_traps() {
        let mut core = core_at(0x0800_0008);
        let mut bus = SystemBus::new();
        let mut irq = InterruptLines::new();
        irq.software_interrupt(&mut core, &mut bus, 0x06).unwrap();
        assert_eq!(core.regs.mode, Mode::Supervisor);
        assert_eq!(core.regs.read(LR), 0x0800_0004);
        assert_eq!(core.regs.read(PC), 0x08 + 4);
        assert_eq!(core.regs.spsr & 0x1F, Mode::System.bits());
    }
}

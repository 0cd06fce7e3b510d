// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::cache::{InstructionCache, RegionLayout, REGION_COUNT, REGION_SHIFT};
use crate::memory::{LinearMemory, Memory, WaitStates};
use crate::{SimResult, SimulationError};
use anyhow::Context;
use labwired_arm7_config::MemoryMapConfig;

#[derive(Debug, Clone)]
pub struct MemoryRegion {
    pub name: String,
    pub base: u32,
    pub size: u32,
    pub read_only: bool,
    pub wait: WaitStates,
    /// Index into the bus storage list; mirrors share one.
    pub storage: usize,
}

/// Region-mapped memory with per-region wait states and the instruction
/// cache that covers it.
#[derive(Debug)]
pub struct SystemBus {
    pub regions: Vec<MemoryRegion>,
    storages: Vec<LinearMemory>,
    slots: [Option<usize>; REGION_COUNT],
    icache: InstructionCache,
    /// Fail unmapped accesses instead of reading zero and dropping stores.
    pub strict: bool,
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBus {
    /// A bus with no regions mapped.
    pub fn empty() -> Self {
        Self {
            regions: Vec::new(),
            storages: Vec::new(),
            slots: [None; REGION_COUNT],
            icache: InstructionCache::default(),
            strict: false,
        }
    }

    /// A bus laid out with the default handheld memory map.
    pub fn new() -> Self {
        match Self::from_config(&MemoryMapConfig::gba()) {
            Ok(bus) => bus,
            Err(e) => {
                tracing::error!("Default memory map rejected: {:#}", e);
                Self::empty()
            }
        }
    }

    pub fn from_config(map: &MemoryMapConfig) -> anyhow::Result<Self> {
        map.validate()?;

        let mut bus = Self::empty();
        for cfg in &map.regions {
            let size = u32::try_from(cfg.size_bytes()?)
                .with_context(|| format!("Region '{}' is larger than the address space", cfg.id))?;
            let storage = match &cfg.mirror {
                Some(target) => bus
                    .regions
                    .iter()
                    .find(|r| &r.name == target)
                    .map(|r| r.storage)
                    .with_context(|| {
                        format!(
                            "Region '{}' mirrors '{}', which must be declared first",
                            cfg.id, target
                        )
                    })?,
                None => {
                    bus.storages.push(LinearMemory::new(size));
                    bus.storages.len() - 1
                }
            };
            bus.map_region(
                MemoryRegion {
                    name: cfg.id.clone(),
                    base: cfg.base,
                    size,
                    read_only: cfg.read_only,
                    wait: cfg.wait,
                    storage,
                },
                cfg.page_bits()?,
            );
        }

        tracing::debug!(
            "Memory map '{}': {} regions, {} backing stores",
            map.name,
            bus.regions.len(),
            bus.storages.len()
        );
        Ok(bus)
    }

    /// Adds a region, claiming every 16 MiB slot it spans.
    pub fn map_region(&mut self, region: MemoryRegion, page_bits: u32) {
        let index = self.regions.len();
        let first = (region.base >> REGION_SHIFT) as usize;
        let span = (region.size >> REGION_SHIFT).max(1) as usize;
        let layout = RegionLayout::new(region.size, page_bits);
        for slot in first..(first + span).min(REGION_COUNT) {
            self.slots[slot] = Some(index);
            self.icache.configure_region(slot, layout);
        }
        self.regions.push(region);
    }

    fn region(&self, addr: u32) -> Option<&MemoryRegion> {
        if addr >> 28 != 0 {
            return None;
        }
        self.slots[(addr >> REGION_SHIFT) as usize].map(|i| &self.regions[i])
    }

    fn waits(&self, addr: u32) -> WaitStates {
        self.region(addr).map(|r| r.wait).unwrap_or_default()
    }

    fn open_bus(&self, addr: u32) -> SimResult<u32> {
        if self.strict {
            return Err(SimulationError::MemoryViolation(addr));
        }
        tracing::warn!("Read from unmapped address {:#010x}", addr);
        Ok(0)
    }

    /// Resolves a writable location, or `None` when the store is dropped.
    fn store_target(&mut self, addr: u32) -> SimResult<Option<(usize, u32)>> {
        match self.region(addr) {
            Some(region) if region.read_only => {
                tracing::warn!(
                    "Ignoring store to read-only region '{}' at {:#010x}",
                    region.name,
                    addr
                );
                Ok(None)
            }
            Some(region) => Ok(Some((region.storage, addr.wrapping_sub(region.base)))),
            None if self.strict => Err(SimulationError::MemoryViolation(addr)),
            None => {
                tracing::warn!("Store to unmapped address {:#010x}", addr);
                Ok(None)
            }
        }
    }

    /// Copies an image into memory, read-only regions included.
    pub fn load_image(&mut self, addr: u32, bytes: &[u8]) -> SimResult<()> {
        let (storage, offset) = match self.region(addr) {
            Some(region) => (region.storage, addr.wrapping_sub(region.base)),
            None => return Err(SimulationError::MemoryViolation(addr)),
        };
        self.storages[storage].load_bytes(offset, bytes);
        self.icache.invalidate(addr, bytes.len() as u32);
        Ok(())
    }

    /// Reads `len` bytes without side effects. Unmapped bytes read as zero.
    pub fn read_bytes(&self, addr: u32, len: usize) -> Vec<u8> {
        (0..len as u32)
            .map(|i| {
                let a = addr.wrapping_add(i);
                self.region(a)
                    .map(|r| self.storages[r.storage].read_u8(a.wrapping_sub(r.base)))
                    .unwrap_or(0)
            })
            .collect()
    }
}

impl Memory for SystemBus {
    fn load_u8(&mut self, addr: u32) -> SimResult<u32> {
        match self.region(addr) {
            Some(r) => Ok(self.storages[r.storage].read_u8(addr.wrapping_sub(r.base)) as u32),
            None => self.open_bus(addr),
        }
    }

    fn load_u16(&mut self, addr: u32) -> SimResult<u32> {
        let value = match self.region(addr) {
            Some(r) => self.storages[r.storage].read_u16(addr.wrapping_sub(r.base)) as u32,
            None => self.open_bus(addr)?,
        };
        Ok(value.rotate_right((addr & 1) * 8))
    }

    fn load32(&mut self, addr: u32) -> SimResult<u32> {
        let value = match self.region(addr) {
            Some(r) => self.storages[r.storage].read_u32(addr.wrapping_sub(r.base)),
            None => self.open_bus(addr)?,
        };
        Ok(value.rotate_right((addr & 3) * 8))
    }

    fn store8(&mut self, addr: u32, value: u32) -> SimResult<()> {
        if let Some((storage, offset)) = self.store_target(addr)? {
            self.storages[storage].write_u8(offset, value as u8);
            self.icache.invalidate(addr, 1);
        }
        Ok(())
    }

    fn store16(&mut self, addr: u32, value: u32) -> SimResult<()> {
        let addr = addr & !1;
        if let Some((storage, offset)) = self.store_target(addr)? {
            self.storages[storage].write_u16(offset, value as u16);
            self.icache.invalidate(addr, 2);
        }
        Ok(())
    }

    fn store32(&mut self, addr: u32, value: u32) -> SimResult<()> {
        let addr = addr & !3;
        if let Some((storage, offset)) = self.store_target(addr)? {
            self.storages[storage].write_u32(offset, value);
            self.icache.invalidate(addr, 4);
        }
        Ok(())
    }

    fn wait(&self, addr: u32) -> u32 {
        1 + self.waits(addr).nonseq16
    }

    fn wait32(&self, addr: u32) -> u32 {
        1 + self.waits(addr).nonseq32
    }

    fn wait_seq(&self, addr: u32) -> u32 {
        1 + self.waits(addr).seq16
    }

    fn wait_seq32(&self, addr: u32) -> u32 {
        1 + self.waits(addr).seq32
    }

    fn wait_prefetch(&self, addr: u32) -> u32 {
        1 + self.waits(addr).seq16
    }

    fn wait_prefetch32(&self, addr: u32) -> u32 {
        1 + self.waits(addr).seq32
    }

    fn instruction_cache(&mut self) -> &mut InstructionCache {
        &mut self.icache
    }
}

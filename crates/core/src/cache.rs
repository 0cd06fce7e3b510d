// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Paged cache of compiled instruction handles.
//!
//! The address space is split into 16 regions of 16 MiB (selected by bits
//! 27-24). Each region has its own page size and wraps at its configured
//! size so mirrored memory shares pages. Pages are created on first use and
//! never freed: a store marks the page invalid and the next access through
//! [`InstructionCache::page_for`] drops every slot and bumps the page
//! generation, which makes every outstanding [`HandleId`] into it stale.

use crate::cpu::registers::ExecState;
use crate::decoder::InstructionHandle;

pub const REGION_SHIFT: u32 = 24;
pub const REGION_COUNT: usize = 16;
const MAX_REGION_SIZE: u32 = 1 << REGION_SHIFT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionLayout {
    /// Bytes before the region mirrors. Rounded up to a power of two.
    pub size: u32,
    pub page_bits: u32,
}

impl RegionLayout {
    pub const DEFAULT_PAGE_BITS: u32 = 9;

    pub fn new(size: u32, page_bits: u32) -> Self {
        let page_bits = page_bits.clamp(2, REGION_SHIFT);
        let size = size
            .max(1 << page_bits)
            .checked_next_power_of_two()
            .unwrap_or(MAX_REGION_SIZE)
            .min(MAX_REGION_SIZE);
        Self { size, page_bits }
    }

    fn page_count(&self) -> usize {
        (self.size >> self.page_bits) as usize
    }

    fn page_index(&self, address: u32) -> usize {
        ((address & (self.size - 1)) >> self.page_bits) as usize
    }

    fn slot_index(&self, address: u32, state: ExecState) -> usize {
        let offset = address & ((1 << self.page_bits) - 1);
        match state {
            ExecState::Arm => (offset >> 2) as usize,
            ExecState::Thumb => (offset >> 1) as usize,
        }
    }
}

impl Default for RegionLayout {
    fn default() -> Self {
        Self::new(1 << 16, Self::DEFAULT_PAGE_BITS)
    }
}

/// Stable reference to a cached handle. Only valid while the page it points
/// into keeps the generation recorded here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleId {
    region: u8,
    page: u32,
    slot: u32,
    state: ExecState,
    generation: u32,
}

#[derive(Debug, Default)]
pub struct Page {
    arm: Vec<Option<InstructionHandle>>,
    thumb: Vec<Option<InstructionHandle>>,
    invalid: bool,
    generation: u32,
}

impl Page {
    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    fn slots(&self, state: ExecState) -> &[Option<InstructionHandle>] {
        match state {
            ExecState::Arm => &self.arm,
            ExecState::Thumb => &self.thumb,
        }
    }

    fn slots_mut(&mut self, state: ExecState) -> &mut Vec<Option<InstructionHandle>> {
        match state {
            ExecState::Arm => &mut self.arm,
            ExecState::Thumb => &mut self.thumb,
        }
    }

    fn repopulate(&mut self) {
        self.arm.clear();
        self.thumb.clear();
        self.invalid = false;
        self.generation = self.generation.wrapping_add(1);
    }
}

#[derive(Debug)]
struct RegionCache {
    layout: RegionLayout,
    pages: Vec<Option<Page>>,
}

impl RegionCache {
    fn new(layout: RegionLayout) -> Self {
        let mut pages = Vec::new();
        pages.resize_with(layout.page_count(), || None);
        Self { layout, pages }
    }
}

#[derive(Debug)]
pub struct InstructionCache {
    regions: Vec<RegionCache>,
    compiled: u64,
}

impl Default for InstructionCache {
    fn default() -> Self {
        Self::new([RegionLayout::default(); REGION_COUNT])
    }
}

fn region_index(address: u32) -> usize {
    ((address >> REGION_SHIFT) as usize) & (REGION_COUNT - 1)
}

impl InstructionCache {
    pub fn new(layouts: [RegionLayout; REGION_COUNT]) -> Self {
        Self {
            regions: layouts.into_iter().map(RegionCache::new).collect(),
            compiled: 0,
        }
    }

    /// Replaces the layout of region `index`, dropping its pages.
    pub fn configure_region(&mut self, index: usize, layout: RegionLayout) {
        self.regions[index & (REGION_COUNT - 1)] = RegionCache::new(layout);
    }

    pub fn layout(&self, address: u32) -> RegionLayout {
        self.regions[region_index(address)].layout
    }

    /// Page containing `address`, created on first access. An invalidated
    /// page is emptied here before it is handed out.
    pub fn page_for(&mut self, address: u32) -> &mut Page {
        let region = &mut self.regions[region_index(address)];
        let index = region.layout.page_index(address);
        let page = region.pages[index].get_or_insert_with(Page::default);
        if page.invalid {
            page.repopulate();
        }
        page
    }

    /// Looks up the handle compiled for `address` in the given state.
    pub fn lookup(
        &mut self,
        address: u32,
        state: ExecState,
    ) -> Option<(HandleId, InstructionHandle)> {
        let layout = self.layout(address);
        let slot = layout.slot_index(address, state);
        let page = self.page_for(address);
        let handle = page.slots(state).get(slot).copied().flatten()?;
        if handle.address != address {
            return None;
        }
        let id = HandleId {
            region: region_index(address) as u8,
            page: layout.page_index(address) as u32,
            slot: slot as u32,
            state,
            generation: page.generation,
        };
        Some((id, handle))
    }

    /// Stores a freshly compiled handle, replacing whatever occupied its
    /// slot.
    pub fn insert(&mut self, handle: InstructionHandle) -> HandleId {
        let address = handle.address;
        let state = handle.exec_state();
        let layout = self.layout(address);
        let slot = layout.slot_index(address, state);
        let slot_count = match state {
            ExecState::Arm => 1 << (layout.page_bits - 2),
            ExecState::Thumb => 1 << (layout.page_bits - 1),
        };

        let page = self.page_for(address);
        let slots = page.slots_mut(state);
        if slots.is_empty() {
            slots.resize(slot_count, None);
        }
        slots[slot] = Some(handle);
        let generation = page.generation;

        self.compiled += 1;
        HandleId {
            region: region_index(address) as u8,
            page: layout.page_index(address) as u32,
            slot: slot as u32,
            state,
            generation,
        }
    }

    /// Resolves `id`, or `None` once its page was invalidated or the slot
    /// was overwritten.
    pub fn get(&self, id: HandleId) -> Option<InstructionHandle> {
        let page = self.regions[id.region as usize]
            .pages
            .get(id.page as usize)?
            .as_ref()?;
        if page.invalid || page.generation != id.generation {
            return None;
        }
        page.slots(id.state).get(id.slot as usize).copied().flatten()
    }

    /// Records `next` as the successor of `id`. Ignored if `id` is stale.
    pub fn link_next(&mut self, id: HandleId, next: HandleId) {
        let Some(Some(page)) = self.regions[id.region as usize]
            .pages
            .get_mut(id.page as usize)
        else {
            return;
        };
        if page.invalid || page.generation != id.generation {
            return;
        }
        if let Some(Some(handle)) = page.slots_mut(id.state).get_mut(id.slot as usize) {
            handle.next = Some(next);
        }
    }

    /// Marks every allocated page overlapping `[address, address + len)` as
    /// invalid.
    pub fn invalidate(&mut self, address: u32, len: u32) {
        if len == 0 {
            return;
        }
        let last = address.wrapping_add(len - 1);
        let page_bits = self.layout(address).page_bits;
        let mut cursor = address & !((1 << page_bits) - 1);
        loop {
            let region = &mut self.regions[region_index(cursor)];
            let index = region.layout.page_index(cursor);
            if let Some(page) = region.pages[index].as_mut() {
                page.invalid = true;
            }

            let step = 1u32 << region.layout.page_bits;
            let next = (cursor & !(step - 1)).wrapping_add(step);
            if next <= cursor || next > last {
                break;
            }
            cursor = next;
        }
    }

    /// Invalidates every page.
    pub fn clear(&mut self) {
        for region in &mut self.regions {
            for page in region.pages.iter_mut().flatten() {
                page.invalid = true;
            }
        }
    }

    /// Number of handles compiled since construction.
    pub fn compiled_count(&self) -> u64 {
        self.compiled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{compile_arm, compile_thumb};

    fn cache() -> InstructionCache {
        InstructionCache::new([RegionLayout::new(0x4_0000, 9); REGION_COUNT])
    }

    #[test]
    fn test_insert_then_lookup() {
        let mut cache = cache();
        let id = cache.insert(compile_arm(0xE3A0_0001, 0x0200_0000));
        let (found, handle) = cache.lookup(0x0200_0000, ExecState::Arm).unwrap();
        assert_eq!(found, id);
        assert_eq!(handle.opcode, 0xE3A0_0001);
        assert!(cache.lookup(0x0200_0000, ExecState::Thumb).is_none());
        assert_eq!(cache.compiled_count(), 1);
    }

    #[test]
    fn test_mirrored_address_misses_on_tag() {
        let mut cache = cache();
        cache.insert(compile_arm(0xE3A0_0001, 0x0200_0000));
        // 0x02040000 shares the slot through mirroring but is a distinct fetch address.
        assert!(cache.lookup(0x0204_0000, ExecState::Arm).is_none());
    }

    #[test]
    fn test_store_invalidates_page_lazily() {
        let mut cache = cache();
        let id = cache.insert(compile_arm(0xE3A0_0001, 0x0200_0010));
        let neighbour = cache.insert(compile_arm(0xE3A0_0002, 0x0200_0400));

        cache.invalidate(0x0200_01FE, 2);
        assert!(cache.get(id).is_none());
        assert!(cache.get(neighbour).is_some());
        assert!(cache.lookup(0x0200_0010, ExecState::Arm).is_none());
        assert!(!cache.page_for(0x0200_0010).is_invalid());
    }

    #[test]
    fn test_invalidate_spanning_pages() {
        let mut cache = cache();
        let a = cache.insert(compile_thumb(0x2001, 0x0300_01FE));
        let b = cache.insert(compile_thumb(0x2002, 0x0300_0200));
        cache.invalidate(0x0300_01FE, 4);
        assert!(cache.get(a).is_none());
        assert!(cache.get(b).is_none());
    }

    #[test]
    fn test_link_next_survives_until_invalidation() {
        let mut cache = cache();
        let first = cache.insert(compile_arm(0xE3A0_0001, 0x0800_0000));
        let second = cache.insert(compile_arm(0xE3A0_0002, 0x0800_0004));
        cache.link_next(first, second);
        assert_eq!(cache.get(first).unwrap().next, Some(second));

        cache.clear();
        assert!(cache.get(first).is_none());
    }
}

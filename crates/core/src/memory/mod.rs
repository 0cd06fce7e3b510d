// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::cache::InstructionCache;
use crate::SimResult;

pub use labwired_arm7_config::WaitStates;

/// Memory and timing oracle the core executes against.
///
/// Loads return values zero- or sign-extended to 32 bits. Each `wait*`
/// method returns the cycles an access costs; the core adds them to its
/// cycle counter.
pub trait Memory {
    fn load_u8(&mut self, addr: u32) -> SimResult<u32>;
    /// Unsigned halfword. Odd addresses rotate the aligned halfword by 8.
    fn load_u16(&mut self, addr: u32) -> SimResult<u32>;
    /// Word load. Unaligned addresses rotate the aligned word.
    fn load32(&mut self, addr: u32) -> SimResult<u32>;
    fn store8(&mut self, addr: u32, value: u32) -> SimResult<()>;
    fn store16(&mut self, addr: u32, value: u32) -> SimResult<()>;
    fn store32(&mut self, addr: u32, value: u32) -> SimResult<()>;

    fn load8(&mut self, addr: u32) -> SimResult<u32> {
        Ok(self.load_u8(addr)? as u8 as i8 as i32 as u32)
    }

    /// Signed halfword. An odd address yields the sign-extended byte.
    fn load16(&mut self, addr: u32) -> SimResult<u32> {
        if addr & 1 != 0 {
            return self.load8(addr);
        }
        Ok(self.load_u16(addr)? as u16 as i16 as i32 as u32)
    }

    /// Non-sequential 16-bit access.
    fn wait(&self, addr: u32) -> u32;
    /// Non-sequential 32-bit access.
    fn wait32(&self, addr: u32) -> u32;
    fn wait_seq(&self, addr: u32) -> u32;
    fn wait_seq32(&self, addr: u32) -> u32;
    /// Opcode prefetch in Thumb state.
    fn wait_prefetch(&self, addr: u32) -> u32;
    /// Opcode prefetch in ARM state.
    fn wait_prefetch32(&self, addr: u32) -> u32;

    /// A burst of `count` words: one non-sequential access followed by
    /// sequential ones.
    fn wait_multiple32(&self, addr: u32, count: u32) -> u32 {
        if count == 0 {
            return 0;
        }
        self.wait32(addr) + (count - 1) * self.wait_seq32(addr)
    }

    /// Internal multiplier cycles, from how many leading bytes of the
    /// multiplier operand are all zeros or all ones.
    fn wait_multiply(&self, operand: u32) -> u32 {
        let early_out = |mask: u32| operand & mask == 0 || operand & mask == mask;
        if early_out(0xFFFF_FF00) {
            1
        } else if early_out(0xFFFF_0000) {
            2
        } else if early_out(0xFF00_0000) {
            3
        } else {
            4
        }
    }

    /// Decoded-instruction cache covering this memory.
    fn instruction_cache(&mut self) -> &mut InstructionCache;
}

/// Backing store for one region. The buffer grows on demand up to `size`
/// and reads past its end return zero.
#[derive(Debug, Clone)]
pub struct LinearMemory {
    pub data: Vec<u8>,
    size: u32,
}

impl LinearMemory {
    /// `size` is rounded up to a power of two so offsets can be masked.
    pub fn new(size: u32) -> Self {
        Self {
            data: Vec::new(),
            size: size.max(1).checked_next_power_of_two().unwrap_or(1 << 31),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    fn index(&self, offset: u32) -> usize {
        (offset & (self.size - 1)) as usize
    }

    pub fn read_u8(&self, offset: u32) -> u8 {
        self.data.get(self.index(offset)).copied().unwrap_or(0)
    }

    pub fn read_u16(&self, offset: u32) -> u16 {
        let offset = offset & !1;
        u16::from_le_bytes([self.read_u8(offset), self.read_u8(offset + 1)])
    }

    pub fn read_u32(&self, offset: u32) -> u32 {
        let offset = offset & !3;
        u32::from_le_bytes([
            self.read_u8(offset),
            self.read_u8(offset + 1),
            self.read_u8(offset + 2),
            self.read_u8(offset + 3),
        ])
    }

    pub fn write_u8(&mut self, offset: u32, value: u8) {
        let index = self.index(offset);
        if index >= self.data.len() {
            self.data.resize(index + 1, 0);
        }
        self.data[index] = value;
    }

    pub fn write_u16(&mut self, offset: u32, value: u16) {
        let offset = offset & !1;
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_u8(offset + i as u32, byte);
        }
    }

    pub fn write_u32(&mut self, offset: u32, value: u32) {
        let offset = offset & !3;
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_u8(offset + i as u32, byte);
        }
    }

    /// Copies `bytes` in at `offset`, wrapping at `size`.
    pub fn load_bytes(&mut self, offset: u32, bytes: &[u8]) {
        let start = self.index(offset);
        let end = start + bytes.len();
        if end <= self.size as usize {
            if end > self.data.len() {
                self.data.resize(end, 0);
            }
            self.data[start..end].copy_from_slice(bytes);
        } else {
            for (i, byte) in bytes.iter().enumerate() {
                self.write_u8(offset.wrapping_add(i as u32), *byte);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_memory_mirrors_and_grows() {
        let mut mem = LinearMemory::new(0x100);
        assert_eq!(mem.read_u32(0x40), 0);
        mem.write_u32(0x40, 0xDEAD_BEEF);
        assert_eq!(mem.read_u32(0x140), 0xDEAD_BEEF);
        assert_eq!(mem.read_u16(0x42), 0xDEAD);
        assert_eq!(mem.data.len(), 0x44);
    }

    #[test]
    fn test_load_bytes_wraps() {
        let mut mem = LinearMemory::new(4);
        mem.load_bytes(2, &[1, 2, 3, 4]);
        assert_eq!(mem.read_u32(0), 0x0201_0403);
    }
}

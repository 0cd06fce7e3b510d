// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::cpu::registers::StatusFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Eq,
    Ne,
    Cs,
    Cc,
    Mi,
    Pl,
    Vs,
    Vc,
    Hi,
    Ls,
    Ge,
    Lt,
    Gt,
    Le,
    Al,
}

impl Condition {
    /// Decodes a 4-bit condition field. `0xF` (NV) executes unconditionally
    /// on this core.
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0xF {
            0x0 => Condition::Eq,
            0x1 => Condition::Ne,
            0x2 => Condition::Cs,
            0x3 => Condition::Cc,
            0x4 => Condition::Mi,
            0x5 => Condition::Pl,
            0x6 => Condition::Vs,
            0x7 => Condition::Vc,
            0x8 => Condition::Hi,
            0x9 => Condition::Ls,
            0xA => Condition::Ge,
            0xB => Condition::Lt,
            0xC => Condition::Gt,
            0xD => Condition::Le,
            _ => Condition::Al,
        }
    }

    pub fn passes(self, flags: &StatusFlags) -> bool {
        match self {
            Condition::Eq => flags.z,
            Condition::Ne => !flags.z,
            Condition::Cs => flags.c,
            Condition::Cc => !flags.c,
            Condition::Mi => flags.n,
            Condition::Pl => !flags.n,
            Condition::Vs => flags.v,
            Condition::Vc => !flags.v,
            Condition::Hi => flags.c && !flags.z,
            Condition::Ls => !flags.c || flags.z,
            Condition::Ge => flags.n == flags.v,
            Condition::Lt => flags.n != flags.v,
            Condition::Gt => !flags.z && flags.n == flags.v,
            Condition::Le => flags.z || flags.n != flags.v,
            Condition::Al => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_flag_combinations() -> impl Iterator<Item = StatusFlags> {
        (0u8..16).map(|bits| StatusFlags {
            n: bits & 8 != 0,
            z: bits & 4 != 0,
            c: bits & 2 != 0,
            v: bits & 1 != 0,
            ..StatusFlags::default()
        })
    }

    #[test]
    fn test_complementary_pairs_are_exclusive() {
        for flags in all_flag_combinations() {
            for code in (0..14).step_by(2) {
                let even = Condition::from_bits(code).passes(&flags);
                let odd = Condition::from_bits(code + 1).passes(&flags);
                assert_ne!(even, odd, "code {:#x} flags {:?}", code, flags);
            }
        }
    }

    #[test]
    fn test_always_and_never_both_execute() {
        for flags in all_flag_combinations() {
            assert!(Condition::from_bits(0xE).passes(&flags));
            assert!(Condition::from_bits(0xF).passes(&flags));
        }
    }

    #[test]
    fn test_signed_comparisons() {
        let lt = StatusFlags {
            n: true,
            v: false,
            ..StatusFlags::default()
        };
        assert!(Condition::Lt.passes(&lt));
        assert!(Condition::Le.passes(&lt));
        assert!(!Condition::Gt.passes(&lt));

        let eq = StatusFlags {
            z: true,
            ..StatusFlags::default()
        };
        assert!(Condition::Ge.passes(&eq));
        assert!(!Condition::Gt.passes(&eq));
        assert!(Condition::Ls.passes(&eq));
    }
}

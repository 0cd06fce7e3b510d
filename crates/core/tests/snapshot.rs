// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use labwired_arm7::cpu::registers::Mode;
use labwired_arm7::snapshot::MachineSnapshot;
use labwired_arm7::{ArmCore, InterruptLines, Machine, SimulationError, SystemBus};

const IWRAM: u32 = 0x0300_0000;

fn counter_program() -> SystemBus {
    let program: [u32; 3] = [
        0xE3A0_0000, // MOV r0, #0
        0xE280_0003, // loop: ADD r0, r0, #3
        0xEAFF_FFFD, // B loop
    ];
    let bytes: Vec<u8> = program.iter().flat_map(|w| w.to_le_bytes()).collect();
    let mut bus = SystemBus::new();
    bus.load_image(IWRAM, &bytes).unwrap();
    bus
}

fn boot() -> Machine {
    let mut m = Machine::new(ArmCore::new(), counter_program(), InterruptLines::new());
    m.reset(IWRAM);
    m
}

#[test]
fn test_snapshot_survives_json() {
    let mut m = boot();
    for _ in 0..7 {
        m.step().unwrap();
    }
    m.cpu.regs.switch_mode(Mode::Irq);
    m.cpu.regs.spsr = 0x6000_001F;

    let snap = m.snapshot();
    let json = serde_json::to_string_pretty(&snap).unwrap();
    let decoded: MachineSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, snap);
    assert_eq!(decoded.cpu.banked.len(), 6);
    assert_eq!(decoded.cpu.banked[2].len(), 2);
}

#[test]
fn test_restored_machine_continues_identically() {
    let mut original = boot();
    for _ in 0..5 {
        original.step().unwrap();
    }
    let snap = original.snapshot();

    let mut resumed = boot();
    resumed.apply_snapshot(&snap).unwrap();
    assert_eq!(resumed.cpu.next_address(), original.cpu.next_address());

    for _ in 0..6 {
        original.step().unwrap();
        resumed.step().unwrap();
    }
    assert_eq!(resumed.cpu.reg(0), original.cpu.reg(0));
    assert_eq!(resumed.total_cycles, original.total_cycles);
    assert_eq!(resumed.snapshot(), original.snapshot());
}

#[test]
fn test_malformed_json_snapshot_is_rejected() {
    let mut m = boot();
    let mut value = serde_json::to_value(m.snapshot()).unwrap();
    value["cpu"]["banked_spsrs"] = serde_json::json!([0, 0]);
    let snap: MachineSnapshot = serde_json::from_value(value).unwrap();

    let before = m.snapshot();
    assert!(matches!(
        m.apply_snapshot(&snap),
        Err(SimulationError::InvalidSnapshot(_))
    ));
    assert_eq!(m.snapshot(), before);
}

// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use labwired_arm7::{ArmCore, InterruptLines, Machine, SimulationConfig, SystemBus};

const ROM: u32 = 0x0800_0000;
const STEPS: u64 = 10_000;

fn hot_loop(decode_cache_enabled: bool) -> Machine {
    let program: [u32; 5] = [
        0xE3A0_0000, // MOV r0, #0
        0xE280_0001, // loop: ADD r0, r0, #1
        0xE020_1000, // EOR r1, r0, r0
        0xE351_0000, // CMP r1, #0
        0x0AFF_FFFB, // BEQ loop
    ];
    let bytes: Vec<u8> = program.iter().flat_map(|w| w.to_le_bytes()).collect();
    let mut bus = SystemBus::new();
    if let Err(e) = bus.load_image(ROM, &bytes) {
        panic!("failed to load benchmark program: {}", e);
    }

    let core = ArmCore::with_config(SimulationConfig {
        decode_cache_enabled,
    });
    let mut machine = Machine::new(core, bus, InterruptLines::new());
    machine.reset(ROM);
    machine
}

fn bench_fetch_ips(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch_ips");
    group.throughput(Throughput::Elements(STEPS));

    for cached in [true, false] {
        let label = if cached { "cached" } else { "uncached" };
        group.bench_with_input(BenchmarkId::from_parameter(label), &cached, |b, &cached| {
            let mut machine = hot_loop(cached);
            b.iter(|| {
                for _ in 0..STEPS {
                    black_box(machine.step()).ok();
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fetch_ips);
criterion_main!(benches);

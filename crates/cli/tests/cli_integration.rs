// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn get_temp_path(prefix: &str, extension: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push("labwired-arm7-tests");
    let _ = std::fs::create_dir_all(&dir);

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    dir.join(format!("{}-{}.{}", prefix, nonce, extension))
}

fn write_image(prefix: &str, program: &[u32]) -> PathBuf {
    let path = get_temp_path(prefix, "bin");
    let bytes: Vec<u8> = program.iter().flat_map(|w| w.to_le_bytes()).collect();
    std::fs::write(&path, bytes).unwrap();
    path
}

fn arm7run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_arm7run"))
        .args(args)
        .output()
        .expect("Failed to execute arm7run")
}

fn report(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout
        .lines()
        .rfind(|l| l.starts_with('{'))
        .unwrap_or_else(|| panic!("JSON report not found in output. Stdout: {}", stdout));
    serde_json::from_str(line).expect("Failed to parse JSON report")
}

const MOV_THEN_SPIN: [u32; 2] = [
    0xE3A0_0001, // MOV r0, #1
    0xEAFF_FFFE, // B .
];

#[test]
fn test_cli_json_report() {
    let image = write_image("spin", &MOV_THEN_SPIN);
    let output = arm7run(&[
        "--image",
        image.to_str().unwrap(),
        "--max-steps",
        "10",
        "--json",
    ]);
    assert!(output.status.success());

    let json = report(&output);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["stop_reason"], "max_steps");
    assert_eq!(json["steps_executed"], 10);
    assert_eq!(json["instructions"], 10);
    assert_eq!(json["final_pc"], 0x0800_0004u32);
    assert_eq!(json["decoded_instructions"], 2);
    assert!(json["cycles"].as_u64().unwrap() > 10);
}

#[test]
fn test_cli_breakpoint_stops_run() {
    let image = write_image("bp", &MOV_THEN_SPIN);
    let output = arm7run(&[
        "--image",
        image.to_str().unwrap(),
        "--breakpoint",
        "0x08000004",
        "--json",
    ]);
    assert!(output.status.success());

    let json = report(&output);
    assert_eq!(json["stop_reason"], "breakpoint");
    assert_eq!(json["steps_executed"], 1);
}

#[test]
fn test_cli_missing_image_is_config_error() {
    let output = arm7run(&["--max-steps", "1"]);
    assert_eq!(output.status.code(), Some(2));

    let output = arm7run(&["--image", "/nonexistent/image.bin"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_undefined_instruction_is_runtime_error() {
    let image = write_image("undef", &[0xEE00_0000]);
    let output = arm7run(&["--image", image.to_str().unwrap(), "--json"]);
    assert_eq!(output.status.code(), Some(3));

    let json = report(&output);
    assert_eq!(json["status"], "error");
    assert_eq!(json["stop_reason"], "illegal_instruction");
    assert!(json["message"].as_str().unwrap().contains("0xee000000"));
}

#[test]
fn test_cli_snapshot_save_and_load() {
    let image = write_image(
        "div",
        &[
            0xE3A0_0064, // MOV r0, #100
            0xE3A0_1007, // MOV r1, #7
            0xEF06_0000, // SWI 0x06
            0xEAFF_FFFE, // B .
        ],
    );
    let snapshot_path = get_temp_path("snapshot", "json");

    let output = arm7run(&[
        "--image",
        image.to_str().unwrap(),
        "--hle-bios",
        "--max-steps",
        "5",
        "--snapshot",
        snapshot_path.to_str().unwrap(),
    ]);
    assert!(output.status.success());
    assert!(
        snapshot_path.exists(),
        "Snapshot file should have been created"
    );

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&snapshot_path).unwrap()).unwrap();
    assert_eq!(saved["snapshot_schema_version"], "1.0");
    assert_eq!(saved["steps_executed"], 5);
    assert_eq!(saved["config"]["hle_bios"], true);
    assert_eq!(saved["machine"]["cpu"]["registers"][0], 14);
    assert_eq!(saved["machine"]["cpu"]["registers"][1], 2);

    let output_load = arm7run(&[
        "machine",
        "load",
        "--snapshot",
        snapshot_path.to_str().unwrap(),
        "--max-steps",
        "3",
        "--json",
    ]);
    assert!(output_load.status.success());

    let stderr = String::from_utf8_lossy(&output_load.stderr);
    assert!(
        stderr.contains("Resuming simulation"),
        "Should indicate resumption"
    );
    let json = report(&output_load);
    assert_eq!(json["steps_executed"], 3);
    assert_eq!(json["final_pc"], 0x0800_000Cu32);
    assert!(json["total_cycles"].as_u64().unwrap() > json["cycles"].as_u64().unwrap());
}

// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};

use labwired_arm7::metrics::PerformanceMetrics;
use labwired_arm7::snapshot::MachineSnapshot;
use labwired_arm7::{
    ArmCore, DebugControl, InterruptLines, Machine, Memory, SimulationConfig, SimulationError,
    SystemBus,
};
use labwired_arm7_config::MemoryMapConfig;

const EXIT_PASS: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const SNAPSHOT_SCHEMA_VERSION: &str = "1.0";
const DEFAULT_LOAD_ADDR: u32 = 0x0800_0000;
const PROGRESS_INTERVAL: u64 = 100_000;

fn parse_u32_addr(s: &str) -> Result<u32, String> {
    let trimmed = s.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex address '{}': {}", s, e))
    } else {
        u32::from_str(trimmed).map_err(|e| format!("Invalid address '{}': {}", s, e))
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "ARMv4T core runner",
    long_about = None,
    subcommand_negates_reqs = true
)]
struct Cli {
    /// Raw binary image to execute
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Address the image is copied to
    #[arg(long, value_parser = parse_u32_addr, default_value_t = DEFAULT_LOAD_ADDR)]
    load_addr: u32,

    /// First instruction to execute (defaults to the load address)
    #[arg(long, value_parser = parse_u32_addr)]
    entry: Option<u32>,

    /// Raw BIOS image copied to address 0
    #[arg(long)]
    bios: Option<PathBuf>,

    /// Memory map (YAML). The built-in handheld map is used otherwise.
    #[arg(short, long)]
    map: Option<PathBuf>,

    /// Service BIOS calls (Div, Sqrt, ArcTan, Halt) without a BIOS image
    #[arg(long)]
    hle_bios: bool,

    /// Fail on accesses to unmapped memory
    #[arg(long)]
    strict: bool,

    /// Decode every fetch instead of reusing cached instructions
    #[arg(long)]
    no_decode_cache: bool,

    /// Write a state snapshot (JSON) when the run stops.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Breakpoint address (repeatable). Stops the run when execution reaches it.
    #[arg(long, value_parser = parse_u32_addr)]
    breakpoint: Vec<u32>,

    /// Enable instruction-level execution tracing
    #[arg(short, long, global = true)]
    trace: bool,

    /// Print the final report as a single JSON line on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Maximum number of steps to execute
    #[arg(long, default_value = "20000")]
    max_steps: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Machine control operations (load, etc.)
    Machine(MachineArgs),
}

#[derive(Parser, Debug)]
struct MachineArgs {
    #[command(subcommand)]
    command: MachineCommands,
}

#[derive(Subcommand, Debug)]
enum MachineCommands {
    /// Load a machine state from a snapshot and resume execution.
    Load(LoadArgs),
}

#[derive(Parser, Debug)]
struct LoadArgs {
    /// Path to the snapshot JSON file
    #[arg(short, long)]
    snapshot: PathBuf,

    /// Override maximum number of steps to execute
    #[arg(long)]
    max_steps: Option<u64>,

    /// Breakpoint address (repeatable)
    #[arg(long, value_parser = parse_u32_addr)]
    breakpoint: Vec<u32>,

    /// Write a new snapshot when the resumed run stops
    #[arg(long)]
    save: Option<PathBuf>,
}

/// Everything needed to rebuild the machine around a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunConfig {
    image: PathBuf,
    load_addr: u32,
    entry: u32,
    #[serde(default)]
    bios: Option<PathBuf>,
    #[serde(default)]
    map: Option<PathBuf>,
    #[serde(default)]
    hle_bios: bool,
    #[serde(default)]
    strict: bool,
    decode_cache: bool,
    max_steps: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RunStop {
    MaxSteps,
    Breakpoint,
    IllegalInstruction,
    MemoryViolation,
    UnimplementedSwi,
    InvalidMode,
    InvalidSnapshot,
}

impl RunStop {
    fn from_error(e: &SimulationError) -> Self {
        match e {
            SimulationError::IllegalInstruction { .. } => RunStop::IllegalInstruction,
            SimulationError::MemoryViolation(_) => RunStop::MemoryViolation,
            SimulationError::UnimplementedSwi(_) => RunStop::UnimplementedSwi,
            SimulationError::InvalidMode(_) => RunStop::InvalidMode,
            SimulationError::InvalidSnapshot(_) => RunStop::InvalidSnapshot,
        }
    }

    fn is_error(self) -> bool {
        !matches!(self, RunStop::MaxSteps | RunStop::Breakpoint)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    snapshot_schema_version: String,
    status: String,
    steps_executed: u64,
    stop_reason: RunStop,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    config: RunConfig,
    machine: MachineSnapshot,
}

#[derive(Debug, Serialize)]
struct RunReport {
    status: String,
    stop_reason: RunStop,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    steps_executed: u64,
    instructions: u64,
    cycles: u64,
    total_cycles: u64,
    final_pc: u32,
    thumb: bool,
    decoded_instructions: u64,
    ips: f64,
}

struct LoopResult {
    stop_reason: RunStop,
    steps_executed: u64,
    stop_message: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays machine readable.
    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Some(Commands::Machine(args)) => match &args.command {
            MachineCommands::Load(load_args) => run_machine_load(&cli, load_args),
        },
        None => run_interactive(&cli),
    }
}

fn run_interactive(cli: &Cli) -> ExitCode {
    info!("Starting ARMv4T runner");

    let Some(image) = &cli.image else {
        error!("Missing required --image argument");
        return ExitCode::from(EXIT_CONFIG_ERROR);
    };

    let config = RunConfig {
        image: absolute(image),
        load_addr: cli.load_addr,
        entry: cli.entry.unwrap_or(cli.load_addr),
        bios: cli.bios.as_deref().map(absolute),
        map: cli.map.as_deref().map(absolute),
        hle_bios: cli.hle_bios,
        strict: cli.strict,
        decode_cache: !cli.no_decode_cache,
        max_steps: cli.max_steps,
    };

    let mut machine = match build_machine(&config) {
        Ok(m) => m,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    machine.reset(config.entry);
    info!("Entry Point: {:#010x}", config.entry);

    run_and_report(
        &mut machine,
        &config,
        cli.max_steps,
        &cli.breakpoint,
        cli.snapshot.as_deref(),
        cli.json,
    )
}

fn run_machine_load(cli: &Cli, args: &LoadArgs) -> ExitCode {
    info!("Loading machine from snapshot: {:?}", args.snapshot);

    let snapshot = match read_snapshot(&args.snapshot) {
        Ok(s) => s,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    // Memory contents are not part of the snapshot, so the images are
    // loaded again before the core state is applied.
    let mut machine = match build_machine(&snapshot.config) {
        Ok(m) => m,
        Err(e) => {
            error!("Failed to reconstruct machine: {:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    if let Err(e) = machine.apply_snapshot(&snapshot.machine) {
        error!("Failed to apply snapshot: {}", e);
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    info!(
        "Resuming simulation at {:#010x} after {} steps",
        machine.get_pc(),
        snapshot.steps_executed
    );

    let max_steps = args.max_steps.unwrap_or(snapshot.config.max_steps);
    run_and_report(
        &mut machine,
        &snapshot.config,
        max_steps,
        &args.breakpoint,
        args.save.as_deref(),
        cli.json,
    )
}

/// Snapshots may be resumed from another directory, so recorded paths are
/// made absolute when possible.
fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn read_snapshot(path: &Path) -> anyhow::Result<SnapshotFile> {
    let f = std::fs::File::open(path)
        .with_context(|| format!("Failed to open snapshot {:?}", path))?;
    let snapshot: SnapshotFile = serde_json::from_reader(f)
        .with_context(|| format!("Failed to parse snapshot {:?}", path))?;
    if snapshot.snapshot_schema_version != SNAPSHOT_SCHEMA_VERSION {
        anyhow::bail!(
            "Unsupported snapshot_schema_version '{}'. Supported versions: '{}'",
            snapshot.snapshot_schema_version,
            SNAPSHOT_SCHEMA_VERSION
        );
    }
    Ok(snapshot)
}

fn build_bus(config: &RunConfig) -> anyhow::Result<SystemBus> {
    let mut bus = match &config.map {
        Some(path) => {
            info!("Loading memory map: {:?}", path);
            let map = MemoryMapConfig::from_file(path)?;
            SystemBus::from_config(&map)?
        }
        None => {
            info!("Using default memory map");
            SystemBus::new()
        }
    };
    bus.strict = config.strict;

    if let Some(bios) = &config.bios {
        let bytes =
            std::fs::read(bios).with_context(|| format!("Failed to read BIOS {:?}", bios))?;
        bus.load_image(0, &bytes)
            .with_context(|| format!("BIOS {:?} does not fit at address 0", bios))?;
        info!("BIOS loaded: {} bytes", bytes.len());
    }

    let image = std::fs::read(&config.image)
        .with_context(|| format!("Failed to read image {:?}", config.image))?;
    bus.load_image(config.load_addr, &image).with_context(|| {
        format!(
            "Image {:?} cannot be loaded at {:#010x}",
            config.image, config.load_addr
        )
    })?;
    info!(
        "Image loaded: {} bytes at {:#010x}",
        image.len(),
        config.load_addr
    );

    Ok(bus)
}

fn build_machine(config: &RunConfig) -> anyhow::Result<Machine> {
    let bus = build_bus(config)?;
    let core = ArmCore::with_config(SimulationConfig {
        decode_cache_enabled: config.decode_cache,
    });
    let irq = InterruptLines::new().with_hle_bios(config.hle_bios);
    Ok(Machine::new(core, bus, irq))
}

fn run_and_report(
    machine: &mut Machine,
    config: &RunConfig,
    max_steps: u64,
    breakpoints: &[u32],
    snapshot_path: Option<&Path>,
    json: bool,
) -> ExitCode {
    let metrics = Arc::new(PerformanceMetrics::new());
    machine.observers.push(metrics.clone());
    for &bp in breakpoints {
        machine.add_breakpoint(bp);
    }

    let result = run_simulation_loop(machine, max_steps, &metrics);

    if let Some(path) = snapshot_path {
        write_snapshot(path, machine, config, &result);
    }

    report_metrics(machine, &metrics, &result, json);

    if result.stop_reason.is_error() {
        ExitCode::from(EXIT_RUNTIME_ERROR)
    } else {
        ExitCode::from(EXIT_PASS)
    }
}

fn run_simulation_loop(
    machine: &mut Machine,
    max_steps: u64,
    metrics: &PerformanceMetrics,
) -> LoopResult {
    let mut stop_reason = RunStop::MaxSteps;
    let mut steps_executed: u64 = 0;
    let mut stop_message: Option<String> = None;

    info!("Running for {} steps...", max_steps);
    for observer in &machine.observers {
        observer.on_simulation_start();
    }
    for step in 0..max_steps {
        let pc = machine.get_pc();
        if step > 0 && machine.breakpoints.contains(&(pc & !1)) {
            info!("Breakpoint hit at PC={:#010x} (step={})", pc, step);
            stop_reason = RunStop::Breakpoint;
            break;
        }
        match machine.step() {
            Ok(()) => {
                steps_executed = step + 1;
                if step > 0 && step % PROGRESS_INTERVAL == 0 {
                    info!(
                        "Progress: {} steps, current IPS: {:.2}",
                        step,
                        metrics.get_ips()
                    );
                }
            }
            Err(e) => {
                error!("Simulation error at step {}: {}", step, e);
                stop_reason = RunStop::from_error(&e);
                stop_message = Some(e.to_string());
                break;
            }
        }
    }
    for observer in &machine.observers {
        observer.on_simulation_stop();
    }

    LoopResult {
        stop_reason,
        steps_executed,
        stop_message,
    }
}

fn write_snapshot(path: &Path, machine: &Machine, config: &RunConfig, result: &LoopResult) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!("Failed to create snapshot parent dir {:?}: {}", parent, e);
            return;
        }
    }

    let snapshot = SnapshotFile {
        snapshot_schema_version: SNAPSHOT_SCHEMA_VERSION.to_string(),
        status: status_of(result.stop_reason),
        steps_executed: result.steps_executed,
        stop_reason: result.stop_reason,
        message: result.stop_message.clone(),
        config: config.clone(),
        machine: machine.snapshot(),
    };

    match std::fs::File::create(path) {
        Ok(f) => {
            if let Err(e) = serde_json::to_writer_pretty(f, &snapshot) {
                error!("Failed to write snapshot {:?}: {}", path, e);
            } else {
                info!("Snapshot written to {:?}", path);
            }
        }
        Err(e) => error!("Failed to create snapshot {:?}: {}", path, e),
    }
}

fn status_of(stop: RunStop) -> String {
    let status = if stop.is_error() { "error" } else { "ok" };
    status.to_string()
}

fn report_metrics(
    machine: &mut Machine,
    metrics: &PerformanceMetrics,
    result: &LoopResult,
    json: bool,
) {
    let report = RunReport {
        status: status_of(result.stop_reason),
        stop_reason: result.stop_reason,
        message: result.stop_message.clone(),
        steps_executed: result.steps_executed,
        instructions: metrics.get_instructions(),
        cycles: metrics.get_cycles(),
        total_cycles: machine.total_cycles,
        final_pc: machine.get_pc(),
        thumb: machine.cpu.instruction_width() == 2,
        decoded_instructions: machine.bus.instruction_cache().compiled_count(),
        ips: metrics.get_ips(),
    };

    info!("Simulation loop finished.");
    info!("Final PC: {:#010x}", report.final_pc);
    info!("Total Instructions: {}", report.instructions);
    info!("Total Cycles: {}", report.cycles);
    info!("Average CPI: {:.2}", metrics.get_cpi());
    info!("Average IPS: {:.2}", report.ips);

    if json {
        match serde_json::to_string(&report) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to serialize report: {}", e),
        }
    }
}

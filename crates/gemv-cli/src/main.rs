//! `gemv` — command-line interface for the streaming GEMV accelerator.
//!
//! ```text
//! USAGE:
//!   gemv regs                                   Register map and bit layout
//!   gemv run --len 64 --out-dim 32 [--bias]     One generated run on the model
//!   gemv selftest [--device PATH --base ADDR]   Self-test on model or hardware
//!   gemv status --device PATH --base ADDR       Decode STATUS of a mapped window
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gemv_chip::{dims, regs};
use gemv_driver::selftest::{GeneratedJob, SELF_TEST_SEED};
use gemv_driver::{
    run_self_test, AcceleratorModel, DimMode, DriverConfig, GemvDriver, GemvRegisters,
    ModelConfig, ReferenceEngine, RunConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gemv", about = "Streaming GEMV accelerator CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the register map and CONTROL/STATUS bit layout.
    Regs,
    /// Run one LCG-generated job on the software model and check it.
    Run {
        /// Input vector length (default or extended size).
        #[arg(long, default_value_t = dims::DEFAULT_DIM)]
        len: usize,
        /// Output dimension (default or extended size).
        #[arg(long, default_value_t = dims::DEFAULT_DIM)]
        out_dim: usize,
        /// Enable bias.
        #[arg(long)]
        bias: bool,
        /// LCG seed for the operands.
        #[arg(long, default_value_t = SELF_TEST_SEED)]
        seed: u32,
        /// Fixed completion latency in cycles (default: one cycle per MAC).
        #[arg(long)]
        latency: Option<u64>,
    },
    /// Run the self-test on the model, or on hardware when a device is given.
    Selftest {
        /// Device file to map (e.g. /dev/mem, /dev/uio0).
        #[arg(long, requires = "base")]
        device: Option<String>,
        /// Register base address (hex with 0x, or decimal).
        #[arg(long, requires = "device", value_parser = parse_addr)]
        base: Option<u64>,
    },
    /// Read and decode STATUS of a mapped register window.
    Status {
        /// Device file to map.
        #[arg(long)]
        device: String,
        /// Register base address (hex with 0x, or decimal).
        #[arg(long, value_parser = parse_addr)]
        base: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Regs => cmd_regs(),
        Cmd::Run {
            len,
            out_dim,
            bias,
            seed,
            latency,
        } => cmd_run(len, out_dim, bias, seed, latency)?,
        Cmd::Selftest { device, base } => cmd_selftest(device.as_deref(), base)?,
        Cmd::Status { device, base } => cmd_status(&device, base)?,
    }

    Ok(())
}

fn parse_addr(raw: &str) -> Result<u64, String> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|e| format!("invalid address {raw:?}: {e}"))
}

/// Model cycles per register access; the driver's own polling completes the run.
const BUS_CYCLES_PER_ACCESS: u64 = 16;

fn free_running_model(latency: Option<u64>) -> AcceleratorModel {
    let engine = latency.map_or_else(ReferenceEngine::new, ReferenceEngine::with_fixed_latency);
    AcceleratorModel::with_engine(
        ModelConfig {
            cycles_per_access: BUS_CYCLES_PER_ACCESS,
            ..ModelConfig::default()
        },
        engine,
    )
}

#[cfg(unix)]
fn open_window(device: &str, base: u64) -> Result<gemv_driver::MmioRegisters> {
    gemv_driver::MmioRegisters::open(device, base)
        .with_context(|| format!("mapping GEMV registers from {device} at {base:#x}"))
}

#[cfg(not(unix))]
fn open_window(device: &str, base: u64) -> Result<Box<dyn GemvRegisters>> {
    bail!("MMIO access to {device} at {base:#x} needs a unix host")
}

fn cmd_regs() {
    println!("GEMV register map ({} byte window)", regs::WINDOW_SIZE);
    println!();
    for (name, offset) in regs::ALL {
        println!("  {offset:#04x}  {name}");
    }
    println!();
    println!("CONTROL");
    println!("  bit0  START        (pulse)");
    println!("  bit3  CLEAR_DONE   (pulse)");
    println!("  bit4  LEN_64");
    println!("  bit5  OUT_DIM_64");
    println!("  bit6  BIAS_ENABLE");
    println!("STATUS");
    println!("  bit0  BUSY");
    println!("  bit1  DONE");
    println!("Y_NEXT");
    println!("  bit0  advance read cursor (pulse)");
    println!();
    println!(
        "Sizes: default {} / extended {}; X,W int{}; B,Y int{}",
        dims::DEFAULT_DIM,
        dims::extended(dims::DEFAULT_DIM),
        regs::OPERAND_WIDTH,
        regs::ACCUMULATOR_WIDTH
    );
}

fn dim_mode(flag: &str, size: usize) -> Result<DimMode> {
    DimMode::from_size(size, dims::DEFAULT_DIM).with_context(|| {
        format!(
            "--{flag} must be {} or {}, got {size}",
            dims::DEFAULT_DIM,
            dims::extended(dims::DEFAULT_DIM)
        )
    })
}

fn cmd_run(len: usize, out_dim: usize, bias: bool, seed: u32, latency: Option<u64>) -> Result<()> {
    let config = RunConfig::new(dim_mode("len", len)?, dim_mode("out-dim", out_dim)?, bias);
    let job = GeneratedJob::generate(config, dims::DEFAULT_DIM, seed);
    info!("Generated run: {config:?} seed={seed} latency={latency:?}");

    let mut drv = GemvDriver::with_config(free_running_model(latency), DriverConfig::from_env());
    let y = drv.run(&job.x, &job.w, job.b.as_deref(), config)?;

    println!(
        "len={len} out_dim={out_dim} bias={bias} seed={seed}: {} cycles",
        drv.registers().cycle()
    );
    for (i, (got, want)) in y.iter().zip(&job.expected).enumerate() {
        let mark = if got == want { "" } else { "  MISMATCH" };
        println!("  y[{i:2}] = {got:>8}  (ref {want:>8}){mark}");
    }

    if y != job.expected {
        bail!("outputs differ from the reference");
    }
    println!("PASS");
    Ok(())
}

fn cmd_selftest(device: Option<&str>, base: Option<u64>) -> Result<()> {
    let regs: Box<dyn GemvRegisters> = match (device, base) {
        (Some(device), Some(base)) => {
            info!("Self-test on {device} at {base:#x}");
            Box::new(open_window(device, base)?)
        }
        _ => {
            info!("Self-test on the software model");
            Box::new(free_running_model(None))
        }
    };
    let mut drv = GemvDriver::with_config(regs, DriverConfig::from_env());

    let report = run_self_test(&mut drv)?;
    for case in &report.cases {
        println!("{case}");
    }
    if !report.passed() {
        bail!("GEMV self-test FAIL");
    }
    println!("GEMV self-test PASS");
    Ok(())
}

fn cmd_status(device: &str, base: u64) -> Result<()> {
    let mut regs = open_window(device, base)?;
    info!("Reading STATUS from {device} at {base:#x}");
    let status = regs.read_status();
    println!("STATUS @ {base:#x}: {status} ({:#04b})", status.bits());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_parse_hex_and_decimal() {
        assert_eq!(parse_addr("0x4000_0000".replace('_', "").as_str()), Ok(0x4000_0000));
        assert_eq!(parse_addr("0XFF"), Ok(0xFF));
        assert_eq!(parse_addr("4096"), Ok(4096));
        assert!(parse_addr("0xZZ").is_err());
    }

    #[test]
    fn only_default_and_extended_sizes_accepted() {
        assert_eq!(dim_mode("len", 32).unwrap(), DimMode::Default);
        assert_eq!(dim_mode("len", 64).unwrap(), DimMode::Extended);
        let err = dim_mode("out-dim", 48).unwrap_err();
        assert!(err.to_string().contains("--out-dim"));
    }

    #[test]
    fn run_checks_against_reference() {
        cmd_run(32, 64, true, 9, Some(4)).unwrap();
    }
}

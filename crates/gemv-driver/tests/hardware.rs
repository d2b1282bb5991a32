//! Self-test against a real register window
//!
//! Set `GEMV_DEVICE` (e.g. `/dev/mem` or `/dev/uio0`) and `GEMV_BASE` (hex or
//! decimal) and run with `--ignored`.

#![cfg(unix)]

use gemv_driver::{run_self_test, DriverConfig, GemvDriver, MmioRegisters};

fn parse_base(raw: &str) -> u64 {
    raw.strip_prefix("0x")
        .map_or_else(|| raw.parse(), |hex| u64::from_str_radix(hex, 16))
        .expect("GEMV_BASE must be a number")
}

#[test]
#[ignore] // Requires GEMV hardware
fn test_self_test_on_hardware() {
    let device = std::env::var("GEMV_DEVICE").expect("GEMV_DEVICE not set");
    let base = parse_base(&std::env::var("GEMV_BASE").expect("GEMV_BASE not set"));

    let regs = MmioRegisters::open(&device, base).expect("Failed to map register window");
    let mut drv = GemvDriver::with_config(regs, DriverConfig::from_env());

    let report = run_self_test(&mut drv).expect("Self-test aborted");
    for case in &report.cases {
        println!("{case}");
    }
    assert!(report.passed(), "GEMV self-test FAIL");
}

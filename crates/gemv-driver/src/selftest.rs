//! Accelerator self-test
//!
//! Runs deterministic GEMV jobs through the driver and compares every output
//! with [`reference_gemv`]. Inputs come from a fixed LCG reseeded per case, so
//! a failing case reproduces bit-for-bit on the model, on hardware, and on the
//! bring-up firmware that uses the same generator.
//!
//! | Case | len | out_dim |
//! |------|-----|---------|
//! | 1 | default | default |
//! | 2 | extended | default |
//! | 3 | default | extended |
//! | 4 | extended | extended |

use crate::driver::GemvDriver;
use crate::engine::reference_gemv;
use crate::error::Result;
use crate::registers::GemvRegisters;
use crate::run::{DimMode, RunConfig};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Seed every case starts from.
pub const SELF_TEST_SEED: u32 = 1;

/// The four size combinations, no bias.
pub const SELF_TEST_CASES: [RunConfig; 4] = [
    RunConfig::new(DimMode::Default, DimMode::Default, false),
    RunConfig::new(DimMode::Extended, DimMode::Default, false),
    RunConfig::new(DimMode::Default, DimMode::Extended, false),
    RunConfig::new(DimMode::Extended, DimMode::Extended, false),
];

/// Numerical Recipes LCG; operands take the top byte of each state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    /// Generator at `seed`.
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    fn step(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.state
    }

    /// Next int8 operand.
    pub fn next_i8(&mut self) -> i8 {
        i8::from_be_bytes([self.step().to_be_bytes()[0]])
    }

    /// Next int32 bias, kept within ±2^15 so sums stay readable.
    pub fn next_bias(&mut self) -> i32 {
        i32::from(i16::from_be_bytes([
            self.step().to_be_bytes()[0],
            self.step().to_be_bytes()[0],
        ]))
    }

    /// `n` int8 operands.
    pub fn fill_i8(&mut self, n: usize) -> Vec<i8> {
        (0..n).map(|_| self.next_i8()).collect()
    }
}

/// Operands for one generated job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedJob {
    /// Run configuration
    pub config: RunConfig,
    /// Input vector
    pub x: Vec<i8>,
    /// Weight matrix, row-major
    pub w: Vec<i8>,
    /// Bias, when enabled
    pub b: Option<Vec<i32>>,
    /// Reference outputs
    pub expected: Vec<i32>,
}

impl GeneratedJob {
    /// Generate X, then W, then (if enabled) B from `seed`.
    pub fn generate(config: RunConfig, default_dim: usize, seed: u32) -> Self {
        let len = config.len_elems(default_dim);
        let out_dim = config.out_elems(default_dim);
        let mut lcg = Lcg::new(seed);
        let x = lcg.fill_i8(len);
        let w = lcg.fill_i8(out_dim * len);
        let b = config
            .bias_enable
            .then(|| (0..out_dim).map(|_| lcg.next_bias()).collect::<Vec<_>>());
        let expected = reference_gemv(&w, &x, b.as_deref(), out_dim, len);
        Self {
            config,
            x,
            w,
            b,
            expected,
        }
    }
}

/// First differing output of a case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    /// Output index
    pub index: usize,
    /// Reference value
    pub expected: i32,
    /// Accelerator value
    pub actual: i32,
}

/// Outcome of one case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseReport {
    /// Run configuration
    pub config: RunConfig,
    /// Input length
    pub len: usize,
    /// Output dimension
    pub out_dim: usize,
    /// First mismatch, if any
    pub mismatch: Option<Mismatch>,
    /// Wall time for the full driver cycle
    pub elapsed: Duration,
}

impl CaseReport {
    /// No mismatch.
    pub const fn passed(&self) -> bool {
        self.mismatch.is_none()
    }
}

impl fmt::Display for CaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mismatch {
            None => write!(
                f,
                "PASS len={} out_dim={} ({:?})",
                self.len, self.out_dim, self.elapsed
            ),
            Some(m) => write!(
                f,
                "FAIL len={} out_dim={} i={} ref={:#010x} hw={:#010x}",
                self.len, self.out_dim, m.index, m.expected, m.actual
            ),
        }
    }
}

/// Outcome of the whole self-test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTestReport {
    /// Per-case results, in run order
    pub cases: Vec<CaseReport>,
}

impl SelfTestReport {
    /// Every case passed.
    pub fn passed(&self) -> bool {
        self.cases.iter().all(CaseReport::passed)
    }
}

/// Run one generated job through the driver and compare with the reference.
///
/// # Errors
///
/// Any driver error (busy accelerator, timeout).
pub fn run_case<R: GemvRegisters>(
    driver: &mut GemvDriver<R>,
    config: RunConfig,
    seed: u32,
) -> Result<CaseReport> {
    let default_dim = driver.config().default_dim;
    let job = GeneratedJob::generate(config, default_dim, seed);

    let start = Instant::now();
    let actual = driver.run(&job.x, &job.w, job.b.as_deref(), config)?;
    let elapsed = start.elapsed();

    let mismatch = job
        .expected
        .iter()
        .zip(actual.iter())
        .enumerate()
        .find(|(_, (e, a))| e != a)
        .map(|(index, (&expected, &actual))| Mismatch {
            index,
            expected,
            actual,
        });

    let report = CaseReport {
        config,
        len: config.len_elems(default_dim),
        out_dim: config.out_elems(default_dim),
        mismatch,
        elapsed,
    };
    if report.passed() {
        info!("{report}");
    } else {
        warn!("{report}");
    }
    Ok(report)
}

/// Run all [`SELF_TEST_CASES`], each from [`SELF_TEST_SEED`].
///
/// Mismatches are reported, not returned as errors; every case runs.
///
/// # Errors
///
/// Any driver error aborts the remaining cases.
pub fn run_self_test<R: GemvRegisters>(driver: &mut GemvDriver<R>) -> Result<SelfTestReport> {
    let cases = SELF_TEST_CASES
        .iter()
        .map(|&config| run_case(driver, config, SELF_TEST_SEED))
        .collect::<Result<Vec<_>>>()?;
    let report = SelfTestReport { cases };
    if report.passed() {
        info!("GEMV self-test PASS");
    }
    Ok(report)
}

//! Compute engine behind the register file
//!
//! The arithmetic core is external IP. The model only needs a deterministic
//! function from the sampled mode bits and operand stores to an output buffer
//! plus a completion latency, so the engine is a pluggable strategy:
//!
//! ```text
//! accepted start ─► Job { config, x[len], w[out_dim × len], b[out_dim]? }
//!                      │
//!                      ▼  ComputeEngine::compute
//!                 Completion { outputs[out_dim], latency_cycles }
//! ```
//!
//! [`ReferenceEngine`] is the integer GEMV the hardware is validated against.
//! [`from_fn`] turns any closure into an engine for protocol tests that want
//! outputs unrelated to the arithmetic (index tags, sums, fixed latencies).

use crate::run::RunConfig;

/// Operands and configuration sampled when a start is accepted
#[derive(Debug, Clone, Copy)]
pub struct Job<'a> {
    /// Mode bits sampled at start
    pub config: RunConfig,
    /// Input vector length
    pub len: usize,
    /// Output dimension
    pub out_dim: usize,
    /// Input vector, `len` elements
    pub x: &'a [i8],
    /// Weight matrix, row-major, `out_dim × len` elements
    pub w: &'a [i8],
    /// Bias, `out_dim` elements, present only when bias is enabled
    pub b: Option<&'a [i32]>,
}

/// Engine result for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Output vector; the model fits it to `out_dim`
    pub outputs: Vec<i32>,
    /// Cycles from the accepted start until `done`; the model clamps to ≥ 1
    pub latency_cycles: u64,
}

/// Opaque compute engine strategy
pub trait ComputeEngine: Send {
    /// Produce the outputs and latency for a run.
    fn compute(&self, job: &Job<'_>) -> Completion;

    /// Short name for logs.
    fn name(&self) -> &str {
        "custom"
    }
}

/// Latency model for [`ReferenceEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Latency {
    /// One multiply-accumulate per cycle: `out_dim × len` cycles
    #[default]
    PerMac,
    /// Fixed cycle count regardless of size
    Fixed(u64),
}

/// Integer GEMV: `y = W·x (+ b)` with wrapping 32-bit accumulation
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceEngine {
    latency: Latency,
}

impl ReferenceEngine {
    /// Reference engine with one-MAC-per-cycle latency.
    pub const fn new() -> Self {
        Self {
            latency: Latency::PerMac,
        }
    }

    /// Reference engine with a fixed completion latency.
    pub const fn with_fixed_latency(cycles: u64) -> Self {
        Self {
            latency: Latency::Fixed(cycles),
        }
    }

    /// Configured latency model.
    pub const fn latency(&self) -> Latency {
        self.latency
    }
}

impl ComputeEngine for ReferenceEngine {
    fn compute(&self, job: &Job<'_>) -> Completion {
        let latency_cycles = match self.latency {
            Latency::PerMac => (job.out_dim * job.len) as u64,
            Latency::Fixed(cycles) => cycles,
        };
        Completion {
            outputs: reference_gemv(job.w, job.x, job.b, job.out_dim, job.len),
            latency_cycles,
        }
    }

    fn name(&self) -> &str {
        "reference"
    }
}

/// Closure-backed engine, see [`from_fn`]
pub struct FnEngine<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnEngine<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnEngine").finish_non_exhaustive()
    }
}

impl<F> ComputeEngine for FnEngine<F>
where
    F: Fn(&Job<'_>) -> Completion + Send,
{
    fn compute(&self, job: &Job<'_>) -> Completion {
        (self.f)(job)
    }
}

/// Wrap a closure as a compute engine.
pub fn from_fn<F>(f: F) -> FnEngine<F>
where
    F: Fn(&Job<'_>) -> Completion + Send,
{
    FnEngine { f }
}

/// Software reference GEMV.
///
/// `w` is row-major `[out_dim][len]`. Missing trailing elements in any
/// operand read as zero; bias is added when present.
pub fn reference_gemv(
    w: &[i8],
    x: &[i8],
    b: Option<&[i32]>,
    out_dim: usize,
    len: usize,
) -> Vec<i32> {
    (0..out_dim)
        .map(|i| {
            let row = w.get(i * len..).unwrap_or(&[]);
            let acc = row
                .iter()
                .take(len)
                .zip(x.iter())
                .fold(0i32, |acc, (&wk, &xk)| {
                    acc.wrapping_add(i32::from(wk) * i32::from(xk))
                });
            let bias = b.and_then(|b| b.get(i)).copied().unwrap_or(0);
            acc.wrapping_add(bias)
        })
        .collect()
}

//! Host driver and register-level model for the streaming GEMV accelerator.
//!
//! The accelerator computes `y = W·x (+ b)` over int8 operands with int32
//! accumulation. Operands are streamed word by word into write-only FIFOs,
//! a pulse on CONTROL starts the run, STATUS reports busy/done, and outputs are
//! drained one element at a time through Y_OUT/Y_NEXT.
//!
//! # Register backends
//!
//! ```text
//! GemvDriver<R: GemvRegisters>
//!   ├─ AcceleratorModel  — software model, harness-driven clock
//!   ├─ SharedModel       — Arc<Mutex<AcceleratorModel>>, clock on another thread
//!   └─ MmioRegisters     — mmap'd register window (unix)
//! ```
//!
//! # Quick start
//!
//! ```
//! use gemv_driver::prelude::*;
//!
//! # fn main() -> gemv_driver::Result<()> {
//! let model = AcceleratorModel::with_engine(
//!     ModelConfig { cycles_per_access: 1, ..ModelConfig::default() },
//!     ReferenceEngine::with_fixed_latency(4),
//! );
//! let mut drv = GemvDriver::new(model);
//!
//! let x = [1i8; 32];
//! let w = [2i8; 32 * 32];
//! let y = drv.run(&x, &w, None, RunConfig::default())?;
//! assert_eq!(y, vec![64; 32]);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `GEMV_POLL_INTERVAL_US` | 100 | STATUS poll interval for [`GemvDriver::run`] |
//! | `GEMV_TIMEOUT_MS` | 1000 | completion deadline for [`GemvDriver::run`] |

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod driver;
pub mod engine;
mod error;
#[cfg(unix)]
pub mod mmio;
mod model;
mod registers;
mod run;
pub mod selftest;
mod shared;

pub use driver::{DriverConfig, GemvDriver};
pub use engine::{from_fn, reference_gemv, Completion, ComputeEngine, Job, Latency, ReferenceEngine};
pub use error::{GemvError, Result};
#[cfg(unix)]
pub use mmio::MmioRegisters;
pub use model::{AcceleratorModel, ModelConfig, OperandSnapshot, Phase, RegisterWrite};
pub use registers::{GemvRegisters, Status};
pub use run::{ControlWrite, DimMode, RunConfig};
pub use selftest::{run_self_test, CaseReport, SelfTestReport};
pub use shared::SharedModel;

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        AcceleratorModel, DimMode, DriverConfig, GemvDriver, GemvError, GemvRegisters,
        ModelConfig, ReferenceEngine, Result, RunConfig, SharedModel, Status,
    };
}

//! Software model of the accelerator's register-visible behaviour
//!
//! A synchronous register file plus the start/busy/done state machine,
//! reproduced access by access. It is the test double the driver runs against
//! in CI and the behavioural oracle for hardware bring-up.
//!
//! ```text
//!            start (not busy)              completion (latency ≥ 1 cycle)
//!   IDLE ───────────────────────► RUNNING ──────────────────────────────► DONE
//!    ▲                              │  ▲                                   │
//!    │                              └──┘ start while busy: ignored         │
//!    └─────────────────────────── clear_done ◄─────────────────────────────┘
//!                                  (DONE also accepts a new start)
//! ```
//!
//! Hardware quirks are reproduced, not fixed:
//! - a start pulse while busy is dropped without any error signal;
//! - Y_NEXT past the last output saturates, Y_OUT keeps returning the last
//!   element;
//! - operand writes while running land in the stores for the *next* run (the
//!   in-flight run was snapshotted at start); the hardware leaves this
//!   undefined, and the driver refuses to issue them.
//!
//! Time only moves through [`AcceleratorModel::advance`], or through
//! [`ModelConfig::cycles_per_access`] when a free-running bus clock is wanted.

use crate::engine::{Completion, ComputeEngine, Job, ReferenceEngine};
use crate::registers::{GemvRegisters, Status};
use crate::run::{ControlWrite, RunConfig};
use gemv_chip::dims;
use gemv_chip::regs::y_next;
use tracing::{debug, info, trace, warn};

/// Model configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelConfig {
    /// Default run size; the extended mode doubles it
    pub default_dim: usize,
    /// Cycles each register access advances the clock (0 = harness-driven only)
    pub cycles_per_access: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_dim: dims::DEFAULT_DIM,
            cycles_per_access: 0,
        }
    }
}

/// Handshake phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not started, or cleared
    Idle,
    /// Start accepted, waiting for completion
    Running,
    /// Completed, outputs readable
    Done,
}

/// A single register write, tagged by target register.
///
/// Every write goes through [`AcceleratorModel::apply`]; pulse bits are
/// consumed there and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterWrite {
    /// X_IN
    X(i8),
    /// W_IN
    W(i8),
    /// B_IN
    B(i32),
    /// CONTROL
    Control(ControlWrite),
    /// Y_NEXT (raw bits)
    YNext(u32),
}

/// Operand stores as written so far, in write order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandSnapshot<'a> {
    /// X store up to its write cursor
    pub x: &'a [i8],
    /// W store up to its write cursor
    pub w: &'a [i8],
    /// B store up to its write cursor
    pub b: &'a [i32],
}

/// Fixed-capacity streaming store with a hidden write cursor
#[derive(Debug, Clone)]
struct Store<T> {
    data: Vec<T>,
    cursor: usize,
}

impl<T: Copy + Default> Store<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![T::default(); capacity],
            cursor: 0,
        }
    }

    /// Store at the cursor and advance; `false` when the store is full.
    fn push(&mut self, value: T) -> bool {
        match self.data.get_mut(self.cursor) {
            Some(slot) => {
                *slot = value;
                self.cursor += 1;
                true
            }
            None => false,
        }
    }

    fn written(&self) -> &[T] {
        &self.data[..self.cursor]
    }

    fn head(&self, n: usize) -> &[T] {
        &self.data[..n.min(self.data.len())]
    }

    fn rewind(&mut self) {
        self.cursor = 0;
    }
}

#[derive(Debug)]
struct InFlight {
    remaining: u64,
    outputs: Vec<i32>,
}

/// Register-level accelerator model
pub struct AcceleratorModel {
    config: ModelConfig,
    engine: Box<dyn ComputeEngine>,

    /// CONTROL storage (levels; pulse bits are acted on at write time only)
    control: u32,
    x: Store<i8>,
    w: Store<i8>,
    b: Store<i32>,

    phase: Phase,
    in_flight: Option<InFlight>,
    run_config: Option<RunConfig>,

    /// Outputs of the most recently completed run
    results: Vec<i32>,
    y_cursor: usize,

    cycle: u64,
    runs_completed: u64,
    ignored_starts: u64,
    dropped_writes: u64,
}

impl std::fmt::Debug for AcceleratorModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcceleratorModel")
            .field("engine", &self.engine.name())
            .field("phase", &self.phase)
            .field("control", &format_args!("{:#04x}", self.control))
            .field("x_cursor", &self.x.cursor)
            .field("w_cursor", &self.w.cursor)
            .field("b_cursor", &self.b.cursor)
            .field("y_cursor", &self.y_cursor)
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

impl Default for AcceleratorModel {
    fn default() -> Self {
        Self::new(ModelConfig::default())
    }
}

impl AcceleratorModel {
    /// Model backed by the reference GEMV engine.
    pub fn new(config: ModelConfig) -> Self {
        Self::with_engine(config, ReferenceEngine::new())
    }

    /// Model backed by a custom compute engine.
    pub fn with_engine(config: ModelConfig, engine: impl ComputeEngine + 'static) -> Self {
        let dd = config.default_dim;
        debug!(
            "Model: default_dim={dd}, cycles_per_access={}, engine={}",
            config.cycles_per_access,
            engine.name()
        );
        Self {
            config,
            engine: Box::new(engine),
            control: 0,
            x: Store::with_capacity(dims::vector_capacity(dd)),
            w: Store::with_capacity(dims::matrix_capacity(dd)),
            b: Store::with_capacity(dims::vector_capacity(dd)),
            phase: Phase::Idle,
            in_flight: None,
            run_config: None,
            results: Vec::new(),
            y_cursor: 0,
            cycle: 0,
            runs_completed: 0,
            ignored_starts: 0,
            dropped_writes: 0,
        }
    }

    /// Apply one register write and run the transition it triggers.
    pub fn apply(&mut self, write: RegisterWrite) {
        trace!(cycle = self.cycle, ?write, "register write");
        match write {
            RegisterWrite::X(v) => {
                self.note_operand_write("X_IN");
                if !self.x.push(v) {
                    self.drop_write("X_IN");
                }
            }
            RegisterWrite::W(v) => {
                self.note_operand_write("W_IN");
                if !self.w.push(v) {
                    self.drop_write("W_IN");
                }
            }
            RegisterWrite::B(v) => {
                self.note_operand_write("B_IN");
                if !self.b.push(v) {
                    self.drop_write("B_IN");
                }
            }
            RegisterWrite::Control(ctrl) => {
                self.control = ctrl.storage;
                if ctrl.clear_done {
                    self.clear_done();
                }
                if ctrl.start {
                    self.start(ctrl.config);
                }
            }
            RegisterWrite::YNext(bits) => {
                if bits & y_next::ADVANCE != 0 {
                    self.advance_read_cursor();
                }
            }
        }
    }

    /// Raw Y_NEXT write; only bit0 advances the read cursor.
    pub fn write_y_next(&mut self, bits: u32) {
        self.bus_cycle();
        self.apply(RegisterWrite::YNext(bits));
    }

    /// Advance the clock. A running job completes once its latency has elapsed.
    pub fn advance(&mut self, cycles: u64) {
        self.cycle = self.cycle.saturating_add(cycles);
        let Some(run) = self.in_flight.as_mut() else {
            return;
        };
        run.remaining = run.remaining.saturating_sub(cycles);
        if run.remaining == 0 {
            self.complete();
        }
    }

    /// Advance until the in-flight run completes. Returns the cycles spent.
    pub fn run_to_completion(&mut self) -> u64 {
        let remaining = self.in_flight.as_ref().map_or(0, |run| run.remaining);
        self.advance(remaining);
        remaining
    }

    /// STATUS as a pure function of the current phase.
    pub const fn status(&self) -> Status {
        match self.phase {
            Phase::Idle => Status::IDLE,
            Phase::Running => Status::BUSY,
            Phase::Done => Status::DONE,
        }
    }

    /// Y_OUT at the current read cursor; 0 before any run has completed.
    pub fn y_out(&self) -> i32 {
        self.results.get(self.y_cursor).copied().unwrap_or(0)
    }

    /// Operand stores up to their write cursors.
    pub fn operands(&self) -> OperandSnapshot<'_> {
        OperandSnapshot {
            x: self.x.written(),
            w: self.w.written(),
            b: self.b.written(),
        }
    }

    /// Current handshake phase.
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Mode bits of the in-flight or most recent run.
    pub const fn run_config(&self) -> Option<RunConfig> {
        self.run_config
    }

    /// CONTROL storage (level bits as last written).
    pub const fn control_storage(&self) -> u32 {
        self.control
    }

    /// Y read cursor.
    pub const fn y_cursor(&self) -> usize {
        self.y_cursor
    }

    /// Outputs of the most recently completed run.
    pub fn results(&self) -> &[i32] {
        &self.results
    }

    /// Elapsed cycles.
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Runs that reached DONE.
    pub const fn runs_completed(&self) -> u64 {
        self.runs_completed
    }

    /// Start pulses dropped because the core was busy.
    pub const fn ignored_starts(&self) -> u64 {
        self.ignored_starts
    }

    /// Operand writes dropped because a store was full.
    pub const fn dropped_writes(&self) -> u64 {
        self.dropped_writes
    }

    /// Model configuration.
    pub const fn config(&self) -> ModelConfig {
        self.config
    }

    fn bus_cycle(&mut self) {
        if self.config.cycles_per_access > 0 {
            self.advance(self.config.cycles_per_access);
        }
    }

    fn note_operand_write(&self, reg: &str) {
        if self.phase == Phase::Running {
            warn!("{reg} written while running; effect on the in-flight run is undefined");
        }
    }

    fn drop_write(&mut self, reg: &str) {
        self.dropped_writes += 1;
        warn!("{reg} store full; write dropped");
    }

    fn start(&mut self, config: RunConfig) {
        if self.phase == Phase::Running {
            self.ignored_starts += 1;
            warn!("Start pulse while busy ignored (cycle {})", self.cycle);
            return;
        }

        let dd = self.config.default_dim;
        let len = config.len_elems(dd);
        let out_dim = config.out_elems(dd);
        let job = Job {
            config,
            len,
            out_dim,
            x: self.x.head(len),
            w: self.w.head(config.weight_elems(dd)),
            b: config.bias_enable.then(|| self.b.head(out_dim)),
        };
        let Completion {
            mut outputs,
            latency_cycles,
        } = self.engine.compute(&job);
        outputs.resize(out_dim, 0);

        self.x.rewind();
        self.w.rewind();
        self.b.rewind();
        self.y_cursor = 0;
        self.phase = Phase::Running;
        self.run_config = Some(config);
        self.in_flight = Some(InFlight {
            remaining: latency_cycles.max(1),
            outputs,
        });

        info!(
            "Run started: len={len} out_dim={out_dim} bias={} latency={} cycles",
            config.bias_enable,
            latency_cycles.max(1)
        );
    }

    fn complete(&mut self) {
        let Some(run) = self.in_flight.take() else {
            return;
        };
        self.results = run.outputs;
        self.y_cursor = 0;
        self.phase = Phase::Done;
        self.runs_completed += 1;
        info!(
            "Run complete at cycle {} ({} outputs)",
            self.cycle,
            self.results.len()
        );
    }

    fn clear_done(&mut self) {
        if self.phase == Phase::Done {
            self.phase = Phase::Idle;
            debug!("Done cleared");
        }
    }

    fn advance_read_cursor(&mut self) {
        if self.y_cursor + 1 < self.results.len() {
            self.y_cursor += 1;
        } else {
            debug!("Y_NEXT saturated at index {}", self.y_cursor);
        }
    }
}

impl GemvRegisters for AcceleratorModel {
    fn write_x(&mut self, value: i8) {
        self.bus_cycle();
        self.apply(RegisterWrite::X(value));
    }

    fn write_w(&mut self, value: i8) {
        self.bus_cycle();
        self.apply(RegisterWrite::W(value));
    }

    fn write_b(&mut self, value: i32) {
        self.bus_cycle();
        self.apply(RegisterWrite::B(value));
    }

    fn write_control(&mut self, bits: u32) {
        self.bus_cycle();
        self.apply(RegisterWrite::Control(ControlWrite::decode(bits)));
    }

    fn read_status(&mut self) -> Status {
        self.bus_cycle();
        self.status()
    }

    fn read_y(&mut self) -> i32 {
        self.bus_cycle();
        self.y_out()
    }

    fn pulse_y_next(&mut self) {
        self.write_y_next(y_next::ADVANCE);
    }
}

//! Host-side GEMV driver
//!
//! Sequences register accesses into safe operations and enforces the protocol
//! rules the accelerator itself does not:
//!
//! ```text
//! load_operands ──► start_run ──► wait_done ──► read_outputs ──► clear
//!   X_IN/W_IN/B_IN    CONTROL       STATUS        Y_OUT, Y_NEXT    CONTROL
//!   (not busy)        (not busy,    (poll until   (done, once      (not busy)
//!                     operands      done or       per run)
//!                     loaded)       timeout)
//! ```
//!
//! The hardware drops a start pulse while busy and has no fence between
//! operand writes and start, so the driver checks STATUS itself and tracks
//! "all operands loaded". Every rejection happens before any register write,
//! leaving the accelerator untouched.

use crate::error::{GemvError, Result};
use crate::registers::{GemvRegisters, Status};
use crate::run::RunConfig;
use gemv_chip::dims;
use gemv_chip::regs::control;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// STATUS poll interval used by [`GemvDriver::run`]
    pub poll_interval: Duration,
    /// Completion deadline used by [`GemvDriver::run`]
    pub timeout: Duration,
    /// Default run size of the paired compute IP
    pub default_dim: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_micros(100),
            timeout: Duration::from_secs(1),
            default_dim: dims::DEFAULT_DIM,
        }
    }
}

impl DriverConfig {
    /// Defaults, overridden by `GEMV_POLL_INTERVAL_US` and `GEMV_TIMEOUT_MS`.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(us) = env_u64("GEMV_POLL_INTERVAL_US") {
            config.poll_interval = Duration::from_micros(us);
        }
        if let Some(ms) = env_u64("GEMV_TIMEOUT_MS") {
            config.timeout = Duration::from_millis(ms);
        }
        debug!(
            "Driver config: poll={:?} timeout={:?} default_dim={}",
            config.poll_interval, config.timeout, config.default_dim
        );
        config
    }

    /// Same configuration with a different default size.
    #[must_use]
    pub const fn with_default_dim(mut self, default_dim: usize) -> Self {
        self.default_dim = default_dim;
        self
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Ignoring {name}={raw:?}: {e}");
            None
        }
    }
}

/// Run started by this driver and not yet cleared
#[derive(Debug, Clone, Copy)]
struct ActiveRun {
    config: RunConfig,
    out_dim: usize,
    drained: bool,
}

/// GEMV accelerator driver over any register backend
#[derive(Debug)]
pub struct GemvDriver<R> {
    regs: R,
    config: DriverConfig,
    /// Operands fully streamed since the last accepted start
    loaded: Option<RunConfig>,
    run: Option<ActiveRun>,
}

impl<R: GemvRegisters> GemvDriver<R> {
    /// Driver with default configuration.
    pub fn new(regs: R) -> Self {
        Self::with_config(regs, DriverConfig::default())
    }

    /// Driver with explicit configuration.
    pub fn with_config(regs: R, config: DriverConfig) -> Self {
        Self {
            regs,
            config,
            loaded: None,
            run: None,
        }
    }

    /// Driver configuration.
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Register backend.
    pub const fn registers(&self) -> &R {
        &self.regs
    }

    /// Register backend, mutably. Raw accesses bypass the driver's checks.
    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    /// Release the register backend.
    pub fn into_inner(self) -> R {
        self.regs
    }

    /// Current STATUS.
    pub fn status(&mut self) -> Status {
        self.regs.read_status()
    }

    /// Stream the operands for the next run.
    ///
    /// Each operand is fitted to the size `config` selects: longer inputs are
    /// truncated, shorter ones zero-padded, so every write cursor ends exactly
    /// on the run size. `b` is streamed whenever given; the core reads it only
    /// with `bias_enable`.
    ///
    /// Only an accepted start rewinds the operand write cursors, so a load
    /// must be followed by [`start_run`](Self::start_run) before the next
    /// load. A second load would append after the first and the run would
    /// compute on the first load's elements.
    ///
    /// # Errors
    ///
    /// - [`GemvError::InvalidOperand`] if bias is enabled without `b`
    /// - [`GemvError::Protocol`] if the accelerator is busy, or operands are
    ///   already loaded and waiting for a start
    pub fn load_operands(
        &mut self,
        x: &[i8],
        w: &[i8],
        b: Option<&[i32]>,
        config: RunConfig,
    ) -> Result<()> {
        if config.bias_enable && b.is_none() {
            return Err(GemvError::invalid_operand(
                "bias enabled but no bias values given",
            ));
        }
        let status = self.regs.read_status();
        if status.busy() {
            return Err(GemvError::protocol(
                "load_operands",
                "operand writes while busy have undefined effect on the running job",
            ));
        }
        if let Some(pending) = self.loaded {
            return Err(GemvError::protocol(
                "load_operands",
                format!("operands for {pending:?} already loaded; start them first"),
            ));
        }

        let dd = self.config.default_dim;
        let len = config.len_elems(dd);
        let out_dim = config.out_elems(dd);

        let regs = &mut self.regs;
        stream(x, len, "x", |v| regs.write_x(v));
        stream(w, config.weight_elems(dd), "w", |v| regs.write_w(v));
        if let Some(b) = b {
            stream(b, out_dim, "b", |v| regs.write_b(v));
        }

        self.loaded = Some(config);
        debug!(
            "Operands loaded: len={len} out_dim={out_dim} bias={}",
            config.bias_enable
        );
        Ok(())
    }

    /// Issue the start pulse for the loaded operands. Does not block.
    ///
    /// # Errors
    ///
    /// [`GemvError::Protocol`] if the accelerator is busy (the pulse would be
    /// dropped) or no operands were loaded since the last start.
    pub fn start_run(&mut self) -> Result<()> {
        let status = self.regs.read_status();
        if status.busy() {
            return Err(GemvError::protocol(
                "start_run",
                "accelerator busy; start pulse would be ignored",
            ));
        }
        let Some(config) = self.loaded.take() else {
            return Err(GemvError::protocol(
                "start_run",
                "no operands loaded since the last start",
            ));
        };

        self.regs.write_control(control::START | config.control_bits());
        let out_dim = config.out_elems(self.config.default_dim);
        self.run = Some(ActiveRun {
            config,
            out_dim,
            drained: false,
        });
        info!("Run started: {config:?}");
        Ok(())
    }

    /// Poll STATUS every `poll_interval` until done.
    ///
    /// A timed-out run stays recorded: the accelerator keeps running, and a
    /// later `wait_done` or `clear` picks it up.
    ///
    /// # Errors
    ///
    /// - [`GemvError::Timeout`] if done is not seen within `timeout`
    /// - [`GemvError::Protocol`] if this driver has not started a run
    pub fn wait_done(&mut self, poll_interval: Duration, timeout: Duration) -> Result<()> {
        if self.run.is_none() {
            return Err(GemvError::protocol("wait_done", "no run started"));
        }

        let start = Instant::now();
        let mut polls = 0u64;
        loop {
            polls += 1;
            if self.regs.read_status().done() {
                debug!("Done after {polls} polls ({:?})", start.elapsed());
                return Ok(());
            }
            if start.elapsed() >= timeout {
                warn!("No done after {timeout:?} ({polls} polls)");
                return Err(GemvError::timeout(timeout));
            }
            std::thread::sleep(poll_interval.min(timeout.saturating_sub(start.elapsed())));
        }
    }

    /// Drain the completed run's outputs, index 0 first.
    ///
    /// # Errors
    ///
    /// [`GemvError::Protocol`] if the accelerator is not done, no run was
    /// started, or this run was already drained.
    pub fn read_outputs(&mut self) -> Result<Vec<i32>> {
        let status = self.regs.read_status();
        if !status.done() {
            return Err(GemvError::protocol(
                "read_outputs",
                format!("accelerator not done (status: {status})"),
            ));
        }
        let Some(run) = self.run.as_mut() else {
            return Err(GemvError::protocol("read_outputs", "no run started"));
        };
        if run.drained {
            return Err(GemvError::protocol(
                "read_outputs",
                "outputs already drained; read cursor is saturated",
            ));
        }

        let outputs = self.regs.drain_outputs(run.out_dim);
        run.drained = true;
        debug!("Drained {} outputs for {:?}", outputs.len(), run.config);
        Ok(outputs)
    }

    /// Pulse clear-done, returning the accelerator to idle.
    ///
    /// Safe with or without a drained output buffer, and a no-op when already
    /// idle.
    ///
    /// # Errors
    ///
    /// [`GemvError::Protocol`] while busy: the core has no abort, so clearing
    /// cannot end a running job.
    pub fn clear(&mut self) -> Result<()> {
        let status = self.regs.read_status();
        if status.busy() {
            return Err(GemvError::protocol(
                "clear",
                "accelerator busy; a running job cannot be aborted",
            ));
        }
        self.regs.write_control(control::CLEAR_DONE);
        if let Some(run) = self.run.take() {
            if !run.drained {
                debug!("Cleared without draining {} outputs", run.out_dim);
            }
        }
        Ok(())
    }

    /// Full cycle: clear, load, start, wait, drain, clear.
    ///
    /// Uses the poll interval and timeout from [`DriverConfig`].
    ///
    /// # Errors
    ///
    /// Any error from the individual steps.
    pub fn run(
        &mut self,
        x: &[i8],
        w: &[i8],
        b: Option<&[i32]>,
        config: RunConfig,
    ) -> Result<Vec<i32>> {
        self.clear()?;
        self.load_operands(x, w, b, config)?;
        self.start_run()?;
        self.wait_done(self.config.poll_interval, self.config.timeout)?;
        let outputs = self.read_outputs()?;
        self.clear()?;
        Ok(outputs)
    }
}

/// Write exactly `count` elements: `src` truncated or zero-padded.
fn stream<T: Copy + Default>(src: &[T], count: usize, name: &str, write: impl FnMut(T)) {
    if src.len() > count {
        warn!("{name}: {} elements given, truncating to {count}", src.len());
    } else if src.len() < count {
        debug!("{name}: {} elements given, zero-padding to {count}", src.len());
    }
    src.iter()
        .copied()
        .chain(std::iter::repeat(T::default()))
        .take(count)
        .for_each(write);
}

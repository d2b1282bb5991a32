//! Shared, mutex-guarded model handle
//!
//! The register file is the only shared mutable resource. When a harness
//! thread drives the clock while a driver polls, both go through one
//! `Arc<Mutex<AcceleratorModel>>`. Single accesses lock per call;
//! [`SharedModel::with`] holds the lock across a multi-register sequence so it
//! cannot be torn; output drains go through it, so each read/advance pair is
//! atomic with respect to other handles.

use crate::model::AcceleratorModel;
use crate::registers::{GemvRegisters, Status};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cloneable handle to one accelerator model
#[derive(Debug, Clone, Default)]
pub struct SharedModel {
    inner: Arc<Mutex<AcceleratorModel>>,
}

impl SharedModel {
    /// Wrap a model for shared access.
    pub fn new(model: AcceleratorModel) -> Self {
        Self {
            inner: Arc::new(Mutex::new(model)),
        }
    }

    /// Run `f` with exclusive access to the whole register file.
    pub fn with<T>(&self, f: impl FnOnce(&mut AcceleratorModel) -> T) -> T {
        f(&mut *self.lock())
    }

    /// Advance the model clock.
    pub fn advance(&self, cycles: u64) {
        self.lock().advance(cycles);
    }

    // A panic while holding the lock cannot leave a register access half
    // applied, so a poisoned lock is still a consistent model.
    fn lock(&self) -> MutexGuard<'_, AcceleratorModel> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl GemvRegisters for SharedModel {
    fn write_x(&mut self, value: i8) {
        self.lock().write_x(value);
    }

    fn write_w(&mut self, value: i8) {
        self.lock().write_w(value);
    }

    fn write_b(&mut self, value: i32) {
        self.lock().write_b(value);
    }

    fn write_control(&mut self, bits: u32) {
        self.lock().write_control(bits);
    }

    fn read_status(&mut self) -> Status {
        self.lock().read_status()
    }

    fn read_y(&mut self) -> i32 {
        self.lock().read_y()
    }

    fn pulse_y_next(&mut self) {
        self.lock().pulse_y_next();
    }

    fn drain_outputs(&mut self, count: usize) -> Vec<i32> {
        self.with(|model| model.drain_outputs(count))
    }
}

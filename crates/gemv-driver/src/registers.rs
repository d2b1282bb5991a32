//! Register-access abstraction
//!
//! The driver talks to the accelerator only through [`GemvRegisters`]: one
//! method per register access, no addressing. The software model, the shared
//! (mutex-guarded) model and the MMIO window all implement it, so the same
//! driver code runs against any of them.

use gemv_chip::regs::status;
use std::fmt::{self, Debug};

/// One atomic access per method, in the order the caller issues them.
///
/// Reads take `&mut self` because an access may move a clocked model forward.
pub trait GemvRegisters: Debug + Send {
    /// Append one element to the input vector stream (X_IN).
    fn write_x(&mut self, value: i8);

    /// Append one element to the weight matrix stream (W_IN).
    fn write_w(&mut self, value: i8);

    /// Append one element to the bias stream (B_IN).
    fn write_b(&mut self, value: i32);

    /// Write CONTROL. Pulse bits act on this write only.
    fn write_control(&mut self, bits: u32);

    /// Read STATUS.
    fn read_status(&mut self) -> Status;

    /// Read Y_OUT at the current read cursor. Never advances the cursor.
    fn read_y(&mut self) -> i32;

    /// Write Y_NEXT with the advance bit set.
    fn pulse_y_next(&mut self);

    /// Read Y_OUT, then pulse Y_NEXT, once per index.
    ///
    /// Reading after the pulse would return the next element, so this pair is
    /// the only way the driver touches the read cursor. Backends shared
    /// between threads override it to hold the register file for the whole
    /// drain.
    fn drain_outputs(&mut self, count: usize) -> Vec<i32> {
        (0..count)
            .map(|_| {
                let value = self.read_y();
                self.pulse_y_next();
                value
            })
            .collect()
    }
}

impl<T: GemvRegisters + ?Sized> GemvRegisters for Box<T> {
    fn write_x(&mut self, value: i8) {
        (**self).write_x(value);
    }

    fn write_w(&mut self, value: i8) {
        (**self).write_w(value);
    }

    fn write_b(&mut self, value: i32) {
        (**self).write_b(value);
    }

    fn write_control(&mut self, bits: u32) {
        (**self).write_control(bits);
    }

    fn read_status(&mut self) -> Status {
        (**self).read_status()
    }

    fn read_y(&mut self) -> i32 {
        (**self).read_y()
    }

    fn pulse_y_next(&mut self) {
        (**self).pulse_y_next();
    }

    fn drain_outputs(&mut self, count: usize) -> Vec<i32> {
        (**self).drain_outputs(count)
    }
}

/// Decoded STATUS register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status {
    bits: u32,
}

impl Status {
    /// Idle: neither busy nor done.
    pub const IDLE: Self = Self { bits: 0 };
    /// Run in progress.
    pub const BUSY: Self = Self { bits: status::BUSY };
    /// Run complete, not yet cleared.
    pub const DONE: Self = Self { bits: status::DONE };

    /// Decode a raw STATUS word; bits above bit1 are ignored.
    pub const fn from_bits(bits: u32) -> Self {
        Self {
            bits: bits & (status::BUSY | status::DONE),
        }
    }

    /// Raw STATUS bits.
    pub const fn bits(self) -> u32 {
        self.bits
    }

    /// A run is in progress.
    pub const fn busy(self) -> bool {
        self.bits & status::BUSY != 0
    }

    /// The last run completed and has not been cleared.
    pub const fn done(self) -> bool {
        self.bits & status::DONE != 0
    }

    /// Neither busy nor done.
    pub const fn is_idle(self) -> bool {
        self.bits == 0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.busy(), self.done()) {
            (false, false) => write!(f, "idle"),
            (true, false) => write!(f, "busy"),
            (false, true) => write!(f, "done"),
            (true, true) => write!(f, "busy+done ({:#04b})", self.bits),
        }
    }
}

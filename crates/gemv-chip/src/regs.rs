//! Register map for the GEMV core.
//!
//! Offsets are byte offsets from the peripheral base and match the layout the
//! reference firmware uses for raw MMIO access. Every register is a 32-bit bus
//! word; only the low `*_WIDTH` bits carry meaning.
//!
//! ```text
//! CONTROL  0x00  write   pulses: start, clear_done   levels: len_64, out_dim_64, bias_en
//! STATUS   0x14  read    busy | done, recomputed from core state every cycle
//! Y_NEXT   0x18  write   pulse: advance the Y read pointer
//! ```

// ── Control ──────────────────────────────────────────────────────────────────

/// Control register. Start / clear-done pulses plus latched mode bits.
pub const CONTROL: usize = 0x00;

// ── Operand streams ──────────────────────────────────────────────────────────

/// Input vector stream. Each write appends one int8 element.
pub const X_IN: usize = 0x04;
/// Weight matrix stream (row-major). Each write appends one int8 element.
pub const W_IN: usize = 0x08;
/// Bias stream. Each write appends one int32 element.
pub const B_IN: usize = 0x0C;

// ── Results and status ───────────────────────────────────────────────────────

/// Output element at the current read cursor. Reading does not advance.
pub const Y_OUT: usize = 0x10;
/// Busy/done status. Read-only.
pub const STATUS: usize = 0x14;
/// Write with bit0 set to advance the Y read cursor.
pub const Y_NEXT: usize = 0x18;

/// Bytes spanned by the register window.
pub const WINDOW_SIZE: usize = Y_NEXT + 4;

/// All registers in address order, with their names.
pub const ALL: [(&str, usize); 7] = [
    ("CONTROL", CONTROL),
    ("X_IN", X_IN),
    ("W_IN", W_IN),
    ("B_IN", B_IN),
    ("Y_OUT", Y_OUT),
    ("STATUS", STATUS),
    ("Y_NEXT", Y_NEXT),
];

// ── Register widths ──────────────────────────────────────────────────────────

/// CONTROL storage width in bits.
pub const CONTROL_WIDTH: u32 = 7;
/// STATUS width in bits.
pub const STATUS_WIDTH: u32 = 2;
/// X_IN / W_IN element width in bits (signed).
pub const OPERAND_WIDTH: u32 = 8;
/// B_IN / Y_OUT element width in bits (signed).
pub const ACCUMULATOR_WIDTH: u32 = 32;

// ── CONTROL bit definitions ──────────────────────────────────────────────────

pub mod control {
    //! CONTROL bits. `START` and `CLEAR_DONE` are one-shot pulses; the rest
    //! are level-held configuration sampled when a start is accepted.

    /// Start a run (pulse). Ignored while busy.
    pub const START: u32 = 1 << 0;
    /// Drop `done` back to idle (pulse).
    pub const CLEAR_DONE: u32 = 1 << 3;
    /// Operand length is the extended size instead of the default.
    pub const LEN_64: u32 = 1 << 4;
    /// Output dimension is the extended size instead of the default.
    pub const OUT_DIM_64: u32 = 1 << 5;
    /// Add the streamed bias to every output.
    pub const BIAS_ENABLE: u32 = 1 << 6;

    /// Bits that are one-shot pulses.
    pub const PULSES: u32 = START | CLEAR_DONE;
    /// Bits that are latched configuration.
    pub const MODES: u32 = LEN_64 | OUT_DIM_64 | BIAS_ENABLE;
    /// Every defined bit; the rest are reserved and ignored.
    pub const DEFINED: u32 = PULSES | MODES;
}

// ── STATUS bit definitions ───────────────────────────────────────────────────

pub mod status {
    //! STATUS bits.

    /// A run is in progress.
    pub const BUSY: u32 = 1 << 0;
    /// The last run completed and has not been cleared.
    pub const DONE: u32 = 1 << 1;
}

// ── Y_NEXT bit definitions ───────────────────────────────────────────────────

pub mod y_next {
    //! Y_NEXT bits.

    /// Advance the read cursor (pulse).
    pub const ADVANCE: u32 = 1 << 0;
}

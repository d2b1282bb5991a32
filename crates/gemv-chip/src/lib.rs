//! Silicon description of the streaming GEMV accelerator.
//!
//! This crate has **no dependencies** and **no hardware access**. It is the
//! register-visible contract of the core: register offsets, the CONTROL and
//! STATUS bit layouts, operand widths and the run sizing constants.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | Register offsets, CONTROL/STATUS bits, operand widths |
//! | [`dims`] | Default/extended run sizes and operand store capacities |
//!
//! # Register file at a glance
//!
//! ```text
//! 0x00  CONTROL  W   [0] start*  [3] clear_done*  [4] len_64  [5] out_dim_64  [6] bias_en
//! 0x04  X_IN     W   int8, streaming (cursor++)
//! 0x08  W_IN     W   int8, streaming, row-major (cursor++)
//! 0x0C  B_IN     W   int32, streaming (cursor++)
//! 0x10  Y_OUT    R   int32 at read cursor (reading never advances)
//! 0x14  STATUS   R   [0] busy  [1] done
//! 0x18  Y_NEXT   W   [0] advance read cursor*
//!
//! * one-shot pulse, consumed by the write that carries it
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod dims;
pub mod regs;

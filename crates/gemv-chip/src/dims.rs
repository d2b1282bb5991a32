//! Run sizing.
//!
//! The core supports two sizes per dimension: the default, and the extended
//! size selected by the `LEN_64` / `OUT_DIM_64` mode bits, which doubles it.
//! The default has to match the compute IP paired with the register
//! interface, so it is a configuration constant rather than core logic.

/// Default operand length and output dimension in the reference pairing.
pub const DEFAULT_DIM: usize = 32;

/// Extended size for a given default.
pub const fn extended(default_dim: usize) -> usize {
    default_dim * 2
}

/// Input vector / bias store capacity for a given default size.
pub const fn vector_capacity(default_dim: usize) -> usize {
    extended(default_dim)
}

/// Weight matrix store capacity for a given default size.
pub const fn matrix_capacity(default_dim: usize) -> usize {
    extended(default_dim) * extended(default_dim)
}

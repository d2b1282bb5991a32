//! Run configuration and CONTROL write decoding

use gemv_chip::regs::control;

/// Size selection for one dimension of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DimMode {
    /// The configured default size (32 in the reference pairing)
    #[default]
    Default,
    /// Twice the default (the "64" mode bit)
    Extended,
}

impl DimMode {
    /// Element count for this mode.
    pub const fn size(self, default_dim: usize) -> usize {
        match self {
            Self::Default => default_dim,
            Self::Extended => gemv_chip::dims::extended(default_dim),
        }
    }

    /// Mode selected by a CONTROL mode bit.
    pub const fn from_flag(extended: bool) -> Self {
        if extended {
            Self::Extended
        } else {
            Self::Default
        }
    }

    /// Mode whose size is `size`, if any.
    pub fn from_size(size: usize, default_dim: usize) -> Option<Self> {
        [Self::Default, Self::Extended]
            .into_iter()
            .find(|mode| mode.size(default_dim) == size)
    }

    const fn is_extended(self) -> bool {
        matches!(self, Self::Extended)
    }
}

/// Mode bits for one run: operand length, output dimension, bias enable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunConfig {
    /// Operand length mode (`LEN_64`)
    pub len: DimMode,
    /// Output dimension mode (`OUT_DIM_64`)
    pub out_dim: DimMode,
    /// Add bias (`BIAS_ENABLE`)
    pub bias_enable: bool,
}

impl RunConfig {
    /// Build a run configuration.
    pub const fn new(len: DimMode, out_dim: DimMode, bias_enable: bool) -> Self {
        Self {
            len,
            out_dim,
            bias_enable,
        }
    }

    /// CONTROL mode bits for this configuration (no pulses).
    pub const fn control_bits(self) -> u32 {
        let mut bits = 0;
        if self.len.is_extended() {
            bits |= control::LEN_64;
        }
        if self.out_dim.is_extended() {
            bits |= control::OUT_DIM_64;
        }
        if self.bias_enable {
            bits |= control::BIAS_ENABLE;
        }
        bits
    }

    /// Configuration held in a CONTROL word. Pulse and reserved bits are ignored.
    pub const fn from_control(bits: u32) -> Self {
        Self {
            len: DimMode::from_flag(bits & control::LEN_64 != 0),
            out_dim: DimMode::from_flag(bits & control::OUT_DIM_64 != 0),
            bias_enable: bits & control::BIAS_ENABLE != 0,
        }
    }

    /// Input vector length.
    pub const fn len_elems(self, default_dim: usize) -> usize {
        self.len.size(default_dim)
    }

    /// Output (and bias) length.
    pub const fn out_elems(self, default_dim: usize) -> usize {
        self.out_dim.size(default_dim)
    }

    /// Weight matrix element count, `out_dim × len`.
    pub const fn weight_elems(self, default_dim: usize) -> usize {
        self.out_elems(default_dim) * self.len_elems(default_dim)
    }
}

/// A CONTROL write decoded into its one-shot events and latched levels.
///
/// Pulses exist only inside this value; nothing stores "was just pulsed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlWrite {
    /// Storage value after the write (masked to the register width)
    pub storage: u32,
    /// Start pulse carried by this write
    pub start: bool,
    /// Clear-done pulse carried by this write
    pub clear_done: bool,
    /// Mode levels carried by this write
    pub config: RunConfig,
}

impl ControlWrite {
    /// Decode a raw CONTROL write.
    pub const fn decode(bits: u32) -> Self {
        let storage = bits & ((1 << gemv_chip::regs::CONTROL_WIDTH) - 1);
        Self {
            storage,
            start: storage & control::START != 0,
            clear_done: storage & control::CLEAR_DONE != 0,
            config: RunConfig::from_control(storage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemv_chip::dims::DEFAULT_DIM;

    #[test]
    fn control_bits_round_trip_every_config() {
        for len in [DimMode::Default, DimMode::Extended] {
            for out_dim in [DimMode::Default, DimMode::Extended] {
                for bias in [false, true] {
                    let cfg = RunConfig::new(len, out_dim, bias);
                    assert_eq!(RunConfig::from_control(cfg.control_bits()), cfg);
                }
            }
        }
    }

    #[test]
    fn decode_separates_pulses_from_levels() {
        let w = ControlWrite::decode(control::START | control::OUT_DIM_64 | 0xFF00);
        assert!(w.start);
        assert!(!w.clear_done);
        assert_eq!(w.config.out_dim, DimMode::Extended);
        assert_eq!(w.config.len, DimMode::Default);
        assert_eq!(w.storage, control::START | control::OUT_DIM_64);
    }

    #[test]
    fn sizes_follow_default_dim() {
        let cfg = RunConfig::new(DimMode::Extended, DimMode::Default, false);
        assert_eq!(cfg.len_elems(DEFAULT_DIM), 64);
        assert_eq!(cfg.out_elems(DEFAULT_DIM), 32);
        assert_eq!(cfg.weight_elems(DEFAULT_DIM), 2048);
        assert_eq!(cfg.weight_elems(4), 32);
        assert_eq!(DimMode::from_size(64, DEFAULT_DIM), Some(DimMode::Extended));
        assert_eq!(DimMode::from_size(48, DEFAULT_DIM), None);
    }
}

//! Error types for GEMV driver operations

use std::time::Duration;
use thiserror::Error;

/// Result type alias for GEMV operations
pub type Result<T> = std::result::Result<T, GemvError>;

/// Errors that can occur while driving the accelerator
#[derive(Debug, Error)]
pub enum GemvError {
    /// Operation forbidden in the accelerator's current state
    #[error("Protocol violation in {operation}: {reason}")]
    Protocol {
        /// Driver operation that was rejected
        operation: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// `wait_done` deadline expired
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds
        duration_ms: u64,
    },

    /// Operand set cannot describe a run
    #[error("Invalid operand: {reason}")]
    InvalidOperand {
        /// Reason for failure
        reason: String,
    },

    /// Register window could not be mapped
    #[error("MMIO mapping failed: {reason}")]
    Mmio {
        /// Reason for failure
        reason: String,
    },

    /// I/O error while opening the register window
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl GemvError {
    /// Create a protocol violation error
    pub fn protocol(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            operation,
            reason: reason.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout {
            duration_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Create an invalid operand error
    pub fn invalid_operand(reason: impl Into<String>) -> Self {
        Self::InvalidOperand {
            reason: reason.into(),
        }
    }

    /// Create an MMIO mapping error
    pub fn mmio(reason: impl Into<String>) -> Self {
        Self::Mmio {
            reason: reason.into(),
        }
    }

    /// True for [`GemvError::Protocol`]
    pub const fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    /// True for [`GemvError::Timeout`]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_reports_milliseconds() {
        let err = GemvError::timeout(Duration::from_micros(5_400));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Operation timeout after 5ms");
    }

    #[test]
    fn protocol_names_operation() {
        let err = GemvError::protocol("start_run", "accelerator busy");
        assert!(err.is_protocol());
        assert_eq!(
            err.to_string(),
            "Protocol violation in start_run: accelerator busy"
        );
    }
}

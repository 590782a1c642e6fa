//! Custom error types for pipeline operations.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error type for pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Admission control rejected a new session
    #[error("Device is busy: {open} of {max} sessions already open")]
    Busy {
        /// Sessions open at the time of the attempt
        open: usize,
        /// Configured session limit
        max: usize,
    },

    /// A blocking wait was cancelled or the pipeline shut down underneath it
    #[error("Blocking {operation} was interrupted")]
    Interrupted {
        /// The operation that was waiting ("read" or "write")
        operation: &'static str,
    },

    /// Block allocation failed; fatal to the single operation, not the pipeline
    #[error("Could not allocate a {requested}-byte block")]
    OutOfMemory {
        /// Requested block length in bytes
        requested: usize,
    },

    /// Moving bytes to or from the external caller failed
    #[error("Transfer failed: {0}")]
    Transfer(#[from] std::io::Error),

    /// Invalid configuration value provided at construction
    #[error("Invalid configuration '{parameter}': {reason}")]
    InvalidConfig {
        /// The configuration field name
        parameter: &'static str,
        /// Explanation of why it's invalid
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_message() {
        let error = PipelineError::Busy { open: 1, max: 1 };
        let msg = format!("{error}");
        assert!(msg.contains("busy"));
        assert!(msg.contains("1 of 1"));
    }

    #[test]
    fn test_interrupted_message() {
        let error = PipelineError::Interrupted { operation: "write" };
        assert!(format!("{error}").contains("write"));
    }

    #[test]
    fn test_invalid_config_message() {
        let error = PipelineError::InvalidConfig {
            parameter: "max_blocks",
            reason: "must be >= 1".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("max_blocks"));
        assert!(msg.contains("must be >= 1"));
    }

    #[test]
    fn test_transfer_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "sink closed");
        let error = PipelineError::from(io);
        assert!(format!("{error}").contains("sink closed"));
    }
}

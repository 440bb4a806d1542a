//! Error types for the spinner supervisor
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur while supervising an indicator
#[derive(Debug, Error)]
pub enum SpinnerError {
    /// The indicator thread, process or task could not be started
    #[error("Spawn error: {0}")]
    Spawn(String),

    /// The indicator did not terminate cleanly
    #[error("Join error: {0}")]
    Join(String),

    /// The blocking unit of work failed
    #[error("Work failed: {0}")]
    Work(String),

    /// The stop signal could not be delivered or observed
    #[error("Signal error: {0}")]
    Signal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for spinner operations
pub type Result<T> = std::result::Result<T, SpinnerError>;

//! Error types for the timed-callback service.
//!
//! This module defines the error codes reported across the Node boundary and
//! the main error type used throughout the crate.

use serde::{Deserialize, Serialize};

/// Error codes for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Duration out of range or completion missing
    InvalidArgument,
    /// Background worker could not accept the request
    SchedulingError,
    /// Invalid service configuration
    ConfigError,
    /// Internal error (bug or OS failure)
    InternalError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::InvalidArgument => write!(f, "INVALID_ARGUMENT"),
            ErrorCode::SchedulingError => write!(f, "SCHEDULING_ERROR"),
            ErrorCode::ConfigError => write!(f, "CONFIG_ERROR"),
            ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}

/// Main error type for the service
#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    /// Rejected at call time, before any wait began
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Non-blocking request could not be handed to a worker
    #[error("Scheduling error: {0}")]
    Scheduling(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TimerError {
    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        TimerError::InvalidArgument(message.into())
    }

    /// Create a scheduling error
    pub fn scheduling(message: impl Into<String>) -> Self {
        TimerError::Scheduling(message.into())
    }

    /// The code reported to callers for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            TimerError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            TimerError::Scheduling(_) => ErrorCode::SchedulingError,
            TimerError::Config(_) => ErrorCode::ConfigError,
            TimerError::Io(_) => ErrorCode::InternalError,
        }
    }
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, TimerError>;

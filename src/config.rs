//! Service configuration types and defaults.
//!
//! This module defines the configuration for the timed-callback service:
//! the size of the background worker runtime and the limits applied when
//! requests are accepted.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of background worker threads
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// Default maximum number of in-flight non-blocking requests
pub const DEFAULT_MAX_PENDING: usize = 1024;

/// Default upper bound for a requested duration (unsigned 32-bit range)
pub const DEFAULT_MAX_DURATION_MS: u64 = u32::MAX as u64;

/// Default name given to background worker threads
pub const DEFAULT_THREAD_NAME: &str = "timed-callback-worker";

/// Configuration for the timed-callback service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerConfig {
    /// Number of worker threads awaiting non-blocking requests (default: 2)
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Maximum in-flight non-blocking requests before scheduling fails (default: 1024)
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,

    /// Largest accepted duration in milliseconds (default: u32::MAX)
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u64,

    /// Worker thread name (default: "timed-callback-worker")
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            max_pending: DEFAULT_MAX_PENDING,
            max_duration_ms: DEFAULT_MAX_DURATION_MS,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl TimerConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Set the in-flight request limit
    pub fn with_max_pending(mut self, max: usize) -> Self {
        self.max_pending = max;
        self
    }

    /// Set the largest accepted duration
    pub fn with_max_duration_ms(mut self, max: u64) -> Self {
        self.max_duration_ms = max;
        self
    }

    /// Set the worker thread name
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Parse a configuration from JSON, filling missing fields with defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == 0 {
            return Err(ConfigError::InvalidValue {
                field: "worker_threads".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.max_pending == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_pending".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.thread_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "thread_name".into(),
                reason: "must not be empty".into(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// The field name
        field: String,
        /// The reason it's invalid
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Default value functions for serde
fn default_worker_threads() -> usize {
    DEFAULT_WORKER_THREADS
}

fn default_max_pending() -> usize {
    DEFAULT_MAX_PENDING
}

fn default_max_duration_ms() -> u64 {
    DEFAULT_MAX_DURATION_MS
}

fn default_thread_name() -> String {
    DEFAULT_THREAD_NAME.to_string()
}

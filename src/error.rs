//! `taskslot` Error Types
//!
//! Centralized error handling using thiserror for type-safe errors.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Boxed error returned by task executors
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error type for `taskslot`
#[derive(Error, Debug)]
pub enum Error {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors surfaced synchronously to callers of the scheduler API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Queue is full (max: {max}, current: {current})")]
    Capacity { max: usize, current: usize },

    #[error("Gave up waiting after {timeout_ms}ms")]
    WaitTimeout { timeout_ms: u64 },

    #[error("Task '{id}' not found")]
    TaskNotFound { id: Uuid },
}

/// Why a task attempt failed.
///
/// Captured into the ledger rather than returned to any caller.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskFailure {
    #[error("Task timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Task failed: {message}")]
    Execution { message: String },
}

impl TaskFailure {
    /// Check if this failure came from the timeout guard
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskFailure::Timeout { .. })
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias for `taskslot` operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for scheduler operations
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

/// Result type alias for Config operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

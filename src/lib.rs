//! taskslot Library
//!
//! This library provides an asynchronous task scheduling core:
//! - Priority-ordered queue with bounded execution slots
//! - Per-task timeouts and exponential-backoff retries
//! - Cancellation, completion tracking and ETA estimation

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use domain::task::{
    OverflowStrategy, Priority, SchedulerConfig, SchedulerEvent, SchedulerStats, TaskId,
    TaskResult, TaskScheduler, TaskSpec, TaskStatus,
};
pub use error::{BoxError, Error, Result, SchedulerError, TaskFailure};

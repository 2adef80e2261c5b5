//! Task Model
//!
//! Core data structures for task management.

use crate::error::{BoxError, TaskFailure};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Task identifier
pub type TaskId = Uuid;

/// Type-erased task body. Retries call it again, so it must be `Fn`.
pub type Executor = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync>;

/// Task priority (higher runs first)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
        }
    }
}

/// Task execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Task is waiting in the queue
    Pending,
    /// Task is currently running
    Running,
    /// Task completed successfully
    Completed,
    /// Task failed after exhausting its retries
    Failed,
    /// Task was cancelled before it started
    Cancelled,
    /// Task failed and is waiting for another attempt
    Retrying,
}

impl TaskStatus {
    /// Check if the task is in a terminal state
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
            TaskStatus::Retrying => write!(f, "retrying"),
        }
    }
}

/// Description of work submitted through [`TaskScheduler::add`].
///
/// Unset timeout and retries are filled from the scheduler configuration.
///
/// [`TaskScheduler::add`]: super::TaskScheduler::add
pub struct TaskSpec {
    pub name: String,
    pub priority: Priority,
    pub executor: Executor,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub metadata: HashMap<String, String>,
}

impl TaskSpec {
    /// Create a spec from a name and an async closure
    pub fn new<F, Fut, T, E>(name: impl Into<String>, executor: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Into<Value>,
        E: Into<BoxError>,
    {
        let executor: Executor = Arc::new(move || -> BoxFuture<'static, Result<Value, BoxError>> {
            executor()
                .map(|outcome| -> Result<Value, BoxError> {
                    outcome.map(Into::into).map_err(Into::into)
                })
                .boxed()
        });
        Self {
            name: name.into(),
            priority: Priority::default(),
            executor,
            timeout: None,
            retries: None,
            metadata: HashMap::new(),
        }
    }

    /// Builder: set priority
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Builder: set the per-attempt timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builder: set the maximum number of retries
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Builder: set metadata
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// An accepted task. Never mutated after creation.
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub priority: Priority,
    pub timeout: Duration,
    pub retries: u32,
    pub metadata: HashMap<String, String>,
    pub(crate) executor: Executor,
}

impl Task {
    /// Resolve a spec into a task, filling defaults
    pub fn from_spec(spec: TaskSpec, default_timeout: Duration, default_retries: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: spec.name,
            priority: spec.priority,
            timeout: spec.timeout.unwrap_or(default_timeout),
            retries: spec.retries.unwrap_or(default_retries),
            metadata: spec.metadata,
            executor: spec.executor,
        }
    }

    /// One attempt of the executor. The closure itself is only called once
    /// the returned future is first polled.
    pub(crate) fn invoke(&self) -> BoxFuture<'static, Result<Value, BoxError>> {
        let executor = Arc::clone(&self.executor);
        async move { executor().await }.boxed()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

/// Ledger entry for one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    /// Executor output (present iff `Completed`)
    pub result: Option<Value>,
    /// Last failure (present iff `Failed`, or the failure being retried)
    pub error: Option<TaskFailure>,
    /// Duration of the latest attempt in milliseconds
    pub duration_ms: u64,
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
}

impl TaskResult {
    fn new(task: &Task, status: TaskStatus, retry_count: u32) -> Self {
        Self {
            task_id: task.id,
            name: task.name.clone(),
            status,
            result: None,
            error: None,
            duration_ms: 0,
            retry_count,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn pending(task: &Task) -> Self {
        Self::new(task, TaskStatus::Pending, 0)
    }

    #[must_use]
    pub fn running(task: &Task, retry_count: u32) -> Self {
        Self::new(task, TaskStatus::Running, retry_count)
    }

    #[must_use]
    pub fn completed(task: &Task, value: Value, duration_ms: u64, retry_count: u32) -> Self {
        Self {
            result: Some(value),
            duration_ms,
            ..Self::new(task, TaskStatus::Completed, retry_count)
        }
    }

    #[must_use]
    pub fn failed(task: &Task, error: TaskFailure, duration_ms: u64, retry_count: u32) -> Self {
        Self {
            error: Some(error),
            duration_ms,
            ..Self::new(task, TaskStatus::Failed, retry_count)
        }
    }

    #[must_use]
    pub fn retrying(task: &Task, error: TaskFailure, duration_ms: u64, retry_count: u32) -> Self {
        Self {
            error: Some(error),
            duration_ms,
            ..Self::new(task, TaskStatus::Retrying, retry_count)
        }
    }

    #[must_use]
    pub fn cancelled(task: &Task, retry_count: u32) -> Self {
        Self::new(task, TaskStatus::Cancelled, retry_count)
    }

    /// Check if the result indicates success
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Format duration as human-readable string
    #[must_use]
    pub fn duration_str(&self) -> String {
        match self.duration_ms {
            ms if ms < 1000 => format!("{ms}ms"),
            ms if ms < 60000 => format!("{:.1}s", ms as f64 / 1000.0),
            ms => format!("{}m {}s", ms / 60000, (ms % 60000) / 1000),
        }
    }
}

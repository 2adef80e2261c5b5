//! Task Management
//!
//! Task model, priority queue, result ledger and the scheduler that drives
//! them.

pub mod ledger;
pub mod model;
pub mod queue;
pub mod retry;
pub mod scheduler;
pub mod stats;
pub mod timeout;

pub use ledger::Ledger;
pub use model::{Executor, Priority, Task, TaskId, TaskResult, TaskSpec, TaskStatus};
pub use queue::{PriorityQueue, QueueEntry};
pub use retry::{BackoffPolicy, RetryDecision, RetryPriority};
pub use scheduler::{Lifecycle, OverflowStrategy, SchedulerConfig, SchedulerEvent, TaskScheduler};
pub use stats::{EstimatedCompletion, SchedulerStats};

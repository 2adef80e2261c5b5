//! Task Scheduler
//!
//! Priority-ordered scheduler with a bounded number of execution slots.
//!
//! All queue, running-set, backoff and ledger state lives in a single
//! [`SchedulerState`] behind one mutex. Workers, producers and waiters only
//! ever touch it through short critical sections, so every scheduling
//! decision is serialized.

use super::ledger::Ledger;
use super::model::{Priority, Task, TaskId, TaskResult, TaskSpec, TaskStatus};
use super::queue::{PriorityQueue, QueueEntry};
use super::retry::{self, BackoffPolicy, RetryDecision, RetryPriority};
use super::stats::{self, EstimatedCompletion, SchedulerStats};
use super::timeout;
use crate::error::{ConfigError, ConfigResult, SchedulerError, SchedulerResult, TaskFailure};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Notify};
use tokio::time::Instant;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// What `add` does when the queue is at `max_queue_size`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowStrategy {
    /// Fail immediately with a capacity error
    Reject,
    /// Suspend the caller until space frees up
    #[default]
    Wait,
    /// Evict the earliest-inserted pending task
    DropOldest,
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of concurrent tasks
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Per-attempt timeout used when a task does not set one
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Number of retries used when a task does not set one
    #[serde(default = "default_retries")]
    pub default_retries: u32,
    /// Base backoff unit, doubled on every retry
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Upper bound for a single backoff delay
    #[serde(default)]
    pub max_retry_delay_ms: Option<u64>,
    /// Start the workers as soon as the scheduler is constructed
    #[serde(default = "default_true")]
    pub auto_start: bool,
    #[serde(default)]
    pub overflow_strategy: OverflowStrategy,
    /// Maximum pending tasks (unbounded when unset)
    #[serde(default)]
    pub max_queue_size: Option<usize>,
    #[serde(default)]
    pub retry_priority: RetryPriority,
}

fn default_max_concurrent() -> usize {
    4
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            default_timeout_ms: default_timeout_ms(),
            default_retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: None,
            auto_start: true,
            overflow_strategy: OverflowStrategy::default(),
            max_queue_size: None,
            retry_priority: RetryPriority::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.max_queue_size == Some(0) {
            return Err(ConfigError::Invalid(
                "max_queue_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.retry_delay_ms),
            self.max_retry_delay_ms.map(Duration::from_millis),
        )
    }
}

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    /// Constructed, workers not started
    Idle,
    Running,
    /// No new dequeues; running tasks carry on
    Paused,
    /// Workers exit once their current task settles
    Stopped,
}

/// Events that the scheduler can produce
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A task entered the queue
    TaskQueued { task_id: TaskId, priority: Priority },
    /// A task took an execution slot
    TaskStarted { task_id: TaskId, attempt: u32 },
    /// A task has completed
    TaskCompleted { task_id: TaskId, result: TaskResult },
    /// A task has failed for good
    TaskFailed { task_id: TaskId, result: TaskResult },
    /// A failed task will run again after `delay`
    TaskRetrying {
        task_id: TaskId,
        attempt: u32,
        delay: Duration,
    },
    /// A task was cancelled before it ran
    TaskCancelled { task_id: TaskId },
    /// A task was pushed out by drop-oldest overflow
    TaskEvicted { task_id: TaskId },
}

/// Currently running task
#[derive(Debug)]
struct RunningTask {
    entry: QueueEntry,
    started_at: Instant,
}

/// A failed task sitting out its backoff delay
#[derive(Debug)]
struct BackoffEntry {
    task: Arc<Task>,
    retry_count: u32,
    priority: Priority,
}

/// Handed to the backoff timer after a failed attempt
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryTicket {
    pub task_id: TaskId,
    pub delay: Duration,
}

/// Scheduler state
///
/// Pure bookkeeping: no spawning or awaiting happens here.
#[derive(Debug)]
pub(crate) struct SchedulerState {
    config: SchedulerConfig,
    backoff_policy: BackoffPolicy,
    queue: PriorityQueue,
    running: HashMap<TaskId, RunningTask>,
    backoff: HashMap<TaskId, BackoffEntry>,
    ledger: Ledger,
    lifecycle: Lifecycle,
    /// Bumped on every `start()`, so workers from an earlier run retire
    generation: u64,
    events: broadcast::Sender<SchedulerEvent>,
    progress: watch::Sender<u64>,
}

impl SchedulerState {
    pub(crate) fn new(
        config: SchedulerConfig,
        events: broadcast::Sender<SchedulerEvent>,
        progress: watch::Sender<u64>,
    ) -> Self {
        Self {
            backoff_policy: config.backoff_policy(),
            config,
            queue: PriorityQueue::new(),
            running: HashMap::new(),
            backoff: HashMap::new(),
            ledger: Ledger::new(),
            lifecycle: Lifecycle::Idle,
            generation: 0,
            events,
            progress,
        }
    }

    fn emit(&self, event: SchedulerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn bump_progress(&self) {
        self.progress.send_modify(|version| *version = version.wrapping_add(1));
    }

    fn record(&mut self, result: TaskResult) {
        self.ledger.record(result);
        self.bump_progress();
    }

    /// Check if the queue can take another fresh task
    pub(crate) fn has_room(&self) -> bool {
        self.config
            .max_queue_size
            .map_or(true, |max| self.queue.len() < max)
    }

    pub(crate) fn capacity_error(&self) -> SchedulerError {
        SchedulerError::Capacity {
            max: self.config.max_queue_size.unwrap_or(usize::MAX),
            current: self.queue.len(),
        }
    }

    /// Accept a new task into the queue
    pub(crate) fn insert_new(&mut self, task: Arc<Task>) -> TaskId {
        let task_id = task.id;
        let priority = task.priority;
        self.ledger.record(TaskResult::pending(&task));
        self.queue.push(task, priority, 0);
        tracing::debug!(%task_id, %priority, pending = self.queue.len(), "Task queued");
        self.emit(SchedulerEvent::TaskQueued { task_id, priority });
        self.bump_progress();
        task_id
    }

    /// Make room under drop-oldest overflow
    pub(crate) fn evict_oldest(&mut self) -> Option<TaskId> {
        let entry = self.queue.evict_oldest()?;
        let task_id = entry.id();
        tracing::warn!(%task_id, name = %entry.task.name, "Queue full, evicting oldest pending task");
        self.record(TaskResult::cancelled(&entry.task, entry.retry_count));
        self.emit(SchedulerEvent::TaskEvicted { task_id });
        Some(task_id)
    }

    /// Check if a worker of this generation should keep going
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.lifecycle != Lifecycle::Stopped
    }

    /// Check if more tasks can be started
    pub(crate) fn can_start_more(&self) -> bool {
        self.lifecycle == Lifecycle::Running && self.running.len() < self.config.max_concurrent
    }

    /// Move the head of the queue into the running set
    pub(crate) fn dispatch_next(&mut self) -> Option<QueueEntry> {
        if !self.can_start_more() {
            return None;
        }
        let entry = self.queue.pop()?;
        let task_id = entry.id();

        tracing::info!(
            %task_id,
            name = %entry.task.name,
            priority = %entry.priority,
            attempt = entry.retry_count + 1,
            "Starting task"
        );
        self.record(TaskResult::running(&entry.task, entry.retry_count));
        self.emit(SchedulerEvent::TaskStarted {
            task_id,
            attempt: entry.retry_count + 1,
        });
        self.running.insert(
            task_id,
            RunningTask {
                entry: entry.clone(),
                started_at: Instant::now(),
            },
        );
        Some(entry)
    }

    /// Settle an attempt and free its slot.
    ///
    /// Returns a ticket when the task should be retried after a delay.
    pub(crate) fn finish(
        &mut self,
        task_id: TaskId,
        outcome: Result<Value, TaskFailure>,
    ) -> Option<RetryTicket> {
        let Some(RunningTask { entry, started_at }) = self.running.remove(&task_id) else {
            tracing::warn!(%task_id, "Completion reported for a task that is not running");
            return None;
        };
        let duration_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        let task = &entry.task;

        let error = match outcome {
            Ok(value) => {
                let result = TaskResult::completed(task, value, duration_ms, entry.retry_count);
                tracing::info!(%task_id, name = %task.name, duration_ms, "Task completed");
                self.record(result.clone());
                self.emit(SchedulerEvent::TaskCompleted { task_id, result });
                return None;
            }
            Err(error) => error,
        };

        match retry::decide(
            entry.retry_count,
            task.retries,
            task.priority,
            &self.backoff_policy,
            self.config.retry_priority,
        ) {
            RetryDecision::Retry {
                delay,
                retry_count,
                priority,
            } => {
                tracing::warn!(
                    %task_id,
                    name = %task.name,
                    %error,
                    attempt = retry_count,
                    max_retries = task.retries,
                    delay_ms = delay.as_millis() as u64,
                    "Task failed, retrying"
                );
                self.record(TaskResult::retrying(task, error, duration_ms, entry.retry_count));
                self.backoff.insert(
                    task_id,
                    BackoffEntry {
                        task: Arc::clone(task),
                        retry_count,
                        priority,
                    },
                );
                self.emit(SchedulerEvent::TaskRetrying {
                    task_id,
                    attempt: retry_count + 1,
                    delay,
                });
                Some(RetryTicket { task_id, delay })
            }
            RetryDecision::GiveUp => {
                tracing::error!(
                    %task_id,
                    name = %task.name,
                    %error,
                    attempts = entry.retry_count + 1,
                    "Task failed"
                );
                let result = TaskResult::failed(task, error, duration_ms, entry.retry_count);
                self.record(result.clone());
                self.emit(SchedulerEvent::TaskFailed { task_id, result });
                None
            }
        }
    }

    /// Put a task whose backoff elapsed back into the queue.
    ///
    /// Returns `false` if it was cancelled while waiting.
    pub(crate) fn requeue(&mut self, task_id: TaskId) -> bool {
        let Some(BackoffEntry {
            task,
            retry_count,
            priority,
        }) = self.backoff.remove(&task_id)
        else {
            return false;
        };
        tracing::debug!(%task_id, %priority, retry_count, "Re-queueing task after backoff");
        self.queue.push(task, priority, retry_count);
        self.emit(SchedulerEvent::TaskQueued { task_id, priority });
        self.bump_progress();
        true
    }

    /// Cancel a pending (or backing-off) task
    pub(crate) fn cancel(&mut self, task_id: &TaskId) -> bool {
        let (task, retry_count) = if let Some(entry) = self.queue.remove(task_id) {
            (entry.task, entry.retry_count)
        } else if let Some(entry) = self.backoff.remove(task_id) {
            (entry.task, entry.retry_count)
        } else {
            if self.running.contains_key(task_id) {
                tracing::debug!(%task_id, "Refusing to cancel a running task");
            }
            return false;
        };

        tracing::info!(%task_id, name = %task.name, "Task cancelled");
        self.record(TaskResult::cancelled(&task, retry_count));
        self.emit(SchedulerEvent::TaskCancelled { task_id: *task_id });
        true
    }

    /// Cancel every pending and backing-off task
    pub(crate) fn cancel_all(&mut self) -> usize {
        let mut ids = self.queue.ids();
        ids.extend(self.backoff.keys().copied());
        ids.iter().filter(|id| self.cancel(id)).count()
    }

    pub(crate) fn result(&self, task_id: &TaskId) -> Option<TaskResult> {
        self.ledger.get(task_id).cloned()
    }

    /// Nothing queued, running or backing off
    pub(crate) fn is_drained(&self) -> bool {
        self.queue.is_empty() && self.running.is_empty() && self.backoff.is_empty()
    }

    pub(crate) fn statistics(&self) -> SchedulerStats {
        SchedulerStats {
            pending: self.queue.len(),
            running: self.running.len(),
            retrying: self.backoff.len(),
            completed: self.ledger.count(TaskStatus::Completed),
            failed: self.ledger.count(TaskStatus::Failed),
            cancelled: self.ledger.count(TaskStatus::Cancelled),
            total: self.ledger.len(),
        }
    }

    pub(crate) fn estimated_completion(&self) -> Option<EstimatedCompletion> {
        stats::estimate_completion(
            self.ledger.completed_durations(),
            self.statistics().outstanding(),
            self.config.max_concurrent,
        )
    }
}

/// Shared between the handle, the workers and the backoff timers
#[derive(Debug)]
struct Shared {
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    /// Wakes idle workers when work or capacity appears
    wake: Notify,
    /// Wakes producers blocked on a full queue
    space: Notify,
    events: broadcast::Sender<SchedulerEvent>,
    progress: watch::Receiver<u64>,
}

/// Task Scheduler
///
/// Cheaply cloneable handle. Accepts tasks, runs them on `max_concurrent`
/// workers and keeps a ledger of their outcomes.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    shared: Arc<Shared>,
}

impl TaskScheduler {
    /// Create a new scheduler, starting it if `auto_start` is set
    pub fn new(config: SchedulerConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Create a scheduler with default configuration
    pub fn with_defaults() -> Self {
        Self::build(SchedulerConfig::default())
    }

    fn build(config: SchedulerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (progress_tx, progress) = watch::channel(0);
        let state = SchedulerState::new(config.clone(), events.clone(), progress_tx);
        let auto_start = config.auto_start;

        let scheduler = Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(state),
                wake: Notify::new(),
                space: Notify::new(),
                events,
                progress,
            }),
        };

        if auto_start {
            scheduler.start();
        }
        scheduler
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Receive lifecycle events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.shared.events.subscribe()
    }

    /// Submit a task and return its id.
    ///
    /// Under the `wait` overflow strategy this suspends until the queue has
    /// room.
    pub async fn add(&self, spec: TaskSpec) -> SchedulerResult<TaskId> {
        let config = &self.shared.config;
        let task = Arc::new(Task::from_spec(
            spec,
            config.default_timeout(),
            config.default_retries,
        ));

        loop {
            let notified = self.shared.space.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.shared.state.lock();
                if state.has_room() {
                    let task_id = state.insert_new(task);
                    drop(state);
                    self.shared.wake.notify_waiters();
                    return Ok(task_id);
                }
                match config.overflow_strategy {
                    OverflowStrategy::Reject => {
                        let error = state.capacity_error();
                        tracing::warn!(name = %task.name, %error, "Rejecting task");
                        return Err(error);
                    }
                    OverflowStrategy::DropOldest => {
                        state.evict_oldest();
                        let task_id = state.insert_new(task);
                        drop(state);
                        self.shared.wake.notify_waiters();
                        return Ok(task_id);
                    }
                    OverflowStrategy::Wait => {
                        tracing::debug!(name = %task.name, "Queue full, waiting for space");
                    }
                }
            }

            notified.await;
        }
    }

    /// Submit several tasks in order.
    ///
    /// Stops at the first rejection; tasks accepted before it stay queued.
    pub async fn add_batch(
        &self,
        specs: impl IntoIterator<Item = TaskSpec>,
    ) -> SchedulerResult<Vec<TaskId>> {
        let mut ids = Vec::new();
        for spec in specs {
            ids.push(self.add(spec).await?);
        }
        Ok(ids)
    }

    /// Spawn the workers. No-op if already running or paused.
    pub fn start(&self) {
        let generation = {
            let mut state = self.shared.state.lock();
            if matches!(state.lifecycle, Lifecycle::Running | Lifecycle::Paused) {
                return;
            }
            state.lifecycle = Lifecycle::Running;
            state.generation += 1;
            state.generation
        };

        tracing::info!(
            workers = self.shared.config.max_concurrent,
            generation,
            "Scheduler started"
        );
        for worker_id in 0..self.shared.config.max_concurrent {
            tokio::spawn(worker_loop(Arc::clone(&self.shared), worker_id, generation));
        }
    }

    /// Stop dequeuing; running tasks carry on
    pub fn pause(&self) {
        let mut state = self.shared.state.lock();
        if state.lifecycle == Lifecycle::Running {
            state.lifecycle = Lifecycle::Paused;
            tracing::info!("Scheduler paused");
        }
    }

    /// Resume scheduling after `pause()`
    pub fn resume(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.lifecycle != Lifecycle::Paused {
                tracing::debug!(lifecycle = ?state.lifecycle, "Resume ignored");
                return;
            }
            state.lifecycle = Lifecycle::Running;
        }
        tracing::info!("Scheduler resumed");
        self.shared.wake.notify_waiters();
    }

    /// Halt scheduling. Running tasks still settle; the queue is kept.
    pub fn stop(&self) {
        self.shared.state.lock().lifecycle = Lifecycle::Stopped;
        tracing::info!("Scheduler stopped");
        self.shared.wake.notify_waiters();
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.state.lock().lifecycle
    }

    /// Check if scheduling is paused
    pub fn is_paused(&self) -> bool {
        self.lifecycle() == Lifecycle::Paused
    }

    /// Cancel a task that has not started. Running tasks are never cancelled.
    pub fn cancel(&self, task_id: TaskId) -> bool {
        let cancelled = self.shared.state.lock().cancel(&task_id);
        if cancelled {
            self.shared.space.notify_waiters();
        }
        cancelled
    }

    /// Cancel every task that has not started; returns how many
    pub fn cancel_all(&self) -> usize {
        let count = self.shared.state.lock().cancel_all();
        if count > 0 {
            tracing::info!(count, "Cancelled all pending tasks");
            self.shared.space.notify_waiters();
        }
        count
    }

    /// Current ledger entry for a task
    pub fn get_result(&self, task_id: TaskId) -> Option<TaskResult> {
        self.shared.state.lock().result(&task_id)
    }

    /// Wait until the task settles as completed, failed or cancelled.
    ///
    /// `timeout` bounds how long the caller is willing to wait; it is
    /// unrelated to the task's own execution timeout.
    pub async fn wait_for(
        &self,
        task_id: TaskId,
        timeout: Option<Duration>,
    ) -> SchedulerResult<TaskResult> {
        let mut progress = self.shared.progress.clone();
        progress.borrow_and_update();

        let wait = async {
            loop {
                match self.get_result(task_id) {
                    None => return Err(SchedulerError::TaskNotFound { id: task_id }),
                    Some(result) if result.status.is_terminal() => return Ok(result),
                    Some(_) => {}
                }
                if progress.changed().await.is_err() {
                    return Err(SchedulerError::TaskNotFound { id: task_id });
                }
            }
        };

        with_wait_timeout(timeout, wait).await
    }

    /// Wait until nothing is queued, running or backing off, then return a
    /// snapshot of the ledger
    pub async fn wait_all(
        &self,
        timeout: Option<Duration>,
    ) -> SchedulerResult<HashMap<TaskId, TaskResult>> {
        let mut progress = self.shared.progress.clone();
        progress.borrow_and_update();

        let wait = async {
            loop {
                {
                    let state = self.shared.state.lock();
                    if state.is_drained() {
                        return Ok(state.ledger.snapshot());
                    }
                }
                // The sender lives as long as `self`
                let _ = progress.changed().await;
            }
        };

        with_wait_timeout(timeout, wait).await
    }

    pub fn statistics(&self) -> SchedulerStats {
        self.shared.state.lock().statistics()
    }

    /// Project when outstanding work will be done
    pub fn estimated_completion(&self) -> Option<EstimatedCompletion> {
        self.shared.state.lock().estimated_completion()
    }

    /// Forget settled tasks; returns how many entries were removed
    pub fn clear_results(&self) -> usize {
        self.shared.state.lock().ledger.clear_terminal()
    }

    /// Pending task ids in the order they will be dequeued
    pub fn pending_ids(&self) -> Vec<TaskId> {
        self.shared.state.lock().queue.ids()
    }
}

async fn with_wait_timeout<T>(
    timeout: Option<Duration>,
    wait: impl std::future::Future<Output = SchedulerResult<T>>,
) -> SchedulerResult<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| {
            SchedulerError::WaitTimeout {
                timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            }
        })?,
        None => wait.await,
    }
}

/// One execution slot: pull, run, report, repeat
async fn worker_loop(shared: Arc<Shared>, worker_id: usize, generation: u64) {
    tracing::debug!(worker_id, generation, "Worker started");

    loop {
        let notified = shared.wake.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let next = {
            let mut state = shared.state.lock();
            if !state.is_current(generation) {
                break;
            }
            state.dispatch_next()
        };

        let Some(entry) = next else {
            notified.await;
            continue;
        };
        shared.space.notify_waiters();

        let outcome = timeout::run_guarded(&entry.task).await;
        let ticket = shared.state.lock().finish(entry.id(), outcome);
        if let Some(ticket) = ticket {
            schedule_retry(Arc::clone(&shared), ticket);
        }
        shared.wake.notify_waiters();
    }

    tracing::debug!(worker_id, generation, "Worker exited");
}

/// Re-queue a failed task once its backoff delay has passed
fn schedule_retry(shared: Arc<Shared>, ticket: RetryTicket) {
    tokio::spawn(async move {
        tokio::time::sleep(ticket.delay).await;
        let requeued = shared.state.lock().requeue(ticket.task_id);
        if requeued {
            shared.wake.notify_waiters();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use pretty_assertions::assert_eq;

    fn create_state(config: SchedulerConfig) -> SchedulerState {
        let (events, _) = broadcast::channel(16);
        let (progress, _) = watch::channel(0);
        SchedulerState::new(config, events, progress)
    }

    fn task(name: &str, priority: Priority, retries: u32) -> Arc<Task> {
        let spec = TaskSpec::new(name, || async { Ok::<_, BoxError>(()) })
            .with_priority(priority)
            .with_retries(retries);
        Arc::new(Task::from_spec(spec, Duration::from_secs(1), 0))
    }

    fn failure() -> TaskFailure {
        TaskFailure::Execution {
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(SchedulerConfig::default().validate().is_ok());

        let config = SchedulerConfig {
            max_concurrent: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = SchedulerConfig {
            max_queue_size: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_idle_state_does_not_dispatch() {
        let mut state = create_state(SchedulerConfig::default());
        state.insert_new(task("a", Priority::Normal, 0));
        assert!(state.dispatch_next().is_none());

        state.lifecycle = Lifecycle::Running;
        assert!(state.dispatch_next().is_some());
    }

    #[test]
    fn test_concurrency_limit() {
        let mut state = create_state(SchedulerConfig {
            max_concurrent: 2,
            ..Default::default()
        });
        state.lifecycle = Lifecycle::Running;
        for i in 0..5 {
            state.insert_new(task(&format!("Task{i}"), Priority::Normal, 0));
        }

        assert!(state.dispatch_next().is_some());
        assert!(state.dispatch_next().is_some());
        assert!(state.dispatch_next().is_none());

        let stats = state.statistics();
        assert_eq!((stats.running, stats.pending, stats.total), (2, 3, 5));
    }

    #[test]
    fn test_task_lifecycle() {
        let mut state = create_state(SchedulerConfig::default());
        state.lifecycle = Lifecycle::Running;
        let id = state.insert_new(task("a", Priority::Normal, 0));
        assert_eq!(state.result(&id).unwrap().status, TaskStatus::Pending);

        let entry = state.dispatch_next().unwrap();
        assert_eq!(state.result(&id).unwrap().status, TaskStatus::Running);

        assert!(state.finish(entry.id(), Ok(Value::from(7))).is_none());
        let result = state.result(&id).unwrap();
        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.result, Some(Value::from(7)));
        assert!(state.is_drained());
    }

    #[test]
    fn test_failure_goes_through_backoff_at_urgent() {
        let mut state = create_state(SchedulerConfig {
            retry_delay_ms: 10,
            ..Default::default()
        });
        state.lifecycle = Lifecycle::Running;
        let id = state.insert_new(task("flaky", Priority::Low, 1));

        let entry = state.dispatch_next().unwrap();
        let ticket = state.finish(entry.id(), Err(failure())).unwrap();
        assert_eq!(ticket.delay, Duration::from_millis(10));
        assert_eq!(state.result(&id).unwrap().status, TaskStatus::Retrying);
        assert_eq!(state.statistics().retrying, 1);
        assert!(!state.is_drained());

        assert!(state.requeue(id));
        let entry = state.dispatch_next().unwrap();
        assert_eq!(entry.priority, Priority::Urgent);
        assert_eq!(entry.retry_count, 1);

        assert!(state.finish(entry.id(), Err(failure())).is_none());
        let result = state.result(&id).unwrap();
        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.retry_count, 1);
        assert_eq!(result.error, Some(failure()));
    }

    #[test]
    fn test_original_retry_priority() {
        let mut state = create_state(SchedulerConfig {
            retry_priority: RetryPriority::Original,
            ..Default::default()
        });
        state.lifecycle = Lifecycle::Running;
        let id = state.insert_new(task("flaky", Priority::Low, 1));
        let entry = state.dispatch_next().unwrap();
        state.finish(entry.id(), Err(failure()));
        state.requeue(id);

        assert_eq!(state.dispatch_next().unwrap().priority, Priority::Low);
    }

    #[test]
    fn test_cancel_pending_backoff_and_running() {
        let mut state = create_state(SchedulerConfig {
            max_concurrent: 1,
            ..Default::default()
        });
        state.lifecycle = Lifecycle::Running;
        let running = state.insert_new(task("running", Priority::High, 1));
        let pending = state.insert_new(task("pending", Priority::Low, 0));
        state.dispatch_next();

        assert!(!state.cancel(&running));
        assert!(state.cancel(&pending));
        assert!(!state.cancel(&pending));
        assert_eq!(state.result(&pending).unwrap().status, TaskStatus::Cancelled);

        // Cancelled during backoff: the timer must not bring it back
        state.finish(running, Err(failure()));
        assert!(state.cancel(&running));
        assert!(!state.requeue(running));
        assert_eq!(state.statistics().cancelled, 2);
    }

    #[test]
    fn test_drop_oldest_eviction() {
        let mut state = create_state(SchedulerConfig {
            max_queue_size: Some(2),
            ..Default::default()
        });
        let oldest = state.insert_new(task("oldest", Priority::Urgent, 0));
        state.insert_new(task("newer", Priority::Low, 0));
        assert!(!state.has_room());

        assert_eq!(state.evict_oldest(), Some(oldest));
        assert!(state.has_room());
        assert_eq!(state.result(&oldest).unwrap().status, TaskStatus::Cancelled);
    }

    #[test]
    fn test_stale_generation_retires() {
        let mut state = create_state(SchedulerConfig::default());
        state.lifecycle = Lifecycle::Running;
        state.generation = 2;
        assert!(state.is_current(2));
        assert!(!state.is_current(1));

        state.lifecycle = Lifecycle::Stopped;
        assert!(!state.is_current(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_resume() {
        let scheduler = TaskScheduler::new(SchedulerConfig {
            auto_start: false,
            ..Default::default()
        })
        .unwrap();
        scheduler.start();
        scheduler.pause();
        assert!(scheduler.is_paused());

        let id = scheduler
            .add(TaskSpec::new("a", || async { Ok::<_, BoxError>(1) }))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(scheduler.get_result(id).unwrap().status, TaskStatus::Pending);

        scheduler.resume();
        let result = scheduler
            .wait_for(id, Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(result.status, TaskStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_then_restart() {
        let scheduler = TaskScheduler::new(SchedulerConfig {
            max_concurrent: 1,
            ..Default::default()
        })
        .unwrap();
        scheduler.stop();
        assert_eq!(scheduler.lifecycle(), Lifecycle::Stopped);

        let id = scheduler
            .add(TaskSpec::new("later", || async { Ok::<_, BoxError>(()) }))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(scheduler.statistics().pending, 1);

        scheduler.start();
        let result = scheduler.wait_for(id, Some(Duration::from_secs(1))).await.unwrap();
        assert!(result.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_unknown_task() {
        let scheduler = TaskScheduler::with_defaults();
        let missing = uuid::Uuid::new_v4();
        assert_eq!(
            scheduler.wait_for(missing, None).await,
            Err(SchedulerError::TaskNotFound { id: missing })
        );
    }
}

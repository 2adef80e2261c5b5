//! Result Ledger
//!
//! Latest known outcome per task. Terminal entries are never overwritten.

use super::model::{TaskId, TaskResult, TaskStatus};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Ledger {
    entries: HashMap<TaskId, TaskResult>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a state transition.
    ///
    /// Returns `false` if the task already reached a terminal state.
    pub fn record(&mut self, result: TaskResult) -> bool {
        if let Some(existing) = self.entries.get(&result.task_id) {
            if existing.status.is_terminal() {
                tracing::warn!(
                    task_id = %result.task_id,
                    current = %existing.status,
                    attempted = %result.status,
                    "Ignoring transition on terminal task"
                );
                return false;
            }
        }
        self.entries.insert(result.task_id, result);
        true
    }

    pub fn get(&self, id: &TaskId) -> Option<&TaskResult> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries currently in `status`
    pub fn count(&self, status: TaskStatus) -> usize {
        self.entries.values().filter(|r| r.status == status).count()
    }

    /// Durations of all completed tasks
    pub fn completed_durations(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries
            .values()
            .filter(|r| r.status == TaskStatus::Completed)
            .map(|r| r.duration_ms)
    }

    /// Drop terminal entries; in-flight entries are kept
    pub fn clear_terminal(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, r| !r.status.is_terminal());
        before - self.entries.len()
    }

    pub fn snapshot(&self) -> HashMap<TaskId, TaskResult> {
        self.entries.clone()
    }
}

//! Priority Queue
//!
//! Pending tasks ordered by priority, stable among equal priorities.

use super::model::{Priority, Task, TaskId};
use std::collections::VecDeque;
use std::sync::Arc;

/// A task waiting for an execution slot
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub task: Arc<Task>,
    /// Effective priority (retries may be promoted above the task's own)
    pub priority: Priority,
    /// Attempts already made
    pub retry_count: u32,
    /// Monotonic insertion sequence, used for drop-oldest eviction
    pub(crate) seq: u64,
}

impl QueueEntry {
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.task.id
    }
}

/// Stable priority queue
///
/// Insertion is an O(n) scan, which is fine for bounded queue sizes and keeps
/// arrival order intact without re-sorting.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    entries: VecDeque<QueueEntry>,
    next_seq: u64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert before the first entry with strictly lower priority
    pub fn push(&mut self, task: Arc<Task>, priority: Priority, retry_count: u32) {
        let entry = QueueEntry {
            task,
            priority,
            retry_count,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        let position = self
            .entries
            .iter()
            .position(|queued| queued.priority < priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(position, entry);
    }

    /// Take the highest-priority entry
    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    /// Remove a specific task
    pub fn remove(&mut self, id: &TaskId) -> Option<QueueEntry> {
        let index = self.entries.iter().position(|entry| entry.id() == *id)?;
        self.entries.remove(index)
    }

    /// Remove the earliest-inserted entry, whatever its priority
    pub fn evict_oldest(&mut self) -> Option<QueueEntry> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .min_by_key(|(_, entry)| entry.seq)
            .map(|(index, _)| index)?;
        self.entries.remove(index)
    }

    /// Pending task ids in dequeue order
    pub fn ids(&self) -> Vec<TaskId> {
        self.entries.iter().map(QueueEntry::id).collect()
    }
}

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};

use compliance_types::{AgentTask, TaskPriority};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::orchestrator::CompletionSink;

pub struct QueuedTask {
    pub task: AgentTask,
    pub completion_sink: Option<CompletionSink>,
}

struct Entry {
    priority: TaskPriority,
    sequence: u64,
    queued: QueuedTask,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    /// Highest priority first; within a priority, earliest `sequence` first
    /// (spec.md §4.1 "FIFO with priority as a stable tiebreaker").
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority.cmp(&other.priority).then_with(|| Reverse(self.sequence).cmp(&Reverse(other.sequence)))
    }
}

/// Bounded FIFO-with-priority task queue. Dequeue blocks until a task is
/// submitted or shutdown is requested.
pub struct TaskQueue {
    heap: Mutex<BinaryHeap<Entry>>,
    notify: Notify,
    capacity: usize,
    sequence: AtomicU64,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        Self { heap: Mutex::new(BinaryHeap::new()), notify: Notify::new(), capacity, sequence: AtomicU64::new(0) }
    }

    /// `Some(false)` would be ambiguous with shutdown's `false`, so overflow
    /// is reported separately via `Err`: returns `Ok(())` on success, `Err(())`
    /// if the queue is at capacity.
    pub fn push(&self, queued: QueuedTask) -> Result<(), ()> {
        let mut heap = self.heap.lock();
        if heap.len() >= self.capacity {
            return Err(());
        }
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        heap.push(Entry { priority: queued.task.priority, sequence, queued });
        drop(heap);
        self.notify.notify_one();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    /// Waits for a task or for `shutdown` to flip true, whichever comes
    /// first. Returns `None` only once the queue is empty and shutdown has
    /// been requested.
    pub async fn pop(&self, shutdown: &std::sync::atomic::AtomicBool) -> Option<QueuedTask> {
        loop {
            if let Some(entry) = self.heap.lock().pop() {
                return Some(entry.queued);
            }
            if shutdown.load(Ordering::SeqCst) {
                return None;
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(std::time::Duration::from_millis(200)) => {}
            }
        }
    }

    pub fn wake_all(&self) {
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use compliance_types::{ComplianceEvent, EventKind, Severity};

    fn task(priority: TaskPriority, id: &str) -> QueuedTask {
        let event = ComplianceEvent::new(EventKind::Transaction, Severity::Low, "test");
        QueuedTask { task: AgentTask::new(id, "kyc", event, priority, Utc::now()), completion_sink: None }
    }

    #[test]
    fn higher_priority_dequeues_first() {
        let queue = TaskQueue::new(10);
        queue.push(task(TaskPriority::Low, "a")).unwrap();
        queue.push(task(TaskPriority::Critical, "b")).unwrap();
        queue.push(task(TaskPriority::Normal, "c")).unwrap();
        let mut heap = queue.heap.lock();
        assert_eq!(heap.pop().unwrap().queued.task.task_id, "b");
        assert_eq!(heap.pop().unwrap().queued.task.task_id, "c");
        assert_eq!(heap.pop().unwrap().queued.task.task_id, "a");
    }

    #[test]
    fn equal_priority_is_fifo() {
        let queue = TaskQueue::new(10);
        queue.push(task(TaskPriority::Normal, "first")).unwrap();
        queue.push(task(TaskPriority::Normal, "second")).unwrap();
        let mut heap = queue.heap.lock();
        assert_eq!(heap.pop().unwrap().queued.task.task_id, "first");
        assert_eq!(heap.pop().unwrap().queued.task.task_id, "second");
    }

    #[test]
    fn push_fails_at_capacity() {
        let queue = TaskQueue::new(1);
        assert!(queue.push(task(TaskPriority::Normal, "a")).is_ok());
        assert!(queue.push(task(TaskPriority::Normal, "b")).is_err());
    }
}

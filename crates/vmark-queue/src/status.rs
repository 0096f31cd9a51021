//! Per-task status records with push notification.
//!
//! The board holds exactly one [`ProcessingStatus`] per task. Every update
//! replaces the record wholesale under the write lock and is broadcast to
//! that task's subscribers while the lock is still held, so a subscriber
//! registered under the read lock sees its snapshot followed by every later
//! update with no gap.

use futures_util::stream::{self, Stream};
use futures_util::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tracing::{trace, warn};

use vmark_models::{ProcessingStatus, TaskId, TaskState};

/// Default per-task notification buffer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

struct Entry {
    latest: ProcessingStatus,
    tx: broadcast::Sender<ProcessingStatus>,
}

struct BoardInner {
    entries: RwLock<HashMap<TaskId, Entry>>,
    all: broadcast::Sender<ProcessingStatus>,
    capacity: usize,
}

/// Shared map of task id to latest status. Cheap to clone.
#[derive(Clone)]
pub struct StatusBoard {
    inner: Arc<BoardInner>,
}

/// Number of known tasks in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl StatusBoard {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (all, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(BoardInner {
                entries: RwLock::new(HashMap::new()),
                all,
                capacity,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TaskId, Entry>> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TaskId, Entry>> {
        self.inner
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new task. Returns `false` if the id is already known.
    pub fn insert_new(&self, status: ProcessingStatus) -> bool {
        let mut entries = self.write();
        if entries.contains_key(&status.task_id) {
            return false;
        }
        let (tx, _) = broadcast::channel(self.inner.capacity);
        let _ = self.inner.all.send(status.clone());
        entries.insert(
            status.task_id.clone(),
            Entry {
                latest: status,
                tx,
            },
        );
        true
    }

    /// Replace the task's record and notify subscribers. Never blocks on
    /// delivery; slow subscribers skip ahead.
    ///
    /// Updates that would move a task backwards (or out of a terminal
    /// state) are dropped and `false` is returned.
    pub fn publish(&self, status: ProcessingStatus) -> bool {
        let mut entries = self.write();
        let entry = entries.entry(status.task_id.clone()).or_insert_with(|| Entry {
            latest: status.clone(),
            tx: broadcast::channel(self.inner.capacity).0,
        });

        let current = entry.latest.state;
        if current != status.state && !current.can_transition_to(status.state) {
            warn!(
                task_id = %status.task_id,
                from = %current,
                to = %status.state,
                "Rejected illegal status transition"
            );
            return false;
        }
        if current.is_terminal() && entry.latest != status {
            warn!(
                task_id = %status.task_id,
                state = %current,
                "Rejected update to a finished task"
            );
            return false;
        }

        trace!(
            task_id = %status.task_id,
            state = %status.state,
            progress = status.progress,
            "Status update"
        );

        entry.latest = status.clone();
        let _ = entry.tx.send(status.clone());
        let _ = self.inner.all.send(status);
        true
    }

    /// Latest status of a task, or `None` for an unknown id.
    pub fn status(&self, task_id: &TaskId) -> Option<ProcessingStatus> {
        self.read().get(task_id).map(|e| e.latest.clone())
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.read().contains_key(task_id)
    }

    /// Subscribe to one task: the current snapshot plus every later update.
    pub fn subscribe(&self, task_id: &TaskId) -> Option<StatusSubscription> {
        let entries = self.read();
        entries.get(task_id).map(|entry| StatusSubscription {
            latest: entry.latest.clone(),
            rx: entry.tx.subscribe(),
            finished: entry.latest.is_terminal(),
        })
    }

    /// Receive updates for every task.
    pub fn subscribe_all(&self) -> broadcast::Receiver<ProcessingStatus> {
        self.inner.all.subscribe()
    }

    /// Forget a task. Open subscriptions end.
    pub fn remove(&self, task_id: &TaskId) -> Option<ProcessingStatus> {
        self.write().remove(task_id).map(|e| e.latest)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn counts(&self) -> StateCounts {
        let entries = self.read();
        let mut counts = StateCounts::default();
        for entry in entries.values() {
            match entry.latest.state {
                TaskState::Queued => counts.queued += 1,
                TaskState::Processing => counts.processing += 1,
                TaskState::Completed => counts.completed += 1,
                TaskState::Error => counts.failed += 1,
            }
        }
        counts
    }
}

/// Live view of one task's status.
pub struct StatusSubscription {
    latest: ProcessingStatus,
    rx: broadcast::Receiver<ProcessingStatus>,
    finished: bool,
}

impl StatusSubscription {
    /// Status at subscription time, or the last one received.
    pub fn latest(&self) -> &ProcessingStatus {
        &self.latest
    }

    /// Next update. Returns `None` after a terminal state has been seen or
    /// when the task is removed from the board.
    pub async fn recv(&mut self) -> Option<ProcessingStatus> {
        if self.finished {
            return None;
        }
        loop {
            match self.rx.recv().await {
                Ok(status) => {
                    self.finished = status.is_terminal();
                    self.latest = status.clone();
                    return Some(status);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    trace!(skipped, "Subscriber lagged, skipping ahead");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Snapshot followed by every update, ending after a terminal state.
    pub fn into_stream(self) -> Pin<Box<dyn Stream<Item = ProcessingStatus> + Send>> {
        let snapshot = self.latest.clone();
        let updates = stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|status| (status, sub))
        });
        Box::pin(stream::once(async move { snapshot }).chain(updates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TaskId {
        TaskId::from(s)
    }

    #[test]
    fn test_insert_new_rejects_duplicates() {
        let board = StatusBoard::default();
        assert!(board.insert_new(ProcessingStatus::queued(id("a"))));
        assert!(!board.insert_new(ProcessingStatus::queued(id("a"))));
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn test_publish_replaces_record() {
        let board = StatusBoard::default();
        board.insert_new(ProcessingStatus::queued(id("a")));
        board.publish(ProcessingStatus::frame_progress(id("a"), 3, 10));

        let status = board.status(&id("a")).unwrap();
        assert_eq!(status.state, TaskState::Processing);
        assert_eq!(status.progress, 30);
        assert!(board.status(&id("missing")).is_none());
    }

    #[tokio::test]
    async fn test_subscribe_gets_snapshot_then_updates() {
        let board = StatusBoard::default();
        board.insert_new(ProcessingStatus::queued(id("a")));

        let mut sub = board.subscribe(&id("a")).unwrap();
        assert_eq!(sub.latest().state, TaskState::Queued);

        board.publish(ProcessingStatus::started(id("a")));
        board.publish(ProcessingStatus::completed(id("a")));

        assert_eq!(sub.recv().await.unwrap().state, TaskState::Processing);
        assert_eq!(sub.recv().await.unwrap().state, TaskState::Completed);
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn test_publish_rejects_backward_transitions() {
        let board = StatusBoard::default();
        board.insert_new(ProcessingStatus::queued(id("a")));

        assert!(!board.publish(ProcessingStatus::completed(id("a"))));
        assert_eq!(board.status(&id("a")).unwrap().state, TaskState::Queued);

        assert!(board.publish(ProcessingStatus::started(id("a"))));
        assert!(board.publish(ProcessingStatus::frame_progress(id("a"), 1, 2)));
        assert!(board.publish(ProcessingStatus::completed(id("a"))));

        assert!(!board.publish(ProcessingStatus::started(id("a"))));
        assert!(!board.publish(ProcessingStatus::failed(id("a"), "late")));
        assert_eq!(board.status(&id("a")).unwrap().state, TaskState::Completed);
    }

    #[tokio::test]
    async fn test_subscribe_after_terminal() {
        let board = StatusBoard::default();
        board.publish(ProcessingStatus::failed(id("a"), "boom"));

        let mut sub = board.subscribe(&id("a")).unwrap();
        assert_eq!(sub.latest().state, TaskState::Error);
        assert!(sub.recv().await.is_none());
        assert!(board.subscribe(&id("other")).is_none());
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_ahead() {
        let board = StatusBoard::new(2);
        board.insert_new(ProcessingStatus::queued(id("a")));
        let mut sub = board.subscribe(&id("a")).unwrap();

        for frame in 1..=10 {
            board.publish(ProcessingStatus::frame_progress(id("a"), frame, 10));
        }
        board.publish(ProcessingStatus::completed(id("a")));

        let mut last = None;
        while let Some(status) = sub.recv().await {
            last = Some(status);
        }
        assert_eq!(last.unwrap().state, TaskState::Completed);
    }

    #[tokio::test]
    async fn test_stream_ends_on_terminal() {
        let board = StatusBoard::default();
        board.insert_new(ProcessingStatus::queued(id("a")));
        let stream = board.subscribe(&id("a")).unwrap().into_stream();

        board.publish(ProcessingStatus::started(id("a")));
        board.publish(ProcessingStatus::failed(id("a"), "bad input"));

        let states: Vec<TaskState> = stream.map(|s| s.state).collect().await;
        assert_eq!(
            states,
            vec![TaskState::Queued, TaskState::Processing, TaskState::Error]
        );
    }

    #[test]
    fn test_counts() {
        let board = StatusBoard::default();
        board.insert_new(ProcessingStatus::queued(id("a")));
        board.insert_new(ProcessingStatus::queued(id("b")));
        board.publish(ProcessingStatus::started(id("b")));
        board.publish(ProcessingStatus::completed(id("c")));
        board.publish(ProcessingStatus::failed(id("d"), "x"));

        let counts = board.counts();
        assert_eq!(
            counts,
            StateCounts {
                queued: 1,
                processing: 1,
                completed: 1,
                failed: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_remove_closes_subscription() {
        let board = StatusBoard::default();
        board.insert_new(ProcessingStatus::queued(id("a")));
        let mut sub = board.subscribe(&id("a")).unwrap();

        assert!(board.remove(&id("a")).is_some());
        assert!(sub.recv().await.is_none());
        assert!(board.is_empty());
    }
}

//! Unbounded FIFO task queue with a single consumer.
//!
//! Producers never wait: `submit` validates, records the `queued` status and
//! pushes onto an unbounded channel. The one [`TaskReceiver`] takes tasks in
//! submission order and suspends only while the queue is empty.

use metrics::{counter, gauge};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use vmark_models::{ProcessingStatus, Task, TaskId};

use crate::error::{QueueError, QueueResult};
use crate::status::{StatusBoard, StatusSubscription};

/// Metric names.
pub mod names {
    pub const TASKS_ENQUEUED: &str = "vmark_tasks_enqueued_total";
    pub const TASKS_REJECTED: &str = "vmark_tasks_rejected_total";
    pub const QUEUE_LENGTH: &str = "vmark_queue_length";
}

/// Snapshot of queue and task counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Tasks waiting to be picked up
    pub queue_size: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Producer handle. Cheap to clone and share across request handlers.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Task>,
    board: StatusBoard,
    pending: Arc<AtomicUsize>,
}

/// The single consumer end.
pub struct TaskReceiver {
    rx: mpsc::UnboundedReceiver<Task>,
    pending: Arc<AtomicUsize>,
}

/// Create a queue whose statuses live on `board`.
pub fn task_queue(board: StatusBoard) -> (TaskQueue, TaskReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));
    (
        TaskQueue {
            tx,
            board,
            pending: Arc::clone(&pending),
        },
        TaskReceiver { rx, pending },
    )
}

impl TaskQueue {
    /// Validate and enqueue a task.
    ///
    /// The `queued` status is visible before the task can be dequeued.
    pub fn submit(&self, task: Task) -> QueueResult<TaskId> {
        if let Err(reason) = task.check() {
            counter!(names::TASKS_REJECTED).increment(1);
            return Err(QueueError::invalid_task(reason));
        }

        let task_id = task.id.clone();
        if !self.board.insert_new(ProcessingStatus::queued(task_id.clone())) {
            counter!(names::TASKS_REJECTED).increment(1);
            return Err(QueueError::DuplicateTask(task_id));
        }

        let depth = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
        if self.tx.send(task).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            warn!(task_id = %task_id, "Queue closed, task not accepted");
            self.board
                .publish(ProcessingStatus::failed(task_id, QueueError::Closed));
            return Err(QueueError::Closed);
        }

        counter!(names::TASKS_ENQUEUED).increment(1);
        gauge!(names::QUEUE_LENGTH).set(depth as f64);
        info!(task_id = %task_id, queue_size = depth, "Task queued");
        Ok(task_id)
    }

    /// Latest status of a task, `None` for an unknown id.
    pub fn status(&self, task_id: &TaskId) -> Option<ProcessingStatus> {
        self.board.status(task_id)
    }

    /// Subscribe to a task's status updates.
    pub fn subscribe(&self, task_id: &TaskId) -> Option<StatusSubscription> {
        self.board.subscribe(task_id)
    }

    pub fn board(&self) -> &StatusBoard {
        &self.board
    }

    /// Number of tasks waiting to be dequeued.
    pub fn len(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> QueueStats {
        let counts = self.board.counts();
        QueueStats {
            queue_size: self.len(),
            processing: counts.processing,
            completed: counts.completed,
            failed: counts.failed,
        }
    }
}

impl TaskReceiver {
    /// Next task in submission order. Returns `None` once every producer
    /// handle has been dropped and the queue is drained.
    pub async fn recv(&mut self) -> Option<Task> {
        let task = self.rx.recv().await?;
        let depth = self
            .pending
            .fetch_sub(1, Ordering::SeqCst)
            .saturating_sub(1);
        gauge!(names::QUEUE_LENGTH).set(depth as f64);
        Some(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmark_models::TaskState;

    fn task(id: &str) -> Task {
        Task::new(
            TaskId::from(id),
            format!("/tmp/up/{}.mp4", id),
            format!("/tmp/out/{}_watermarked.mp4", id),
            "hello",
            0.1,
            format!("{}.mp4", id),
        )
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (queue, mut rx) = task_queue(StatusBoard::default());
        for id in ["a", "b", "c"] {
            queue.submit(task(id)).unwrap();
        }
        assert_eq!(queue.len(), 3);

        for id in ["a", "b", "c"] {
            assert_eq!(rx.recv().await.unwrap().id, TaskId::from(id));
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_submit_publishes_queued() {
        let (queue, _rx) = task_queue(StatusBoard::default());
        let id = queue.submit(task("a")).unwrap();
        let status = queue.status(&id).unwrap();
        assert_eq!(status.state, TaskState::Queued);
        assert_eq!(status.progress, 0);
    }

    #[tokio::test]
    async fn test_invalid_task_rejected() {
        let (queue, _rx) = task_queue(StatusBoard::default());
        let mut bad = task("a");
        bad.strength = 0.9;
        assert!(matches!(queue.submit(bad), Err(QueueError::InvalidTask(_))));

        let mut empty = task("b");
        empty.text.clear();
        assert!(matches!(queue.submit(empty), Err(QueueError::InvalidTask(_))));

        assert!(queue.status(&TaskId::from("a")).is_none());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let (queue, _rx) = task_queue(StatusBoard::default());
        queue.submit(task("a")).unwrap();
        assert!(matches!(
            queue.submit(task("a")),
            Err(QueueError::DuplicateTask(_))
        ));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (queue, rx) = task_queue(StatusBoard::default());
        drop(rx);
        assert!(matches!(queue.submit(task("a")), Err(QueueError::Closed)));
        assert_eq!(
            queue.status(&TaskId::from("a")).unwrap().state,
            TaskState::Error
        );
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_recv_ends_when_producers_dropped() {
        let (queue, mut rx) = task_queue(StatusBoard::default());
        queue.submit(task("a")).unwrap();
        drop(queue);
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stats() {
        let (queue, mut rx) = task_queue(StatusBoard::default());
        queue.submit(task("a")).unwrap();
        queue.submit(task("b")).unwrap();
        let _ = rx.recv().await;
        queue
            .board()
            .publish(ProcessingStatus::started(TaskId::from("a")));
        queue
            .board()
            .publish(ProcessingStatus::completed(TaskId::from("a")));

        let stats = queue.stats();
        assert_eq!(stats.queue_size, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.processing, 0);
    }
}

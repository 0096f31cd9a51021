//! Task executor.
//!
//! One consumer drains the queue in submission order. Each task runs to a
//! terminal state before the next one is dequeued; a failure or panic is
//! caught at the task boundary and never stops the loop.

use std::any::Any;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{info, Instrument};

use vmark_media::fs_utils::remove_if_exists;
use vmark_models::{FileRecord, ProcessingStatus, Task, TaskState};
use vmark_queue::{StatusBoard, TaskReceiver};
use vmark_storage::FileRegistry;

use crate::error::{WorkerError, WorkerResult};
use crate::logging::TaskLogger;
use crate::metrics::{record_task_finished, record_task_started};
use crate::processor::{ProgressFn, TaskProcessor};

const OPERATION: &str = "embed_watermark";

/// Requests a graceful stop. The running task, if any, finishes first.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Ask the worker to stop. The flag is stored even if `run()` has not
    /// started yet, and it stays set.
    pub fn shutdown(&self) {
        if !self.tx.send_replace(true) {
            info!("Worker shutdown requested");
        }
    }
}

/// Single-consumer task executor.
pub struct Worker {
    receiver: TaskReceiver,
    board: StatusBoard,
    registry: Arc<dyn FileRegistry>,
    processor: Arc<dyn TaskProcessor>,
    shutdown: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Worker {
    pub fn new(
        receiver: TaskReceiver,
        board: StatusBoard,
        registry: Arc<dyn FileRegistry>,
        processor: Arc<dyn TaskProcessor>,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        Self {
            receiver,
            board,
            registry,
            processor,
            shutdown: Arc::new(shutdown),
            shutdown_rx,
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown),
        }
    }

    /// Process tasks until shutdown is requested or every queue handle is
    /// dropped and the queue is drained.
    pub async fn run(mut self) -> WorkerResult<()> {
        info!("Starting watermark worker");
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            if *shutdown_rx.borrow_and_update() {
                info!("Shutdown signal received, stopping worker");
                break;
            }

            let next = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => continue,
                task = self.receiver.recv() => task,
            };

            let Some(task) = next else {
                info!("Task queue closed, stopping worker");
                break;
            };

            let span = TaskLogger::new(&task.id, OPERATION).create_span();
            self.execute_task(task).instrument(span).await;
        }

        info!("Worker stopped");
        Ok(())
    }

    async fn execute_task(&self, task: Task) {
        let logger = TaskLogger::new(&task.id, OPERATION);
        let started = Instant::now();

        logger.log_start(&format!(
            "{} ({})",
            task.original_name,
            task.input_path.display()
        ));
        self.board.publish(ProcessingStatus::started(task.id.clone()));
        record_task_started();

        let outcome = match self.run_processor(&task).await {
            Ok(size) => self.register_output(&task, size).await,
            Err(e) => Err(e),
        };

        // Inputs are temporary on every exit path
        remove_artifact(&task.input_path, &logger).await;

        match outcome {
            Ok(record) => {
                self.board.publish(ProcessingStatus::completed(task.id.clone()));
                logger.log_completion(&format!(
                    "{} ({:.2} MB) in {:.1}s",
                    record.processed_name,
                    record.size_mb(),
                    started.elapsed().as_secs_f64()
                ));
                record_task_finished(TaskState::Completed, started.elapsed());
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                remove_artifact(&task.output_path, &logger).await;
                self.board.publish(ProcessingStatus::failed(task.id.clone(), &e));
                record_task_finished(TaskState::Error, started.elapsed());
            }
        }
    }

    /// Run the processor in its own task so a panic surfaces as a
    /// `JoinError` instead of unwinding through the worker loop.
    async fn run_processor(&self, task: &Task) -> WorkerResult<u64> {
        let processor = Arc::clone(&self.processor);
        let board = self.board.clone();
        let owned = task.clone();

        let handle = tokio::spawn(
            async move {
                let task_id = owned.id.clone();
                let on_progress: ProgressFn = Box::new(move |frame, total| {
                    board.publish(ProcessingStatus::frame_progress(task_id.clone(), frame, total));
                });
                processor.process(&owned, on_progress).await
            }
            .in_current_span(),
        );

        match handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(WorkerError::panicked(panic_message(e.into_panic()))),
            Err(e) => Err(WorkerError::processing_failed(e.to_string())),
        }
    }

    async fn register_output(&self, task: &Task, size: u64) -> WorkerResult<FileRecord> {
        let record = FileRecord::from_task(task, size);
        self.registry
            .register(record.clone())
            .await
            .map_err(|e| WorkerError::registration_failed(e.to_string()))?;
        Ok(record)
    }
}

async fn remove_artifact(path: &Path, logger: &TaskLogger) {
    if let Err(e) = remove_if_exists(path).await {
        logger.log_warning(&format!("Failed to remove {}: {}", path.display(), e));
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new("bad frame".to_string())), "bad frame");
        assert_eq!(panic_message(Box::new(42_u32)), "unknown panic");
    }
}

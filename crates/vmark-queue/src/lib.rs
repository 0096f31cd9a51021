//! In-process task queue for the watermark worker.
//!
//! - [`TaskQueue`] / [`TaskReceiver`]: unbounded FIFO, many producers, one consumer
//! - [`StatusBoard`]: latest status per task with push subscriptions

pub mod error;
pub mod queue;
pub mod status;

pub use error::{QueueError, QueueResult};
pub use queue::{task_queue, QueueStats, TaskQueue, TaskReceiver};
pub use status::{StateCounts, StatusBoard, StatusSubscription, DEFAULT_CHANNEL_CAPACITY};

//! Worker metrics.

use std::time::Duration;

use metrics::{counter, gauge, histogram};
use vmark_models::TaskState;

/// Metric names.
pub mod names {
    pub const TASKS_COMPLETED: &str = "vmark_tasks_completed_total";
    pub const TASKS_FAILED: &str = "vmark_tasks_failed_total";
    pub const TASK_DURATION: &str = "vmark_task_duration_seconds";
    pub const TASKS_IN_FLIGHT: &str = "vmark_tasks_in_flight";
}

/// Mark a task as picked up by the worker.
pub fn record_task_started() {
    gauge!(names::TASKS_IN_FLIGHT).set(1.0);
}

/// Record a task reaching a terminal state.
pub fn record_task_finished(state: TaskState, elapsed: Duration) {
    gauge!(names::TASKS_IN_FLIGHT).set(0.0);
    match state {
        TaskState::Completed => counter!(names::TASKS_COMPLETED).increment(1),
        _ => counter!(names::TASKS_FAILED).increment(1),
    }
    histogram!(names::TASK_DURATION, "state" => state.as_str()).record(elapsed.as_secs_f64());
}

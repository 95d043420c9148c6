//! Task execution. The network treats the computation as a pluggable
//! deterministic function; squaring is the one this deployment runs.

use chrono::Utc;

use quorus_core::{CompletedTask, Task};

/// A deterministic function over a task value. Implementations must
/// return the same `response` for the same `value` on every call.
pub trait TaskExecutor: Send + Sync {
    fn execute(&self, task: &Task) -> CompletedTask;
}

/// Squares the task value. `u64::MAX²` fits in a `u128`, so this cannot
/// overflow.
#[derive(Debug, Default, Clone, Copy)]
pub struct SquareExecutor;

impl TaskExecutor for SquareExecutor {
    fn execute(&self, task: &Task) -> CompletedTask {
        let value = u128::from(task.value);
        CompletedTask {
            value: task.value,
            response: value * value,
            completed_at: Utc::now(),
        }
    }
}

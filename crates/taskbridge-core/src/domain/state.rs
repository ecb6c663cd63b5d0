//! Task execution states as recorded by the result backend.

use serde::{Deserialize, Serialize};

/// Serialized as SCREAMING_SNAKE_CASE: PENDING / STARTED / SUCCESS / FAILURE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Submitted, not picked up yet (or unknown id).
    Pending,
    /// A worker began executing it. Only recorded when `task_track_started` is on.
    Started,
    Success,
    Failure,
}

impl TaskState {
    /// Whether the outcome is final.
    pub fn is_ready(self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failure)
    }
}

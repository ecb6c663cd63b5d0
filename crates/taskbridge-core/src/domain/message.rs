//! TaskMessage - what a submission puts on the broker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::args::TaskArgs;
use super::ids::TaskId;
use super::meta::TaskOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub id: TaskId,
    /// Registered task name the worker dispatches on.
    pub name: String,
    pub args: TaskArgs,
    pub queue: String,
    /// Submission options other than `queue`.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub options: TaskOptions,
    pub sent_at: DateTime<Utc>,
}

impl TaskMessage {
    pub fn new(name: impl Into<String>, args: TaskArgs, queue: impl Into<String>) -> Self {
        Self {
            id: TaskId::generate(),
            name: name.into(),
            args,
            queue: queue.into(),
            options: TaskOptions::new(),
            sent_at: Utc::now(),
        }
    }

    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }
}

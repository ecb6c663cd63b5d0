//! AsyncResult - handle to a submitted task.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::domain::{TaskId, TaskState};
use crate::ports::{BackendError, ResultBackend};

#[derive(Debug, Error)]
pub enum ResultError {
    #[error("task {0} did not finish within {1:?}")]
    Timeout(TaskId, Duration),

    #[error("task {id} failed: {message}")]
    TaskFailed { id: TaskId, message: String },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Clone)]
pub struct AsyncResult {
    id: TaskId,
    task_name: String,
    backend: Arc<dyn ResultBackend>,
}

impl AsyncResult {
    pub fn new(id: TaskId, task_name: impl Into<String>, backend: Arc<dyn ResultBackend>) -> Self {
        Self {
            id,
            task_name: task_name.into(),
            backend,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Unknown ids report PENDING.
    pub async fn state(&self) -> Result<TaskState, ResultError> {
        let record = self.backend.get(self.id).await?;
        Ok(record.map_or(TaskState::Pending, |r| r.state))
    }

    pub async fn ready(&self) -> Result<bool, ResultError> {
        Ok(self.state().await?.is_ready())
    }

    /// Wait for the task to finish and return its value.
    pub async fn get(&self, timeout: Duration) -> Result<Value, ResultError> {
        let record = self
            .backend
            .wait_ready(self.id, timeout)
            .await?
            .ok_or(ResultError::Timeout(self.id, timeout))?;

        match record.state {
            TaskState::Success => Ok(record.result.unwrap_or(Value::Null)),
            _ => Err(ResultError::TaskFailed {
                id: self.id,
                message: record.error.unwrap_or_default(),
            }),
        }
    }
}

impl fmt::Debug for AsyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResult")
            .field("id", &self.id)
            .field("task_name", &self.task_name)
            .finish()
    }
}

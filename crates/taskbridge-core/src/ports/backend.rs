//! ResultBackend port - where task outcomes are stored and awaited.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{TaskId, TaskState};

#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("result backend operation failed: {0}")]
    OperationFailed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub task_id: TaskId,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_done: Option<DateTime<Utc>>,
}

impl ResultRecord {
    pub fn pending(task_id: TaskId) -> Self {
        Self {
            task_id,
            state: TaskState::Pending,
            result: None,
            error: None,
            date_done: None,
        }
    }

    pub fn started(task_id: TaskId) -> Self {
        Self {
            state: TaskState::Started,
            ..Self::pending(task_id)
        }
    }

    pub fn success(task_id: TaskId, result: Value) -> Self {
        Self {
            task_id,
            state: TaskState::Success,
            result: Some(result),
            error: None,
            date_done: Some(Utc::now()),
        }
    }

    pub fn failure(task_id: TaskId, error: impl Into<String>) -> Self {
        Self {
            task_id,
            state: TaskState::Failure,
            result: None,
            error: Some(error.into()),
            date_done: Some(Utc::now()),
        }
    }
}

#[async_trait]
pub trait ResultBackend: Send + Sync {
    async fn store(&self, record: ResultRecord) -> Result<(), BackendError>;

    async fn get(&self, task_id: TaskId) -> Result<Option<ResultRecord>, BackendError>;

    /// Wait until the task reaches a ready state. `None` on timeout.
    async fn wait_ready(
        &self,
        task_id: TaskId,
        timeout: Duration,
    ) -> Result<Option<ResultRecord>, BackendError>;
}

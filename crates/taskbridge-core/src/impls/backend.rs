//! InMemoryBackend - 開発用の result backend
//!
//! Records are kept per task id. Every `store` wakes all waiters; each waiter
//! re-checks its own record.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::domain::TaskId;
use crate::ports::{BackendError, ResultBackend, ResultRecord};

/// Single-process result store for development and tests.
///
/// Records are never evicted: every submitted task keeps its record for the
/// lifetime of the backend. Long-running deployments should inject a real
/// backend through `CeleryApp::builder(..).backend(..)`.
#[derive(Default)]
pub struct InMemoryBackend {
    records: Mutex<HashMap<TaskId, ResultRecord>>,
    stored: Notify,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self, task_id: TaskId) -> Option<ResultRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&task_id)
            .cloned()
    }
}

#[async_trait]
impl ResultBackend for InMemoryBackend {
    async fn store(&self, record: ResultRecord) -> Result<(), BackendError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.task_id, record);
        self.stored.notify_waiters();
        Ok(())
    }

    async fn get(&self, task_id: TaskId) -> Result<Option<ResultRecord>, BackendError> {
        Ok(self.snapshot(task_id))
    }

    async fn wait_ready(
        &self,
        task_id: TaskId,
        timeout: Duration,
    ) -> Result<Option<ResultRecord>, BackendError> {
        let deadline = Instant::now() + timeout;
        loop {
            // 確認より先に登録しておく (確認と待機の間の store を取りこぼさない)
            let notified = self.stored.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(record) = self.snapshot(task_id).filter(|r| r.state.is_ready()) {
                return Ok(Some(record));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }
}

//! Broker port - task message transport.
//!
//! Messages are routed by queue name. `consume` blocks up to `timeout` and
//! returns `None` when nothing arrived.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::TaskMessage;

#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    #[error("broker operation failed: {0}")]
    OperationFailed(String),
}

#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, message: TaskMessage) -> Result<(), BrokerError>;

    /// Take the next message from the first non-empty queue in `queues`.
    async fn consume(
        &self,
        queues: &[String],
        timeout: Duration,
    ) -> Result<Option<TaskMessage>, BrokerError>;
}

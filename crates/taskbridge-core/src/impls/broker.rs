//! InMemoryBroker - 開発用の broker
//!
//! # 実装詳細
//! - HashMap<String, VecDeque<TaskMessage>> で queue ごとに管理
//! - Mutex + Condvar で blocking consume
//! - lock は spawn_blocking の中でだけ取る

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::domain::TaskMessage;
use crate::ports::{Broker, BrokerError};

type Queues = HashMap<String, VecDeque<TaskMessage>>;

pub struct InMemoryBroker {
    queues: Arc<Mutex<Queues>>,
    condvar: Arc<Condvar>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
            condvar: Arc::new(Condvar::new()),
        }
    }

    /// Snapshot of the messages waiting on `queue`.
    pub fn pending(&self, queue: &str) -> Vec<TaskMessage> {
        lock(&self.queues)
            .get(queue)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(queues: &Mutex<Queues>) -> MutexGuard<'_, Queues> {
    queues.lock().unwrap_or_else(PoisonError::into_inner)
}

fn take_first(queues: &mut Queues, names: &[String]) -> Option<TaskMessage> {
    names
        .iter()
        .find_map(|name| queues.get_mut(name).and_then(VecDeque::pop_front))
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(&self, message: TaskMessage) -> Result<(), BrokerError> {
        let queues = self.queues.clone();
        let condvar = self.condvar.clone();

        tokio::task::spawn_blocking(move || {
            lock(&queues).entry(message.queue.clone()).or_default().push_back(message);
            // consumer ごとに見ている queue が違うので全員起こす
            condvar.notify_all();
        })
        .await
        .map_err(|e| BrokerError::OperationFailed(format!("publish failed: {e}")))
    }

    async fn consume(
        &self,
        queues: &[String],
        timeout: Duration,
    ) -> Result<Option<TaskMessage>, BrokerError> {
        let shared = self.queues.clone();
        let condvar = self.condvar.clone();
        let names = queues.to_vec();

        tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let mut guard = lock(&shared);
            loop {
                if let Some(message) = take_first(&mut guard, &names) {
                    return Some(message);
                }
                let elapsed = start.elapsed();
                if elapsed >= timeout {
                    return None;
                }
                let (new_guard, _) = condvar
                    .wait_timeout(guard, timeout - elapsed)
                    .unwrap_or_else(PoisonError::into_inner);
                guard = new_guard;
            }
        })
        .await
        .map_err(|e| BrokerError::OperationFailed(format!("consume failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskArgs;

    fn message(name: &str, queue: &str) -> TaskMessage {
        TaskMessage::new(name, TaskArgs::new(), queue)
    }

    fn names(queues: &[&str]) -> Vec<String> {
        queues.iter().map(|q| q.to_string()).collect()
    }

    #[tokio::test]
    async fn publish_consume_roundtrip() {
        let broker = InMemoryBroker::new();
        let msg = message("tasks.a", "celery");
        broker.publish(msg.clone()).await.unwrap();

        let got = broker.consume(&names(&["celery"]), Duration::from_secs(1)).await.unwrap();
        assert_eq!(got, Some(msg));
        assert!(broker.pending("celery").is_empty());
    }

    #[tokio::test]
    async fn consume_times_out() {
        let broker = InMemoryBroker::new();
        let start = Instant::now();
        let got = broker
            .consume(&names(&["celery"]), Duration::from_millis(100))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn queues_are_checked_in_order() {
        let broker = InMemoryBroker::new();
        broker.publish(message("tasks.low", "low")).await.unwrap();
        broker.publish(message("tasks.high", "high")).await.unwrap();

        let queues = names(&["high", "low"]);
        let first = broker.consume(&queues, Duration::from_secs(1)).await.unwrap().unwrap();
        let second = broker.consume(&queues, Duration::from_secs(1)).await.unwrap().unwrap();
        assert_eq!(first.name, "tasks.high");
        assert_eq!(second.name, "tasks.low");
    }

    #[tokio::test]
    async fn publish_wakes_consumer() {
        let broker = Arc::new(InMemoryBroker::new());

        let consumer = tokio::spawn({
            let broker = broker.clone();
            async move {
                broker
                    .consume(&names(&["celery"]), Duration::from_secs(5))
                    .await
                    .unwrap()
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        broker.publish(message("tasks.late", "celery")).await.unwrap();

        let got = consumer.await.unwrap().unwrap();
        assert_eq!(got.name, "tasks.late");
    }
}

//! CeleryApp - task registration and submission.
//!
//! One `CeleryApp` is shared by both sides: the registrar adds tasks to it at
//! startup, and the client interceptor submits through it at call time.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use thiserror::Error;
use tracing::info;

use super::registry::{RegisteredTask, RegistryError, SyncTaskFn, TaskRegistry};
use super::result::AsyncResult;
use crate::domain::{TaskArgs, TaskMessage, TaskOptions};
use crate::impls::{InMemoryBackend, InMemoryBroker};
use crate::ports::{BackendError, Broker, BrokerError, ResultBackend, ResultRecord};

pub const DEFAULT_QUEUE: &str = "celery";

/// Application-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConf {
    pub broker_url: Option<String>,
    pub backend_url: Option<String>,
    /// Record STARTED before a task body runs.
    pub task_track_started: bool,
    pub task_default_queue: String,
}

impl Default for AppConf {
    fn default() -> Self {
        Self {
            broker_url: None,
            backend_url: None,
            task_track_started: false,
            task_default_queue: DEFAULT_QUEUE.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("invalid task option {key}: {value}")]
    InvalidOption { key: String, value: Value },

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub struct CeleryApp {
    main: String,
    conf: AppConf,
    broker: Arc<dyn Broker>,
    backend: Arc<dyn ResultBackend>,
    tasks: RwLock<TaskRegistry>,
}

impl CeleryApp {
    pub fn builder(main: impl Into<String>) -> CeleryAppBuilder {
        CeleryAppBuilder {
            main: main.into(),
            conf: AppConf::default(),
            broker: None,
            backend: None,
        }
    }

    /// Name the app was built with; used as the main module of its tasks.
    pub fn main(&self) -> &str {
        &self.main
    }

    /// Settings the app was built with.
    pub fn conf(&self) -> &AppConf {
        &self.conf
    }

    /// Transport that carries submitted messages to workers.
    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.broker
    }

    /// Store that holds task states and results.
    pub fn backend(&self) -> &Arc<dyn ResultBackend> {
        &self.backend
    }

    /// Register a blocking callable under `name`.
    pub fn task(
        &self,
        name: impl Into<String>,
        options: TaskOptions,
        func: SyncTaskFn,
    ) -> Result<(), RegistryError> {
        let task = RegisteredTask::new(name, options, func);
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        tasks.register(task)
    }

    pub fn get_task(&self, name: &str) -> Option<RegisteredTask> {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner).get(name)
    }

    /// Whether a task named `name` is registered in this process.
    pub fn has_task(&self, name: &str) -> bool {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner).contains(name)
    }

    /// Names of all registered tasks, sorted.
    pub fn registered_tasks(&self) -> Vec<String> {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner).names()
    }

    /// Submit task `name` by name. The task does not have to be registered in
    /// this process.
    ///
    /// `options["queue"]` selects the queue (default `task_default_queue`);
    /// every other option travels with the message. A `queue` that is not a
    /// string is rejected with `SendError::InvalidOption` before anything is
    /// stored or published.
    pub async fn send_task(
        &self,
        name: &str,
        args: TaskArgs,
        options: &TaskOptions,
    ) -> Result<AsyncResult, SendError> {
        let mut extra = options.clone();
        let queue = match extra.remove("queue") {
            Some(Value::String(queue)) => queue,
            None => self.conf.task_default_queue.clone(),
            Some(value) => {
                return Err(SendError::InvalidOption {
                    key: "queue".to_string(),
                    value,
                });
            }
        };

        let message = TaskMessage::new(name, args, queue).with_options(extra);
        let id = message.id;
        info!(task = name, %id, queue = %message.queue, "sending task");

        self.backend.store(ResultRecord::pending(id)).await?;
        self.broker.publish(message).await?;

        Ok(AsyncResult::new(id, name, Arc::clone(&self.backend)))
    }
}

impl fmt::Debug for CeleryApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CeleryApp")
            .field("main", &self.main)
            .field("conf", &self.conf)
            .field("tasks", &self.registered_tasks())
            .finish()
    }
}

pub struct CeleryAppBuilder {
    main: String,
    conf: AppConf,
    broker: Option<Arc<dyn Broker>>,
    backend: Option<Arc<dyn ResultBackend>>,
}

impl CeleryAppBuilder {
    pub fn conf(mut self, conf: AppConf) -> Self {
        self.conf = conf;
        self
    }

    pub fn broker(mut self, broker: Arc<dyn Broker>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn ResultBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Missing transports fall back to the in-memory ones.
    pub fn build(self) -> CeleryApp {
        CeleryApp {
            main: self.main,
            conf: self.conf,
            broker: self.broker.unwrap_or_else(|| Arc::new(InMemoryBroker::new())),
            backend: self.backend.unwrap_or_else(|| Arc::new(InMemoryBackend::new())),
            tasks: RwLock::new(TaskRegistry::new()),
        }
    }
}

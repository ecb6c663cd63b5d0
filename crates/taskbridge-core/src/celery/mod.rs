//! Celery - the task-queue application.
//!
//! # 構成
//! - **registry**: task name -> blocking callable
//! - **app**: `CeleryApp` (registration, `send_task`)
//! - **result**: `AsyncResult` handles returned by submissions
//! - **worker**: `WorkerGroup`, consumes the broker and runs registered tasks

pub mod registry;
pub mod app;
pub mod result;
pub mod worker;

pub use self::app::{AppConf, CeleryApp, CeleryAppBuilder, SendError};
pub use self::registry::{RegisteredTask, RegistryError, SyncTaskFn, TaskRegistry};
pub use self::result::{AsyncResult, ResultError};
pub use self::worker::WorkerGroup;

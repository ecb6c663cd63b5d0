//! taskbridge-core
//!
//! Bridges a dependency-injection container and a task-queue application.
//!
//! # Modules
//! - **domain**: task arguments, marker metadata, ids, states, messages, errors
//! - **component**: explicit class tables (`ClassDef`, `Member`) and client proxies
//! - **markers**: `task(..)` / `send_task(..)` method markers
//! - **intercept**: method interception chain (`MethodInterceptor`, `Next`)
//! - **client**: `celery(..)` class registrar and `CeleryClientInterceptor`
//! - **ports**: container / broker / result backend abstractions
//! - **impls**: in-memory implementations of the ports
//! - **celery**: the task-queue application, result handles and worker group
//! - **config**: configuration tree and `CelerySettings`
//! - **factory**: builds the shared `CeleryApp` from settings
//! - **registrar**: discovers `task` members and registers blocking wrappers
//! - **app**: `AppBuilder`, the startup wiring

use std::future::Future;
use std::pin::Pin;

pub mod domain;
pub mod component;
pub mod markers;
pub mod intercept;
pub mod client;
pub mod ports;
pub mod impls;
pub mod celery;
pub mod config;
pub mod factory;
pub mod registrar;
pub mod app;
pub mod error;

/// Boxed, sendable future used at the type-erased seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use self::app::{App, AppBuilder};
pub use self::celery::{AsyncResult, CeleryApp, WorkerGroup};
pub use self::client::{CeleryClientInterceptor, CeleryRegistrar, celery};
pub use self::component::{ClassDef, ComponentDef, ComponentProxy, Member};
pub use self::config::{CelerySettings, Configuration};
pub use self::domain::{TaskArgs, TaskError, TaskId, TaskState};
pub use self::error::{Error, Result};
pub use self::intercept::{MethodCtx, MethodInterceptor, Next, Reply};
pub use self::markers::{send_task, task};
pub use self::registrar::PicoTaskRegistrar;

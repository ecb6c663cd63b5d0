//! Task registrar.
//!
//! Runs once at the container's configure point. Every class-backed component
//! is scanned for `task` members, and each one is registered on the
//! `CeleryApp` as a blocking wrapper:
//!
//! 1. resolve an instance of the owning class from the container
//! 2. call the async method on it
//! 3. drive both to completion on a scheduler the wrapper owns
//!
//! # スケジューラ検出
//! A worker calls the wrapper synchronously, possibly from a thread that is
//! already inside a tokio runtime. Nesting `block_on` there panics, so in that
//! case the routine runs on a helper thread with its own current-thread
//! runtime and the calling thread waits for it.

use std::any::Any;
use std::future::Future;
use std::sync::{Arc, Weak};

use tokio::runtime::{Builder, Handle};
use tracing::{debug, info};

use crate::celery::{CeleryApp, RegistryError, SyncTaskFn};
use crate::component::ErasedClass;
use crate::domain::errors::{ContainerError, MethodResult, TaskError};
use crate::domain::TaskArgs;
use crate::ports::{ConfigureHook, Container};

pub struct PicoTaskRegistrar {
    container: Weak<dyn Container>,
    celery_app: Arc<CeleryApp>,
}

impl PicoTaskRegistrar {
    /// The registrar and its wrappers hold the container weakly: the container
    /// owns the app, and the app owns the wrappers.
    pub fn new(container: Weak<dyn Container>, celery_app: Arc<CeleryApp>) -> Self {
        Self {
            container,
            celery_app,
        }
    }

    /// Register every discovered `task` member. Returns how many were registered.
    ///
    /// A container without a component registry, or registry entries without
    /// a class table, are skipped silently.
    pub fn register_tasks(&self) -> Result<usize, RegistryError> {
        let Some(container) = self.container.upgrade() else {
            return Ok(0);
        };
        let Some(metadata) = container.component_metadata() else {
            debug!("container exposes no component registry; nothing to register");
            return Ok(0);
        };

        let mut registered = 0;
        for class in metadata.into_iter().filter_map(|md| md.concrete_class) {
            for (method, meta) in class.task_methods() {
                let wrapper = self.create_task_wrapper(Arc::clone(&class), &method);
                self.celery_app.task(meta.name(), meta.options().clone(), wrapper)?;
                debug!(class = class.name(), method = %method, task = meta.name(), "registered task");
                registered += 1;
            }
        }

        info!(tasks = registered, "task registration complete");
        Ok(registered)
    }

    /// Blocking callable that runs `class.method` on a freshly resolved instance.
    pub fn create_task_wrapper(&self, class: Arc<dyn ErasedClass>, method: &str) -> SyncTaskFn {
        let container = self.container.clone();
        let method = method.to_string();
        Arc::new(move |args: TaskArgs| {
            let routine = run_task_logic(container.clone(), Arc::clone(&class), method.clone(), args);
            block_on_bridge(routine)
        })
    }
}

impl ConfigureHook for PicoTaskRegistrar {
    fn configure(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.register_tasks()?;
        Ok(())
    }
}

async fn run_task_logic(
    container: Weak<dyn Container>,
    class: Arc<dyn ErasedClass>,
    method: String,
    args: TaskArgs,
) -> MethodResult {
    let container = container.upgrade().ok_or(ContainerError::Gone)?;
    let instance = container.resolve_any(class.key()).await?;
    class.invoke(instance, &method, args).await
}

/// Run `routine` to completion from synchronous code.
fn block_on_bridge<F>(routine: F) -> MethodResult
where
    F: Future<Output = MethodResult> + Send,
{
    if Handle::try_current().is_err() {
        return run_on_fresh_runtime(routine);
    }

    debug!("scheduler already active on this thread; running task on a helper thread");
    std::thread::scope(|scope| {
        scope
            .spawn(move || run_on_fresh_runtime(routine))
            .join()
            .unwrap_or_else(|panic| Err(TaskError::Panicked(panic_message(panic.as_ref()))))
    })
}

fn run_on_fresh_runtime<F: Future<Output = MethodResult>>(routine: F) -> MethodResult {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TaskError::Runtime(e.to_string()))?;
    runtime.block_on(routine)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

//! TaskRegistry - registered tasks by name.
//!
//! Workers call tasks synchronously: every entry is a blocking callable taking
//! `TaskArgs`. Async methods reach this table only through a wrapper that
//! drives them to completion.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::domain::errors::TaskError;
use crate::domain::{TaskArgs, TaskOptions};

/// Blocking task callable.
pub type SyncTaskFn = Arc<dyn Fn(TaskArgs) -> Result<Value, TaskError> + Send + Sync>;

#[derive(Clone)]
pub struct RegisteredTask {
    name: String,
    options: TaskOptions,
    func: SyncTaskFn,
}

impl RegisteredTask {
    pub fn new(name: impl Into<String>, options: TaskOptions, func: SyncTaskFn) -> Self {
        Self {
            name: name.into(),
            options,
            func,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &TaskOptions {
        &self.options
    }

    /// Run the task on the current thread.
    pub fn run(&self, args: TaskArgs) -> Result<Value, TaskError> {
        (self.func)(args)
    }
}

impl fmt::Debug for RegisteredTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTask")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("task '{0}' is already registered")]
    AlreadyRegistered(String),
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, RegisteredTask>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `task` under its name.
    ///
    /// # Example
    /// ```ignore
    /// registry.register(RegisteredTask::new("tasks.add", TaskOptions::new(), func))?;
    /// ```
    pub fn register(&mut self, task: RegisteredTask) -> Result<(), RegistryError> {
        if self.tasks.contains_key(task.name()) {
            return Err(RegistryError::AlreadyRegistered(task.name().to_string()));
        }
        self.tasks.insert(task.name().to_string(), task);
        Ok(())
    }

    /// Cloned handle to the task registered under `name`.
    pub fn get(&self, name: &str) -> Option<RegisteredTask> {
        self.tasks.get(name).cloned()
    }

    /// Whether `name` is taken.
    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

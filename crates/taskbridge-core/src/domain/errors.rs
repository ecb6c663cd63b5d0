//! Errors - definition-time, container and task execution errors.
//!
//! # 分類
//! - `DefinitionError`: marker / registrar misuse. Raised immediately, never deferred.
//! - `ContainerError`: component resolution or lifecycle failures.
//! - `TaskError`: anything raised while running a task. Passed through to the
//!   worker unchanged; retry policy is not ours.

use serde_json::Value;
use thiserror::Error;

/// What a method body returns.
pub type MethodResult = Result<Value, TaskError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("task marker can only be applied to async methods, got: {member}")]
    NotAsync { member: String },

    #[error("send_task can only decorate methods or functions, got: {member}")]
    NotCallable { member: String },

    #[error("No send_task or task methods found on {class}")]
    NoMarkedMethods { class: String },

    #[error("{member} already carries {marker} metadata")]
    AlreadyMarked { member: String, marker: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    #[error("no component registered for {0}")]
    NotRegistered(&'static str),

    #[error("component {0} resolved to an unexpected type")]
    TypeMismatch(&'static str),

    #[error("failed to construct {component}: {message}")]
    Construction {
        component: &'static str,
        message: String,
    },

    #[error("configure hook failed: {0}")]
    Configure(String),

    #[error("container is no longer available")]
    Gone,
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Failed(String),

    #[error("{class} has no method named {method}")]
    UnknownMethod { class: String, method: String },

    #[error("{class}.{member} is not callable")]
    NotCallable { class: String, member: String },

    #[error(transparent)]
    Resolve(#[from] ContainerError),

    #[error("could not start scheduler: {0}")]
    Runtime(String),

    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

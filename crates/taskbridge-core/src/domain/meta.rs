//! Marker metadata attached to class members.
//!
//! `TaskMetadata` is read once, when the registrar walks the container.
//! `SenderMetadata` is read on every intercepted client call.
//! Neither has setters: once a member is marked, its metadata does not change.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form task options (`queue`, retry policy, ...), forwarded untouched.
pub type TaskOptions = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    name: String,
    #[serde(default)]
    options: TaskOptions,
}

impl TaskMetadata {
    pub fn new(name: impl Into<String>, options: TaskOptions) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &TaskOptions {
        &self.options
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderMetadata {
    name: String,
    #[serde(default)]
    options: TaskOptions,
}

impl SenderMetadata {
    pub fn new(name: impl Into<String>, options: TaskOptions) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &TaskOptions {
        &self.options
    }
}

//! TaskArgs - positional and keyword arguments of one call.
//!
//! The same shape travels everywhere a call is described: a client proxy call,
//! the `MethodCtx` seen by interceptors, a `TaskMessage` on the broker and the
//! arguments handed to a registered task wrapper.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::TaskError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskArgs {
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl TaskArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from positional values only.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            args: values.into_iter().map(Into::into).collect(),
            kwargs: Map::new(),
        }
    }

    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn with_kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.args.len() + self.kwargs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }

    /// Decode the positional argument at `index`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, TaskError> {
        let value = self
            .args
            .get(index)
            .ok_or_else(|| TaskError::InvalidArgument(format!("missing positional argument {index}")))?;
        decode(value, &index.to_string())
    }

    /// Decode the keyword argument `name`.
    pub fn kwarg<T: DeserializeOwned>(&self, name: &str) -> Result<T, TaskError> {
        let value = self
            .kwargs
            .get(name)
            .ok_or_else(|| TaskError::InvalidArgument(format!("missing keyword argument '{name}'")))?;
        decode(value, name)
    }

    /// Bind a parameter the way a call site would: by position first, then by keyword.
    pub fn get<T: DeserializeOwned>(&self, index: usize, name: &str) -> Result<T, TaskError> {
        match (self.args.get(index), self.kwargs.get(name)) {
            (Some(_), Some(_)) => Err(TaskError::InvalidArgument(format!(
                "got multiple values for argument '{name}'"
            ))),
            (Some(value), None) => decode(value, name),
            (None, Some(value)) => decode(value, name),
            (None, None) => Err(TaskError::InvalidArgument(format!(
                "missing required argument '{name}'"
            ))),
        }
    }
}

fn decode<T: DeserializeOwned>(value: &Value, label: &str) -> Result<T, TaskError> {
    serde_json::from_value(value.clone())
        .map_err(|e| TaskError::InvalidArgument(format!("argument '{label}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn binds_positional_then_keyword() {
        let args = TaskArgs::positional([json!(7)]).with_kwarg("msg", "hi");

        let user_id: i64 = args.get(0, "user_id").unwrap();
        let msg: String = args.get(1, "msg").unwrap();

        assert_eq!(user_id, 7);
        assert_eq!(msg, "hi");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn rejects_duplicate_binding() {
        let args = TaskArgs::positional([json!(1)]).with_kwarg("value", 2);
        let err = args.get::<i64>(0, "value").unwrap_err();
        assert!(err.to_string().contains("multiple values"));
    }

    #[test]
    fn reports_missing_and_mistyped_arguments() {
        let args = TaskArgs::positional([json!("not a number")]);

        assert!(matches!(args.arg::<i64>(0), Err(TaskError::InvalidArgument(_))));
        assert!(matches!(args.arg::<i64>(3), Err(TaskError::InvalidArgument(_))));
        assert!(matches!(args.kwarg::<i64>("x"), Err(TaskError::InvalidArgument(_))));
    }

    #[test]
    fn empty_args() {
        let args = TaskArgs::new();
        assert!(args.is_empty());
        assert!(!args.with_arg(1).is_empty());
    }
}

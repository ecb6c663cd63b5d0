//! Method markers.
//!
//! - `task(name)` marks an async method as a worker-side task. The registrar
//!   later finds it and registers a blocking wrapper under `name`.
//! - `send_task(name)` marks a client-side method whose calls become task
//!   submissions. The body is kept but never runs once the class goes through
//!   the client registrar.
//!
//! Both validate the member at definition time and return it unchanged apart
//! from the attached metadata.
//!
//! ```ignore
//! let class = ClassDef::new("EmailTasks", EmailTasks::default)
//!     .member(task("tasks.send_email").option("queue", "mail").decorate(
//!         Member::asynchronous("send_email", |this, args| async move { this.send(args).await }),
//!     )?);
//! ```

use serde_json::Value;

use crate::component::Member;
use crate::domain::errors::DefinitionError;
use crate::domain::{SenderMetadata, TaskMetadata, TaskOptions};

/// Worker-side marker: registers the decorated async method under `name`.
///
/// Only async members are accepted; anything else is `DefinitionError::NotAsync`.
///
/// # Example
/// ```ignore
/// let member = task("tasks.add").decorate(Member::asynchronous("add", add))?;
/// ```
pub fn task(name: impl Into<String>) -> TaskMarker {
    TaskMarker {
        name: name.into(),
        options: TaskOptions::new(),
    }
}

/// Client-side marker: calls on the decorated method are submitted as task `name`.
///
/// Any callable member is accepted, async or blocking.
///
/// # Example
/// ```ignore
/// let member = send_task("tasks.notify")
///     .option("queue", "high")
///     .decorate(Member::blocking("notify", |_this, _args| Ok(Value::Null)))?;
/// ```
pub fn send_task(name: impl Into<String>) -> SenderMarker {
    SenderMarker {
        name: name.into(),
        options: TaskOptions::new(),
    }
}

#[derive(Debug, Clone)]
pub struct TaskMarker {
    name: String,
    options: TaskOptions,
}

impl TaskMarker {
    /// Option forwarded to task registration (`queue`, `max_retries`, ...).
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn options(mut self, options: TaskOptions) -> Self {
        self.options.extend(options);
        self
    }

    /// Attach task metadata to `member`. The body is kept as is.
    pub fn decorate<C>(self, member: Member<C>) -> Result<Member<C>, DefinitionError> {
        if !member.is_async() {
            return Err(DefinitionError::NotAsync {
                member: member.name().to_string(),
            });
        }
        member.attach_task(TaskMetadata::new(self.name, self.options))
    }
}

#[derive(Debug, Clone)]
pub struct SenderMarker {
    name: String,
    options: TaskOptions,
}

impl SenderMarker {
    /// Option forwarded to every submission (`queue`, `countdown`, ...).
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn options(mut self, options: TaskOptions) -> Self {
        self.options.extend(options);
        self
    }

    /// Attach sender metadata to `member`. Attributes are rejected.
    pub fn decorate<C>(self, member: Member<C>) -> Result<Member<C>, DefinitionError> {
        if !member.is_callable() {
            return Err(DefinitionError::NotCallable {
                member: member.name().to_string(),
            });
        }
        member.attach_sender(SenderMetadata::new(self.name, self.options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::MemberBody;
    use rstest::rstest;
    use serde_json::json;

    struct Svc;

    fn async_member() -> Member<Svc> {
        Member::asynchronous("work", |_this, _args| async move { Ok(json!(1)) })
    }

    fn blocking_member() -> Member<Svc> {
        Member::blocking("work", |_this, _args| Ok(json!(1)))
    }

    fn attribute_member() -> Member<Svc> {
        Member::attribute("work", 1)
    }

    #[test]
    fn task_attaches_metadata_without_touching_the_body() {
        let member = task("sample.task")
            .option("queue", "high")
            .decorate(async_member())
            .unwrap();

        let meta = member.task_metadata().unwrap();
        assert_eq!(meta.name(), "sample.task");
        assert_eq!(meta.options()["queue"], json!("high"));
        assert!(member.sender_metadata().is_none());
        assert!(matches!(member.body(), MemberBody::Async(_)));
    }

    #[rstest]
    #[case::blocking(blocking_member())]
    #[case::attribute(attribute_member())]
    fn task_rejects_non_async(#[case] member: Member<Svc>) {
        let err = task("sample.task").decorate(member).unwrap_err();
        assert_eq!(
            err,
            DefinitionError::NotAsync {
                member: "work".to_string()
            }
        );
        assert!(err.to_string().contains("async methods"));
    }

    #[rstest]
    #[case::asynchronous(async_member())]
    #[case::blocking(blocking_member())]
    fn send_task_accepts_any_method(#[case] member: Member<Svc>) {
        let member = send_task("tasks.notify").option("queue", "high").decorate(member).unwrap();
        let meta = member.sender_metadata().unwrap();
        assert_eq!(meta.name(), "tasks.notify");
        assert_eq!(meta.options()["queue"], json!("high"));
    }

    #[test]
    fn send_task_rejects_attributes() {
        let err = send_task("tasks.notify").decorate(attribute_member()).unwrap_err();
        assert!(matches!(err, DefinitionError::NotCallable { .. }));
        assert!(err.to_string().contains("can only decorate methods or functions"));
    }

    #[test]
    fn metadata_is_attached_once() {
        let member = task("a").decorate(async_member()).unwrap();
        let err = task("b").decorate(member).unwrap_err();
        assert!(matches!(err, DefinitionError::AlreadyMarked { marker: "task", .. }));
    }

    #[test]
    fn a_member_can_carry_both_markers() {
        let member = send_task("tasks.work")
            .decorate(task("tasks.work").decorate(async_member()).unwrap())
            .unwrap();
        assert!(member.task_metadata().is_some());
        assert!(member.sender_metadata().is_some());
    }
}

//! Member - one named entry of a class table.
//!
//! A member is an async method, a blocking method, or a plain attribute.
//! Markers attach metadata to members; the client registrar attaches
//! interceptors. The body itself is never rewritten.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::BoxFuture;
use crate::domain::errors::{DefinitionError, MethodResult, TaskError};
use crate::domain::{SenderMetadata, TaskArgs, TaskMetadata};
use crate::intercept::{InterceptorRef, MethodInterceptor};

pub type AsyncMethodFn<C> =
    Arc<dyn Fn(Arc<C>, TaskArgs) -> BoxFuture<'static, MethodResult> + Send + Sync>;

pub type BlockingMethodFn<C> = Arc<dyn Fn(&C, TaskArgs) -> MethodResult + Send + Sync>;

pub enum MemberBody<C> {
    Async(AsyncMethodFn<C>),
    Blocking(BlockingMethodFn<C>),
    Attribute(Value),
}

impl<C> Clone for MemberBody<C> {
    fn clone(&self) -> Self {
        match self {
            MemberBody::Async(f) => MemberBody::Async(Arc::clone(f)),
            MemberBody::Blocking(f) => MemberBody::Blocking(Arc::clone(f)),
            MemberBody::Attribute(v) => MemberBody::Attribute(v.clone()),
        }
    }
}

pub struct Member<C> {
    name: String,
    body: MemberBody<C>,
    task: Option<TaskMetadata>,
    sender: Option<SenderMetadata>,
    interceptors: Vec<InterceptorRef>,
}

impl<C> Clone for Member<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            body: self.body.clone(),
            task: self.task.clone(),
            sender: self.sender.clone(),
            interceptors: self.interceptors.clone(),
        }
    }
}

impl<C> fmt::Debug for Member<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.body {
            MemberBody::Async(_) => "async",
            MemberBody::Blocking(_) => "blocking",
            MemberBody::Attribute(_) => "attribute",
        };
        f.debug_struct("Member")
            .field("name", &self.name)
            .field("kind", &kind)
            .field("task", &self.task)
            .field("sender", &self.sender)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

impl<C: Send + Sync + 'static> Member<C> {
    pub fn asynchronous<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Arc<C>, TaskArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MethodResult> + Send + 'static,
    {
        let body: AsyncMethodFn<C> = Arc::new(
            move |this: Arc<C>, args: TaskArgs| -> BoxFuture<'static, MethodResult> {
                Box::pin(f(this, args))
            },
        );
        Self::with_body(name, MemberBody::Async(body))
    }

    pub fn blocking<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&C, TaskArgs) -> MethodResult + Send + Sync + 'static,
    {
        Self::with_body(name, MemberBody::Blocking(Arc::new(f)))
    }

    pub fn attribute(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::with_body(name, MemberBody::Attribute(value.into()))
    }

    fn with_body(name: impl Into<String>, body: MemberBody<C>) -> Self {
        Self {
            name: name.into(),
            body,
            task: None,
            sender: None,
            interceptors: Vec::new(),
        }
    }

    /// Route calls to this member through interceptor `I` (resolved from the
    /// container at call time). Attaching the same interceptor twice is a no-op.
    pub fn intercepted_by<I: MethodInterceptor + 'static>(mut self) -> Self {
        let interceptor = InterceptorRef::of::<I>();
        if !self.interceptors.iter().any(|i| i.key() == interceptor.key()) {
            self.interceptors.push(interceptor);
        }
        self
    }

    /// Run the body against `instance`.
    pub(crate) fn call(&self, instance: Arc<C>, args: TaskArgs) -> BoxFuture<'static, MethodResult> {
        match &self.body {
            MemberBody::Async(f) => f(instance, args),
            MemberBody::Blocking(f) => {
                let f = Arc::clone(f);
                Box::pin(async move { f(&instance, args) })
            }
            MemberBody::Attribute(_) => {
                let err = TaskError::NotCallable {
                    class: std::any::type_name::<C>().to_string(),
                    member: self.name.clone(),
                };
                Box::pin(async move { Err(err) })
            }
        }
    }
}

impl<C> Member<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &MemberBody<C> {
        &self.body
    }

    pub fn is_async(&self) -> bool {
        matches!(self.body, MemberBody::Async(_))
    }

    pub fn is_callable(&self) -> bool {
        !matches!(self.body, MemberBody::Attribute(_))
    }

    pub fn task_metadata(&self) -> Option<&TaskMetadata> {
        self.task.as_ref()
    }

    pub fn sender_metadata(&self) -> Option<&SenderMetadata> {
        self.sender.as_ref()
    }

    pub fn interceptors(&self) -> &[InterceptorRef] {
        &self.interceptors
    }

    pub(crate) fn attach_task(mut self, meta: TaskMetadata) -> Result<Self, DefinitionError> {
        if self.task.is_some() {
            return Err(DefinitionError::AlreadyMarked {
                member: self.name,
                marker: "task",
            });
        }
        self.task = Some(meta);
        Ok(self)
    }

    pub(crate) fn attach_sender(mut self, meta: SenderMetadata) -> Result<Self, DefinitionError> {
        if self.sender.is_some() {
            return Err(DefinitionError::AlreadyMarked {
                member: self.name,
                marker: "send_task",
            });
        }
        self.sender = Some(meta);
        Ok(self)
    }
}

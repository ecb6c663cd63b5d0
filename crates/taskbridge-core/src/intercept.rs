//! Method interception.
//!
//! A call on a client proxy becomes a `MethodCtx` that walks the member's
//! interceptor chain. Each interceptor either answers the call itself or hands
//! it to `Next`, which runs the rest of the chain and finally the member body.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::BoxFuture;
use crate::celery::{AsyncResult, SendError};
use crate::component::ErasedClass;
use crate::domain::errors::{ContainerError, TaskError};
use crate::domain::TaskArgs;
use crate::ports::{AnyArc, ComponentKey, Container};

/// One in-flight call: owning class, member name and arguments.
#[derive(Clone)]
pub struct MethodCtx {
    class: Arc<dyn ErasedClass>,
    name: String,
    args: TaskArgs,
}

impl MethodCtx {
    pub fn new(class: Arc<dyn ErasedClass>, name: impl Into<String>, args: TaskArgs) -> Self {
        Self {
            class,
            name: name.into(),
            args,
        }
    }

    pub fn class(&self) -> &Arc<dyn ErasedClass> {
        &self.class
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &TaskArgs {
        &self.args
    }

    pub fn into_args(self) -> TaskArgs {
        self.args
    }
}

impl fmt::Debug for MethodCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCtx")
            .field("class", &self.class.name())
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

/// What a proxied call produced.
#[derive(Debug)]
pub enum Reply {
    /// The member body ran and returned this value.
    Value(Value),
    /// The call was turned into a task submission.
    Submitted(AsyncResult),
}

impl Reply {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Reply::Value(v) => Some(v),
            Reply::Submitted(_) => None,
        }
    }

    pub fn into_async_result(self) -> Option<AsyncResult> {
        match self {
            Reply::Submitted(r) => Some(r),
            Reply::Value(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("{class} has no member named {member}")]
    UnknownMember { class: String, member: String },

    #[error("{class}.{member} is not callable")]
    NotCallable { class: String, member: String },

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    Resolve(#[from] ContainerError),
}

#[async_trait]
pub trait MethodInterceptor: Send + Sync {
    async fn invoke(&self, ctx: MethodCtx, next: Next<'_>) -> Result<Reply, InvokeError>;
}

/// The innermost step of a chain: the member body itself.
pub type Target<'a> =
    Box<dyn FnOnce(MethodCtx) -> BoxFuture<'static, Result<Reply, InvokeError>> + Send + 'a>;

/// The rest of the interception chain.
pub struct Next<'a> {
    chain: &'a [Arc<dyn MethodInterceptor>],
    target: Target<'a>,
}

impl<'a> Next<'a> {
    pub fn new(chain: &'a [Arc<dyn MethodInterceptor>], target: Target<'a>) -> Self {
        Self { chain, target }
    }

    pub async fn run(self, ctx: MethodCtx) -> Result<Reply, InvokeError> {
        match self.chain.split_first() {
            Some((head, rest)) => {
                let next = Next {
                    chain: rest,
                    target: self.target,
                };
                head.invoke(ctx, next).await
            }
            None => (self.target)(ctx).await,
        }
    }
}

/// Reference to an interceptor component, resolved lazily from the container.
#[derive(Clone)]
pub struct InterceptorRef {
    key: ComponentKey,
    cast: fn(AnyArc) -> Option<Arc<dyn MethodInterceptor>>,
}

fn cast_interceptor<I: MethodInterceptor + 'static>(any: AnyArc) -> Option<Arc<dyn MethodInterceptor>> {
    any.downcast::<I>().ok().map(|i| i as Arc<dyn MethodInterceptor>)
}

impl InterceptorRef {
    pub fn of<I: MethodInterceptor + 'static>() -> Self {
        Self {
            key: ComponentKey::of::<I>(),
            cast: cast_interceptor::<I>,
        }
    }

    pub fn key(&self) -> ComponentKey {
        self.key
    }

    pub async fn resolve(
        &self,
        container: &dyn Container,
    ) -> Result<Arc<dyn MethodInterceptor>, ContainerError> {
        let any = container.resolve_any(self.key).await?;
        (self.cast)(any).ok_or(ContainerError::TypeMismatch(self.key.type_name()))
    }
}

impl fmt::Debug for InterceptorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InterceptorRef").field(&self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ClassDef;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Plain;

    struct Tagging {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MethodInterceptor for Tagging {
        async fn invoke(&self, ctx: MethodCtx, next: Next<'_>) -> Result<Reply, InvokeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = next.run(ctx).await?;
            let value = reply.into_value().unwrap_or(Value::Null);
            Ok(Reply::Value(json!({ "tagged": value })))
        }
    }

    fn ctx() -> MethodCtx {
        let class: Arc<dyn ErasedClass> = Arc::new(ClassDef::new("Plain", || Plain));
        MethodCtx::new(class, "noop", TaskArgs::positional([json!(1)]))
    }

    fn echo_target<'a>() -> Target<'a> {
        Box::new(|ctx: MethodCtx| -> BoxFuture<'static, Result<Reply, InvokeError>> {
            Box::pin(async move { Ok(Reply::Value(json!(ctx.args().args.clone()))) })
        })
    }

    #[tokio::test]
    async fn empty_chain_runs_target() {
        let reply = Next::new(&[], echo_target()).run(ctx()).await.unwrap();
        assert_eq!(reply.into_value(), Some(json!([1])));
    }

    #[tokio::test]
    async fn interceptors_wrap_in_order() {
        let tagging = Arc::new(Tagging {
            calls: AtomicUsize::new(0),
        });
        let chain: Vec<Arc<dyn MethodInterceptor>> = vec![tagging.clone(), tagging.clone()];

        let reply = Next::new(&chain, echo_target()).run(ctx()).await.unwrap();

        assert_eq!(reply.into_value(), Some(json!({ "tagged": { "tagged": [1] } })));
        assert_eq!(tagging.calls.load(Ordering::SeqCst), 2);
    }
}

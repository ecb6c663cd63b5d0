//! ComponentProxy - calls on a component instance, routed through interceptors.
//!
//! Members without interceptors run their body directly, exactly as if no
//! interception existed.

use std::sync::Arc;

use serde_json::Value;

use super::class::{ClassDef, ErasedClass};
use super::member::MemberBody;
use crate::BoxFuture;
use crate::domain::TaskArgs;
use crate::intercept::{InvokeError, MethodCtx, MethodInterceptor, Next, Reply, Target};
use crate::ports::Container;

pub struct ComponentProxy<C> {
    instance: Arc<C>,
    class: Arc<ClassDef<C>>,
    container: Arc<dyn Container>,
}

impl<C> Clone for ComponentProxy<C> {
    fn clone(&self) -> Self {
        Self {
            instance: Arc::clone(&self.instance),
            class: Arc::clone(&self.class),
            container: Arc::clone(&self.container),
        }
    }
}

impl<C: Send + Sync + 'static> ComponentProxy<C> {
    pub fn new(instance: Arc<C>, class: Arc<ClassDef<C>>, container: Arc<dyn Container>) -> Self {
        Self {
            instance,
            class,
            container,
        }
    }

    pub fn instance(&self) -> &Arc<C> {
        &self.instance
    }

    pub fn class(&self) -> &ClassDef<C> {
        &self.class
    }

    /// Read a plain attribute member.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        match self.class.get(name)?.body() {
            MemberBody::Attribute(value) => Some(value),
            _ => None,
        }
    }

    /// Call member `name` with `args`.
    pub async fn call(&self, name: &str, args: TaskArgs) -> Result<Reply, InvokeError> {
        let member = self.class.get(name).ok_or_else(|| InvokeError::UnknownMember {
            class: self.class.name().to_string(),
            member: name.to_string(),
        })?;
        if !member.is_callable() {
            return Err(InvokeError::NotCallable {
                class: self.class.name().to_string(),
                member: name.to_string(),
            });
        }

        let mut chain: Vec<Arc<dyn MethodInterceptor>> = Vec::with_capacity(member.interceptors().len());
        for interceptor in member.interceptors() {
            chain.push(interceptor.resolve(self.container.as_ref()).await?);
        }

        let instance = Arc::clone(&self.instance);
        let class = Arc::clone(&self.class);
        let target: Target<'_> = Box::new(
            move |ctx: MethodCtx| -> BoxFuture<'static, Result<Reply, InvokeError>> {
                Box::pin(async move {
                    let member = class.get(ctx.name()).ok_or_else(|| InvokeError::UnknownMember {
                        class: class.name().to_string(),
                        member: ctx.name().to_string(),
                    })?;
                    let value = member.call(instance, ctx.into_args()).await?;
                    Ok(Reply::Value(value))
                })
            },
        );

        let erased: Arc<dyn ErasedClass> = self.class.clone();
        let ctx = MethodCtx::new(erased, name, args);
        Next::new(&chain, target).run(ctx).await
    }
}

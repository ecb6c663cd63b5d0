//! Client side: the class registrar and the sender interceptor.
//!
//! `celery(class)` checks that the class has at least one marked method, routes
//! every `send_task` member through `CeleryClientInterceptor`, and returns a
//! `ComponentDef` for the container. A call on a sender member then becomes
//! `CeleryApp::send_task(..)` and returns an `AsyncResult`; the method body is
//! never executed.
//!
//! ```ignore
//! let client = celery(
//!     ClassDef::new("NotificationClient", || NotificationClient)
//!         .member(send_task("tasks.notify").option("queue", "high").decorate(
//!             Member::blocking("notify", |_this, _args| Ok(Value::Null)),
//!         )?),
//! )?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::celery::CeleryApp;
use crate::component::{ClassDef, ComponentDef};
use crate::domain::errors::DefinitionError;
use crate::intercept::{InvokeError, MethodCtx, MethodInterceptor, Next, Reply};
use crate::ports::Scope;

/// Turns calls on `send_task` members into task submissions.
pub struct CeleryClientInterceptor {
    celery: Arc<CeleryApp>,
}

impl CeleryClientInterceptor {
    pub fn new(celery_app: Arc<CeleryApp>) -> Self {
        Self { celery: celery_app }
    }
}

#[async_trait]
impl MethodInterceptor for CeleryClientInterceptor {
    async fn invoke(&self, ctx: MethodCtx, next: Next<'_>) -> Result<Reply, InvokeError> {
        let Some(meta) = ctx.class().sender_metadata(ctx.name()).cloned() else {
            return next.run(ctx).await;
        };

        debug!(
            class = ctx.class().name(),
            method = ctx.name(),
            task = meta.name(),
            "dispatching sender call as task"
        );
        let result = self
            .celery
            .send_task(meta.name(), ctx.into_args(), meta.options())
            .await?;
        Ok(Reply::Submitted(result))
    }
}

/// Bare form: register `class` as a singleton client/worker component.
pub fn celery<C: Send + Sync + 'static>(class: ClassDef<C>) -> Result<ComponentDef<C>, DefinitionError> {
    CeleryRegistrar::new().decorate(class)
}

/// Factory form: `CeleryRegistrar::new().scope(Scope::Prototype).decorate(class)`.
#[derive(Debug, Clone, Default)]
pub struct CeleryRegistrar {
    scope: Scope,
    options: Map<String, Value>,
}

impl CeleryRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Pass-through component option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Applying this twice to the same class is harmless: a member is routed
    /// through the interceptor at most once.
    pub fn decorate<C: Send + Sync + 'static>(
        &self,
        class: ClassDef<C>,
    ) -> Result<ComponentDef<C>, DefinitionError> {
        let has_send_tasks = class.functions().any(|m| m.sender_metadata().is_some());
        let has_worker_tasks = class.functions().any(|m| m.task_metadata().is_some());

        if !has_send_tasks && !has_worker_tasks {
            return Err(DefinitionError::NoMarkedMethods {
                class: class.name().to_string(),
            });
        }

        let class = if has_send_tasks {
            class.map_members(|member| {
                if member.sender_metadata().is_some() {
                    member.intercepted_by::<CeleryClientInterceptor>()
                } else {
                    member
                }
            })
        } else {
            class
        };

        Ok(ComponentDef::new(class, self.scope).with_options(self.options.clone()))
    }
}

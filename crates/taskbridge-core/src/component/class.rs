//! ClassDef - explicit, statically declared class table.
//!
//! # 型消去
//! - `ClassDef<C>`: typed surface (constructor + members of `C`)
//! - `ErasedClass`: object-safe view, so the container, the registrar and the
//!   interceptors can work with `Arc<dyn ErasedClass>` without knowing `C`

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::member::Member;
use crate::BoxFuture;
use crate::domain::errors::{ContainerError, MethodResult, TaskError};
use crate::domain::{SenderMetadata, TaskArgs, TaskMetadata};
use crate::ports::{AnyArc, ComponentKey, Container, Scope};

/// Builds an instance; may resolve dependencies from the container first.
pub type Constructor<C> =
    Arc<dyn Fn(Arc<dyn Container>) -> BoxFuture<'static, Result<C, ContainerError>> + Send + Sync>;

pub struct ClassDef<C> {
    name: String,
    constructor: Constructor<C>,
    members: Vec<Member<C>>,
}

impl<C: Send + Sync + 'static> ClassDef<C> {
    /// Class whose instances need nothing from the container.
    pub fn new<F>(name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> C + Send + Sync + 'static,
    {
        let constructor: Constructor<C> = Arc::new(
            move |_container: Arc<dyn Container>| -> BoxFuture<'static, Result<C, ContainerError>> {
                let instance = constructor();
                Box::pin(async move { Ok(instance) })
            },
        );
        Self {
            name: name.into(),
            constructor,
            members: Vec::new(),
        }
    }

    /// Class whose constructor resolves its dependencies (possibly suspending).
    pub fn with_factory<F, Fut>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(Arc<dyn Container>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C, ContainerError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            constructor: Arc::new(
                move |container: Arc<dyn Container>| -> BoxFuture<'static, Result<C, ContainerError>> {
                    Box::pin(factory(container))
                },
            ),
            members: Vec::new(),
        }
    }

    /// Add a member. A later member with the same name replaces the earlier one.
    pub fn member(mut self, member: Member<C>) -> Self {
        match self.members.iter_mut().find(|m| m.name() == member.name()) {
            Some(slot) => *slot = member,
            None => self.members.push(member),
        }
        self
    }

    pub fn into_component(self, scope: Scope) -> ComponentDef<C> {
        ComponentDef::new(self, scope)
    }

    pub(crate) async fn construct(&self, container: Arc<dyn Container>) -> Result<C, ContainerError> {
        (self.constructor)(container).await
    }
}

impl<C> ClassDef<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> impl Iterator<Item = &Member<C>> {
        self.members.iter()
    }

    /// Callable members only (async or blocking methods).
    pub fn functions(&self) -> impl Iterator<Item = &Member<C>> {
        self.members.iter().filter(|m| m.is_callable())
    }

    pub fn get(&self, name: &str) -> Option<&Member<C>> {
        self.members.iter().find(|m| m.name() == name)
    }

    pub(crate) fn map_members(mut self, f: impl FnMut(Member<C>) -> Member<C>) -> Self {
        self.members = self.members.into_iter().map(f).collect();
        self
    }
}

impl<C> fmt::Debug for ClassDef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDef")
            .field("name", &self.name)
            .field("members", &self.members)
            .finish()
    }
}

/// Object-safe view of a `ClassDef<C>`.
pub trait ErasedClass: Send + Sync {
    fn name(&self) -> &str;

    /// Key the instances of this class are registered under.
    fn key(&self) -> ComponentKey;

    /// `(member name, metadata)` for every task-marked method.
    fn task_methods(&self) -> Vec<(String, TaskMetadata)>;

    fn sender_metadata(&self, member: &str) -> Option<&SenderMetadata>;

    /// Run `member` on a resolved instance.
    fn invoke(&self, instance: AnyArc, member: &str, args: TaskArgs) -> BoxFuture<'static, MethodResult>;
}

impl<C: Send + Sync + 'static> ErasedClass for ClassDef<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn key(&self) -> ComponentKey {
        ComponentKey::of::<C>()
    }

    fn task_methods(&self) -> Vec<(String, TaskMetadata)> {
        self.functions()
            .filter_map(|m| m.task_metadata().map(|meta| (m.name().to_string(), meta.clone())))
            .collect()
    }

    fn sender_metadata(&self, member: &str) -> Option<&SenderMetadata> {
        self.get(member).and_then(|m| m.sender_metadata())
    }

    fn invoke(&self, instance: AnyArc, member: &str, args: TaskArgs) -> BoxFuture<'static, MethodResult> {
        let Some(method) = self.get(member) else {
            let err = TaskError::UnknownMethod {
                class: self.name.clone(),
                method: member.to_string(),
            };
            return Box::pin(async move { Err(err) });
        };
        match instance.downcast::<C>() {
            Ok(instance) => method.call(instance, args),
            Err(_) => {
                let err = TaskError::Resolve(ContainerError::TypeMismatch(std::any::type_name::<C>()));
                Box::pin(async move { Err(err) })
            }
        }
    }
}

/// A class ready for container registration.
pub struct ComponentDef<C> {
    class: ClassDef<C>,
    scope: Scope,
    options: Map<String, Value>,
}

impl<C> ComponentDef<C> {
    pub fn new(class: ClassDef<C>, scope: Scope) -> Self {
        Self {
            class,
            scope,
            options: Map::new(),
        }
    }

    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }

    pub fn class(&self) -> &ClassDef<C> {
        &self.class
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    pub fn into_class(self) -> ClassDef<C> {
        self.class
    }

    pub(crate) fn into_parts(self) -> (ClassDef<C>, Scope, Map<String, Value>) {
        (self.class, self.scope, self.options)
    }
}

impl<C> fmt::Debug for ComponentDef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("class", &self.class.name)
            .field("scope", &self.scope)
            .field("options", &self.options)
            .finish()
    }
}

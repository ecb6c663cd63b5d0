//! Container port - the DI container as seen from this crate.
//!
//! Two capabilities are needed:
//! - resolve an instance by key (may suspend: constructors can be async)
//! - enumerate component metadata so the registrar can find marked classes
//!
//! The metadata registry is optional. A container that cannot enumerate its
//! components returns `None`, and discovery quietly finds nothing.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::component::ErasedClass;
use crate::domain::errors::ContainerError;

/// A type-erased component instance.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Registration key: the concrete type of the component.
#[derive(Clone, Copy)]
pub struct ComponentKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl ComponentKey {
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for ComponentKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ComponentKey {}

impl std::hash::Hash for ComponentKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// Instance lifetime policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One shared instance, created on first resolution.
    #[default]
    Singleton,
    /// A fresh instance per resolution.
    Prototype,
}

/// One entry of the container's component registry.
///
/// `concrete_class` is `None` for entries that are not backed by a class table:
/// plain values, factory products, placeholders.
#[derive(Clone)]
pub struct ComponentMetadata {
    pub key: ComponentKey,
    pub scope: Scope,
    pub concrete_class: Option<Arc<dyn ErasedClass>>,
}

impl fmt::Debug for ComponentMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentMetadata")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .field("concrete_class", &self.concrete_class.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}

#[async_trait]
pub trait Container: Send + Sync {
    async fn resolve_any(&self, key: ComponentKey) -> Result<AnyArc, ContainerError>;

    /// Snapshot of the component registry, or `None` when unavailable.
    fn component_metadata(&self) -> Option<Vec<ComponentMetadata>>;
}

impl dyn Container {
    /// Typed resolution on top of `resolve_any`.
    pub async fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ContainerError> {
        let key = ComponentKey::of::<T>();
        self.resolve_any(key)
            .await?
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch(key.type_name()))
    }
}

/// Runs at the container's configure point, after every component is known.
pub trait ConfigureHook: Send + Sync {
    fn configure(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

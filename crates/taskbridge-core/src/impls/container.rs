//! InMemoryContainer - a small DI container.
//!
//! - components are keyed by concrete type (`ComponentKey`)
//! - singleton instances are created on first resolution, once
//! - configure hooks run once, after every component is registered
//!
//! The container holds a weak handle to itself so resolved constructors and
//! proxies can be given an `Arc<dyn Container>`.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::BoxFuture;
use crate::component::{ClassDef, ComponentDef, ComponentProxy, ErasedClass};
use crate::domain::errors::ContainerError;
use crate::ports::{AnyArc, ComponentKey, ComponentMetadata, ConfigureHook, Container, Scope};

type Provider =
    Arc<dyn Fn(Arc<dyn Container>) -> BoxFuture<'static, Result<AnyArc, ContainerError>> + Send + Sync>;

struct Registration {
    key: ComponentKey,
    scope: Scope,
    options: Map<String, Value>,
    provider: Provider,
    /// Class table for component registrations, `None` for plain values.
    class: Option<Arc<dyn ErasedClass>>,
    /// The same table as `Arc<ClassDef<C>>`, for typed proxies.
    class_any: Option<AnyArc>,
    singleton: OnceCell<AnyArc>,
}

pub struct InMemoryContainer {
    this: Weak<InMemoryContainer>,
    registrations: RwLock<HashMap<ComponentKey, Arc<Registration>>>,
    order: RwLock<Vec<ComponentKey>>,
    hooks: Mutex<Vec<Arc<dyn ConfigureHook>>>,
}

impl InMemoryContainer {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            registrations: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
            hooks: Mutex::new(Vec::new()),
        })
    }

    /// Register an existing value as a singleton.
    pub fn register_instance<T: Any + Send + Sync>(&self, instance: Arc<T>) {
        let provider: Provider = Arc::new(
            move |_container: Arc<dyn Container>| -> BoxFuture<'static, Result<AnyArc, ContainerError>> {
                let any: AnyArc = instance.clone();
                Box::pin(async move { Ok(any) })
            },
        );
        self.insert(Registration {
            key: ComponentKey::of::<T>(),
            scope: Scope::Singleton,
            options: Map::new(),
            provider,
            class: None,
            class_any: None,
            singleton: OnceCell::new(),
        });
    }

    /// Register a factory. The product has no class table.
    pub fn register_factory<T, F, Fut>(&self, scope: Scope, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn(Arc<dyn Container>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ContainerError>> + Send + 'static,
    {
        let provider: Provider = Arc::new(
            move |container: Arc<dyn Container>| -> BoxFuture<'static, Result<AnyArc, ContainerError>> {
                let fut = factory(container);
                Box::pin(async move {
                    let any: AnyArc = Arc::new(fut.await?);
                    Ok(any)
                })
            },
        );
        self.insert(Registration {
            key: ComponentKey::of::<T>(),
            scope,
            options: Map::new(),
            provider,
            class: None,
            class_any: None,
            singleton: OnceCell::new(),
        });
    }

    /// Register a class-backed component.
    pub fn register_component<C: Send + Sync + 'static>(&self, def: ComponentDef<C>) {
        let (class, scope, options) = def.into_parts();
        let class = Arc::new(class);

        let constructing = Arc::clone(&class);
        let provider: Provider = Arc::new(
            move |container: Arc<dyn Container>| -> BoxFuture<'static, Result<AnyArc, ContainerError>> {
                let class = Arc::clone(&constructing);
                Box::pin(async move {
                    let any: AnyArc = Arc::new(class.construct(container).await?);
                    Ok(any)
                })
            },
        );

        let erased: Arc<dyn ErasedClass> = class.clone();
        let class_any: AnyArc = class;
        self.insert(Registration {
            key: ComponentKey::of::<C>(),
            scope,
            options,
            provider,
            class: Some(erased),
            class_any: Some(class_any),
            singleton: OnceCell::new(),
        });
    }

    /// Resolve `C` and wrap it in a proxy that applies member interceptors.
    pub async fn proxy<C: Send + Sync + 'static>(&self) -> Result<ComponentProxy<C>, ContainerError> {
        let key = ComponentKey::of::<C>();
        let registration = self.registration(key)?;
        let class = registration
            .class_any
            .clone()
            .ok_or(ContainerError::TypeMismatch(key.type_name()))?
            .downcast::<ClassDef<C>>()
            .map_err(|_| ContainerError::TypeMismatch(key.type_name()))?;

        let container = self.handle()?;
        let instance = container.resolve::<C>().await?;
        Ok(ComponentProxy::new(instance, class, container))
    }

    /// Options the component was registered with.
    pub fn component_options(&self, key: ComponentKey) -> Option<Map<String, Value>> {
        self.registration(key).ok().map(|r| r.options.clone())
    }

    pub fn add_configure_hook(&self, hook: Arc<dyn ConfigureHook>) {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner).push(hook);
    }

    /// Run pending configure hooks. Each hook runs at most once.
    pub fn configure(&self) -> Result<(), ContainerError> {
        let hooks = std::mem::take(&mut *self.hooks.lock().unwrap_or_else(PoisonError::into_inner));
        debug!(hooks = hooks.len(), "running configure hooks");
        for hook in hooks {
            hook.configure().map_err(|e| {
                warn!(error = %e, "configure hook failed");
                ContainerError::Configure(e.to_string())
            })?;
        }
        Ok(())
    }

    fn handle(&self) -> Result<Arc<dyn Container>, ContainerError> {
        let this: Arc<dyn Container> = self.this.upgrade().ok_or(ContainerError::Gone)?;
        Ok(this)
    }

    fn registration(&self, key: ComponentKey) -> Result<Arc<Registration>, ContainerError> {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
            .ok_or(ContainerError::NotRegistered(key.type_name()))
    }

    /// A later registration for the same key replaces the earlier one.
    fn insert(&self, registration: Registration) {
        let key = registration.key;
        let previous = self
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::new(registration));
        if previous.is_none() {
            self.order.write().unwrap_or_else(PoisonError::into_inner).push(key);
        }
        debug!(component = key.type_name(), replaced = previous.is_some(), "registered component");
    }
}

#[async_trait]
impl Container for InMemoryContainer {
    async fn resolve_any(&self, key: ComponentKey) -> Result<AnyArc, ContainerError> {
        let registration = self.registration(key)?;
        let container = self.handle()?;
        match registration.scope {
            Scope::Singleton => registration
                .singleton
                .get_or_try_init(|| (registration.provider)(container))
                .await
                .cloned(),
            Scope::Prototype => (registration.provider)(container).await,
        }
    }

    fn component_metadata(&self) -> Option<Vec<ComponentMetadata>> {
        let registrations = self.registrations.read().unwrap_or_else(PoisonError::into_inner);
        let order = self.order.read().unwrap_or_else(PoisonError::into_inner);
        Some(
            order
                .iter()
                .filter_map(|key| registrations.get(key))
                .map(|r| ComponentMetadata {
                    key: r.key,
                    scope: r.scope,
                    concrete_class: r.class.clone(),
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Member;
    use crate::domain::TaskArgs;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Settings {
        greeting: String,
    }

    struct Greeter {
        settings: Arc<Settings>,
    }

    fn greeter_class() -> ClassDef<Greeter> {
        ClassDef::with_factory("Greeter", |container: Arc<dyn Container>| async move {
            let settings = container.resolve::<Settings>().await?;
            Ok(Greeter { settings })
        })
        .member(Member::blocking("greet", |this: &Greeter, args: TaskArgs| {
            let name: String = args.arg(0)?;
            Ok(json!(format!("{} {name}", this.settings.greeting)))
        }))
    }

    fn container() -> Arc<InMemoryContainer> {
        let container = InMemoryContainer::new();
        container.register_instance(Arc::new(Settings {
            greeting: "hello".to_string(),
        }));
        container
    }

    #[tokio::test]
    async fn singleton_is_built_once() {
        let container = container();
        container.register_component(greeter_class().into_component(Scope::Singleton));
        let dyn_container: Arc<dyn Container> = container.clone();

        let a = dyn_container.resolve::<Greeter>().await.unwrap();
        let b = dyn_container.resolve::<Greeter>().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.settings.greeting, "hello");
    }

    #[tokio::test]
    async fn prototype_is_built_per_resolution() {
        let built = Arc::new(AtomicUsize::new(0));
        let container = InMemoryContainer::new();
        let counter = built.clone();
        container.register_factory(Scope::Prototype, move |_c: Arc<dyn Container>| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(n) }
        });
        let dyn_container: Arc<dyn Container> = container.clone();

        assert_eq!(*dyn_container.resolve::<usize>().await.unwrap(), 0);
        assert_eq!(*dyn_container.resolve::<usize>().await.unwrap(), 1);
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_component_is_not_registered() {
        let container: Arc<dyn Container> = InMemoryContainer::new();
        let err = container.resolve::<Greeter>().await.err().unwrap();
        assert!(matches!(err, ContainerError::NotRegistered(_)));
    }

    #[test]
    fn metadata_marks_class_entries() {
        let container = container();
        container.register_component(greeter_class().into_component(Scope::Prototype));

        let metadata = container.component_metadata().unwrap();
        assert_eq!(metadata.len(), 2);
        assert!(metadata[0].concrete_class.is_none());
        assert_eq!(metadata[1].key, ComponentKey::of::<Greeter>());
        assert_eq!(metadata[1].scope, Scope::Prototype);
        assert_eq!(metadata[1].concrete_class.as_ref().unwrap().name(), "Greeter");
    }

    #[tokio::test]
    async fn proxy_calls_member_bodies() {
        let container = container();
        container.register_component(
            greeter_class()
                .into_component(Scope::Singleton)
                .with_options(Map::from_iter([("lazy".to_string(), json!(true))])),
        );

        let proxy = container.proxy::<Greeter>().await.unwrap();
        let reply = proxy.call("greet", TaskArgs::positional([json!("bob")])).await.unwrap();
        assert_eq!(reply.into_value(), Some(json!("hello bob")));
        assert_eq!(
            container.component_options(ComponentKey::of::<Greeter>()).unwrap()["lazy"],
            json!(true)
        );
    }

    struct CountingHook {
        runs: AtomicUsize,
        fail: bool,
    }

    impl ConfigureHook for CountingHook {
        fn configure(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err("broken hook".into());
            }
            Ok(())
        }
    }

    #[test]
    fn configure_runs_hooks_once() {
        let container = InMemoryContainer::new();
        let hook = Arc::new(CountingHook {
            runs: AtomicUsize::new(0),
            fail: false,
        });
        container.add_configure_hook(hook.clone());

        container.configure().unwrap();
        container.configure().unwrap();
        assert_eq!(hook.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn configure_surfaces_hook_errors() {
        let container = InMemoryContainer::new();
        container.add_configure_hook(Arc::new(CountingHook {
            runs: AtomicUsize::new(0),
            fail: true,
        }));
        let err = container.configure().unwrap_err();
        assert_eq!(err, ContainerError::Configure("broken hook".to_string()));
    }
}

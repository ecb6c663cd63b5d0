//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! ```ignore
//! let app = AppBuilder::new(config)
//!     .celery(math_tasks_class())?
//!     .celery(math_client_class())?
//!     .expect_tasks(&["math.add"])
//!     .build()?;
//! ```
//!
//! # Fail-fast
//! - 設定の不足・未対応 URL は build() で失敗
//! - configure 中の二重登録は build() で失敗
//! - expect_tasks() の期待集合が登録済み集合に含まれなければ失敗

use std::sync::Arc;

use tracing::info;

use crate::celery::{CeleryApp, WorkerGroup};
use crate::client::{CeleryClientInterceptor, CeleryRegistrar};
use crate::component::{ClassDef, ComponentDef, ComponentProxy};
use crate::config::{CelerySettings, ConfigError, Configuration};
use crate::domain::errors::{ContainerError, DefinitionError};
use crate::factory::CeleryFactory;
use crate::impls::InMemoryContainer;
use crate::ports::Container;
use crate::registrar::PicoTaskRegistrar;

type Registration = Box<dyn FnOnce(&InMemoryContainer) + Send>;

pub struct AppBuilder {
    config: Configuration,
    components: Vec<Registration>,
    expected_tasks: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing tasks: {0:?}. These tasks were expected but not registered.")]
    MissingTaskTypes(Vec<String>),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Container(#[from] ContainerError),
}

impl AppBuilder {
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            components: Vec::new(),
            expected_tasks: None,
        }
    }

    /// Register an already prepared component.
    pub fn component<C: Send + Sync + 'static>(mut self, def: ComponentDef<C>) -> Self {
        self.components
            .push(Box::new(move |container: &InMemoryContainer| container.register_component(def)));
        self
    }

    /// Apply the client registrar to `class` (singleton scope) and register it.
    pub fn celery<C: Send + Sync + 'static>(self, class: ClassDef<C>) -> Result<Self, DefinitionError> {
        let def = CeleryRegistrar::new().decorate(class)?;
        Ok(self.component(def))
    }

    /// 期待される task 名のリストを設定
    pub fn expect_tasks(mut self, names: &[&str]) -> Self {
        self.expected_tasks = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        let settings = Arc::new(CelerySettings::from_config(&self.config)?);
        let celery_app = CeleryFactory::create_celery_app(&settings)?;

        let container = InMemoryContainer::new();
        container.register_instance(Arc::clone(&settings));
        container.register_instance(Arc::clone(&celery_app));
        container.register_instance(Arc::new(CeleryClientInterceptor::new(Arc::clone(&celery_app))));
        for register in self.components {
            register(&container);
        }

        let dyn_container: Arc<dyn Container> = container.clone();
        container.add_configure_hook(Arc::new(PicoTaskRegistrar::new(
            Arc::downgrade(&dyn_container),
            Arc::clone(&celery_app),
        )));
        container.configure()?;

        if let Some(expected) = &self.expected_tasks {
            let registered = celery_app.registered_tasks();
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !registered.contains(name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingTaskTypes(missing));
            }
        }

        info!(tasks = ?celery_app.registered_tasks(), "application ready");
        Ok(App {
            container,
            celery_app,
            settings,
        })
    }
}

pub struct App {
    container: Arc<InMemoryContainer>,
    celery_app: Arc<CeleryApp>,
    settings: Arc<CelerySettings>,
}

impl App {
    pub fn container(&self) -> &Arc<InMemoryContainer> {
        &self.container
    }

    pub fn celery_app(&self) -> &Arc<CeleryApp> {
        &self.celery_app
    }

    pub fn settings(&self) -> &CelerySettings {
        &self.settings
    }

    /// Component instance whose calls go through its interceptors.
    pub async fn proxy<C: Send + Sync + 'static>(&self) -> Result<ComponentProxy<C>, ContainerError> {
        self.container.proxy::<C>().await
    }

    /// Start `n` workers on `queues` (default queue when empty).
    pub fn worker(&self, n: usize, queues: Vec<String>) -> WorkerGroup {
        WorkerGroup::spawn(n, Arc::clone(&self.celery_app), queues)
    }
}

//! Application factory: one shared `CeleryApp` built from `CelerySettings`.

use std::sync::Arc;

use tracing::info;

use crate::celery::{AppConf, CeleryApp};
use crate::config::{CelerySettings, ConfigError};
use crate::impls::{InMemoryBackend, InMemoryBroker};
use crate::ports::{Broker, ResultBackend};

pub const APP_MAIN: &str = "taskbridge_tasks";

pub struct CeleryFactory;

impl CeleryFactory {
    pub fn create_celery_app(settings: &CelerySettings) -> Result<Arc<CeleryApp>, ConfigError> {
        let broker = broker_for(&settings.broker_url)?;
        let backend = backend_for(&settings.backend_url)?;

        let conf = AppConf {
            broker_url: Some(settings.broker_url.clone()),
            backend_url: Some(settings.backend_url.clone()),
            task_track_started: settings.task_track_started,
            ..AppConf::default()
        };
        info!(
            broker = %settings.broker_url,
            backend = %settings.backend_url,
            track_started = settings.task_track_started,
            "creating task-queue application"
        );

        Ok(Arc::new(
            CeleryApp::builder(APP_MAIN)
                .conf(conf)
                .broker(broker)
                .backend(backend)
                .build(),
        ))
    }
}

fn scheme(url: &str) -> &str {
    url.split_once("://").map_or(url, |(scheme, _)| scheme)
}

fn broker_for(url: &str) -> Result<Arc<dyn Broker>, ConfigError> {
    match scheme(url) {
        "memory" => Ok(Arc::new(InMemoryBroker::new())),
        _ => Err(ConfigError::UnsupportedBroker(url.to_string())),
    }
}

fn backend_for(url: &str) -> Result<Arc<dyn ResultBackend>, ConfigError> {
    match scheme(url) {
        "memory" | "rpc" => Ok(Arc::new(InMemoryBackend::new())),
        _ => Err(ConfigError::UnsupportedBackend(url.to_string())),
    }
}

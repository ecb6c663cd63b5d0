use thiserror::Error;

use crate::app::BuildError;
use crate::celery::{RegistryError, ResultError, SendError};
use crate::config::ConfigError;
use crate::domain::errors::{ContainerError, DefinitionError, TaskError};
use crate::intercept::InvokeError;
use crate::ports::{BackendError, BrokerError};

/// Any error this crate can return.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    AsyncResult(#[from] ResultError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, Error>;

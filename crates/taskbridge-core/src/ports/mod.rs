//! Ports - abstractions over the collaborators this crate plugs into.
//!
//! - `Container`: the DI container (resolution + component metadata registry)
//! - `Broker`: task message transport
//! - `ResultBackend`: task outcome storage
//!
//! In-memory implementations live in `impls`.

pub mod container;
pub mod broker;
pub mod backend;

pub use self::backend::{BackendError, ResultBackend, ResultRecord};
pub use self::broker::{Broker, BrokerError};
pub use self::container::{AnyArc, ComponentKey, ComponentMetadata, ConfigureHook, Container, Scope};

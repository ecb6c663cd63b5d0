//! App - startup wiring.
//!
//! `AppBuilder` binds settings, creates the shared `CeleryApp`, registers
//! components in the container and runs the configure phase (task
//! registration). The resulting `App` hands out client proxies and workers.

pub mod builder;

pub use self::builder::{App, AppBuilder, BuildError};

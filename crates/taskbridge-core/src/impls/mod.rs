//! Impls - in-memory implementations of the ports (開発用・テスト用)
//!
//! # 含まれる実装
//! - **InMemoryContainer**: DI container with a component registry and configure hooks
//! - **InMemoryBroker**: per-queue message transport (`memory://`)
//! - **InMemoryBackend**: result store with readiness notification (`memory://`, `rpc://`)

pub mod container;
pub mod broker;
pub mod backend;

pub use self::backend::InMemoryBackend;
pub use self::broker::InMemoryBroker;
pub use self::container::InMemoryContainer;

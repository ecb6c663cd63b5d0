//! Domain model (arguments, metadata, ids, states, messages, errors).

pub mod args;
pub mod meta;
pub mod ids;
pub mod state;
pub mod message;
pub mod errors;

pub use self::args::TaskArgs;
pub use self::errors::{ContainerError, DefinitionError, MethodResult, TaskError};
pub use self::ids::TaskId;
pub use self::message::TaskMessage;
pub use self::meta::{SenderMetadata, TaskMetadata, TaskOptions};
pub use self::state::TaskState;

//! Component - class tables and client proxies.
//!
//! Marked methods are not discovered by inspecting types at runtime. A class is
//! described once, explicitly, as a `ClassDef` listing its members and their
//! metadata; everything else (registration, discovery, interception) reads
//! that table.

pub mod member;
pub mod class;
pub mod proxy;

pub use self::class::{ClassDef, ComponentDef, Constructor, ErasedClass};
pub use self::member::{AsyncMethodFn, BlockingMethodFn, Member, MemberBody};
pub use self::proxy::ComponentProxy;

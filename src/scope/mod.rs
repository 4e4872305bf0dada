//! Scope resolution - where bound declarations live on the host side
//!
//! Namespaces map to modules, classes to class objects. Placement is
//! backend-neutral; only enum value hoisting depends on the backend.

pub mod graph;
pub mod hoist;
pub mod resolver;

pub use graph::{ModuleId, Scope, ScopeGraph, ScopeId, ScopeKind};
pub use hoist::{enum_exports, EnumExport};
pub use resolver::ScopeResolver;

//! # Chimera - dual-backend C++ binding generator
//!
//! From one description of a C++ API surface, Chimera generates two
//! independent sets of Python bindings: one for pybind11 and one for
//! Boost.Python.
//!
//! Chimera provides:
//! - A backend-neutral declaration model built from front-end JSON
//! - Ordered include/exclude/rename/suppress rules over declaration paths
//! - Scope, overload and virtual dispatch resolution
//! - A capability table per backend and a shared planning pass that
//!   compensates for each backend's gaps
//! - A manifest recording what was emitted, suppressed and worked around

pub mod path;
pub mod decl;
pub mod model;
pub mod config;
pub mod rules;
pub mod scope;
pub mod overload;
pub mod dispatch;
pub mod exceptions;
pub mod backend;
pub mod manifest;
pub mod generator;
pub mod ui;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-exports for convenient access
pub use path::DeclPath;
pub use decl::{TranslationUnitDecl, TypeRef};
pub use model::{Model, NodeId};
pub use config::Configuration;
pub use backend::Backend;
pub use manifest::Manifest;
pub use generator::{CancelFlag, Generator, UnitOutput};

/// Result type alias for Chimera operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Chimera operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Fatal for the unit: the input or configuration cannot be honored
    #[error("Configuration error at {path}: {kind}")]
    Config { path: DeclPath, kind: ConfigErrorKind },

    /// Fatal for the unit: an emitter hit a broken internal invariant
    #[error("{backend} emission failed at {path}: {message}")]
    Emission {
        backend: Backend,
        path: DeclPath,
        message: String,
    },

    /// Fatal for the unit: a declaration was placed into an impossible scope
    #[error("Scope error at {path}: {message}")]
    Scope { path: DeclPath, message: String },

    #[error("Invalid declaration path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Worker generating unit {0} panicked")]
    WorkerPanicked(String),
}

impl Error {
    pub fn config(path: &DeclPath, kind: ConfigErrorKind) -> Self {
        Error::Config {
            path: path.clone(),
            kind,
        }
    }

    pub fn emission(backend: Backend, path: &DeclPath, message: impl Into<String>) -> Self {
        Error::Emission {
            backend,
            path: path.clone(),
            message: message.into(),
        }
    }
}

/// What exactly is wrong with a configuration or its input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigErrorKind {
    #[error("base class {0} does not resolve to a known class")]
    UnresolvedBase(String),

    #[error("alias target {0} is not declared")]
    UnresolvedAliasTarget(String),

    #[error("template argument {0} is not declared")]
    UnresolvedTemplateArgument(String),

    #[error("template expects {expected} arguments, found {found}")]
    TemplateArity { expected: usize, found: usize },

    #[error("exposed name '{name}' is bound by both {first} and {second}")]
    ConflictingRename {
        name: String,
        first: String,
        second: String,
    },

    #[error("suppress_param index {index} is out of range for {arity} parameters")]
    SuppressParamOutOfRange { index: usize, arity: usize },

    #[error("invalid rule pattern '{0}'")]
    InvalidPattern(String),

    #[error("{0}")]
    Invalid(String),
}

//! Generation manifest
//!
//! One manifest per unit, one section per backend. It records what each
//! backend emitted (with accepted arities), what was suppressed and why,
//! every capability gap, how static/instance collisions were resolved,
//! where enum values ended up and which exceptions are translated.

use crate::backend::{Backend, Feature};
use crate::config::{Configuration, Version};
use crate::decl::TranslationUnitDecl;
use crate::exceptions::{ExceptionCategory, HostException};
use crate::overload::{AccessPath, Ambiguity};
use crate::scope::EnumExport;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What kind of attribute an emitted name is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmittedKind {
    Module,
    Class,
    Constructor,
    Method,
    StaticMethod,
    /// Static function reachable through instances only
    StaticThunk,
    Operator,
    Field,
    StaticField,
    Enum,
    Function,
    Variable,
    Alias,
}

/// An attribute present on the host side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emitted {
    /// Dotted host path, e.g. `chimera_test.Integer.add`
    pub name: String,
    pub kind: EmittedKind,
    /// Accepted argument counts, for callables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arities: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<AccessPath>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suppressed {
    /// C++ declaration path
    pub path: String,
    pub reason: String,
}

/// Something the backend could not express
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub feature: Feature,
    pub path: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguityRecord {
    /// Dotted path of the class owning the colliding name
    pub class: String,
    #[serde(flatten)]
    pub ambiguity: Ambiguity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRecord {
    pub category: ExceptionCategory,
    pub host: HostException,
}

/// Everything one backend did for one unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendManifest {
    /// Generated source file name
    pub artifact: String,
    pub version: Version,
    #[serde(default)]
    pub emitted: Vec<Emitted>,
    #[serde(default)]
    pub suppressed: Vec<Suppressed>,
    #[serde(default)]
    pub gaps: Vec<Gap>,
    #[serde(default)]
    pub ambiguities: Vec<AmbiguityRecord>,
    #[serde(default)]
    pub enum_exports: Vec<EnumExport>,
    #[serde(default)]
    pub exceptions: Vec<ExceptionRecord>,
}

impl BackendManifest {
    pub fn new(artifact: impl Into<String>, version: Version) -> Self {
        Self {
            artifact: artifact.into(),
            version,
            emitted: Vec::new(),
            suppressed: Vec::new(),
            gaps: Vec::new(),
            ambiguities: Vec::new(),
            enum_exports: Vec::new(),
            exceptions: Vec::new(),
        }
    }

    pub fn emitted(&self, name: &str) -> Option<&Emitted> {
        self.emitted.iter().find(|e| e.name == name)
    }

    /// Whether `name` is reachable as an attribute, including exported enum values
    pub fn has_attribute(&self, name: &str) -> bool {
        self.emitted(name).is_some()
            || self
                .enum_exports
                .iter()
                .any(|export| export.reachable.iter().any(|r| r == name))
    }

    pub fn is_suppressed(&self, path: &str) -> bool {
        self.suppressed.iter().any(|s| s.path == path)
    }

    pub fn gaps_for(&self, feature: Feature) -> impl Iterator<Item = &Gap> {
        self.gaps.iter().filter(move |gap| gap.feature == feature)
    }
}

/// Manifest of one unit across both backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub unit: String,
    pub module: String,
    /// blake3 of the unit input and configuration
    pub input_hash: String,
    pub backends: BTreeMap<Backend, BackendManifest>,
}

impl Manifest {
    pub fn new(unit: impl Into<String>, module: impl Into<String>, input_hash: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            module: module.into(),
            input_hash: input_hash.into(),
            backends: BTreeMap::new(),
        }
    }

    /// Manifest file name for a module
    pub fn file_name(module: &str) -> String {
        format!("{}.manifest.json", module)
    }

    pub fn insert(&mut self, backend: Backend, manifest: BackendManifest) {
        self.backends.insert(backend, manifest);
    }

    pub fn backend(&self, backend: Backend) -> Option<&BackendManifest> {
        self.backends.get(&backend)
    }

    pub fn has_attribute(&self, backend: Backend, name: &str) -> bool {
        self.backend(backend)
            .map(|m| m.has_attribute(name))
            .unwrap_or(false)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }
}

/// Hash over everything that determines the generated output
pub fn input_hash(unit: &TranslationUnitDecl, config: &Configuration) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(env!("CARGO_PKG_VERSION").as_bytes());
    hasher.update(b"\n");
    hasher.update(serde_json::to_string(unit)?.as_bytes());
    hasher.update(b"\n");
    hasher.update(toml::to_string(config)?.as_bytes());
    Ok(hasher.finalize().to_hex().to_string())
}

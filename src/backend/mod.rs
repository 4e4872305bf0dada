//! Backend Emitters
//!
//! Each backend is a [`Dialect`]: a pure function from the model and a
//! [`BackendPlan`] to C++ source text. The plan is produced once per
//! backend by the shared planner, which consults the backend's
//! [`CapabilityTable`] for every decision.

pub mod boost_python;
pub mod capability;
pub mod plan;
pub mod pybind11;
pub mod writer;

pub use capability::{CapabilityTable, Feature, Support};
pub use plan::{BackendPlan, Planner};

use crate::model::Model;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binding framework targeted by an emitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Pybind11,
    BoostPython,
}

impl Backend {
    pub const ALL: [Backend; 2] = [Backend::Pybind11, Backend::BoostPython];

    /// Identifier used in file names and configuration keys
    pub fn id(self) -> &'static str {
        match self {
            Backend::Pybind11 => "pybind11",
            Backend::BoostPython => "boost_python",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Backend::Pybind11 => "pybind11",
            Backend::BoostPython => "Boost.Python",
        }
    }

    /// Generated source file for a module
    pub fn artifact_name(self, module: &str) -> String {
        format!("{}_{}.cpp", module, self.id())
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Renders a backend plan as source text
pub trait Dialect: Send + Sync {
    fn backend(&self) -> Backend;

    /// Emit the complete translation unit for `plan`
    fn emit(&self, model: &Model, plan: &BackendPlan) -> Result<String>;
}

/// Dialect for a backend
pub fn dialect(backend: Backend) -> Box<dyn Dialect> {
    match backend {
        Backend::Pybind11 => Box::new(pybind11::Pybind11Dialect),
        Backend::BoostPython => Box::new(boost_python::BoostPythonDialect),
    }
}

//! Capability table
//!
//! What each backend can express, as data. The planning pass consults the
//! table instead of branching on the backend, so both dialects stay
//! structurally parallel.

use super::Backend;
use crate::config::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A backend feature the planner may need
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    WritableStaticField,
    /// Pointer to void or a fundamental type, or pointer to pointer
    RawPointerParameter,
    /// Smart-pointer holder used without being declared on the class
    ImplicitHolder,
    /// `std::map`/`std::set` family in a signature or template argument
    AssociativeContainer,
    FreeOperator,
    ScopedEnum,
    /// Exporting enum values into an enclosing class
    ClassScopeEnumExport,
    /// Static and instance overloads sharing one exposed name
    StaticInstanceOverload,
    VirtualTrampoline,
    /// Translating a native exception category
    ExceptionTranslation,
    /// Configured return policy on a callable
    ReturnPolicyOverride,
    /// Copying the object behind a returned pointer
    PointerCopyPolicy,
}

impl Feature {
    pub fn as_str(self) -> &'static str {
        match self {
            Feature::WritableStaticField => "writable_static_field",
            Feature::RawPointerParameter => "raw_pointer_parameter",
            Feature::ImplicitHolder => "implicit_holder",
            Feature::AssociativeContainer => "associative_container",
            Feature::FreeOperator => "free_operator",
            Feature::ScopedEnum => "scoped_enum",
            Feature::ClassScopeEnumExport => "class_scope_enum_export",
            Feature::StaticInstanceOverload => "static_instance_overload",
            Feature::VirtualTrampoline => "virtual_trampoline",
            Feature::ExceptionTranslation => "exception_translation",
            Feature::ReturnPolicyOverride => "return_policy_override",
            Feature::PointerCopyPolicy => "pointer_copy_policy",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a backend supports something
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    Yes,
    No,
    /// Supported from this release on
    Since(Version),
}

impl Support {
    /// Evaluate against the configured backend version
    pub fn holds(self, version: Version) -> bool {
        match self {
            Support::Yes => true,
            Support::No => false,
            Support::Since(floor) => version >= floor,
        }
    }
}

/// Capabilities of one backend at one version
#[derive(Debug, Clone, Copy)]
pub struct CapabilityTable {
    backend: Backend,
    version: Version,
}

impl CapabilityTable {
    pub fn new(backend: Backend, version: Version) -> Self {
        Self { backend, version }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Raw table entry
    pub fn support(&self, feature: Feature) -> Support {
        use Feature::*;
        match (self.backend, feature) {
            (_, FreeOperator | StaticInstanceOverload) => Support::No,
            (_, VirtualTrampoline | ExceptionTranslation | ReturnPolicyOverride) => Support::Yes,
            (Backend::Pybind11, AssociativeContainer) => Support::Since(Version::new(2, 2, 0)),
            (Backend::BoostPython, AssociativeContainer) => Support::Since(Version::new(1, 72, 0)),
            (Backend::Pybind11, _) => Support::Yes,
            (
                Backend::BoostPython,
                WritableStaticField
                | RawPointerParameter
                | ImplicitHolder
                | ScopedEnum
                | ClassScopeEnumExport
                | PointerCopyPolicy,
            ) => Support::No,
        }
    }

    pub fn supports(&self, feature: Feature) -> bool {
        self.support(feature).holds(self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pybind11() -> CapabilityTable {
        CapabilityTable::new(Backend::Pybind11, Version::new(2, 10, 0))
    }

    fn boost() -> CapabilityTable {
        CapabilityTable::new(Backend::BoostPython, Version::new(1, 74, 0))
    }

    #[test]
    fn test_table_matches_backend_limits() {
        assert!(pybind11().supports(Feature::WritableStaticField));
        assert!(!boost().supports(Feature::WritableStaticField));
        assert!(pybind11().supports(Feature::RawPointerParameter));
        assert!(!boost().supports(Feature::RawPointerParameter));
        assert!(pybind11().supports(Feature::ClassScopeEnumExport));
        assert!(!boost().supports(Feature::ClassScopeEnumExport));
        for table in [pybind11(), boost()] {
            assert!(!table.supports(Feature::FreeOperator));
            assert!(!table.supports(Feature::StaticInstanceOverload));
            assert!(table.supports(Feature::VirtualTrampoline));
            assert!(table.supports(Feature::ReturnPolicyOverride));
        }
        assert!(pybind11().supports(Feature::PointerCopyPolicy));
        assert!(!boost().supports(Feature::PointerCopyPolicy));
    }

    #[test]
    fn test_associative_container_version_floor() {
        let old = CapabilityTable::new(Backend::BoostPython, Version::new(1, 71, 0));
        assert!(!old.supports(Feature::AssociativeContainer));
        assert!(boost().supports(Feature::AssociativeContainer));

        let old = CapabilityTable::new(Backend::Pybind11, Version::new(2, 1, 1));
        assert!(!old.supports(Feature::AssociativeContainer));
        assert_eq!(
            pybind11().support(Feature::AssociativeContainer),
            Support::Since(Version::new(2, 2, 0))
        );
    }
}

//! Exception Translation Table
//!
//! Maps native exception categories to host (Python) exception kinds per
//! backend. Entries may carry a version floor, evaluated with the same
//! predicate as the capability table.

use crate::backend::Backend;
use crate::backend::capability::Support;
use crate::config::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Native exception categories, in catch order (most specific first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionCategory {
    BadAlloc,
    OutOfRange,
    InvalidArgument,
    DomainError,
    LengthError,
    RangeError,
    Overflow,
    Runtime,
    /// Plain `std::exception`
    Generic,
}

impl ExceptionCategory {
    pub const ALL: [ExceptionCategory; 9] = [
        ExceptionCategory::BadAlloc,
        ExceptionCategory::OutOfRange,
        ExceptionCategory::InvalidArgument,
        ExceptionCategory::DomainError,
        ExceptionCategory::LengthError,
        ExceptionCategory::RangeError,
        ExceptionCategory::Overflow,
        ExceptionCategory::Runtime,
        ExceptionCategory::Generic,
    ];

    /// C++ type caught for this category
    pub fn cpp_type(self) -> &'static str {
        match self {
            ExceptionCategory::BadAlloc => "std::bad_alloc",
            ExceptionCategory::OutOfRange => "std::out_of_range",
            ExceptionCategory::InvalidArgument => "std::invalid_argument",
            ExceptionCategory::DomainError => "std::domain_error",
            ExceptionCategory::LengthError => "std::length_error",
            ExceptionCategory::RangeError => "std::range_error",
            ExceptionCategory::Overflow => "std::overflow_error",
            ExceptionCategory::Runtime => "std::runtime_error",
            ExceptionCategory::Generic => "std::exception",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExceptionCategory::BadAlloc => "bad_alloc",
            ExceptionCategory::OutOfRange => "out_of_range",
            ExceptionCategory::InvalidArgument => "invalid_argument",
            ExceptionCategory::DomainError => "domain_error",
            ExceptionCategory::LengthError => "length_error",
            ExceptionCategory::RangeError => "range_error",
            ExceptionCategory::Overflow => "overflow",
            ExceptionCategory::Runtime => "runtime",
            ExceptionCategory::Generic => "generic",
        }
    }
}

impl fmt::Display for ExceptionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Python exception kinds the backends raise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HostException {
    RuntimeError,
    MemoryError,
    ValueError,
    IndexError,
    OverflowError,
}

impl HostException {
    pub fn name(self) -> &'static str {
        match self {
            HostException::RuntimeError => "RuntimeError",
            HostException::MemoryError => "MemoryError",
            HostException::ValueError => "ValueError",
            HostException::IndexError => "IndexError",
            HostException::OverflowError => "OverflowError",
        }
    }

    /// CPython exception object
    pub fn py_object(self) -> &'static str {
        match self {
            HostException::RuntimeError => "PyExc_RuntimeError",
            HostException::MemoryError => "PyExc_MemoryError",
            HostException::ValueError => "PyExc_ValueError",
            HostException::IndexError => "PyExc_IndexError",
            HostException::OverflowError => "PyExc_OverflowError",
        }
    }
}

impl fmt::Display for HostException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    category: ExceptionCategory,
    host: HostException,
    support: Support,
}

const fn entry(category: ExceptionCategory, host: HostException, support: Support) -> Entry {
    Entry {
        category,
        host,
        support,
    }
}

const PYBIND11: &[Entry] = &[
    entry(ExceptionCategory::BadAlloc, HostException::MemoryError, Support::Yes),
    entry(ExceptionCategory::OutOfRange, HostException::IndexError, Support::Yes),
    entry(ExceptionCategory::InvalidArgument, HostException::ValueError, Support::Yes),
    entry(ExceptionCategory::DomainError, HostException::ValueError, Support::Yes),
    entry(ExceptionCategory::LengthError, HostException::ValueError, Support::Yes),
    entry(ExceptionCategory::RangeError, HostException::ValueError, Support::Yes),
    entry(
        ExceptionCategory::Overflow,
        HostException::OverflowError,
        Support::Since(Version::new(2, 5, 0)),
    ),
    entry(ExceptionCategory::Runtime, HostException::RuntimeError, Support::Yes),
    entry(ExceptionCategory::Generic, HostException::RuntimeError, Support::Yes),
];

const BOOST_PYTHON: &[Entry] = &[
    entry(ExceptionCategory::BadAlloc, HostException::MemoryError, Support::Yes),
    entry(ExceptionCategory::OutOfRange, HostException::IndexError, Support::Yes),
    entry(ExceptionCategory::InvalidArgument, HostException::ValueError, Support::Yes),
    entry(ExceptionCategory::Overflow, HostException::OverflowError, Support::Yes),
    entry(ExceptionCategory::Runtime, HostException::RuntimeError, Support::Yes),
    entry(ExceptionCategory::Generic, HostException::RuntimeError, Support::Yes),
];

/// Exception mapping of one backend at one version
#[derive(Debug, Clone, Copy)]
pub struct ExceptionTable {
    backend: Backend,
    version: Version,
}

impl ExceptionTable {
    pub fn new(backend: Backend, version: Version) -> Self {
        Self { backend, version }
    }

    fn entries(&self) -> &'static [Entry] {
        match self.backend {
            Backend::Pybind11 => PYBIND11,
            Backend::BoostPython => BOOST_PYTHON,
        }
    }

    /// Host exception for a category; `None` means it is not translated
    pub fn translate(&self, category: ExceptionCategory) -> Option<HostException> {
        self.entries()
            .iter()
            .find(|e| e.category == category && e.support.holds(self.version))
            .map(|e| e.host)
    }
}

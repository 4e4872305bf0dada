//! Generator configuration (`chimera.toml`)
//!
//! The configuration is an explicit object handed to every phase; nothing
//! reads it from global state.
//!
//! ```toml
//! [module]
//! name = "chimera_test"
//! namespaces = ["chimera_test"]
//! hidden = ["detail"]
//!
//! [backends.pybind11]
//! version = "2.10.0"
//!
//! [backends.boost_python]
//! version = "1.74.0"
//!
//! [[rules]]
//! pattern = "chimera_test::Integer::add"
//! action = { rename = "plus" }
//!
//! [[rules]]
//! pattern = "chimera_test::Widget"
//! action = { copyable = false }
//! ```

use crate::backend::Backend;
use crate::decl::SmartPointerKind;
use crate::path::DeclPath;
use crate::{ConfigErrorKind, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub module: ModuleConfig,
    #[serde(default)]
    pub backends: BackendsConfig,
    /// Ordered rules; later matches override earlier ones
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Name of the root host module
    pub name: String,
    /// Namespaces whose contents are bound; they map to the root module
    pub namespaces: Vec<DeclPath>,
    /// Namespace names never exposed as submodules
    #[serde(default = "default_hidden")]
    pub hidden: Vec<String>,
    /// Directory receiving generated files
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

/// Implementation namespace that is never exposed
pub const DETAIL_NAMESPACE: &str = "detail";

fn default_hidden() -> Vec<String> {
    vec![DETAIL_NAMESPACE.to_string()]
}

fn default_output() -> PathBuf {
    PathBuf::from("bindings")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendsConfig {
    #[serde(default = "BackendConfig::pybind11")]
    pub pybind11: BackendConfig,
    #[serde(default = "BackendConfig::boost_python")]
    pub boost_python: BackendConfig,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            pybind11: BackendConfig::pybind11(),
            boost_python: BackendConfig::boost_python(),
        }
    }
}

impl BackendsConfig {
    /// Configured target release of a backend
    pub fn version(&self, backend: Backend) -> Version {
        match backend {
            Backend::Pybind11 => self.pybind11.version,
            Backend::BoostPython => self.boost_python.version,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend release the generated code targets
    pub version: Version,
}

impl BackendConfig {
    fn pybind11() -> Self {
        Self {
            version: Version::new(2, 10, 0),
        }
    }

    fn boost_python() -> Self {
        Self {
            version: Version::new(1, 74, 0),
        }
    }
}

/// A single matching rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Glob over `::`-separated declaration paths
    pub pattern: String,
    pub action: RuleAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Include,
    Exclude,
    Rename(String),
    /// Zero-based parameter index
    SuppressParam(usize),
    Holder(SmartPointerKind),
    /// Return value policy of a function or method
    ReturnPolicy(ReturnPolicy),
    /// Overrides whether a class can be copied
    Copyable(bool),
}

/// Who owns what a callable returns by reference or pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnPolicy {
    /// Copy the referent into a new host object
    Copy,
    /// Refer to the result without owning it
    Reference,
    /// Refer to the result and keep the receiver alive
    ReferenceInternal,
    /// The host takes ownership of a returned pointer
    TakeOwnership,
}

impl Configuration {
    /// Configuration binding the given namespaces into module `name`
    pub fn new(name: impl Into<String>, namespaces: Vec<DeclPath>) -> Self {
        Self {
            module: ModuleConfig {
                name: name.into(),
                namespaces,
                hidden: default_hidden(),
                output: default_output(),
            },
            backends: BackendsConfig::default(),
            rules: Vec::new(),
        }
    }

    /// Append a rule after validating its pattern
    pub fn apply_rule(&mut self, pattern: impl Into<String>, action: RuleAction) -> Result<()> {
        let pattern = pattern.into();
        glob::Pattern::new(&pattern).map_err(|_| {
            Error::config(
                &DeclPath::root(),
                ConfigErrorKind::InvalidPattern(pattern.clone()),
            )
        })?;
        self.rules.push(Rule { pattern, action });
        Ok(())
    }

    /// Builder-style variant of [`apply_rule`](Self::apply_rule)
    pub fn with_rule(mut self, pattern: &str, action: RuleAction) -> Result<Self> {
        self.apply_rule(pattern, action)?;
        Ok(self)
    }

    /// `detail` is hidden whatever the configured list says
    pub fn is_hidden(&self, name: &str) -> bool {
        name == DETAIL_NAMESPACE || self.module.hidden.iter().any(|h| h == name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.module.name.is_empty() {
            return Err(Error::config(
                &DeclPath::root(),
                ConfigErrorKind::Invalid("module name is empty".to_string()),
            ));
        }
        if self.module.namespaces.is_empty() {
            return Err(Error::config(
                &DeclPath::root(),
                ConfigErrorKind::Invalid("no input namespaces configured".to_string()),
            ));
        }
        for rule in &self.rules {
            glob::Pattern::new(&rule.pattern).map_err(|_| {
                Error::config(
                    &DeclPath::root(),
                    ConfigErrorKind::InvalidPattern(rule.pattern.clone()),
                )
            })?;
        }
        Ok(())
    }
}

/// `major.minor.patch` release number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = Error;

    /// Missing components default to zero: `2.5` is `2.5.0`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            Error::config(
                &DeclPath::root(),
                ConfigErrorKind::Invalid(format!("invalid version '{}'", s)),
            )
        };
        let mut parts = s.trim().split('.');
        let mut next = |required: bool| -> Result<u32> {
            match parts.next() {
                Some(part) => part.parse().map_err(|_| invalid()),
                None if required => Err(invalid()),
                None => Ok(0),
            }
        };
        let version = Version::new(next(true)?, next(false)?, next(false)?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("chimera.toml")
}

pub fn load_config(path: Option<&Path>) -> Result<Option<Configuration>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: Configuration = toml::from_str(&contents)?;
    config.validate()?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &Configuration, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::config(
            &DeclPath::root(),
            ConfigErrorKind::Invalid(format!(
                "config already exists at {} (use --force to overwrite)",
                path.display()
            )),
        ));
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[module]
name = "chimera_test"
namespaces = ["chimera_test"]

[backends.pybind11]
version = "2.4"

[[rules]]
pattern = "chimera_test::detail::*"
action = "exclude"

[[rules]]
pattern = "chimera_test::Integer::add"
action = { rename = "plus" }

[[rules]]
pattern = "chimera_test::Logger::log"
action = { suppress_param = 1 }

[[rules]]
pattern = "chimera_test::Widget"
action = { holder = "shared" }

[[rules]]
pattern = "chimera_test::Buffer::data"
action = { return_policy = "reference_internal" }

[[rules]]
pattern = "chimera_test::Widget"
action = { copyable = false }
"#;

    #[test]
    fn test_parse_config() {
        let config: Configuration = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.module.name, "chimera_test");
        assert_eq!(config.module.hidden, vec!["detail".to_string()]);
        assert_eq!(config.backends.pybind11.version, Version::new(2, 4, 0));
        assert_eq!(config.backends.boost_python.version, Version::new(1, 74, 0));
        assert_eq!(config.rules.len(), 6);
        assert_eq!(config.rules[0].action, RuleAction::Exclude);
        assert_eq!(config.rules[1].action, RuleAction::Rename("plus".into()));
        assert_eq!(config.rules[2].action, RuleAction::SuppressParam(1));
        assert_eq!(config.rules[3].action, RuleAction::Holder(SmartPointerKind::Shared));
        assert_eq!(
            config.rules[4].action,
            RuleAction::ReturnPolicy(ReturnPolicy::ReferenceInternal)
        );
        assert_eq!(config.rules[5].action, RuleAction::Copyable(false));
    }

    #[test]
    fn test_version_ordering() {
        let v: Version = "2.5.0".parse().unwrap();
        assert!(v >= Version::new(2, 5, 0));
        assert!(Version::new(2, 4, 9) < v);
        assert!("2.x".parse::<Version>().is_err());
        assert!("1.2.3.4".parse::<Version>().is_err());
    }

    #[test]
    fn test_apply_rule_rejects_bad_glob() {
        let mut config = Configuration::new("m", vec![DeclPath::parse("ns").unwrap()]);
        assert!(config.apply_rule("ns::[", RuleAction::Exclude).is_err());
        assert!(config.apply_rule("ns::*", RuleAction::Exclude).is_ok());
        assert_eq!(config.rules.len(), 1);
    }

    #[test]
    fn test_write_and_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chimera.toml");
        let config = Configuration::new("demo", vec![DeclPath::parse("demo").unwrap()])
            .with_rule("demo::*Impl", RuleAction::Exclude)
            .unwrap();

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.module.name, "demo");
        assert_eq!(loaded.rules, config.rules);
        assert!(load_config(Some(&dir.path().join("missing.toml"))).unwrap().is_none());
    }
}

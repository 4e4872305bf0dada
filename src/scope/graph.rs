//! Scope Graph data structure for host-side placement
//!
//! The scope graph tracks:
//! - Module scopes (the root module and one submodule per visible namespace)
//! - Class scopes (one per bound class, nested classes inside their outer class)
//! - Which scope every bound declaration is registered in
//!
//! Scopes are a tagged variant. Module scopes carry a [`ModuleId`] and can
//! only be created from namespace nodes; classes always get class scopes.

use crate::model::{Model, NodeId, NodeKind};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl ScopeId {
    /// The root module scope
    pub fn root() -> Self {
        Self(0)
    }
}

/// Identifier of a module scope; only module scopes have one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

/// The kind of scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Module,
    Class,
}

#[derive(Debug, Clone)]
pub enum Scope {
    Module {
        module: ModuleId,
        name: String,
        parent: Option<ScopeId>,
        /// Namespace the module was created from; `None` for the root
        namespace: Option<NodeId>,
    },
    Class {
        class: NodeId,
        name: String,
        parent: ScopeId,
    },
}

impl Scope {
    pub fn name(&self) -> &str {
        match self {
            Scope::Module { name, .. } | Scope::Class { name, .. } => name,
        }
    }

    pub fn parent(&self) -> Option<ScopeId> {
        match self {
            Scope::Module { parent, .. } => *parent,
            Scope::Class { parent, .. } => Some(*parent),
        }
    }

    pub fn kind(&self) -> ScopeKind {
        match self {
            Scope::Module { .. } => ScopeKind::Module,
            Scope::Class { .. } => ScopeKind::Class,
        }
    }

    pub fn module_id(&self) -> Option<ModuleId> {
        match self {
            Scope::Module { module, .. } => Some(*module),
            Scope::Class { .. } => None,
        }
    }

    pub fn class(&self) -> Option<NodeId> {
        match self {
            Scope::Class { class, .. } => Some(*class),
            Scope::Module { .. } => None,
        }
    }
}

/// Scope graph of one unit
#[derive(Debug, Clone)]
pub struct ScopeGraph {
    scopes: Vec<Scope>,
    /// Declaration → scope it is registered in
    placements: HashMap<NodeId, ScopeId>,
    /// Namespace or class node → scope it introduces
    introduced: HashMap<NodeId, ScopeId>,
    next_module: u32,
}

impl ScopeGraph {
    /// Create a new scope graph with a root module scope
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            scopes: vec![Scope::Module {
                module: ModuleId(0),
                name: root_name.into(),
                parent: None,
                namespace: None,
            }],
            placements: HashMap::new(),
            introduced: HashMap::new(),
            next_module: 1,
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId::root()
    }

    fn push(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(scope);
        id
    }

    /// Map an input namespace onto an existing scope (the root module)
    pub fn alias_namespace(&mut self, namespace: NodeId, scope: ScopeId) {
        self.introduced.insert(namespace, scope);
    }

    /// Create a submodule for a namespace node
    pub fn add_module(&mut self, parent: ScopeId, model: &Model, namespace: NodeId) -> Result<ScopeId> {
        let node = model.node(namespace);
        if !node.is_namespace() {
            return Err(Error::Scope {
                path: node.path.clone(),
                message: format!("a {} cannot become a module", node.kind.label()),
            });
        }
        if self.scope(parent).kind() != ScopeKind::Module {
            return Err(Error::Scope {
                path: node.path.clone(),
                message: "a module cannot be nested in a class".to_string(),
            });
        }

        let module = ModuleId(self.next_module);
        self.next_module += 1;
        let id = self.push(Scope::Module {
            module,
            name: node.exposed_name.clone(),
            parent: Some(parent),
            namespace: Some(namespace),
        });
        self.introduced.insert(namespace, id);
        self.placements.insert(namespace, parent);
        Ok(id)
    }

    /// Create a class scope for a class node placed in `parent`
    pub fn add_class(&mut self, parent: ScopeId, model: &Model, class: NodeId) -> Result<ScopeId> {
        let node = model.node(class);
        if !matches!(node.kind, NodeKind::Class(_)) {
            return Err(Error::Scope {
                path: node.path.clone(),
                message: format!("a {} cannot become a class scope", node.kind.label()),
            });
        }

        let id = self.push(Scope::Class {
            class,
            name: node.exposed_name.clone(),
            parent,
        });
        self.introduced.insert(class, id);
        self.placements.insert(class, parent);
        Ok(id)
    }

    /// Register a declaration in a scope
    pub fn place(&mut self, node: NodeId, scope: ScopeId) {
        self.placements.insert(node, scope);
    }

    /// Scope a declaration is registered in
    pub fn placement(&self, node: NodeId) -> Option<ScopeId> {
        self.placements.get(&node).copied()
    }

    /// Scope a namespace or class introduces
    pub fn introduced_by(&self, node: NodeId) -> Option<ScopeId> {
        self.introduced.get(&node).copied()
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// All scopes in creation order (parents first)
    pub fn scopes(&self) -> impl Iterator<Item = (ScopeId, &Scope)> {
        self.scopes
            .iter()
            .enumerate()
            .map(|(i, scope)| (ScopeId(i as u32), scope))
    }

    /// Module scopes in creation order
    pub fn modules(&self) -> Vec<ScopeId> {
        self.scopes()
            .filter(|(_, scope)| scope.kind() == ScopeKind::Module)
            .map(|(id, _)| id)
            .collect()
    }

    /// Nearest enclosing module scope (the scope itself for modules)
    pub fn module_of(&self, scope: ScopeId) -> ScopeId {
        let mut current = scope;
        while self.scope(current).kind() != ScopeKind::Module {
            match self.scope(current).parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    /// Get scope chain from a scope up to root
    pub fn scope_chain(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut chain = vec![scope];
        let mut current = scope;
        while let Some(parent) = self.scope(current).parent() {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Host-side dotted name, e.g. `chimera_test.MainClass.NestedClass`
    pub fn dotted_path(&self, scope: ScopeId) -> String {
        let mut names: Vec<&str> = self
            .scope_chain(scope)
            .into_iter()
            .map(|id| self.scope(id).name())
            .collect();
        names.reverse();
        names.join(".")
    }

    /// Dotted name of an attribute inside a scope
    pub fn attribute_path(&self, scope: ScopeId, name: &str) -> String {
        format!("{}.{}", self.dotted_path(scope), name)
    }

    /// Dotted name of a scope relative to its module, e.g. `Outer.Inner`
    pub fn relative_path(&self, scope: ScopeId) -> String {
        let module = self.module_of(scope);
        let mut names = Vec::new();
        let mut current = scope;
        while current != module {
            names.push(self.scope(current).name());
            match self.scope(current).parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        names.reverse();
        names.join(".")
    }
}

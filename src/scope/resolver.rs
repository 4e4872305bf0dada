//! Scope Resolver - places bound declarations into host scopes
//!
//! Placement algorithm:
//! 1. Every configured input namespace maps to the root module
//! 2. A visible nested namespace becomes a submodule
//! 3. A hidden or excluded namespace adds no scope; anything inside it that
//!    is still bound lands in the nearest visible module
//! 4. A class becomes a class scope; nested declarations go inside it
//! 5. Functions, enums, variables and aliases are registered in the
//!    current scope

use super::graph::{ScopeGraph, ScopeId};
use crate::config::Configuration;
use crate::model::{Model, NodeId, NodeKind, Status};
use crate::Result;
use tracing::debug;

/// Scope resolver over a configured model
pub struct ScopeResolver<'a> {
    model: &'a Model,
    config: &'a Configuration,
}

impl<'a> ScopeResolver<'a> {
    /// Create a new resolver
    pub fn new(model: &'a Model, config: &'a Configuration) -> Self {
        Self { model, config }
    }

    /// Build the scope graph for the whole unit
    pub fn resolve(&self) -> Result<ScopeGraph> {
        let mut graph = ScopeGraph::new(self.config.module.name.clone());
        let root = graph.root();

        for namespace in &self.config.module.namespaces {
            for id in self.model.lookup(namespace).iter().copied() {
                if !self.model.node(id).is_namespace() {
                    continue;
                }
                graph.alias_namespace(id, root);
                self.walk(&mut graph, id, root)?;
            }
        }

        debug!(
            "Resolved {} scopes ({} modules) for {}",
            graph.len(),
            graph.modules().len(),
            self.model.unit_name()
        );
        Ok(graph)
    }

    fn is_input(&self, id: NodeId) -> bool {
        let path = &self.model.node(id).path;
        self.config.module.namespaces.iter().any(|ns| ns == path)
    }

    fn walk(&self, graph: &mut ScopeGraph, parent: NodeId, scope: ScopeId) -> Result<()> {
        for &child in self.model.children(parent) {
            let node = self.model.node(child);
            match &node.kind {
                NodeKind::Namespace => {
                    // Nested input namespaces are mapped to the root on their own
                    if self.is_input(child) {
                        continue;
                    }
                    match node.status {
                        Status::Included => {
                            let module = graph.add_module(scope, self.model, child)?;
                            self.walk(graph, child, module)?;
                        }
                        Status::Hidden | Status::Excluded(_) => self.walk(graph, child, scope)?,
                        Status::Outside => {}
                    }
                }
                NodeKind::Class(_) => {
                    if !node.status.is_included() || node.exposed_name.is_empty() {
                        continue;
                    }
                    let class_scope = graph.add_class(scope, self.model, child)?;
                    self.walk(graph, child, class_scope)?;
                }
                NodeKind::Function(_) => {
                    // Unnamed template instances have no host attribute
                    if node.status.is_included() && !node.exposed_name.is_empty() {
                        graph.place(child, scope);
                    }
                }
                NodeKind::Enum(_) | NodeKind::Variable(_) | NodeKind::Alias(_) => {
                    if node.status.is_included() {
                        graph.place(child, scope);
                    }
                }
                NodeKind::Template(_) | NodeKind::Root => {}
            }
        }
        Ok(())
    }
}

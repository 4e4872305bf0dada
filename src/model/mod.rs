//! Declaration Model - backend-neutral tree of C++ declarations
//!
//! The model is a single-owner arena rooted at the translation unit.
//! Every reference between nodes (parents, bases, template instances) is
//! a [`NodeId`] into the arena or a [`DeclPath`] looked up through the
//! path index, so nodes never own each other.

mod builder;
mod node;

pub use node::{
    AliasNode, BaseLink, ClassNode, Constructor, EnumNode, EnumValue, Field, FunctionNode,
    Method, Node, NodeId, NodeKind, Param, Status, TemplateNode, VariableNode,
};

use crate::decl::{TranslationUnitDecl, TypeRef};
use crate::path::DeclPath;
use crate::Result;
use std::collections::HashMap;

/// Aliases deeper than this are treated as unresolvable
const MAX_ALIAS_DEPTH: usize = 32;

/// In-memory declaration tree of one translation unit.
#[derive(Debug, Clone)]
pub struct Model {
    unit: String,
    headers: Vec<String>,
    nodes: Vec<Node>,
    /// Declarations indexed by path; namespaces are merged, overloads are not
    by_path: HashMap<DeclPath, Vec<NodeId>>,
}

impl Model {
    /// Build and validate a model from front-end input
    pub fn build(unit: &TranslationUnitDecl) -> Result<Self> {
        builder::ModelBuilder::new(unit).build()
    }

    pub(crate) fn empty(unit: &str, headers: Vec<String>) -> Self {
        let root = Node {
            id: NodeId::root(),
            name: String::new(),
            exposed_name: String::new(),
            path: DeclPath::root(),
            parent: None,
            children: Vec::new(),
            access: Default::default(),
            status: Status::Included,
            kind: NodeKind::Root,
        };
        let mut by_path = HashMap::new();
        by_path.insert(DeclPath::root(), vec![NodeId::root()]);
        Self {
            unit: unit.to_string(),
            headers,
            nodes: vec![root],
            by_path,
        }
    }

    /// Append a node under `parent` and index it by path
    pub(crate) fn push(&mut self, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        node.id = id;
        if let Some(parent) = node.parent {
            self.nodes[parent.index()].children.push(id);
        }
        self.by_path.entry(node.path.clone()).or_default().push(id);
        self.nodes.push(node);
        id
    }

    pub fn unit_name(&self) -> &str {
        &self.unit
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn root(&self) -> NodeId {
        NodeId::root()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// All nodes in creation order (parents before children)
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// All nodes declared at `path`
    pub fn lookup(&self, path: &DeclPath) -> &[NodeId] {
        self.by_path.get(path).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// The class declared at `path`, if any
    pub fn lookup_class(&self, path: &DeclPath) -> Option<NodeId> {
        self.lookup(path)
            .iter()
            .copied()
            .find(|id| self.node(*id).as_class().is_some())
    }

    pub fn class(&self, id: NodeId) -> Option<&ClassNode> {
        self.node(id).as_class()
    }

    /// Enclosing class of a node, if it is nested in one
    pub fn enclosing_class(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)
            .parent
            .filter(|parent| self.node(*parent).as_class().is_some())
    }

    /// Path of the class materialized from `template<args>`
    pub fn instance_path(template: &DeclPath, args: &[TypeRef]) -> DeclPath {
        let spelled: Vec<String> = args.iter().map(TypeRef::short_spelling).collect();
        let segment = format!("{}<{}>", template.leaf(), spelled.join(", "));
        template
            .parent()
            .unwrap_or_default()
            .join(segment)
    }

    /// Declaration a type reference names: a class, enum, alias or instance
    pub fn resolve_type(&self, ty: &TypeRef) -> Option<NodeId> {
        let path = match ty.innermost() {
            TypeRef::Named { path } => path.clone(),
            TypeRef::Instance { template, args } => Self::instance_path(template, args),
            _ => return None,
        };
        self.lookup(&path).first().copied()
    }

    /// Follow an alias chain to the class it finally names
    pub fn alias_class(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        for _ in 0..MAX_ALIAS_DEPTH {
            match &self.node(current).kind {
                NodeKind::Class(_) => return Some(current),
                NodeKind::Alias(alias) => {
                    if alias.is_template {
                        return None;
                    }
                    // Aliases to pointers or references do not name the class itself
                    if !matches!(
                        alias.target,
                        TypeRef::Named { .. } | TypeRef::Instance { .. }
                    ) {
                        return None;
                    }
                    current = self.resolve_type(&alias.target)?;
                }
                _ => return None,
            }
        }
        None
    }

    /// Every node referenced by a type, including template arguments
    pub fn referenced_nodes(&self, ty: &TypeRef) -> Vec<NodeId> {
        let mut found = Vec::new();
        ty.walk(&mut |inner| {
            let path = match inner {
                TypeRef::Named { path } => Some(path.clone()),
                TypeRef::Instance { template, args } => Some(Self::instance_path(template, args)),
                _ => None,
            };
            if let Some(id) = path.and_then(|p| self.lookup(&p).first().copied()) {
                found.push(id);
            }
            if let TypeRef::Instance { template, .. } = inner {
                found.extend(self.lookup(template).iter().copied());
            }
        });
        found
    }

    /// Pre-order walk below `id`, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Whether `id` is declared inside `ancestor`
    pub fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.node(parent).parent;
        }
        false
    }

    /// All classes, bases before derived classes when both are present
    pub fn classes_base_first(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut visited = vec![false; self.nodes.len()];
        for node in &self.nodes {
            if node.as_class().is_some() {
                self.visit_bases(node.id, &mut visited, &mut order);
            }
        }
        order
    }

    fn visit_bases(&self, id: NodeId, visited: &mut [bool], order: &mut Vec<NodeId>) {
        if visited[id.index()] {
            return;
        }
        visited[id.index()] = true;
        if let Some(class) = self.class(id) {
            for base in &class.bases {
                self.visit_bases(base.class, visited, order);
            }
        }
        // Enclosing classes come before nested ones
        if let Some(outer) = self.enclosing_class(id) {
            self.visit_bases(outer, visited, order);
        }
        order.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_lookup_by_path() {
        let model = Model::build(&fixtures::class_unit()).unwrap();
        let dog = DeclPath::parse("chimera_test::nested_namespace::Dog").unwrap();
        let id = model.lookup_class(&dog).unwrap();
        assert_eq!(model.node(id).name, "Dog");
        assert_eq!(model.node(id).cpp_name(), "::chimera_test::nested_namespace::Dog");
    }

    #[test]
    fn test_classes_base_first() {
        let model = Model::build(&fixtures::class_unit()).unwrap();
        let order: Vec<String> = model
            .classes_base_first()
            .into_iter()
            .map(|id| model.node(id).name.clone())
            .collect();
        let position = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert!(position("Animal") < position("Dog"));
        assert!(position("Dog") < position("Husky"));
        assert!(position("Strong") < position("StrongHusky"));
    }

    #[test]
    fn test_alias_chain_resolves_to_class() {
        let model = Model::build(&fixtures::typedef_unit()).unwrap();
        let alias = DeclPath::parse("chimera_test::PositionAlias").unwrap();
        let id = model.lookup(&alias)[0];
        let class = model.alias_class(id).unwrap();
        assert_eq!(model.node(class).name, "Position");
    }

    #[test]
    fn test_instance_path() {
        let template = DeclPath::parse("chimera_test::Vector").unwrap();
        let path = Model::instance_path(&template, &[TypeRef::builtin("double")]);
        assert_eq!(path.to_path_string(), "chimera_test::Vector<double>");
    }
}

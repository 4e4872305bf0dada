//! Node types of the declaration model

use crate::decl::{Access, OperatorKind, SmartPointerKind, TypeRef, Virtuality};
use crate::config::ReturnPolicy;
use crate::exceptions::ExceptionCategory;
use crate::path::DeclPath;
use serde::{Deserialize, Serialize};

/// Index of a node in the model arena; the default is the root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The translation unit root
    pub fn root() -> Self {
        Self(0)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Whether a declaration takes part in generation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Included,
    /// Not enclosed by any configured input namespace; silently ignored
    Outside,
    /// Inside a hidden namespace and not explicitly included
    Hidden,
    /// Excluded by a rule or by propagation, with the reason
    Excluded(String),
}

impl Status {
    pub fn is_included(&self) -> bool {
        matches!(self, Status::Included)
    }

    pub fn excluded(reason: impl Into<String>) -> Self {
        Status::Excluded(reason.into())
    }

    /// Reason recorded in the manifest, `None` when nothing is worth reporting
    pub fn reason(&self) -> Option<&str> {
        match self {
            Status::Excluded(reason) => Some(reason),
            Status::Hidden => Some("hidden namespace"),
            Status::Included | Status::Outside => None,
        }
    }
}

/// A declaration in the model
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    /// C++ name (last path segment)
    pub name: String,
    /// Host-side name after renames; empty for unnamed template instances
    pub exposed_name: String,
    pub path: DeclPath,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub access: Access,
    pub status: Status,
    pub kind: NodeKind,
}

impl Node {
    pub fn is_namespace(&self) -> bool {
        matches!(self.kind, NodeKind::Namespace)
    }

    pub fn as_class(&self) -> Option<&ClassNode> {
        match &self.kind {
            NodeKind::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn as_class_mut(&mut self) -> Option<&mut ClassNode> {
        match &mut self.kind {
            NodeKind::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionNode> {
        match &self.kind {
            NodeKind::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Fully qualified C++ spelling
    pub fn cpp_name(&self) -> String {
        self.path.qualified()
    }
}

/// Declaration-specific payload of a node
#[derive(Debug, Clone)]
pub enum NodeKind {
    Root,
    Namespace,
    Class(ClassNode),
    Function(FunctionNode),
    Enum(EnumNode),
    Variable(VariableNode),
    Alias(AliasNode),
    Template(TemplateNode),
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Root => "unit",
            NodeKind::Namespace => "namespace",
            NodeKind::Class(_) => "class",
            NodeKind::Function(_) => "function",
            NodeKind::Enum(_) => "enum",
            NodeKind::Variable(_) => "variable",
            NodeKind::Alias(_) => "alias",
            NodeKind::Template(_) => "template",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseLink {
    pub class: NodeId,
    pub access: Access,
}

#[derive(Debug, Clone, Default)]
pub struct ClassNode {
    /// Resolved bases in declaration order
    pub bases: Vec<BaseLink>,
    pub constructors: Vec<Constructor>,
    pub methods: Vec<Method>,
    pub fields: Vec<Field>,
    /// Pure-virtual members remain unimplemented after walking the bases
    pub is_abstract: bool,
    pub is_copyable: bool,
    pub is_final: bool,
    pub holder: Option<SmartPointerKind>,
    pub expose_constructor_params: bool,
    pub doc: Option<String>,
    /// Template this class was instantiated from
    pub instance_of: Option<NodeId>,
}

impl ClassNode {
    pub fn has_virtuals(&self) -> bool {
        self.methods.iter().any(|m| m.virtuality.is_virtual())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<String>,
    /// Removed from the exposed signature; the wrapper supplies the value
    pub suppressed: bool,
}

impl Param {
    /// Expression passed for a suppressed parameter
    pub fn fill_value(&self) -> String {
        self.default.clone().unwrap_or_else(|| "{}".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Constructor {
    pub params: Vec<Param>,
    pub access: Access,
    pub is_deleted: bool,
    pub is_copy_or_move: bool,
    pub status: Status,
}

#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub exposed_name: String,
    pub params: Vec<Param>,
    pub return_type: TypeRef,
    pub virtuality: Virtuality,
    pub is_static: bool,
    pub is_const: bool,
    pub access: Access,
    pub operator: Option<OperatorKind>,
    pub is_deleted: bool,
    pub is_conversion: bool,
    pub is_template: bool,
    pub throws: Vec<ExceptionCategory>,
    pub doc: Option<String>,
    /// Configured override of the backend's default policy
    pub return_policy: Option<ReturnPolicy>,
    pub status: Status,
}

impl Method {
    /// Signature key used to match overrides across a hierarchy
    pub fn signature_key(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| p.ty.spelling()).collect();
        format!(
            "{}({}){}",
            self.name,
            params.join(", "),
            if self.is_const { " const" } else { "" }
        )
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub exposed_name: String,
    pub ty: TypeRef,
    pub is_static: bool,
    pub is_const: bool,
    pub access: Access,
    pub status: Status,
}

#[derive(Debug, Clone)]
pub struct FunctionNode {
    pub params: Vec<Param>,
    pub return_type: TypeRef,
    pub operator: Option<OperatorKind>,
    pub throws: Vec<ExceptionCategory>,
    pub doc: Option<String>,
    pub return_policy: Option<ReturnPolicy>,
    pub instance_of: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub label: String,
    pub value: i64,
}

#[derive(Debug, Clone)]
pub struct EnumNode {
    pub scoped: bool,
    pub anonymous: bool,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone)]
pub struct VariableNode {
    pub ty: TypeRef,
    pub is_const: bool,
    pub is_template: bool,
}

#[derive(Debug, Clone)]
pub struct AliasNode {
    pub target: TypeRef,
    pub is_template: bool,
}

#[derive(Debug, Clone)]
pub struct TemplateNode {
    pub params: Vec<String>,
    pub is_class: bool,
    /// Materialized instantiations, siblings of the template node
    pub instances: Vec<NodeId>,
}

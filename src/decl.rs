//! Declaration input - what the C++ front-end hands over
//!
//! The front-end (a clang-based extractor, outside this crate) walks the
//! headers of one translation unit and serializes the declarations it saw
//! as JSON. Everything here is plain data; validation and linking happen
//! when the [`Model`](crate::model::Model) is built.

use crate::path::DeclPath;
use crate::exceptions::ExceptionCategory;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One translation unit as extracted from its headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationUnitDecl {
    /// Unit name, used for artifact file names when the config has none
    pub name: String,
    /// Headers the generated bindings must include
    #[serde(default)]
    pub headers: Vec<String>,
    /// Top-level declarations
    #[serde(default)]
    pub decls: Vec<Decl>,
}

impl TranslationUnitDecl {
    pub fn from_json(source: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(source)?)
    }
}

/// C++ member/record accessibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    #[default]
    Public,
    Protected,
    Private,
}

/// A single declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decl {
    Namespace(NamespaceDecl),
    Class(ClassDecl),
    Function(FunctionDecl),
    Enum(EnumDecl),
    Variable(VariableDecl),
    Alias(AliasDecl),
    Template(TemplateDecl),
}

impl Decl {
    pub fn name(&self) -> &str {
        match self {
            Decl::Namespace(d) => &d.name,
            Decl::Class(d) => &d.name,
            Decl::Function(d) => &d.name,
            Decl::Enum(d) => &d.name,
            Decl::Variable(d) => &d.name,
            Decl::Alias(d) => &d.name,
            Decl::Template(d) => &d.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceDecl {
    pub name: String,
    #[serde(default)]
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub access: Access,
    /// Base classes in declaration order
    #[serde(default)]
    pub bases: Vec<BaseDecl>,
    #[serde(default)]
    pub constructors: Vec<ConstructorDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    /// Nested classes, enums, aliases
    #[serde(default)]
    pub nested: Vec<Decl>,
    #[serde(default = "default_true")]
    pub is_copyable: bool,
    #[serde(default)]
    pub is_final: bool,
    /// Smart pointer holder declared for this class, if any
    #[serde(default)]
    pub holder: Option<SmartPointerKind>,
    /// Bind constructors even when a parameter names a non-public type
    #[serde(default)]
    pub expose_constructor_params: bool,
    #[serde(default)]
    pub doc: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseDecl {
    pub path: DeclPath,
    #[serde(default)]
    pub access: Access,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstructorDecl {
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_copy_or_move: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Default value expression as evaluated by the front-end
    #[serde(default)]
    pub default: Option<String>,
}

/// Virtual-ness of a member function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Virtuality {
    #[default]
    None,
    Virtual,
    PureVirtual,
    Override,
}

impl Virtuality {
    pub fn is_virtual(self) -> bool {
        !matches!(self, Virtuality::None)
    }
}

/// Overloaded operator spelled by a member function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
    Add,
    Sub,
    Mul,
    Div,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    Neg,
    Pos,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Copy or move assignment (`operator=`)
    Assign,
    /// Anything the generator has no host spelling for (`operator()`, `operator[]`, ...)
    Other,
}

impl OperatorKind {
    pub fn is_compound_assignment(self) -> bool {
        matches!(
            self,
            OperatorKind::AddAssign
                | OperatorKind::SubAssign
                | OperatorKind::MulAssign
                | OperatorKind::DivAssign
        )
    }

    pub fn is_unary(self) -> bool {
        matches!(self, OperatorKind::Neg | OperatorKind::Pos)
    }

    /// C++ operator token
    pub fn token(self) -> &'static str {
        match self {
            OperatorKind::Add | OperatorKind::Pos => "+",
            OperatorKind::Sub | OperatorKind::Neg => "-",
            OperatorKind::Mul => "*",
            OperatorKind::Div => "/",
            OperatorKind::AddAssign => "+=",
            OperatorKind::SubAssign => "-=",
            OperatorKind::MulAssign => "*=",
            OperatorKind::DivAssign => "/=",
            OperatorKind::Eq => "==",
            OperatorKind::Ne => "!=",
            OperatorKind::Lt => "<",
            OperatorKind::Le => "<=",
            OperatorKind::Gt => ">",
            OperatorKind::Ge => ">=",
            OperatorKind::Assign => "=",
            OperatorKind::Other => "",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    #[serde(default = "TypeRef::void")]
    pub return_type: TypeRef,
    #[serde(default)]
    pub virtuality: Virtuality,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_const: bool,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub operator: Option<OperatorKind>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_conversion: bool,
    /// Member function templates are never bound directly
    #[serde(default)]
    pub is_template: bool,
    #[serde(default)]
    pub throws: Vec<ExceptionCategory>,
    #[serde(default)]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_const: bool,
    #[serde(default)]
    pub access: Access,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    #[serde(default = "TypeRef::void")]
    pub return_type: TypeRef,
    /// Free operator overload, never bound
    #[serde(default)]
    pub operator: Option<OperatorKind>,
    #[serde(default)]
    pub throws: Vec<ExceptionCategory>,
    #[serde(default)]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDecl {
    /// Empty for anonymous enums
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub scoped: bool,
    #[serde(default)]
    pub values: Vec<EnumValueDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumValueDecl {
    pub label: String,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub is_const: bool,
    /// Variable templates are never bound
    #[serde(default)]
    pub is_template: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasDecl {
    pub name: String,
    pub target: TypeRef,
    #[serde(default)]
    pub access: Access,
    /// Alias templates (`template <class T> using X = ...`) are never bound
    #[serde(default)]
    pub is_template: bool,
}

/// What a template declares
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemplatePattern {
    Class(ClassDecl),
    Function(FunctionDecl),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDecl {
    pub name: String,
    /// Template parameter names, in order
    #[serde(default)]
    pub params: Vec<String>,
    pub pattern: TemplatePattern,
    #[serde(default)]
    pub instantiations: Vec<InstantiationDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstantiationDecl {
    pub args: Vec<TypeRef>,
    /// Host-side name; instantiations without one are never emitted
    #[serde(default)]
    pub binding_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmartPointerKind {
    Unique,
    Shared,
}

impl SmartPointerKind {
    pub fn spelling(self) -> &'static str {
        match self {
            SmartPointerKind::Unique => "std::unique_ptr",
            SmartPointerKind::Shared => "std::shared_ptr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Vector,
    List,
    Map,
    UnorderedMap,
    Set,
    UnorderedSet,
    Pair,
    Tuple,
}

impl ContainerKind {
    pub fn spelling(self) -> &'static str {
        match self {
            ContainerKind::Vector => "std::vector",
            ContainerKind::List => "std::list",
            ContainerKind::Map => "std::map",
            ContainerKind::UnorderedMap => "std::unordered_map",
            ContainerKind::Set => "std::set",
            ContainerKind::UnorderedSet => "std::unordered_set",
            ContainerKind::Pair => "std::pair",
            ContainerKind::Tuple => "std::tuple",
        }
    }

    pub fn is_associative(self) -> bool {
        matches!(
            self,
            ContainerKind::Map
                | ContainerKind::UnorderedMap
                | ContainerKind::Set
                | ContainerKind::UnorderedSet
        )
    }
}

/// A reference to a C++ type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeRef {
    Void,
    /// Fundamental type (`int`, `double`, `bool`, ...)
    Builtin { name: String },
    /// Type declared outside the unit (`std::string`, `pybind11::dict`)
    External { spelling: String },
    /// Class, enum or alias declared in the unit
    Named { path: DeclPath },
    /// Instance of a class template declared in the unit
    Instance { template: DeclPath, args: Vec<TypeRef> },
    /// Template parameter inside a template pattern
    Param { name: String },
    Pointer {
        pointee: Box<TypeRef>,
        #[serde(default)]
        is_const: bool,
    },
    Reference {
        referent: Box<TypeRef>,
        #[serde(default)]
        is_const: bool,
    },
    RvalueReference { referent: Box<TypeRef> },
    SmartPointer {
        holder: SmartPointerKind,
        pointee: Box<TypeRef>,
    },
    Container {
        container: ContainerKind,
        args: Vec<TypeRef>,
    },
    /// Spelling the front-end could not classify (function types, arrays, ...)
    Opaque { spelling: String },
}

impl TypeRef {
    pub fn void() -> Self {
        TypeRef::Void
    }

    pub fn builtin(name: impl Into<String>) -> Self {
        TypeRef::Builtin { name: name.into() }
    }

    pub fn external(spelling: impl Into<String>) -> Self {
        TypeRef::External {
            spelling: spelling.into(),
        }
    }

    /// Named type from a literal path; a malformed path names the root
    pub fn named(path: &str) -> Self {
        TypeRef::Named {
            path: DeclPath::parse(path).unwrap_or_default(),
        }
    }

    pub fn const_ref(referent: TypeRef) -> Self {
        TypeRef::Reference {
            referent: Box::new(referent),
            is_const: true,
        }
    }

    pub fn pointer(pointee: TypeRef) -> Self {
        TypeRef::Pointer {
            pointee: Box::new(pointee),
            is_const: false,
        }
    }

    /// Strip references, pointers and smart pointers
    pub fn innermost(&self) -> &TypeRef {
        match self {
            TypeRef::Pointer { pointee, .. } | TypeRef::SmartPointer { pointee, .. } => {
                pointee.innermost()
            }
            TypeRef::Reference { referent, .. } | TypeRef::RvalueReference { referent } => {
                referent.innermost()
            }
            other => other,
        }
    }

    /// Visit this type and every type nested in it
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a TypeRef)) {
        visit(self);
        match self {
            TypeRef::Pointer { pointee, .. } | TypeRef::SmartPointer { pointee, .. } => {
                pointee.walk(visit)
            }
            TypeRef::Reference { referent, .. } | TypeRef::RvalueReference { referent } => {
                referent.walk(visit)
            }
            TypeRef::Instance { args, .. } | TypeRef::Container { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            _ => {}
        }
    }

    pub fn any(&self, mut predicate: impl FnMut(&TypeRef) -> bool) -> bool {
        let mut found = false;
        self.walk(&mut |ty| {
            if !found && predicate(ty) {
                found = true;
            }
        });
        found
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Void)
    }

    pub fn is_rvalue_reference(&self) -> bool {
        matches!(self, TypeRef::RvalueReference { .. })
    }

    /// Pointer to void or to a fundamental type, or a pointer to a pointer
    pub fn is_raw_pointer(&self) -> bool {
        match self {
            TypeRef::Pointer { pointee, .. } => matches!(
                pointee.as_ref(),
                TypeRef::Void
                    | TypeRef::Builtin { .. }
                    | TypeRef::Opaque { .. }
                    | TypeRef::Pointer { .. }
            ),
            TypeRef::Reference { referent, .. } => referent.is_raw_pointer(),
            _ => false,
        }
    }

    pub fn contains_associative_container(&self) -> bool {
        self.any(|ty| {
            matches!(ty, TypeRef::Container { container, .. } if container.is_associative())
        })
    }

    /// Replace template parameters by concrete arguments
    pub fn substitute(&self, bindings: &[(String, TypeRef)]) -> TypeRef {
        match self {
            TypeRef::Param { name } => bindings
                .iter()
                .find(|(param, _)| param == name)
                .map(|(_, arg)| arg.clone())
                .unwrap_or_else(|| self.clone()),
            TypeRef::Pointer { pointee, is_const } => TypeRef::Pointer {
                pointee: Box::new(pointee.substitute(bindings)),
                is_const: *is_const,
            },
            TypeRef::Reference { referent, is_const } => TypeRef::Reference {
                referent: Box::new(referent.substitute(bindings)),
                is_const: *is_const,
            },
            TypeRef::RvalueReference { referent } => TypeRef::RvalueReference {
                referent: Box::new(referent.substitute(bindings)),
            },
            TypeRef::SmartPointer { holder, pointee } => TypeRef::SmartPointer {
                holder: *holder,
                pointee: Box::new(pointee.substitute(bindings)),
            },
            TypeRef::Instance { template, args } => TypeRef::Instance {
                template: template.clone(),
                args: args.iter().map(|a| a.substitute(bindings)).collect(),
            },
            TypeRef::Container { container, args } => TypeRef::Container {
                container: *container,
                args: args.iter().map(|a| a.substitute(bindings)).collect(),
            },
            other => other.clone(),
        }
    }

    /// C++ spelling with fully qualified names
    pub fn spelling(&self) -> String {
        match self {
            TypeRef::Void => "void".to_string(),
            TypeRef::Builtin { name } => name.clone(),
            TypeRef::External { spelling } | TypeRef::Opaque { spelling } => spelling.clone(),
            TypeRef::Named { path } => path.qualified(),
            TypeRef::Instance { template, args } => {
                format!("{}<{}>", template.qualified(), spell_args(args))
            }
            TypeRef::Param { name } => name.clone(),
            TypeRef::Pointer { pointee, is_const } => {
                if *is_const {
                    format!("const {} *", pointee.spelling())
                } else {
                    format!("{} *", pointee.spelling())
                }
            }
            TypeRef::Reference { referent, is_const } => {
                if *is_const {
                    format!("const {} &", referent.spelling())
                } else {
                    format!("{} &", referent.spelling())
                }
            }
            TypeRef::RvalueReference { referent } => format!("{} &&", referent.spelling()),
            TypeRef::SmartPointer { holder, pointee } => {
                format!("{}<{}>", holder.spelling(), pointee.spelling())
            }
            TypeRef::Container { container, args } => {
                format!("{}<{}>", container.spelling(), spell_args(args))
            }
        }
    }

    /// Spelling without the leading `::`, used in instantiation paths
    pub fn short_spelling(&self) -> String {
        match self {
            TypeRef::Named { path } => path.to_path_string(),
            TypeRef::Instance { template, args } => format!(
                "{}<{}>",
                template.to_path_string(),
                args.iter().map(TypeRef::short_spelling).collect::<Vec<_>>().join(", ")
            ),
            other => other.spelling(),
        }
    }
}

fn spell_args(args: &[TypeRef]) -> String {
    args.iter().map(TypeRef::spelling).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spelling())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spelling() {
        let ty = TypeRef::const_ref(TypeRef::external("std::string"));
        assert_eq!(ty.spelling(), "const std::string &");

        let ty = TypeRef::SmartPointer {
            holder: SmartPointerKind::Shared,
            pointee: Box::new(TypeRef::named("ns::Example")),
        };
        assert_eq!(ty.spelling(), "std::shared_ptr<::ns::Example>");
    }

    #[test]
    fn test_raw_pointer_detection() {
        assert!(TypeRef::pointer(TypeRef::Void).is_raw_pointer());
        assert!(TypeRef::pointer(TypeRef::builtin("int")).is_raw_pointer());
        assert!(TypeRef::pointer(TypeRef::pointer(TypeRef::named("ns::A"))).is_raw_pointer());
        assert!(!TypeRef::pointer(TypeRef::named("ns::Animal")).is_raw_pointer());
    }

    #[test]
    fn test_substitute_template_params() {
        let pattern = TypeRef::const_ref(TypeRef::Param { name: "T".into() });
        let concrete = pattern.substitute(&[("T".into(), TypeRef::builtin("double"))]);
        assert_eq!(concrete.spelling(), "const double &");
    }

    #[test]
    fn test_associative_container_detection() {
        let map = TypeRef::Container {
            container: ContainerKind::Map,
            args: vec![TypeRef::builtin("int"), TypeRef::builtin("int")],
        };
        let nested = TypeRef::const_ref(TypeRef::Instance {
            template: DeclPath::parse("ns::Box").unwrap(),
            args: vec![map],
        });
        assert!(nested.contains_associative_container());
        assert!(!TypeRef::builtin("int").contains_associative_container());
    }

    #[test]
    fn test_decl_json_shape() {
        let json = r#"{
            "name": "function",
            "headers": ["function.h"],
            "decls": [
                {"kind": "namespace", "name": "chimera_test", "decls": [
                    {"kind": "function", "name": "add",
                     "params": [
                        {"name": "i", "type": {"kind": "builtin", "name": "int"}, "default": "1"},
                        {"name": "j", "type": {"kind": "builtin", "name": "int"}, "default": "2"}
                     ],
                     "return_type": {"kind": "builtin", "name": "int"}}
                ]}
            ]
        }"#;
        let unit = TranslationUnitDecl::from_json(json).unwrap();
        assert_eq!(unit.name, "function");
        let Decl::Namespace(ns) = &unit.decls[0] else {
            panic!("expected namespace");
        };
        let Decl::Function(add) = &ns.decls[0] else {
            panic!("expected function");
        };
        assert_eq!(add.params[1].default.as_deref(), Some("2"));
    }
}

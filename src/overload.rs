//! Overload & Signature Resolver
//!
//! Groups bindable callables under exposed names and resolves the cases a
//! host language cannot express directly:
//! - trailing default arguments expand to one accepted arity per default
//! - static and instance overloads sharing a name (policy per backend)
//! - operators map to special methods, one binding per operator kind
//! - constructors and methods a backend can never bind are filtered out

use crate::backend::Backend;
use crate::decl::{Access, OperatorKind};
use crate::model::{Constructor, Method, Model, NodeId, Param};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Accepted argument counts of a callable, ascending.
///
/// With N exposed parameters of which the last K have defaults, the
/// result is `N-K ..= N`. Suppressed parameters are not exposed and do
/// not count.
pub fn arities(params: &[Param]) -> Vec<usize> {
    let exposed: Vec<&Param> = params.iter().filter(|p| !p.suppressed).collect();
    let trailing_defaults = exposed
        .iter()
        .rev()
        .take_while(|p| p.default.is_some())
        .count();
    let n = exposed.len();
    (n - trailing_defaults..=n).collect()
}

/// Parameters visible to the host
pub fn exposed_params(params: &[Param]) -> impl Iterator<Item = &Param> {
    params.iter().filter(|p| !p.suppressed)
}

/// Python special method for an operator
pub fn special_method(kind: OperatorKind) -> Option<&'static str> {
    let name = match kind {
        OperatorKind::Add => "__add__",
        OperatorKind::Sub => "__sub__",
        OperatorKind::Mul => "__mul__",
        OperatorKind::Div => "__truediv__",
        OperatorKind::AddAssign => "__iadd__",
        OperatorKind::SubAssign => "__isub__",
        OperatorKind::MulAssign => "__imul__",
        OperatorKind::DivAssign => "__itruediv__",
        OperatorKind::Neg => "__neg__",
        OperatorKind::Pos => "__pos__",
        OperatorKind::Eq => "__eq__",
        OperatorKind::Ne => "__ne__",
        OperatorKind::Lt => "__lt__",
        OperatorKind::Le => "__le__",
        OperatorKind::Gt => "__gt__",
        OperatorKind::Ge => "__ge__",
        OperatorKind::Assign => "assign",
        OperatorKind::Other => return None,
    };
    Some(name)
}

/// Why a method can never be bound, regardless of backend
pub fn method_skip_reason(method: &Method) -> Option<&'static str> {
    if method.access != Access::Public {
        return Some("not public");
    }
    if method.is_deleted {
        return Some("deleted");
    }
    if method.is_conversion {
        return Some("conversion operator");
    }
    if method.is_template {
        return Some("member template without binding");
    }
    if method.operator == Some(OperatorKind::Other) {
        return Some("operator without host equivalent");
    }
    // Move assignment merges into the copy assignment binding
    if method.operator != Some(OperatorKind::Assign)
        && method.params.iter().any(|p| p.ty.is_rvalue_reference())
    {
        return Some("rvalue reference parameter");
    }
    None
}

/// Why a constructor can never be bound, regardless of backend
pub fn constructor_skip_reason(model: &Model, class: NodeId, ctor: &Constructor) -> Option<String> {
    if ctor.access != Access::Public {
        return Some("not public".to_string());
    }
    if ctor.is_deleted {
        return Some("deleted".to_string());
    }
    if ctor.is_copy_or_move {
        return Some("copy or move constructor".to_string());
    }
    if ctor.params.iter().any(|p| p.ty.is_rvalue_reference()) {
        return Some("rvalue reference parameter".to_string());
    }
    let expose = model
        .class(class)
        .map(|c| c.expose_constructor_params)
        .unwrap_or(false);
    if !expose {
        for param in &ctor.params {
            if let Some(hidden) = non_public_type(model, param) {
                return Some(format!("parameter type {} is not public", hidden));
            }
        }
    }
    None
}

/// Path of a non-public nested type a parameter names
fn non_public_type(model: &Model, param: &Param) -> Option<String> {
    model
        .referenced_nodes(&param.ty)
        .into_iter()
        .map(|id| model.node(id))
        .find(|node| node.access != Access::Public)
        .map(|node| node.path.to_path_string())
}

/// Where a binding is reachable from on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPath {
    /// Only through the class object
    Class,
    /// Only through an instance
    Instance,
    Both,
}

/// How a method group is attached to the class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Instance,
    Static,
    /// Static function bound as an instance method that ignores the receiver
    StaticThunk,
    Operator(OperatorKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodGroup {
    pub exposed_name: String,
    pub binding: Binding,
    /// Indices into the class's method list
    pub members: Vec<usize>,
}

impl MethodGroup {
    pub fn access(&self) -> AccessPath {
        match self.binding {
            Binding::Static => AccessPath::Both,
            Binding::Instance | Binding::StaticThunk | Binding::Operator(_) => AccessPath::Instance,
        }
    }
}

/// Static-vs-instance collision policy of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Instance keeps the name, statics move to `name_static`
    RenameStatic,
    /// Statics stay under the name as instance thunks
    InstanceThunk,
}

impl CollisionPolicy {
    pub fn for_backend(backend: Backend) -> Self {
        match backend {
            Backend::Pybind11 => CollisionPolicy::RenameStatic,
            Backend::BoostPython => CollisionPolicy::InstanceThunk,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    RenamedStatic,
    InstanceThunk,
}

/// A resolved static/instance collision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ambiguity {
    /// Colliding exposed name
    pub name: String,
    pub resolution: Resolution,
    /// Name the static overloads ended up under
    pub static_name: String,
    pub instance_access: AccessPath,
    pub static_access: AccessPath,
}

#[derive(Debug, Clone, Default)]
pub struct GroupedMethods {
    pub groups: Vec<MethodGroup>,
    pub ambiguities: Vec<Ambiguity>,
}

impl GroupedMethods {
    pub fn group(&self, name: &str) -> Option<&MethodGroup> {
        self.groups.iter().find(|g| g.exposed_name == name)
    }
}

/// Group the admitted methods of a class under exposed names
pub fn group_methods(methods: &[Method], admitted: &[usize], policy: CollisionPolicy) -> GroupedMethods {
    let mut result = GroupedMethods::default();

    // Operators: one binding per kind
    let mut operator_order: Vec<OperatorKind> = Vec::new();
    let mut operators: HashMap<OperatorKind, Vec<usize>> = HashMap::new();
    // Named methods, split by staticness
    let mut order: Vec<String> = Vec::new();
    let mut instance: HashMap<String, Vec<usize>> = HashMap::new();
    let mut statics: HashMap<String, Vec<usize>> = HashMap::new();

    for &index in admitted {
        let method = &methods[index];
        if let Some(kind) = method.operator {
            if !operators.contains_key(&kind) {
                operator_order.push(kind);
            }
            operators.entry(kind).or_default().push(index);
            continue;
        }
        let name = method.exposed_name.clone();
        if !order.contains(&name) {
            order.push(name.clone());
        }
        let bucket = if method.is_static { &mut statics } else { &mut instance };
        bucket.entry(name).or_default().push(index);
    }

    let collided: Vec<String> = order
        .iter()
        .filter(|name| instance.contains_key(*name) && statics.contains_key(*name))
        .cloned()
        .collect();

    let mut thunks: HashMap<String, Vec<usize>> = HashMap::new();
    for name in collided {
        let Some(moved) = statics.remove(&name) else {
            continue;
        };
        match policy {
            CollisionPolicy::RenameStatic => {
                let target = static_target(&name, &instance);
                if !order.contains(&target) {
                    order.push(target.clone());
                }
                statics.entry(target.clone()).or_default().extend(moved);
                result.ambiguities.push(Ambiguity {
                    name,
                    resolution: Resolution::RenamedStatic,
                    static_name: target,
                    instance_access: AccessPath::Instance,
                    static_access: AccessPath::Both,
                });
            }
            CollisionPolicy::InstanceThunk => {
                thunks.insert(name.clone(), moved);
                result.ambiguities.push(Ambiguity {
                    static_name: name.clone(),
                    name,
                    resolution: Resolution::InstanceThunk,
                    instance_access: AccessPath::Instance,
                    static_access: AccessPath::Instance,
                });
            }
        }
    }

    for name in order {
        if let Some(members) = instance.remove(&name) {
            result.groups.push(MethodGroup {
                exposed_name: name.clone(),
                binding: Binding::Instance,
                members,
            });
        }
        if let Some(members) = thunks.remove(&name) {
            result.groups.push(MethodGroup {
                exposed_name: name.clone(),
                binding: Binding::StaticThunk,
                members,
            });
        }
        if let Some(members) = statics.remove(&name) {
            result.groups.push(MethodGroup {
                exposed_name: name,
                binding: Binding::Static,
                members,
            });
        }
    }

    for kind in operator_order {
        let Some(name) = special_method(kind) else {
            continue;
        };
        let mut members = operators.remove(&kind).unwrap_or_default();
        if kind == OperatorKind::Assign {
            // Copy and move assignment become one binding of the copy overload
            members.retain(|&i| !methods[i].params.iter().any(|p| p.ty.is_rvalue_reference()));
            members.truncate(1);
        }
        if members.is_empty() {
            continue;
        }
        result.groups.push(MethodGroup {
            exposed_name: name.to_string(),
            binding: Binding::Operator(kind),
            members,
        });
    }

    result
}

/// `name_static`, or `name_static2`, `name_static3`... when instance methods hold it
fn static_target(name: &str, instance: &HashMap<String, Vec<usize>>) -> String {
    let base = format!("{}_static", name);
    if !instance.contains_key(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{}{}", base, n))
        .find(|candidate| !instance.contains_key(candidate))
        .unwrap_or(base)
}

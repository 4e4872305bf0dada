//! Shared planning pass
//!
//! Answers "do I emit this, and how" for every node and member of a
//! resolved model, for one backend. All backend differences come from the
//! [`CapabilityTable`], the [`ExceptionTable`] and the collision policy;
//! the dialects only render the resulting [`BackendPlan`].
//!
//! Planning order follows emission order:
//! 1. Submodules
//! 2. Classes, bases before derived, outer before nested
//! 3. Enums with their export decisions
//! 4. Free functions, variables and class aliases
//! 5. Exception translators

use super::capability::{CapabilityTable, Feature};
use super::Backend;
use crate::config::{Configuration, ReturnPolicy, Version};
use crate::decl::{Access, OperatorKind, SmartPointerKind, TypeRef};
use crate::dispatch::{DispatchEntry, DispatchTable};
use crate::exceptions::{ExceptionCategory, ExceptionTable};
use crate::manifest::{
    AmbiguityRecord, BackendManifest, Emitted, EmittedKind, ExceptionRecord, Gap, Suppressed,
};
use crate::model::{EnumValue, Model, NodeId, NodeKind, Param, Status};
use crate::overload::{self, AccessPath, Binding, CollisionPolicy, Resolution};
use crate::scope::{EnumExport, Scope, ScopeGraph, ScopeId, ScopeKind};
use crate::{Error, Result};
use std::collections::HashMap;
use tracing::{debug, info};

/// Variable holding the root module object in generated code
pub const ROOT_MODULE_VAR: &str = "m";

/// Host scope an item is registered in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// C++ variable holding the scope object
    pub var: String,
    pub kind: ScopeKind,
    pub dotted: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    Constructor,
    Method,
    StaticMethod,
    Function,
}

/// How a callable returns, as far as return value policies care
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    Value,
    ConstReference,
    MutReference { builtin: bool },
    Pointer,
}

impl ReturnShape {
    pub fn of(ty: &TypeRef) -> Self {
        match ty {
            TypeRef::Reference { is_const: true, .. } => ReturnShape::ConstReference,
            TypeRef::Reference { referent, .. } => ReturnShape::MutReference {
                builtin: matches!(referent.as_ref(), TypeRef::Builtin { .. }),
            },
            TypeRef::Pointer { .. } => ReturnShape::Pointer,
            _ => ReturnShape::Value,
        }
    }
}

/// Virtual slot a bound method belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualSlot {
    pub pure: bool,
    /// Wrapper member calling the base implementation
    pub default_helper: String,
}

/// One bindable overload
#[derive(Debug, Clone)]
pub struct Callable {
    pub kind: CallableKind,
    /// Qualified C++ name; the class itself for constructors
    pub cpp_name: String,
    /// Qualified owning class for members
    pub owner: Option<String>,
    pub params: Vec<Param>,
    pub return_type: TypeRef,
    pub is_const: bool,
    pub operator: Option<OperatorKind>,
    /// Other C++ overloads share the name, so pointers need a cast
    pub overloaded: bool,
    pub returns: ReturnShape,
    /// Configured policy replacing the backend default
    pub policy: Option<ReturnPolicy>,
    pub virtual_slot: Option<VirtualSlot>,
    pub doc: Option<String>,
}

impl Callable {
    /// Parameters the wrapper has to fill in itself
    pub fn has_suppressed(&self) -> bool {
        self.params.iter().any(|p| p.suppressed)
    }

    pub fn arities(&self) -> Vec<usize> {
        overload::arities(&self.params)
    }

    pub fn exposed_params(&self) -> impl Iterator<Item = &Param> {
        overload::exposed_params(&self.params)
    }
}

#[derive(Debug, Clone)]
pub struct MethodGroupPlan {
    pub name: String,
    pub binding: Binding,
    pub overloads: Vec<Callable>,
}

#[derive(Debug, Clone)]
pub struct FieldPlan {
    pub name: String,
    /// Qualified member name, e.g. `::ns::StaticFields::counter`
    pub cpp_name: String,
    pub is_static: bool,
    pub readonly: bool,
}

#[derive(Debug, Clone)]
pub struct TrampolineSlot {
    pub entry: DispatchEntry,
    pub default_helper: String,
}

#[derive(Debug, Clone)]
pub struct ClassPlan {
    pub node: NodeId,
    pub name: String,
    pub cpp_name: String,
    /// Identifier-safe path used for generated helper names
    pub mangled: String,
    pub var: String,
    pub parent: Target,
    pub dotted: String,
    /// Bound public bases, qualified
    pub bases: Vec<String>,
    pub holder: Option<SmartPointerKind>,
    pub copyable: bool,
    pub is_abstract: bool,
    pub doc: Option<String>,
    /// Overridable slots; empty when the class needs no trampoline
    pub trampoline: Vec<TrampolineSlot>,
    pub constructors: Vec<Callable>,
    pub methods: Vec<MethodGroupPlan>,
    pub fields: Vec<FieldPlan>,
}

impl ClassPlan {
    pub fn has_trampoline(&self) -> bool {
        !self.trampoline.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ModulePlan {
    pub name: String,
    pub var: String,
    pub parent: Target,
    pub dotted: String,
}

#[derive(Debug, Clone)]
pub struct EnumPlan {
    /// Empty for anonymous enums
    pub name: String,
    pub cpp_name: String,
    /// Qualified scope the enumerators are spelled in
    pub value_prefix: String,
    pub parent: Target,
    pub values: Vec<EnumValue>,
    pub anonymous: bool,
    pub export: EnumExport,
}

impl EnumPlan {
    pub fn value_cpp(&self, label: &str) -> String {
        format!("{}::{}", self.value_prefix, label)
    }
}

#[derive(Debug, Clone)]
pub struct FunctionGroupPlan {
    pub name: String,
    pub parent: Target,
    pub overloads: Vec<Callable>,
}

#[derive(Debug, Clone)]
pub struct VariablePlan {
    pub name: String,
    pub cpp_name: String,
    pub parent: Target,
}

#[derive(Debug, Clone)]
pub struct AliasPlan {
    pub name: String,
    pub parent: Target,
    /// Variable holding the aliased class object
    pub class_var: String,
}

/// Everything one dialect needs to render a unit
#[derive(Debug, Clone)]
pub struct BackendPlan {
    pub backend: Backend,
    pub version: Version,
    pub module: String,
    pub headers: Vec<String>,
    pub modules: Vec<ModulePlan>,
    pub classes: Vec<ClassPlan>,
    pub enums: Vec<EnumPlan>,
    pub functions: Vec<FunctionGroupPlan>,
    pub variables: Vec<VariablePlan>,
    pub aliases: Vec<AliasPlan>,
    pub translations: Vec<ExceptionRecord>,
    pub manifest: BackendManifest,
}

impl BackendPlan {
    pub fn class(&self, cpp_name: &str) -> Option<&ClassPlan> {
        self.classes.iter().find(|c| c.cpp_name == cpp_name)
    }
}

/// Planning pass for one backend over a resolved model
pub struct Planner<'a> {
    model: &'a Model,
    graph: &'a ScopeGraph,
    config: &'a Configuration,
    backend: Backend,
    caps: CapabilityTable,
    exceptions: ExceptionTable,
}

impl<'a> Planner<'a> {
    pub fn new(model: &'a Model, graph: &'a ScopeGraph, config: &'a Configuration, backend: Backend) -> Self {
        let version = config.backends.version(backend);
        Self {
            model,
            graph,
            config,
            backend,
            caps: CapabilityTable::new(backend, version),
            exceptions: ExceptionTable::new(backend, version),
        }
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.caps
    }

    pub fn plan(&self) -> Result<BackendPlan> {
        let module = self.config.module.name.clone();
        let version = self.caps.version();
        let mut plan = BackendPlan {
            backend: self.backend,
            version,
            module: module.clone(),
            headers: self.model.headers().to_vec(),
            modules: Vec::new(),
            classes: Vec::new(),
            enums: Vec::new(),
            functions: Vec::new(),
            variables: Vec::new(),
            aliases: Vec::new(),
            translations: Vec::new(),
            manifest: BackendManifest::new(self.backend.artifact_name(&module), version),
        };
        let mut state = PlanState {
            class_vars: HashMap::new(),
            implicit_holders: self.implicit_holders(),
        };

        self.plan_modules(&mut plan)?;
        self.plan_classes(&mut plan, &mut state)?;
        self.plan_enums(&mut plan, &state)?;
        self.plan_functions(&mut plan, &state)?;
        self.plan_variables(&mut plan, &state)?;
        self.plan_aliases(&mut plan, &state)?;
        self.plan_translations(&mut plan);
        self.record_unbound(&mut plan);

        info!(
            "Planned {} for {}: {} emitted, {} suppressed, {} gaps",
            self.backend,
            self.model.unit_name(),
            plan.manifest.emitted.len(),
            plan.manifest.suppressed.len(),
            plan.manifest.gaps.len()
        );
        Ok(plan)
    }

    fn module_var(&self, scope: ScopeId) -> String {
        if scope == self.graph.root() {
            return ROOT_MODULE_VAR.to_string();
        }
        let dotted = self.graph.dotted_path(scope);
        let relative = dotted
            .split_once('.')
            .map(|(_, rest)| rest)
            .unwrap_or(&dotted);
        format!("m_{}", relative.replace('.', "_"))
    }

    fn target(&self, scope: ScopeId, state: &PlanState) -> Result<Target> {
        let var = match self.graph.scope(scope) {
            Scope::Module { .. } => self.module_var(scope),
            Scope::Class { class, .. } => match state.class_vars.get(class) {
                Some(var) => var.clone(),
                None => {
                    return Err(Error::emission(
                        self.backend,
                        &self.model.node(*class).path,
                        "class scope without a bound class",
                    ));
                }
            },
        };
        Ok(Target {
            var,
            kind: self.graph.scope(scope).kind(),
            dotted: self.graph.dotted_path(scope),
        })
    }

    /// Scope a placed node lives in; a placement without a scope is fatal
    fn placed_target(&self, id: NodeId, state: &PlanState) -> Result<Option<Target>> {
        match self.graph.placement(id) {
            Some(scope) => self.target(scope, state).map(Some),
            None => Ok(None),
        }
    }

    fn plan_modules(&self, plan: &mut BackendPlan) -> Result<()> {
        let state = PlanState::default();
        for scope in self.graph.modules() {
            if scope == self.graph.root() {
                continue;
            }
            let Some(parent) = self.graph.scope(scope).parent() else {
                continue;
            };
            let module = ModulePlan {
                name: self.graph.scope(scope).name().to_string(),
                var: self.module_var(scope),
                parent: self.target(parent, &state)?,
                dotted: self.graph.dotted_path(scope),
            };
            emit(plan, &module.dotted, EmittedKind::Module, Vec::new(), None);
            plan.modules.push(module);
        }
        Ok(())
    }

    /// Classes used through `std::shared_ptr` somewhere in a bound signature
    fn implicit_holders(&self) -> HashMap<NodeId, SmartPointerKind> {
        let mut found = HashMap::new();
        let mut visit = |ty: &TypeRef| {
            ty.walk(&mut |inner| {
                if let TypeRef::SmartPointer {
                    holder: SmartPointerKind::Shared,
                    pointee,
                } = inner
                    && let Some(class) = self.pointee_class(pointee)
                {
                    found.insert(class, SmartPointerKind::Shared);
                }
            });
        };
        for node in self.model.nodes() {
            if !node.status.is_included() {
                continue;
            }
            match &node.kind {
                NodeKind::Function(function) => {
                    function.params.iter().for_each(|p| visit(&p.ty));
                    visit(&function.return_type);
                }
                NodeKind::Class(class) => {
                    for method in &class.methods {
                        method.params.iter().for_each(|p| visit(&p.ty));
                        visit(&method.return_type);
                    }
                    for ctor in &class.constructors {
                        ctor.params.iter().for_each(|p| visit(&p.ty));
                    }
                    class.fields.iter().for_each(|f| visit(&f.ty));
                }
                _ => {}
            }
        }
        found
    }

    fn pointee_class(&self, pointee: &TypeRef) -> Option<NodeId> {
        let id = self.model.resolve_type(pointee)?;
        self.model.alias_class(id)
    }

    /// First capability gap a signature runs into
    fn signature_gap<'t>(&self, types: impl IntoIterator<Item = &'t TypeRef>) -> Option<(Feature, String)> {
        for ty in types {
            if ty.is_raw_pointer() && !self.caps.supports(Feature::RawPointerParameter) {
                return Some((
                    Feature::RawPointerParameter,
                    format!("raw pointer type {}", ty),
                ));
            }
            if ty.contains_associative_container() && !self.caps.supports(Feature::AssociativeContainer) {
                return Some((
                    Feature::AssociativeContainer,
                    format!("associative container {} needs a newer {}", ty, self.backend),
                ));
            }
            if !self.caps.supports(Feature::ImplicitHolder) {
                let mut undeclared = None;
                ty.walk(&mut |inner| {
                    if let TypeRef::SmartPointer { holder, pointee } = inner
                        && let Some(class) = self.pointee_class(pointee)
                        && self.model.class(class).and_then(|c| c.holder) != Some(*holder)
                        && *holder == SmartPointerKind::Shared
                    {
                        undeclared = Some(inner.spelling());
                    }
                });
                if let Some(spelling) = undeclared {
                    return Some((
                        Feature::ImplicitHolder,
                        format!("{} used without a declared holder", spelling),
                    ));
                }
            }
        }
        None
    }

    fn callable_gap(&self, params: &[Param], return_type: &TypeRef) -> Option<(Feature, String)> {
        self.signature_gap(
            overload::exposed_params(params)
                .map(|p| &p.ty)
                .chain(std::iter::once(return_type)),
        )
    }

    /// Configured return policy, when the return type can carry it here
    fn policy_override(
        &self,
        plan: &mut BackendPlan,
        path: &str,
        policy: Option<ReturnPolicy>,
        return_type: &TypeRef,
    ) -> Option<ReturnPolicy> {
        let policy = policy?;
        let (feature, detail) = match (policy, ReturnShape::of(return_type)) {
            (_, ReturnShape::Value) => (
                Feature::ReturnPolicyOverride,
                format!("{:?} policy on a by-value return", policy),
            ),
            (ReturnPolicy::TakeOwnership, ReturnShape::ConstReference | ReturnShape::MutReference { .. }) => (
                Feature::ReturnPolicyOverride,
                "ownership of a returned reference cannot be taken".to_string(),
            ),
            (ReturnPolicy::Copy, ReturnShape::Pointer)
                if !self.caps.supports(Feature::PointerCopyPolicy) =>
            {
                (
                    Feature::PointerCopyPolicy,
                    format!("cannot copy through returned {}", return_type),
                )
            }
            _ => return Some(policy),
        };
        gap(plan, feature, path, detail);
        None
    }

    fn exception_gaps(&self, plan: &mut BackendPlan, path: &str, throws: &[ExceptionCategory]) {
        for category in throws {
            if self.exceptions.translate(*category).is_none() {
                gap(
                    plan,
                    Feature::ExceptionTranslation,
                    path,
                    format!("{} is not translated", category.cpp_type()),
                );
            }
        }
    }

    fn plan_classes(&self, plan: &mut BackendPlan, state: &mut PlanState) -> Result<()> {
        for id in self.model.classes_base_first() {
            let node = self.model.node(id);
            if !node.status.is_included() || node.exposed_name.is_empty() {
                continue;
            }
            let Some(parent) = self.placed_target(id, state)? else {
                continue;
            };
            let class = self.plan_class(plan, state, id, parent)?;
            state.class_vars.insert(id, class.var.clone());
            plan.classes.push(class);
        }
        Ok(())
    }

    fn plan_class(&self, plan: &mut BackendPlan, state: &PlanState, id: NodeId, parent: Target) -> Result<ClassPlan> {
        let node = self.model.node(id);
        let Some(class) = node.as_class() else {
            return Err(Error::emission(self.backend, &node.path, "not a class"));
        };
        let path = node.path.to_path_string();
        let cpp_name = node.cpp_name();
        let dotted = format!("{}.{}", parent.dotted, node.exposed_name);
        emit(plan, &dotted, EmittedKind::Class, Vec::new(), None);

        let bases = class
            .bases
            .iter()
            .filter(|base| base.access == Access::Public)
            .filter(|base| state.class_vars.contains_key(&base.class))
            .map(|base| self.model.node(base.class).cpp_name())
            .collect();

        let holder = match (class.holder, state.implicit_holders.get(&id)) {
            (Some(holder), _) => Some(holder),
            (None, Some(implicit)) if self.caps.supports(Feature::ImplicitHolder) => {
                debug!("Inferred {} holder for {}", implicit.spelling(), path);
                Some(*implicit)
            }
            (None, Some(implicit)) => {
                gap(
                    plan,
                    Feature::ImplicitHolder,
                    &path,
                    format!("{} holder is not declared", implicit.spelling()),
                );
                None
            }
            (None, None) => None,
        };

        let trampoline = if class.is_final {
            Vec::new()
        } else {
            trampoline_slots(&DispatchTable::build(self.model, id))
        };

        let constructors = self.plan_constructors(plan, id, &cpp_name, &dotted, !trampoline.is_empty());
        let methods = self.plan_methods(plan, id, &cpp_name, &dotted, &trampoline);
        let fields = self.plan_fields(plan, id, &cpp_name, &dotted);

        Ok(ClassPlan {
            node: id,
            name: node.exposed_name.clone(),
            mangled: node.path.mangled(),
            var: format!("cls_{}", node.path.mangled()),
            cpp_name,
            parent,
            dotted,
            bases,
            holder,
            copyable: class.is_copyable,
            is_abstract: class.is_abstract,
            doc: class.doc.clone(),
            trampoline,
            constructors,
            methods,
            fields,
        })
    }

    fn plan_constructors(
        &self,
        plan: &mut BackendPlan,
        id: NodeId,
        cpp_name: &str,
        dotted: &str,
        has_trampoline: bool,
    ) -> Vec<Callable> {
        let node = self.model.node(id);
        let Some(class) = node.as_class() else {
            return Vec::new();
        };
        let leaf = node.name.split('<').next().unwrap_or(&node.name);
        let path = format!("{}::{}", node.path, leaf);

        let mut bound = Vec::new();
        for ctor in &class.constructors {
            if ctor.access != Access::Public || ctor.is_copy_or_move {
                continue;
            }
            if let Some(reason) = ctor.status.reason() {
                suppress(plan, &path, reason);
                continue;
            }
            if let Some(reason) = overload::constructor_skip_reason(self.model, id, ctor) {
                suppress(plan, &path, reason);
                continue;
            }
            if class.is_abstract && !has_trampoline {
                suppress(plan, &path, "abstract class without dispatch wrapper");
                continue;
            }
            if let Some((feature, detail)) = self.callable_gap(&ctor.params, &TypeRef::Void) {
                gap(plan, feature, &path, detail);
                suppress(plan, &path, feature.as_str());
                continue;
            }
            bound.push(Callable {
                kind: CallableKind::Constructor,
                cpp_name: cpp_name.to_string(),
                owner: Some(cpp_name.to_string()),
                params: ctor.params.clone(),
                return_type: TypeRef::Void,
                is_const: false,
                operator: None,
                overloaded: false,
                returns: ReturnShape::Value,
                policy: None,
                virtual_slot: None,
                doc: None,
            });
        }

        if !bound.is_empty() {
            let mut arities: Vec<usize> = bound.iter().flat_map(Callable::arities).collect();
            arities.sort_unstable();
            arities.dedup();
            emit(
                plan,
                &format!("{}.__init__", dotted),
                EmittedKind::Constructor,
                arities,
                Some(AccessPath::Class),
            );
        }
        bound
    }

    fn plan_methods(
        &self,
        plan: &mut BackendPlan,
        id: NodeId,
        cpp_name: &str,
        dotted: &str,
        slots: &[TrampolineSlot],
    ) -> Vec<MethodGroupPlan> {
        let node = self.model.node(id);
        let Some(class) = node.as_class() else {
            return Vec::new();
        };

        let mut admitted = Vec::new();
        let mut policies = vec![None; class.methods.len()];
        for (index, method) in class.methods.iter().enumerate() {
            let path = format!("{}::{}", node.path, method.name);
            if let Some(reason) = method.status.reason() {
                suppress(plan, &path, reason);
                continue;
            }
            if let Some(reason) = overload::method_skip_reason(method) {
                if method.access == Access::Public {
                    suppress(plan, &path, reason);
                }
                continue;
            }
            if let Some((feature, detail)) = self.callable_gap(&method.params, &method.return_type) {
                gap(plan, feature, &path, detail);
                suppress(plan, &path, feature.as_str());
                continue;
            }
            self.exception_gaps(plan, &path, &method.throws);
            policies[index] =
                self.policy_override(plan, &path, method.return_policy, &method.return_type);
            admitted.push(index);
        }

        let grouped = overload::group_methods(
            &class.methods,
            &admitted,
            CollisionPolicy::for_backend(self.backend),
        );
        for ambiguity in grouped.ambiguities {
            if ambiguity.resolution == Resolution::InstanceThunk {
                gap(
                    plan,
                    Feature::StaticInstanceOverload,
                    &format!("{}::{}", node.path, ambiguity.name),
                    "static overloads reachable through instances only",
                );
            }
            debug!(
                "Resolved static/instance collision on {}.{} as {:?}",
                dotted, ambiguity.name, ambiguity.resolution
            );
            plan.manifest.ambiguities.push(AmbiguityRecord {
                class: dotted.to_string(),
                ambiguity,
            });
        }

        let mut groups = Vec::new();
        for group in grouped.groups {
            let overloads: Vec<Callable> = group
                .members
                .iter()
                .map(|&index| {
                    let method = &class.methods[index];
                    let overloaded = class.methods.iter().filter(|m| m.name == method.name).count() > 1;
                    let key = method.signature_key();
                    let virtual_slot = slots
                        .iter()
                        .find(|slot| slot.entry.key == key)
                        .map(|slot| VirtualSlot {
                            pure: slot.entry.is_pure,
                            default_helper: slot.default_helper.clone(),
                        });
                    Callable {
                        kind: if method.is_static {
                            CallableKind::StaticMethod
                        } else {
                            CallableKind::Method
                        },
                        cpp_name: format!("{}::{}", cpp_name, method.name),
                        owner: Some(cpp_name.to_string()),
                        params: method.params.clone(),
                        return_type: method.return_type.clone(),
                        is_const: method.is_const,
                        operator: method.operator,
                        overloaded,
                        returns: ReturnShape::of(&method.return_type),
                        policy: policies[index],
                        virtual_slot,
                        doc: method.doc.clone(),
                    }
                })
                .collect();

            let kind = match group.binding {
                Binding::Instance => EmittedKind::Method,
                Binding::Static => EmittedKind::StaticMethod,
                Binding::StaticThunk => EmittedKind::StaticThunk,
                Binding::Operator(_) => EmittedKind::Operator,
            };
            let mut arities: Vec<usize> = overloads.iter().flat_map(Callable::arities).collect();
            arities.sort_unstable();
            arities.dedup();
            let access = group.access();
            emit(
                plan,
                &format!("{}.{}", dotted, group.exposed_name),
                kind,
                arities,
                Some(access),
            );
            groups.push(MethodGroupPlan {
                name: group.exposed_name,
                binding: group.binding,
                overloads,
            });
        }
        groups
    }

    fn plan_fields(&self, plan: &mut BackendPlan, id: NodeId, cpp_name: &str, dotted: &str) -> Vec<FieldPlan> {
        let node = self.model.node(id);
        let Some(class) = node.as_class() else {
            return Vec::new();
        };

        let mut fields = Vec::new();
        for field in &class.fields {
            if field.access != Access::Public {
                continue;
            }
            let path = format!("{}::{}", node.path, field.name);
            if let Some(reason) = field.status.reason() {
                suppress(plan, &path, reason);
                continue;
            }
            if let Some((feature, detail)) = self.signature_gap([&field.ty]) {
                gap(plan, feature, &path, detail);
                suppress(plan, &path, feature.as_str());
                continue;
            }
            let mut readonly = field.is_const;
            if field.is_static && !readonly && !self.caps.supports(Feature::WritableStaticField) {
                gap(
                    plan,
                    Feature::WritableStaticField,
                    &path,
                    "exposed as a read-only accessor",
                );
                readonly = true;
            }
            emit(
                plan,
                &format!("{}.{}", dotted, field.exposed_name),
                if field.is_static {
                    EmittedKind::StaticField
                } else {
                    EmittedKind::Field
                },
                Vec::new(),
                Some(if field.is_static {
                    AccessPath::Both
                } else {
                    AccessPath::Instance
                }),
            );
            fields.push(FieldPlan {
                name: field.exposed_name.clone(),
                cpp_name: format!("{}::{}", cpp_name, field.name),
                is_static: field.is_static,
                readonly,
            });
        }
        fields
    }

    fn plan_enums(&self, plan: &mut BackendPlan, state: &PlanState) -> Result<()> {
        let exports = crate::scope::enum_exports(self.model, self.graph, &self.caps);
        for export in &exports {
            let node = self.model.node(export.node);
            let NodeKind::Enum(e) = &node.kind else {
                continue;
            };
            let Some(parent) = self.placed_target(export.node, state)? else {
                continue;
            };
            if let Some(feature) = export.gap {
                gap(
                    plan,
                    feature,
                    &node.path.to_path_string(),
                    "values reachable only through the enum",
                );
            }
            let value_prefix = if e.anonymous {
                node.parent
                    .map(|p| self.model.node(p).cpp_name())
                    .unwrap_or_default()
            } else {
                node.cpp_name()
            };
            if !e.anonymous {
                emit(plan, &export.name, EmittedKind::Enum, Vec::new(), None);
            }
            plan.enums.push(EnumPlan {
                name: node.exposed_name.clone(),
                cpp_name: node.cpp_name(),
                value_prefix,
                parent,
                values: e.values.clone(),
                anonymous: e.anonymous,
                export: export.clone(),
            });
        }
        plan.manifest.enum_exports = exports;
        Ok(())
    }

    fn plan_functions(&self, plan: &mut BackendPlan, state: &PlanState) -> Result<()> {
        for id in self.model.ids() {
            let node = self.model.node(id);
            let Some(function) = node.as_function() else {
                continue;
            };
            let Some(parent) = self.placed_target(id, state)? else {
                continue;
            };
            let path = node.path.to_path_string();
            if function.operator.is_some() && !self.caps.supports(Feature::FreeOperator) {
                gap(plan, Feature::FreeOperator, &path, "free operators are not bound");
                suppress(plan, &path, "free operator");
                continue;
            }
            if let Some((feature, detail)) = self.callable_gap(&function.params, &function.return_type) {
                gap(plan, feature, &path, detail);
                suppress(plan, &path, feature.as_str());
                continue;
            }
            self.exception_gaps(plan, &path, &function.throws);
            let policy =
                self.policy_override(plan, &path, function.return_policy, &function.return_type);

            let callable = Callable {
                kind: CallableKind::Function,
                cpp_name: node.cpp_name(),
                owner: None,
                params: function.params.clone(),
                return_type: function.return_type.clone(),
                is_const: false,
                operator: None,
                overloaded: self.model.lookup(&node.path).len() > 1,
                returns: ReturnShape::of(&function.return_type),
                policy,
                virtual_slot: None,
                doc: function.doc.clone(),
            };
            match plan
                .functions
                .iter_mut()
                .find(|g| g.name == node.exposed_name && g.parent == parent)
            {
                Some(group) => group.overloads.push(callable),
                None => plan.functions.push(FunctionGroupPlan {
                    name: node.exposed_name.clone(),
                    parent,
                    overloads: vec![callable],
                }),
            }
        }

        let mut records = Vec::new();
        for group in &plan.functions {
            let mut arities: Vec<usize> = group.overloads.iter().flat_map(Callable::arities).collect();
            arities.sort_unstable();
            arities.dedup();
            records.push((format!("{}.{}", group.parent.dotted, group.name), arities));
        }
        for (name, arities) in records {
            emit(plan, &name, EmittedKind::Function, arities, Some(AccessPath::Both));
        }
        Ok(())
    }

    fn plan_variables(&self, plan: &mut BackendPlan, state: &PlanState) -> Result<()> {
        for id in self.model.ids() {
            let node = self.model.node(id);
            let NodeKind::Variable(variable) = &node.kind else {
                continue;
            };
            let Some(parent) = self.placed_target(id, state)? else {
                continue;
            };
            let path = node.path.to_path_string();
            if variable.is_template {
                suppress(plan, &path, "variable template");
                continue;
            }
            if let Some((feature, detail)) = self.signature_gap([&variable.ty]) {
                gap(plan, feature, &path, detail);
                suppress(plan, &path, feature.as_str());
                continue;
            }
            emit(
                plan,
                &format!("{}.{}", parent.dotted, node.exposed_name),
                EmittedKind::Variable,
                Vec::new(),
                None,
            );
            plan.variables.push(VariablePlan {
                name: node.exposed_name.clone(),
                cpp_name: node.cpp_name(),
                parent,
            });
        }
        Ok(())
    }

    fn plan_aliases(&self, plan: &mut BackendPlan, state: &PlanState) -> Result<()> {
        for id in self.model.ids() {
            let node = self.model.node(id);
            let NodeKind::Alias(alias) = &node.kind else {
                continue;
            };
            let Some(parent) = self.placed_target(id, state)? else {
                continue;
            };
            let path = node.path.to_path_string();
            if alias.is_template {
                suppress(plan, &path, "alias template");
                continue;
            }
            let class_var = self
                .model
                .alias_class(id)
                .and_then(|class| state.class_vars.get(&class));
            let Some(class_var) = class_var else {
                suppress(plan, &path, "target is not a bound class");
                continue;
            };
            emit(
                plan,
                &format!("{}.{}", parent.dotted, node.exposed_name),
                EmittedKind::Alias,
                Vec::new(),
                None,
            );
            plan.aliases.push(AliasPlan {
                name: node.exposed_name.clone(),
                parent,
                class_var: class_var.clone(),
            });
        }
        Ok(())
    }

    fn plan_translations(&self, plan: &mut BackendPlan) {
        plan.translations = ExceptionCategory::ALL
            .iter()
            .filter_map(|&category| {
                self.exceptions
                    .translate(category)
                    .map(|host| ExceptionRecord { category, host })
            })
            .collect();
        plan.manifest.exceptions = plan.translations.clone();
    }

    /// Suppression reasons of declarations that never reached a scope
    fn record_unbound(&self, plan: &mut BackendPlan) {
        for node in self.model.nodes() {
            if matches!(node.kind, NodeKind::Root | NodeKind::Namespace) {
                if let Status::Excluded(reason) = &node.status {
                    suppress(plan, &node.path.to_path_string(), reason.clone());
                }
                continue;
            }
            let parent_status = node.parent.map(|p| &self.model.node(p).status);
            match &node.status {
                Status::Excluded(reason) if parent_status != Some(&node.status) => {
                    suppress(plan, &node.path.to_path_string(), reason.clone());
                }
                Status::Included
                    if matches!(node.kind, NodeKind::Class(_) | NodeKind::Function(_))
                        && node.exposed_name.is_empty() =>
                {
                    suppress(
                        plan,
                        &node.path.to_path_string(),
                        "template instance without binding name",
                    );
                }
                _ => {}
            }
        }
    }
}

#[derive(Debug, Default)]
struct PlanState {
    /// Bound class → variable holding its class object
    class_vars: HashMap<NodeId, String>,
    implicit_holders: HashMap<NodeId, SmartPointerKind>,
}

/// Overridable slots with wrapper helper names; private slots are skipped
fn trampoline_slots(table: &DispatchTable) -> Vec<TrampolineSlot> {
    let mut slots: Vec<TrampolineSlot> = Vec::new();
    for entry in table.entries() {
        if entry.access == Access::Private {
            continue;
        }
        let same_name = slots.iter().filter(|s| s.entry.name == entry.name).count();
        let default_helper = if same_name == 0 {
            format!("default_{}", entry.name)
        } else {
            format!("default_{}_{}", entry.name, same_name)
        };
        slots.push(TrampolineSlot {
            entry: entry.clone(),
            default_helper,
        });
    }
    slots
}

fn emit(plan: &mut BackendPlan, name: &str, kind: EmittedKind, arities: Vec<usize>, access: Option<AccessPath>) {
    plan.manifest.emitted.push(Emitted {
        name: name.to_string(),
        kind,
        arities,
        access,
    });
}

fn suppress(plan: &mut BackendPlan, path: &str, reason: impl Into<String>) {
    let reason = reason.into();
    debug!("Suppressed {} ({})", path, reason);
    plan.manifest.suppressed.push(Suppressed {
        path: path.to_string(),
        reason,
    });
}

fn gap(plan: &mut BackendPlan, feature: Feature, path: &str, detail: impl Into<String>) {
    let detail = detail.into();
    debug!("{} gap at {}: {}", feature, path, detail);
    plan.manifest.gaps.push(Gap {
        feature,
        path: path.to_string(),
        detail,
    });
}

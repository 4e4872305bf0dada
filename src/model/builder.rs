//! Model construction from front-end declarations
//!
//! Construction runs in phases:
//! 1. Create nodes for every declaration (namespaces are merged by path)
//! 2. Materialize template instantiations with substituted members
//! 3. Link base classes
//! 4. Validate alias targets
//! 5. Compute abstractness from the dispatch tables
//!
//! Any unresolved reference aborts construction.

use super::node::*;
use super::Model;
use crate::decl::{
    Access, BaseDecl, ClassDecl, Decl, FunctionDecl, MethodDecl, ParamDecl, TemplateDecl,
    TemplatePattern, TranslationUnitDecl, TypeRef,
};
use crate::dispatch::DispatchTable;
use crate::path::DeclPath;
use crate::{ConfigErrorKind, Error, Result};
use tracing::debug;

type Bindings = [(String, TypeRef)];

/// Segment used for anonymous enums
const ANONYMOUS: &str = "(anonymous)";

pub(super) struct ModelBuilder<'a> {
    unit: &'a TranslationUnitDecl,
    model: Model,
    pending_bases: Vec<(NodeId, Vec<BaseDecl>)>,
    pending_templates: Vec<(NodeId, &'a TemplateDecl)>,
}

impl<'a> ModelBuilder<'a> {
    pub(super) fn new(unit: &'a TranslationUnitDecl) -> Self {
        Self {
            unit,
            model: Model::empty(&unit.name, unit.headers.clone()),
            pending_bases: Vec::new(),
            pending_templates: Vec::new(),
        }
    }

    pub(super) fn build(mut self) -> Result<Model> {
        let unit = self.unit;
        for decl in &unit.decls {
            self.add_decl(NodeId::root(), decl, &[])?;
        }
        self.instantiate_templates()?;
        self.link_bases()?;
        self.check_aliases()?;
        self.compute_abstractness();

        debug!(
            "Built model for {} with {} declarations",
            self.model.unit_name(),
            self.model.len() - 1
        );
        Ok(self.model)
    }

    fn path_of(&self, parent: NodeId) -> DeclPath {
        self.model.node(parent).path.clone()
    }

    fn new_node(&self, parent: NodeId, name: &str, access: Access, kind: NodeKind) -> Node {
        Node {
            id: NodeId::root(),
            name: name.to_string(),
            exposed_name: name.to_string(),
            path: self.path_of(parent).join(name),
            parent: Some(parent),
            children: Vec::new(),
            access,
            status: Status::Included,
            kind,
        }
    }

    fn add_decl(&mut self, parent: NodeId, decl: &'a Decl, bindings: &Bindings) -> Result<()> {
        match decl {
            Decl::Namespace(ns) => {
                let path = self.path_of(parent).join(&ns.name);
                let existing = self
                    .model
                    .lookup(&path)
                    .iter()
                    .copied()
                    .find(|id| self.model.node(*id).is_namespace());
                let id = match existing {
                    Some(id) => id,
                    None => {
                        let node = self.new_node(parent, &ns.name, Access::Public, NodeKind::Namespace);
                        self.model.push(node)
                    }
                };
                for child in &ns.decls {
                    self.add_decl(id, child, bindings)?;
                }
            }
            Decl::Class(class) => {
                self.add_class(parent, class, &class.name, &class.name, bindings, None)?;
            }
            Decl::Function(function) => {
                let kind = NodeKind::Function(function_node(function, bindings, None));
                let node = self.new_node(parent, &function.name, Access::Public, kind);
                self.model.push(node);
            }
            Decl::Enum(e) => {
                let anonymous = e.name.is_empty();
                let name = if anonymous { ANONYMOUS } else { e.name.as_str() };
                let kind = NodeKind::Enum(EnumNode {
                    scoped: e.scoped,
                    anonymous,
                    values: e
                        .values
                        .iter()
                        .map(|v| EnumValue {
                            label: v.label.clone(),
                            value: v.value,
                        })
                        .collect(),
                });
                let mut node = self.new_node(parent, name, e.access, kind);
                if anonymous {
                    node.exposed_name.clear();
                }
                self.model.push(node);
            }
            Decl::Variable(var) => {
                let kind = NodeKind::Variable(VariableNode {
                    ty: var.ty.substitute(bindings),
                    is_const: var.is_const,
                    is_template: var.is_template,
                });
                let node = self.new_node(parent, &var.name, Access::Public, kind);
                self.model.push(node);
            }
            Decl::Alias(alias) => {
                let kind = NodeKind::Alias(AliasNode {
                    target: alias.target.substitute(bindings),
                    is_template: alias.is_template,
                });
                let node = self.new_node(parent, &alias.name, alias.access, kind);
                self.model.push(node);
            }
            Decl::Template(template) => {
                let kind = NodeKind::Template(TemplateNode {
                    params: template.params.clone(),
                    is_class: matches!(template.pattern, TemplatePattern::Class(_)),
                    instances: Vec::new(),
                });
                let access = match &template.pattern {
                    TemplatePattern::Class(class) => class.access,
                    TemplatePattern::Function(_) => Access::Public,
                };
                let node = self.new_node(parent, &template.name, access, kind);
                let id = self.model.push(node);
                self.pending_templates.push((id, template));
            }
        }
        Ok(())
    }

    fn add_class(
        &mut self,
        parent: NodeId,
        decl: &'a ClassDecl,
        name: &str,
        exposed_name: &str,
        bindings: &Bindings,
        instance_of: Option<NodeId>,
    ) -> Result<NodeId> {
        let class = ClassNode {
            bases: Vec::new(),
            constructors: decl
                .constructors
                .iter()
                .map(|c| Constructor {
                    params: params(&c.params, bindings),
                    access: c.access,
                    is_deleted: c.is_deleted,
                    is_copy_or_move: c.is_copy_or_move,
                    status: Status::Included,
                })
                .collect(),
            methods: decl.methods.iter().map(|m| method(m, bindings)).collect(),
            fields: decl
                .fields
                .iter()
                .map(|f| Field {
                    name: f.name.clone(),
                    exposed_name: f.name.clone(),
                    ty: f.ty.substitute(bindings),
                    is_static: f.is_static,
                    is_const: f.is_const,
                    access: f.access,
                    status: Status::Included,
                })
                .collect(),
            is_abstract: false,
            is_copyable: decl.is_copyable,
            is_final: decl.is_final,
            holder: decl.holder,
            expose_constructor_params: decl.expose_constructor_params,
            doc: decl.doc.clone(),
            instance_of,
        };

        let mut node = self.new_node(parent, name, decl.access, NodeKind::Class(class));
        node.exposed_name = exposed_name.to_string();
        let id = self.model.push(node);
        if !decl.bases.is_empty() {
            self.pending_bases.push((id, decl.bases.clone()));
        }

        for nested in &decl.nested {
            self.add_decl(id, nested, bindings)?;
        }
        Ok(id)
    }

    fn instantiate_templates(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending_templates);
        for (template_id, template) in pending {
            let template_path = self.model.node(template_id).path.clone();
            let parent = self.model.node(template_id).parent.unwrap_or_default();

            for instantiation in &template.instantiations {
                if instantiation.args.len() != template.params.len() {
                    return Err(Error::config(
                        &template_path,
                        ConfigErrorKind::TemplateArity {
                            expected: template.params.len(),
                            found: instantiation.args.len(),
                        },
                    ));
                }
                for arg in &instantiation.args {
                    if let Some(missing) = self.first_unknown_path(arg) {
                        return Err(Error::config(
                            &template_path,
                            ConfigErrorKind::UnresolvedTemplateArgument(missing),
                        ));
                    }
                }

                let path = Model::instance_path(&template_path, &instantiation.args);
                if !self.model.lookup(&path).is_empty() {
                    continue;
                }
                let segment = path.leaf().to_string();
                let exposed = instantiation.binding_name.clone().unwrap_or_default();
                let bindings: Vec<(String, TypeRef)> = template
                    .params
                    .iter()
                    .cloned()
                    .zip(instantiation.args.iter().cloned())
                    .collect();

                let instance = match &template.pattern {
                    TemplatePattern::Class(pattern) => self.add_class(
                        parent,
                        pattern,
                        &segment,
                        &exposed,
                        &bindings,
                        Some(template_id),
                    )?,
                    TemplatePattern::Function(pattern) => {
                        let kind = NodeKind::Function(function_node(
                            pattern,
                            &bindings,
                            Some(template_id),
                        ));
                        let mut node = self.new_node(parent, &segment, Access::Public, kind);
                        node.exposed_name = exposed;
                        self.model.push(node)
                    }
                };
                debug!("Instantiated {}", path);

                if let NodeKind::Template(t) = &mut self.model.node_mut(template_id).kind {
                    t.instances.push(instance);
                }
            }
        }
        Ok(())
    }

    /// First named path in `ty` that the model does not declare
    fn first_unknown_path(&self, ty: &TypeRef) -> Option<String> {
        let mut missing = None;
        ty.walk(&mut |inner| {
            if missing.is_some() {
                return;
            }
            let path = match inner {
                TypeRef::Named { path } => path,
                TypeRef::Instance { template, .. } => template,
                _ => return,
            };
            if self.model.lookup(path).is_empty() {
                missing = Some(path.to_path_string());
            }
        });
        missing
    }

    fn link_bases(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending_bases);
        for (class_id, bases) in pending {
            let mut links = Vec::with_capacity(bases.len());
            for base in &bases {
                let resolved = self
                    .model
                    .lookup(&base.path)
                    .iter()
                    .find_map(|id| self.model.alias_class(*id));
                let Some(base_id) = resolved else {
                    return Err(Error::config(
                        &self.model.node(class_id).path,
                        ConfigErrorKind::UnresolvedBase(base.path.to_path_string()),
                    ));
                };
                links.push(BaseLink {
                    class: base_id,
                    access: base.access,
                });
            }
            if let Some(class) = self.model.node_mut(class_id).as_class_mut() {
                class.bases = links;
            }
        }
        Ok(())
    }

    fn check_aliases(&self) -> Result<()> {
        for node in self.model.nodes() {
            let NodeKind::Alias(alias) = &node.kind else {
                continue;
            };
            if alias.is_template {
                continue;
            }
            if let Some(missing) = self.first_unknown_path(&alias.target) {
                return Err(Error::config(
                    &node.path,
                    ConfigErrorKind::UnresolvedAliasTarget(missing),
                ));
            }
        }
        Ok(())
    }

    fn compute_abstractness(&mut self) {
        for id in self.model.classes_base_first() {
            let is_abstract = DispatchTable::build(&self.model, id).has_pure();
            if let Some(class) = self.model.node_mut(id).as_class_mut() {
                class.is_abstract = is_abstract;
            }
        }
    }
}

fn params(decls: &[ParamDecl], bindings: &Bindings) -> Vec<Param> {
    decls
        .iter()
        .map(|p| Param {
            name: p.name.clone(),
            ty: p.ty.substitute(bindings),
            default: p.default.clone(),
            suppressed: false,
        })
        .collect()
}

fn method(decl: &MethodDecl, bindings: &Bindings) -> Method {
    Method {
        name: decl.name.clone(),
        exposed_name: decl.name.clone(),
        params: params(&decl.params, bindings),
        return_type: decl.return_type.substitute(bindings),
        virtuality: decl.virtuality,
        is_static: decl.is_static,
        is_const: decl.is_const,
        access: decl.access,
        operator: decl.operator,
        is_deleted: decl.is_deleted,
        is_conversion: decl.is_conversion,
        is_template: decl.is_template,
        throws: decl.throws.clone(),
        doc: decl.doc.clone(),
        return_policy: None,
        status: Status::Included,
    }
}

fn function_node(decl: &FunctionDecl, bindings: &Bindings, instance_of: Option<NodeId>) -> FunctionNode {
    FunctionNode {
        params: params(&decl.params, bindings),
        return_type: decl.return_type.substitute(bindings),
        operator: decl.operator,
        throws: decl.throws.clone(),
        doc: decl.doc.clone(),
        return_policy: None,
        instance_of,
    }
}

#[cfg(test)]
mod tests {
    use crate::decl::*;
    use crate::fixtures;
    use crate::model::{Model, NodeKind};
    use crate::path::DeclPath;
    use crate::{ConfigErrorKind, Error};

    fn path(s: &str) -> DeclPath {
        DeclPath::parse(s).unwrap()
    }

    fn class(name: &str) -> ClassDecl {
        ClassDecl {
            name: name.to_string(),
            is_copyable: true,
            ..Default::default()
        }
    }

    fn unit_with(decls: Vec<Decl>) -> TranslationUnitDecl {
        TranslationUnitDecl {
            name: "test".to_string(),
            headers: Vec::new(),
            decls: vec![Decl::Namespace(NamespaceDecl {
                name: "ns".to_string(),
                decls,
            })],
        }
    }

    #[test]
    fn test_abstractness_follows_base_chain() {
        let model = Model::build(&fixtures::class_unit()).unwrap();
        let animal = model
            .lookup_class(&path("chimera_test::nested_namespace::Animal"))
            .unwrap();
        let dog = model
            .lookup_class(&path("chimera_test::nested_namespace::Dog"))
            .unwrap();
        assert!(model.class(animal).unwrap().is_abstract);
        assert!(!model.class(dog).unwrap().is_abstract);
    }

    #[test]
    fn test_reopened_namespace_is_merged() {
        let unit = TranslationUnitDecl {
            name: "test".to_string(),
            headers: Vec::new(),
            decls: vec![
                Decl::Namespace(NamespaceDecl {
                    name: "ns".to_string(),
                    decls: vec![Decl::Class(class("A"))],
                }),
                Decl::Namespace(NamespaceDecl {
                    name: "ns".to_string(),
                    decls: vec![Decl::Class(class("B"))],
                }),
            ],
        };
        let model = Model::build(&unit).unwrap();
        assert_eq!(model.lookup(&path("ns")).len(), 1);
        assert_eq!(model.children(model.lookup(&path("ns"))[0]).len(), 2);
    }

    #[test]
    fn test_unresolved_base_is_fatal() {
        let mut derived = class("Derived");
        derived.bases.push(BaseDecl {
            path: path("ns::Missing"),
            access: Access::Public,
        });
        let err = Model::build(&unit_with(vec![Decl::Class(derived)])).unwrap_err();
        match err {
            Error::Config { path, kind } => {
                assert_eq!(path.to_path_string(), "ns::Derived");
                assert_eq!(kind, ConfigErrorKind::UnresolvedBase("ns::Missing".into()));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unresolved_alias_target_is_fatal() {
        let alias = Decl::Alias(AliasDecl {
            name: "Handle".to_string(),
            target: TypeRef::named("ns::Nowhere"),
            access: Access::Public,
            is_template: false,
        });
        let err = Model::build(&unit_with(vec![alias])).unwrap_err();
        assert!(matches!(
            err,
            Error::Config {
                kind: ConfigErrorKind::UnresolvedAliasTarget(_),
                ..
            }
        ));
    }

    #[test]
    fn test_template_arity_is_checked() {
        let template = Decl::Template(TemplateDecl {
            name: "Box".to_string(),
            params: vec!["T".to_string()],
            pattern: TemplatePattern::Class(class("Box")),
            instantiations: vec![InstantiationDecl {
                args: vec![TypeRef::builtin("int"), TypeRef::builtin("int")],
                binding_name: Some("BoxInt".to_string()),
            }],
        });
        let err = Model::build(&unit_with(vec![template])).unwrap_err();
        assert!(matches!(
            err,
            Error::Config {
                kind: ConfigErrorKind::TemplateArity { expected: 1, found: 2 },
                ..
            }
        ));
    }

    #[test]
    fn test_unresolved_template_argument_is_fatal() {
        let template = Decl::Template(TemplateDecl {
            name: "Box".to_string(),
            params: vec!["T".to_string()],
            pattern: TemplatePattern::Class(class("Box")),
            instantiations: vec![InstantiationDecl {
                args: vec![TypeRef::named("ns::Unknown")],
                binding_name: None,
            }],
        });
        let err = Model::build(&unit_with(vec![template])).unwrap_err();
        assert!(matches!(
            err,
            Error::Config {
                kind: ConfigErrorKind::UnresolvedTemplateArgument(_),
                ..
            }
        ));
    }

    #[test]
    fn test_instantiation_substitutes_members() {
        let model = Model::build(&fixtures::template_unit()).unwrap();
        let id = model
            .lookup_class(&path("chimera_test::Vector<double>"))
            .unwrap();
        let node = model.node(id);
        assert_eq!(node.exposed_name, "VectorDouble");
        let class = node.as_class().unwrap();
        let get = class.methods.iter().find(|m| m.name == "get").unwrap();
        assert_eq!(get.return_type.spelling(), "double");
        assert!(class.instance_of.is_some());

        // Instantiation without a binding name is materialized but unnamed
        let unnamed = model.lookup_class(&path("chimera_test::Vector<int>")).unwrap();
        assert!(model.node(unnamed).exposed_name.is_empty());
    }

    #[test]
    fn test_anonymous_enum_has_no_exposed_name() {
        let model = Model::build(&fixtures::enum_unit()).unwrap();
        let anonymous = model
            .nodes()
            .find(|n| matches!(&n.kind, NodeKind::Enum(e) if e.anonymous))
            .unwrap();
        assert!(anonymous.exposed_name.is_empty());
        assert_eq!(anonymous.path.to_path_string(), "chimera_test::test1::(anonymous)");
    }
}

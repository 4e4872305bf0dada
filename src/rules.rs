//! Matching layer
//!
//! Applies the configured rules to a freshly built model:
//! 1. Mark declarations outside the input namespaces as ignored
//! 2. Hide namespaces named in `hidden` unless a rule includes their contents
//! 3. Apply include/exclude (last match wins) and rename (last match wins)
//! 4. Accumulate `suppress_param` indices, register holders and apply
//!    return policy and copyability overrides
//! 5. Propagate exclusion to callables whose signature names an excluded type
//! 6. Reject conflicting exposed names
//!
//! This is the only phase that mutates the model after construction.

use crate::config::{Configuration, ReturnPolicy, RuleAction};
use crate::decl::{Access, SmartPointerKind, TypeRef};
use crate::model::{Model, NodeId, NodeKind, Param, Status};
use crate::path::DeclPath;
use crate::{ConfigErrorKind, Error, Result};
use glob::Pattern;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Compiled rule set
pub struct Matcher {
    rules: Vec<(Pattern, RuleAction)>,
}

impl Matcher {
    pub fn new(config: &Configuration) -> Result<Self> {
        let rules = config
            .rules
            .iter()
            .map(|rule| {
                Pattern::new(&rule.pattern)
                    .map(|pattern| (pattern, rule.action.clone()))
                    .map_err(|_| {
                        Error::config(
                            &DeclPath::root(),
                            ConfigErrorKind::InvalidPattern(rule.pattern.clone()),
                        )
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    fn matching<'a>(&'a self, path: &str) -> impl Iterator<Item = (&'a Pattern, &'a RuleAction)> {
        self.rules
            .iter()
            .filter(move |(pattern, _)| pattern.matches(path))
            .map(|(pattern, action)| (pattern, action))
    }

    /// Last matching include/exclude: `Some(true)` to include, with the pattern
    pub fn decision(&self, path: &str) -> Option<(bool, &str)> {
        self.matching(path)
            .filter_map(|(pattern, action)| match action {
                RuleAction::Include => Some((true, pattern.as_str())),
                RuleAction::Exclude => Some((false, pattern.as_str())),
                _ => None,
            })
            .last()
    }

    pub fn rename(&self, path: &str) -> Option<&str> {
        self.matching(path)
            .filter_map(|(_, action)| match action {
                RuleAction::Rename(name) => Some(name.as_str()),
                _ => None,
            })
            .last()
    }

    /// All suppressed indices, deduplicated and sorted
    pub fn suppressed_params(&self, path: &str) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .matching(path)
            .filter_map(|(_, action)| match action {
                RuleAction::SuppressParam(index) => Some(*index),
                _ => None,
            })
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    pub fn holder(&self, path: &str) -> Option<SmartPointerKind> {
        self.matching(path)
            .filter_map(|(_, action)| match action {
                RuleAction::Holder(kind) => Some(*kind),
                _ => None,
            })
            .last()
    }

    pub fn return_policy(&self, path: &str) -> Option<ReturnPolicy> {
        self.matching(path)
            .filter_map(|(_, action)| match action {
                RuleAction::ReturnPolicy(policy) => Some(*policy),
                _ => None,
            })
            .last()
    }

    pub fn copyable(&self, path: &str) -> Option<bool> {
        self.matching(path)
            .filter_map(|(_, action)| match action {
                RuleAction::Copyable(copyable) => Some(*copyable),
                _ => None,
            })
            .last()
    }
}

/// Apply `config` to `model`
pub fn apply(model: &mut Model, config: &Configuration) -> Result<()> {
    let matcher = Matcher::new(config)?;
    assign_status(model, config, &matcher);
    apply_member_rules(model, &matcher)?;
    propagate_exclusions(model);
    check_conflicts(model)?;

    let excluded = model
        .nodes()
        .filter(|n| matches!(n.status, Status::Excluded(_) | Status::Hidden))
        .count();
    info!(
        "Applied {} rules to {}: {} declarations excluded or hidden",
        config.rules.len(),
        model.unit_name(),
        excluded
    );
    Ok(())
}

fn assign_status(model: &mut Model, config: &Configuration, matcher: &Matcher) {
    let inputs = &config.module.namespaces;
    let ids: Vec<NodeId> = model.ids().skip(1).collect();

    for id in ids {
        let node = model.node(id);
        let path = node.path.clone();
        let path_str = path.to_path_string();

        if !inputs.iter().any(|ns| path.starts_with(ns)) {
            model.node_mut(id).status = Status::Outside;
            continue;
        }

        let is_input = inputs.iter().any(|ns| *ns == path);
        let parent = node.parent.unwrap_or_default();
        let mut status = if is_input {
            Status::Included
        } else {
            model.node(parent).status.clone()
        };

        // Instances follow their template unless matched themselves
        let template = match &node.kind {
            NodeKind::Class(class) => class.instance_of,
            NodeKind::Function(function) => function.instance_of,
            _ => None,
        };
        if let Some(template) = template {
            if let Status::Excluded(_) = model.node(template).status {
                status = Status::excluded(format!(
                    "template {} is excluded",
                    model.node(template).path
                ));
            }
        }

        if !is_input && node.is_namespace() && config.is_hidden(&node.name) {
            status = Status::Hidden;
        }

        match matcher.decision(&path_str) {
            Some((true, _)) => status = Status::Included,
            Some((false, pattern)) => {
                status = Status::excluded(format!("excluded by rule '{}'", pattern))
            }
            None => {}
        }

        // Generated code cannot name non-public declarations
        if node.access != Access::Public && status.is_included() {
            status = Status::excluded("not public");
        }

        let rename = matcher.rename(&path_str).map(str::to_string);
        let holder = matcher.holder(&path_str);
        let copyable = matcher.copyable(&path_str);

        let node = model.node_mut(id);
        if status != Status::Included {
            debug!("{} is not bound: {:?}", path_str, status);
        }
        node.status = status;
        if let Some(name) = rename {
            debug!("Renamed {} to {}", path_str, name);
            node.exposed_name = name;
        }
        if let Some(class) = node.as_class_mut() {
            if let Some(kind) = holder {
                class.holder = Some(kind);
            }
            if let Some(copyable) = copyable {
                class.is_copyable = copyable;
            }
        }
    }
}

fn suppress(params: &mut [Param], indices: &[usize], path: &str) -> Result<()> {
    for &index in indices {
        let arity = params.len();
        let param = params.get_mut(index).ok_or_else(|| {
            Error::config(
                &DeclPath::parse(path).unwrap_or_default(),
                ConfigErrorKind::SuppressParamOutOfRange { index, arity },
            )
        })?;
        param.suppressed = true;
    }
    Ok(())
}

fn apply_member_rules(model: &mut Model, matcher: &Matcher) -> Result<()> {
    let ids: Vec<NodeId> = model.ids().collect();
    for id in ids {
        let path = model.node(id).path.clone();
        let node = model.node_mut(id);
        match &mut node.kind {
            NodeKind::Function(function) => {
                let path_str = path.to_path_string();
                suppress(&mut function.params, &matcher.suppressed_params(&path_str), &path_str)?;
                function.return_policy = matcher.return_policy(&path_str);
            }
            NodeKind::Class(class) => {
                let ctor_name = node.name.split('<').next().unwrap_or_default().to_string();
                let ctor_path = path.join(ctor_name).to_path_string();
                let ctor_indices = matcher.suppressed_params(&ctor_path);
                let ctor_decision = matcher.decision(&ctor_path);
                for ctor in &mut class.constructors {
                    suppress(&mut ctor.params, &ctor_indices, &ctor_path)?;
                    if let Some((false, pattern)) = ctor_decision {
                        ctor.status = Status::excluded(format!("excluded by rule '{}'", pattern));
                    }
                }

                for method in &mut class.methods {
                    let member = path.join(&method.name).to_path_string();
                    suppress(&mut method.params, &matcher.suppressed_params(&member), &member)?;
                    method.return_policy = matcher.return_policy(&member);
                    match matcher.decision(&member) {
                        Some((true, _)) => method.status = Status::Included,
                        Some((false, pattern)) => {
                            method.status =
                                Status::excluded(format!("excluded by rule '{}'", pattern))
                        }
                        None => {}
                    }
                    if let Some(name) = matcher.rename(&member) {
                        method.exposed_name = name.to_string();
                    }
                }

                for field in &mut class.fields {
                    let member = path.join(&field.name).to_path_string();
                    match matcher.decision(&member) {
                        Some((true, _)) => field.status = Status::Included,
                        Some((false, pattern)) => {
                            field.status =
                                Status::excluded(format!("excluded by rule '{}'", pattern))
                        }
                        None => {}
                    }
                    if let Some(name) = matcher.rename(&member) {
                        field.exposed_name = name.to_string();
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// First excluded class or template a type mentions
fn excluded_reference(model: &Model, excluded: &HashSet<NodeId>, ty: &TypeRef) -> Option<String> {
    model
        .referenced_nodes(ty)
        .into_iter()
        .find(|id| excluded.contains(id))
        .map(|id| format!("refers to excluded {}", model.node(id).path))
}

fn signature_reason(
    model: &Model,
    excluded: &HashSet<NodeId>,
    params: &[Param],
    return_type: &TypeRef,
) -> Option<String> {
    params
        .iter()
        .map(|p| &p.ty)
        .chain(std::iter::once(return_type))
        .find_map(|ty| excluded_reference(model, excluded, ty))
}

fn propagate_exclusions(model: &mut Model) {
    let excluded: HashSet<NodeId> = model
        .nodes()
        .filter(|n| matches!(n.kind, NodeKind::Class(_) | NodeKind::Template(_)))
        .filter(|n| matches!(n.status, Status::Excluded(_)))
        .map(|n| n.id)
        .collect();
    if excluded.is_empty() {
        return;
    }

    let ids: Vec<NodeId> = model.ids().collect();
    for id in ids {
        let node = model.node(id);
        if !node.status.is_included() {
            continue;
        }
        match &node.kind {
            NodeKind::Function(function) => {
                if let Some(reason) =
                    signature_reason(model, &excluded, &function.params, &function.return_type)
                {
                    debug!("Suppressing {}: {}", node.path, reason);
                    model.node_mut(id).status = Status::Excluded(reason);
                }
            }
            NodeKind::Class(class) => {
                let method_reasons: Vec<Option<String>> = class
                    .methods
                    .iter()
                    .map(|m| signature_reason(model, &excluded, &m.params, &m.return_type))
                    .collect();
                let ctor_reasons: Vec<Option<String>> = class
                    .constructors
                    .iter()
                    .map(|c| signature_reason(model, &excluded, &c.params, &TypeRef::Void))
                    .collect();
                let field_reasons: Vec<Option<String>> = class
                    .fields
                    .iter()
                    .map(|f| excluded_reference(model, &excluded, &f.ty))
                    .collect();

                if let Some(class) = model.node_mut(id).as_class_mut() {
                    for (method, reason) in class.methods.iter_mut().zip(method_reasons) {
                        if let (Some(reason), true) = (reason, method.status.is_included()) {
                            method.status = Status::Excluded(reason);
                        }
                    }
                    for (ctor, reason) in class.constructors.iter_mut().zip(ctor_reasons) {
                        if let (Some(reason), true) = (reason, ctor.status.is_included()) {
                            ctor.status = Status::Excluded(reason);
                        }
                    }
                    for (field, reason) in class.fields.iter_mut().zip(field_reasons) {
                        if let (Some(reason), true) = (reason, field.status.is_included()) {
                            field.status = Status::Excluded(reason);
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// Kind tag for name conflicts; overloads share a tag
fn conflict_kind(kind: &NodeKind) -> Option<&'static str> {
    match kind {
        NodeKind::Template(_) | NodeKind::Root => None,
        other => Some(other.label()),
    }
}

fn check_conflicts(model: &Model) -> Result<()> {
    for scope in model.nodes() {
        if !scope.status.is_included() {
            continue;
        }
        let mut names = ExposedNames::default();

        for child in scope.children.iter().map(|id| model.node(*id)) {
            if !child.status.is_included() || child.exposed_name.is_empty() {
                continue;
            }
            if let Some(kind) = conflict_kind(&child.kind) {
                names.claim(&child.exposed_name, kind, &child.path)?;
            }
        }

        if let Some(class) = scope.as_class() {
            for method in class.methods.iter().filter(|m| m.status.is_included()) {
                if method.operator.is_none() {
                    names.claim(&method.exposed_name, "method", &scope.path.join(&method.name))?;
                }
            }
            for field in class.fields.iter().filter(|f| f.status.is_included()) {
                names.claim(&field.exposed_name, "field", &scope.path.join(&field.name))?;
            }
        }
    }
    Ok(())
}

/// Exposed names already taken in one scope
#[derive(Default)]
struct ExposedNames {
    taken: HashMap<String, (&'static str, DeclPath)>,
}

impl ExposedNames {
    fn claim(&mut self, name: &str, kind: &'static str, path: &DeclPath) -> Result<()> {
        match self.taken.get(name) {
            Some((existing, first)) if *existing != kind => Err(Error::config(
                path,
                ConfigErrorKind::ConflictingRename {
                    name: name.to_string(),
                    first: format!("{} {}", existing, first),
                    second: format!("{} {}", kind, path),
                },
            )),
            Some(_) => Ok(()),
            None => {
                self.taken.insert(name.to_string(), (kind, path.clone()));
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleAction;
    use crate::fixtures;

    fn path(s: &str) -> DeclPath {
        DeclPath::parse(s).unwrap()
    }

    fn configured(config: Configuration) -> Model {
        let mut model = Model::build(&fixtures::class_unit()).unwrap();
        apply(&mut model, &config).unwrap();
        model
    }

    fn status_of(model: &Model, p: &str) -> Status {
        model.node(model.lookup(&path(p))[0]).status.clone()
    }

    #[test]
    fn test_last_matching_rule_wins() {
        let config = fixtures::class_config()
            .with_rule("chimera_test::nested_namespace::*", RuleAction::Exclude)
            .unwrap()
            .with_rule("chimera_test::nested_namespace::Dog", RuleAction::Include)
            .unwrap();
        let model = configured(config);
        assert!(status_of(&model, "chimera_test::nested_namespace::Dog").is_included());
        assert!(matches!(
            status_of(&model, "chimera_test::nested_namespace::Husky"),
            Status::Excluded(_)
        ));
    }

    #[test]
    fn test_hidden_namespace_and_explicit_include() {
        let model = configured(fixtures::class_config());
        assert_eq!(
            status_of(&model, "chimera_test::nested_namespace::detail::ClassInDetail"),
            Status::Hidden
        );

        let config = fixtures::class_config()
            .with_rule(
                "chimera_test::nested_namespace::detail::ClassInDetail",
                RuleAction::Include,
            )
            .unwrap();
        let model = configured(config);
        assert!(
            status_of(&model, "chimera_test::nested_namespace::detail::ClassInDetail")
                .is_included()
        );
        assert_eq!(
            status_of(&model, "chimera_test::nested_namespace::detail"),
            Status::Hidden
        );
    }

    #[test]
    fn test_detail_stays_hidden_with_custom_hidden_names() {
        let mut config = fixtures::class_config();
        config.module.hidden = vec!["internal".to_string()];
        let model = configured(config);
        assert_eq!(
            status_of(&model, "chimera_test::nested_namespace::detail::ClassInDetail"),
            Status::Hidden
        );
        assert!(status_of(&model, "chimera_test::nested_namespace::Dog").is_included());
    }

    #[test]
    fn test_private_nested_class_is_never_bound() {
        let config = fixtures::class_config()
            .with_rule("chimera_test::nested_namespace::*", RuleAction::Include)
            .unwrap();
        let model = configured(config);
        assert_eq!(
            status_of(
                &model,
                "chimera_test::nested_namespace::NonPublicParamInConstructor::Hidden"
            ),
            Status::excluded("not public")
        );
    }

    #[test]
    fn test_declarations_outside_inputs_are_ignored() {
        let mut config = fixtures::class_config();
        config.module.namespaces = vec![path("chimera_test::nested_namespace")];
        let model = configured(config);
        assert_eq!(status_of(&model, "chimera_test::Integer"), Status::Outside);
        assert!(status_of(&model, "chimera_test::nested_namespace::Dog").is_included());
    }

    #[test]
    fn test_suppress_param_accumulates() {
        let config = fixtures::class_config()
            .with_rule(
                "chimera_test::DefaultArguments::add",
                RuleAction::SuppressParam(0),
            )
            .unwrap()
            .with_rule(
                "chimera_test::DefaultArguments::add",
                RuleAction::SuppressParam(1),
            )
            .unwrap();
        let model = configured(config);
        let id = model
            .lookup_class(&path("chimera_test::DefaultArguments"))
            .unwrap();
        let add = &model.class(id).unwrap().methods[0];
        assert!(add.params.iter().all(|p| p.suppressed));
    }

    #[test]
    fn test_suppress_param_out_of_range() {
        let config = fixtures::class_config()
            .with_rule(
                "chimera_test::DefaultArguments::add",
                RuleAction::SuppressParam(2),
            )
            .unwrap();
        let mut model = Model::build(&fixtures::class_unit()).unwrap();
        let err = apply(&mut model, &config).unwrap_err();
        assert!(matches!(
            err,
            Error::Config {
                kind: ConfigErrorKind::SuppressParamOutOfRange { index: 2, arity: 2 },
                ..
            }
        ));
    }

    #[test]
    fn test_exclusion_propagates_to_signatures() {
        let config = fixtures::class_config()
            .with_rule("chimera_test::nested_namespace::Strong", RuleAction::Exclude)
            .unwrap();
        let model = configured(config);
        match status_of(&model, "chimera_test::make_strong") {
            Status::Excluded(reason) => assert!(reason.contains("Strong")),
            other => panic!("expected exclusion, got {other:?}"),
        }
    }

    #[test]
    fn test_conflicting_rename_is_an_error() {
        let config = fixtures::class_config()
            .with_rule("chimera_test::make_strong", RuleAction::Rename("Integer".into()))
            .unwrap();
        let mut model = Model::build(&fixtures::class_unit()).unwrap();
        let err = apply(&mut model, &config).unwrap_err();
        match err {
            Error::Config {
                kind: ConfigErrorKind::ConflictingRename { name, .. },
                ..
            } => assert_eq!(name, "Integer"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_return_policy_and_copyable_rules() {
        let config = fixtures::class_config()
            .with_rule("chimera_test::Widget::*", RuleAction::ReturnPolicy(ReturnPolicy::Reference))
            .unwrap()
            .with_rule(
                "chimera_test::Widget::peer",
                RuleAction::ReturnPolicy(ReturnPolicy::ReferenceInternal),
            )
            .unwrap()
            .with_rule(
                "chimera_test::find_widget",
                RuleAction::ReturnPolicy(ReturnPolicy::TakeOwnership),
            )
            .unwrap()
            .with_rule("chimera_test::Widget", RuleAction::Copyable(false))
            .unwrap();
        let model = configured(config);

        let widget = model.lookup_class(&path("chimera_test::Widget")).unwrap();
        let widget = model.class(widget).unwrap();
        assert!(!widget.is_copyable);
        let policy = |name: &str| {
            widget
                .methods
                .iter()
                .find(|m| m.name == name)
                .unwrap()
                .return_policy
        };
        assert_eq!(policy("label"), Some(ReturnPolicy::Reference));
        assert_eq!(policy("peer"), Some(ReturnPolicy::ReferenceInternal));

        let find = model.lookup(&path("chimera_test::find_widget"))[0];
        assert_eq!(
            model.node(find).as_function().unwrap().return_policy,
            Some(ReturnPolicy::TakeOwnership)
        );
        let main = model.lookup_class(&path("chimera_test::MainClass")).unwrap();
        assert!(model.class(main).unwrap().is_copyable);
    }

    #[test]
    fn test_rename_and_holder_rules() {
        let config = fixtures::class_config()
            .with_rule(
                "chimera_test::Integer::add",
                RuleAction::Rename("plus".into()),
            )
            .unwrap()
            .with_rule(
                "chimera_test::nested_namespace::Dog",
                RuleAction::Holder(SmartPointerKind::Shared),
            )
            .unwrap();
        let model = configured(config);
        let integer = model.lookup_class(&path("chimera_test::Integer")).unwrap();
        assert!(model
            .class(integer)
            .unwrap()
            .methods
            .iter()
            .all(|m| m.exposed_name == "plus"));
        let dog = model
            .lookup_class(&path("chimera_test::nested_namespace::Dog"))
            .unwrap();
        assert_eq!(model.class(dog).unwrap().holder, Some(SmartPointerKind::Shared));
    }
}

//! Boost.Python dialect
//!
//! Renders a [`BackendPlan`] as a `BOOST_PYTHON_MODULE` translation unit.
//! Boost.Python registers everything in the *current* scope, so nested
//! classes, enums and submodule contents are declared under a
//! `boost::python::scope` guard. Virtual slots become
//! `boost::python::wrapper` subclasses.

use super::plan::{
    BackendPlan, Callable, CallableKind, ClassPlan, EnumPlan, MethodGroupPlan, ReturnShape,
    TrampolineSlot,
};
use super::writer::{self, SourceWriter, cpp_leaf, function_pointer, include, string_literal};
use super::{Backend, Dialect};
use crate::config::ReturnPolicy;
use crate::decl::{OperatorKind, TypeRef};
use crate::model::Model;
use crate::overload::Binding;
use crate::{Error, Result};
use tracing::debug;

pub struct BoostPythonDialect;

impl Dialect for BoostPythonDialect {
    fn backend(&self) -> Backend {
        Backend::BoostPython
    }

    fn emit(&self, model: &Model, plan: &BackendPlan) -> Result<String> {
        for class in &plan.classes {
            if model.class(class.node).is_none() {
                return Err(Error::emission(
                    Backend::BoostPython,
                    &model.node(class.node).path,
                    "only class nodes can be bound as classes",
                ));
            }
        }

        let mut w = SourceWriter::new();
        preamble(&mut w, plan);
        w.line("namespace {");
        w.blank();
        for class in plan.classes.iter().filter(|c| c.has_trampoline()) {
            wrapper(&mut w, class);
        }
        for record in &plan.translations {
            w.open(format!(
                "void {}(const {} &e) {{",
                translator_name(record.category.as_str()),
                record.category.cpp_type()
            ));
            w.line(format!("PyErr_SetString({}, e.what());", record.host.py_object()));
            w.close("}");
            w.blank();
        }
        w.line("} // namespace");
        w.blank();

        w.open(format!("BOOST_PYTHON_MODULE({}) {{", plan.module));
        w.line(format!(
            "boost::python::object {} = boost::python::scope();",
            super::plan::ROOT_MODULE_VAR
        ));
        for module in &plan.modules {
            w.line(format!(
                "boost::python::object {}(boost::python::handle<>(boost::python::borrowed(PyImport_AddModule({}))));",
                module.var,
                string_literal(&module.dotted)
            ));
            w.line(format!(
                "{}.attr({}) = {};",
                module.parent.var,
                string_literal(&module.name),
                module.var
            ));
        }
        for class in &plan.classes {
            declare_class(&mut w, class);
        }
        for e in &plan.enums {
            enumeration(&mut w, e);
        }
        for class in &plan.classes {
            members(&mut w, class);
        }
        for group in &plan.functions {
            w.blank();
            w.open("{");
            w.line(format!("boost::python::scope within({});", group.parent.var));
            for callable in &group.overloads {
                w.line(format!(
                    "boost::python::def({});",
                    def_args(&group.name, callable, None)
                ));
            }
            w.close("}");
        }
        for variable in &plan.variables {
            w.line(format!(
                "{}.attr({}) = {};",
                variable.parent.var,
                string_literal(&variable.name),
                variable.cpp_name
            ));
        }
        for alias in &plan.aliases {
            w.line(format!(
                "{}.attr({}) = {};",
                alias.parent.var,
                string_literal(&alias.name),
                alias.class_var
            ));
        }
        if !plan.translations.is_empty() {
            w.blank();
        }
        // The most recently registered translator is tried first
        for record in plan.translations.iter().rev() {
            w.line(format!(
                "boost::python::register_exception_translator<{}>(&{});",
                record.category.cpp_type(),
                translator_name(record.category.as_str())
            ));
        }
        w.close("}");

        debug!("Rendered Boost.Python module {}", plan.module);
        Ok(w.finish())
    }
}

fn preamble(w: &mut SourceWriter, plan: &BackendPlan) {
    w.line(format!(
        "// Generated by chimera for module {} (Boost.Python {}). Do not edit.",
        plan.module, plan.version
    ));
    w.line("#include <boost/python.hpp>");
    w.line("#include <exception>");
    w.line("#include <memory>");
    w.line("#include <new>");
    w.line("#include <stdexcept>");
    for header in &plan.headers {
        w.line(include(header));
    }
    w.blank();
}

fn translator_name(category: &str) -> String {
    format!("translate_{}", category)
}

fn wrapper_name(class: &ClassPlan) -> String {
    format!("{}_wrapper", class.mangled)
}

fn wrapper(w: &mut SourceWriter, class: &ClassPlan) {
    let name = wrapper_name(class);
    w.open(format!(
        "struct {} : {}, boost::python::wrapper<{}> {{",
        name, class.cpp_name, class.cpp_name
    ));
    w.line(format!("using {}::{};", class.cpp_name, cpp_leaf(&class.cpp_name)));
    for slot in &class.trampoline {
        w.blank();
        override_slot(w, class, slot);
    }
    w.close("};");
    w.blank();
}

fn override_slot(w: &mut SourceWriter, class: &ClassPlan, slot: &TrampolineSlot) {
    let entry = &slot.entry;
    let constness = if entry.is_const { " const" } else { "" };
    let ret = entry.return_type.spelling();
    let args: Vec<String> = entry
        .params
        .iter()
        .enumerate()
        .map(|(i, p)| writer::param_name(p, i))
        .collect();
    let args = args.join(", ");
    let returns = if entry.return_type.is_void() { "" } else { "return " };

    w.open(format!(
        "{} {}({}){} override {{",
        ret,
        entry.name,
        writer::param_list(&entry.params),
        constness
    ));
    if entry.is_pure {
        w.line(format!(
            "{}this->get_override({})({});",
            returns,
            string_literal(&entry.name),
            args
        ));
        w.close("}");
        return;
    }
    w.open(format!(
        "if (boost::python::override f = this->get_override({})) {{",
        string_literal(&entry.name)
    ));
    if entry.return_type.is_void() {
        w.line(format!("f({});", args));
        w.line("return;");
    } else {
        w.line(format!("return f({});", args));
    }
    w.close("}");
    w.line(format!("{}{}::{}({});", returns, class.cpp_name, entry.name, args));
    w.close("}");
    w.blank();
    w.open(format!(
        "{} {}({}){} {{",
        ret,
        slot.default_helper,
        writer::param_list(&entry.params),
        constness
    ));
    w.line(format!(
        "{}this->{}::{}({});",
        returns, class.cpp_name, entry.name, args
    ));
    w.close("}");
}

fn declare_class(w: &mut SourceWriter, class: &ClassPlan) {
    let held = if class.has_trampoline() {
        wrapper_name(class)
    } else {
        class.cpp_name.clone()
    };
    let mut params = vec![held.clone()];
    if !class.bases.is_empty() {
        params.push(format!("boost::python::bases<{}>", class.bases.join(", ")));
    }
    if let Some(holder) = class.holder {
        params.push(format!("{}<{}>", holder.spelling(), held));
    }
    if !class.copyable || class.has_trampoline() || class.is_abstract {
        params.push("boost::noncopyable".to_string());
    }
    let mut args = vec![string_literal(&class.name)];
    if let Some(doc) = &class.doc {
        args.push(string_literal(doc));
    }
    args.push("boost::python::no_init".to_string());

    w.blank();
    w.open(format!("auto {} = [&] {{", class.var));
    w.line(format!("boost::python::scope within({});", class.parent.var));
    w.line(format!(
        "return boost::python::class_<{}>({});",
        params.join(", "),
        args.join(", ")
    ));
    w.close("}();");
}

fn enumeration(w: &mut SourceWriter, e: &EnumPlan) {
    w.blank();
    if e.anonymous {
        for value in &e.values {
            w.line(format!(
                "{}.attr({}) = static_cast<long long>({});",
                e.parent.var,
                string_literal(&value.label),
                e.value_cpp(&value.label)
            ));
        }
        return;
    }
    w.open("{");
    w.line(format!("boost::python::scope within({});", e.parent.var));
    w.line(format!(
        "boost::python::enum_<{}>({})",
        e.cpp_name,
        string_literal(&e.name)
    ));
    w.indent();
    for value in &e.values {
        w.line(format!(
            ".value({}, {})",
            string_literal(&value.label),
            e.value_cpp(&value.label)
        ));
    }
    if e.export.hoisted {
        w.line(".export_values()");
    }
    w.line(";");
    w.dedent();
    w.close("}");
}

fn members(w: &mut SourceWriter, class: &ClassPlan) {
    if class.constructors.is_empty() && class.methods.is_empty() && class.fields.is_empty() {
        return;
    }
    w.blank();
    for ctor in &class.constructors {
        constructor(w, class, ctor);
    }
    for group in &class.methods {
        method_group(w, class, group);
    }
    for field in &class.fields {
        w.line(format!(
            "{}.{}({}, &{});",
            class.var,
            if field.readonly {
                "def_readonly"
            } else {
                "def_readwrite"
            },
            string_literal(&field.name),
            field.cpp_name
        ));
    }
}

fn constructor(w: &mut SourceWriter, class: &ClassPlan, ctor: &Callable) {
    if ctor.has_suppressed() {
        let mut factory = ctor.clone();
        if class.has_trampoline() {
            factory.owner = Some(wrapper_name(class));
        }
        let mut args = vec![writer::forwarding_lambda(&factory, "+")];
        if let Some(keywords) = keywords(ctor, false) {
            args.push("boost::python::default_call_policies()".to_string());
            args.push(keywords);
        }
        w.line(format!(
            "{}.def(\"__init__\", boost::python::make_constructor({}));",
            class.var,
            args.join(", ")
        ));
        return;
    }

    let exposed: Vec<&TypeRef> = ctor.exposed_params().map(|p| &p.ty).collect();
    let required = ctor.arities().first().copied().unwrap_or(exposed.len());
    let mut types: Vec<String> = exposed[..required].iter().map(|t| t.spelling()).collect();
    if required < exposed.len() {
        let optional: Vec<String> = exposed[required..].iter().map(|t| t.spelling()).collect();
        types.push(format!("boost::python::optional<{}>", optional.join(", ")));
    }
    let keywords = keywords(ctor, false)
        .map(|k| format!("({})", k))
        .unwrap_or_default();
    w.line(format!(
        "{}.def(boost::python::init<{}>{});",
        class.var,
        types.join(", "),
        if keywords.is_empty() {
            "()".to_string()
        } else {
            keywords
        }
    ));
}

fn method_group(w: &mut SourceWriter, class: &ClassPlan, group: &MethodGroupPlan) {
    for callable in &group.overloads {
        let line = match group.binding {
            Binding::Operator(kind) => operator(class, &group.name, kind, callable),
            Binding::StaticThunk => format!(
                "{}.def({});",
                class.var,
                def_args(&group.name, callable, Some(writer::thunk_lambda(callable, "+")))
            ),
            Binding::Instance | Binding::Static => match &callable.virtual_slot {
                Some(slot) if !callable.has_suppressed() => {
                    if slot.pure {
                        format!(
                            "{}.def({}, boost::python::pure_virtual({}));",
                            class.var,
                            string_literal(&group.name),
                            function_pointer(callable)
                        )
                    } else {
                        format!(
                            "{}.def({}, {}, &{}::{});",
                            class.var,
                            string_literal(&group.name),
                            function_pointer(callable),
                            wrapper_name(class),
                            slot.default_helper
                        )
                    }
                }
                _ => format!("{}.def({});", class.var, def_args(&group.name, callable, None)),
            },
        };
        w.line(line);
    }
    if group.binding == Binding::Static {
        w.line(format!(
            "{}.staticmethod({});",
            class.var,
            string_literal(&group.name)
        ));
    }
}

/// `"name", <callable>, keywords, policy, doc`
fn def_args(name: &str, callable: &Callable, target: Option<String>) -> String {
    let target = target.unwrap_or_else(|| {
        if callable.has_suppressed() {
            writer::forwarding_lambda(callable, "+")
        } else {
            function_pointer(callable)
        }
    });
    let mut args = vec![string_literal(name), target];
    if let Some(keywords) = keywords(callable, true) {
        args.push(keywords);
    }
    if let Some(policy) = return_policy(callable) {
        args.push(policy.to_string());
    }
    if let Some(doc) = &callable.doc {
        args.push(string_literal(doc));
    }
    args.join(", ")
}

/// `(boost::python::arg("i") = 1, ...)` over the exposed parameters
fn keywords(callable: &Callable, with_defaults: bool) -> Option<String> {
    let specs: Vec<String> = callable
        .params
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.suppressed)
        .map(|(i, p)| {
            let name = string_literal(&writer::param_name(p, i));
            match (&p.default, with_defaults) {
                (Some(default), true) => format!("boost::python::arg({}) = {}", name, default),
                _ => format!("boost::python::arg({})", name),
            }
        })
        .collect();
    if specs.is_empty() {
        None
    } else {
        Some(format!("({})", specs.join(", ")))
    }
}

fn return_policy(callable: &Callable) -> Option<&'static str> {
    if let Some(policy) = callable.policy {
        return Some(match (policy, callable.returns) {
            (ReturnPolicy::Copy, ReturnShape::MutReference { .. }) => {
                "boost::python::return_value_policy<boost::python::copy_non_const_reference>()"
            }
            (ReturnPolicy::Copy, _) => {
                "boost::python::return_value_policy<boost::python::copy_const_reference>()"
            }
            (ReturnPolicy::Reference, _) => {
                "boost::python::return_value_policy<boost::python::reference_existing_object>()"
            }
            (ReturnPolicy::ReferenceInternal, _) => "boost::python::return_internal_reference<>()",
            (ReturnPolicy::TakeOwnership, _) => {
                "boost::python::return_value_policy<boost::python::manage_new_object>()"
            }
        });
    }
    let member = callable.kind == CallableKind::Method;
    match callable.returns {
        ReturnShape::Value => None,
        ReturnShape::ConstReference => {
            Some("boost::python::return_value_policy<boost::python::copy_const_reference>()")
        }
        ReturnShape::MutReference { builtin: true } => {
            Some("boost::python::return_value_policy<boost::python::copy_non_const_reference>()")
        }
        ReturnShape::MutReference { .. } | ReturnShape::Pointer if member => {
            Some("boost::python::return_internal_reference<>()")
        }
        ReturnShape::MutReference { .. } | ReturnShape::Pointer => {
            Some("boost::python::return_value_policy<boost::python::reference_existing_object>()")
        }
    }
}

/// Right-hand operand of an operator: `self` for the class itself
fn operand(class: &ClassPlan, ty: &TypeRef) -> String {
    let inner = ty.innermost().spelling();
    if inner == class.cpp_name {
        "boost::python::self".to_string()
    } else {
        format!("boost::python::other<{}>()", inner)
    }
}

fn operator(class: &ClassPlan, name: &str, kind: OperatorKind, callable: &Callable) -> String {
    let exposed: Vec<&crate::model::Param> = callable.exposed_params().collect();
    if kind == OperatorKind::Assign {
        let other = exposed
            .first()
            .map(|p| writer::param_name(p, 0))
            .unwrap_or_default();
        return format!(
            "{}.def({}, +[]({}) {{ self = {}; }});",
            class.var,
            string_literal(name),
            writer::join_params(
                &format!("{} &self", class.cpp_name),
                &writer::exposed_param_list(&callable.params)
            ),
            other
        );
    }
    let expression = match exposed.first() {
        None => format!("{}boost::python::self", kind.token()),
        Some(param) => format!(
            "boost::python::self {} {}",
            kind.token(),
            operand(class, &param.ty)
        ),
    };
    format!("{}.def({});", class.var, expression)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Planner;
    use crate::config::RuleAction;
    use crate::fixtures;
    use crate::rules;
    use crate::scope::ScopeResolver;

    fn render(unit: crate::TranslationUnitDecl, config: crate::Configuration) -> String {
        let mut model = Model::build(&unit).unwrap();
        rules::apply(&mut model, &config).unwrap();
        let graph = ScopeResolver::new(&model, &config).resolve().unwrap();
        let plan = Planner::new(&model, &graph, &config, Backend::BoostPython)
            .plan()
            .unwrap();
        BoostPythonDialect.emit(&model, &plan).unwrap()
    }

    fn class_source() -> String {
        render(fixtures::class_unit(), fixtures::class_config())
    }

    #[test]
    fn test_module_and_submodule() {
        let source = class_source();
        assert!(source.contains("BOOST_PYTHON_MODULE(chimera_test) {"));
        assert!(source.contains("PyImport_AddModule(\"chimera_test.nested_namespace\")"));
        assert!(source.contains("m.attr(\"nested_namespace\") = m_nested_namespace;"));
    }

    #[test]
    fn test_wrapper_for_virtuals() {
        let source = class_source();
        assert!(source.contains(
            "struct chimera_test_nested_namespace_Animal_wrapper : ::chimera_test::nested_namespace::Animal, boost::python::wrapper<::chimera_test::nested_namespace::Animal> {"
        ));
        assert!(source.contains("return this->get_override(\"pure_virtual_type\")();"));
        assert!(source.contains(
            "cls_chimera_test_nested_namespace_Animal.def(\"pure_virtual_type\", boost::python::pure_virtual(&::chimera_test::nested_namespace::Animal::pure_virtual_type));"
        ));
        assert!(source.contains(
            "&chimera_test_nested_namespace_Dog_wrapper::default_type);"
        ));
    }

    #[test]
    fn test_static_field_is_read_only() {
        let source = class_source();
        assert!(source.contains(
            "cls_chimera_test_StaticFields.def_readonly(\"counter\", &::chimera_test::StaticFields::counter);"
        ));
    }

    #[test]
    fn test_static_instance_thunk() {
        let source = class_source();
        assert!(source.contains(
            "cls_chimera_test_Integer.def(\"add\", +[](const ::chimera_test::Integer &, int a, int b) { return ::chimera_test::Integer::add(a, b); }"
        ));
        assert!(!source.contains("add_static"));
    }

    #[test]
    fn test_operators_use_self_expressions() {
        let source = class_source();
        assert!(source.contains("cls_chimera_test_Vector2.def(boost::python::self += boost::python::self);"));
        assert!(source.contains("cls_chimera_test_Vector2.def(boost::python::self + boost::python::other<double>());"));
        assert!(source.contains("cls_chimera_test_Vector2.def(-boost::python::self);"));
    }

    #[test]
    fn test_default_arguments() {
        let source = class_source();
        assert!(source.contains(
            "cls_chimera_test_DefaultArguments.def(\"add\", &::chimera_test::DefaultArguments::add, (boost::python::arg(\"i\") = 1, boost::python::arg(\"j\") = 2));"
        ));
    }

    #[test]
    fn test_class_scope_enum_not_exported() {
        let source = render(fixtures::enum_unit(), fixtures::enum_config());
        assert!(source.contains("boost::python::scope within(cls_chimera_test_Pet);"));
        assert!(source.contains("boost::python::enum_<::chimera_test::Pet::Kind>(\"Kind\")"));
        let color = source.find("boost::python::enum_<::chimera_test::Color>").unwrap();
        // Only the module-level scoped enum exports its values
        let exports: Vec<usize> = source
            .match_indices(".export_values()")
            .map(|(i, _)| i)
            .collect();
        assert_eq!(exports.len(), 1);
        assert!(exports[0] > color);
    }

    #[test]
    fn test_suppressed_parameters_are_not_keywords() {
        let config = fixtures::class_config()
            .with_rule("chimera_test::DefaultArguments::add", RuleAction::SuppressParam(1))
            .unwrap()
            .with_rule("chimera_test::Vector2::Vector2", RuleAction::SuppressParam(1))
            .unwrap();
        let unit = fixtures::without_default_constructor(fixtures::class_unit(), "Vector2");
        let source = render(unit, config);
        assert!(source.contains(
            "cls_chimera_test_DefaultArguments.def(\"add\", +[](const ::chimera_test::DefaultArguments &self, int i) { return self.add(i, 2); }, (boost::python::arg(\"i\") = 1));"
        ));
        assert!(!source.contains("boost::python::arg(\"j\")"));
        assert!(source.contains(
            "cls_chimera_test_Vector2.def(\"__init__\", boost::python::make_constructor(+[](double x) { return new ::chimera_test::Vector2(x, {}); }, boost::python::default_call_policies(), (boost::python::arg(\"x\"))));"
        ));
        assert!(!source.contains("boost::python::arg(\"y\")"));
    }

    #[test]
    fn test_configured_return_policies() {
        let source = class_source();
        assert!(source.contains(
            "cls_chimera_test_Widget.def(\"peer\", &::chimera_test::Widget::peer, boost::python::return_internal_reference<>());"
        ));

        let config = fixtures::class_config()
            .with_rule("chimera_test::Widget::*", RuleAction::ReturnPolicy(ReturnPolicy::Copy))
            .unwrap()
            .with_rule(
                "chimera_test::find_widget",
                RuleAction::ReturnPolicy(ReturnPolicy::TakeOwnership),
            )
            .unwrap()
            .with_rule("chimera_test::MainClass", RuleAction::Copyable(false))
            .unwrap();
        let source = render(fixtures::class_unit(), config);
        assert!(source.contains(
            "cls_chimera_test_Widget.def(\"label\", &::chimera_test::Widget::label, boost::python::return_value_policy<boost::python::copy_const_reference>());"
        ));
        // Copying through a pointer is not expressible; the default stays
        assert!(source.contains(
            "cls_chimera_test_Widget.def(\"peer\", &::chimera_test::Widget::peer, boost::python::return_internal_reference<>());"
        ));
        assert!(source.contains(
            "boost::python::def(\"find_widget\", &::chimera_test::find_widget, (boost::python::arg(\"id\")), boost::python::return_value_policy<boost::python::manage_new_object>());"
        ));
        assert!(source.contains(
            "return boost::python::class_<::chimera_test::MainClass, boost::noncopyable>(\"MainClass\", boost::python::no_init);"
        ));
    }

    #[test]
    fn test_translators_registered_generic_first() {
        let source = class_source();
        let generic = source
            .find("register_exception_translator<std::exception>")
            .unwrap();
        let out_of_range = source
            .find("register_exception_translator<std::out_of_range>")
            .unwrap();
        assert!(generic < out_of_range);
        assert!(!source.contains("register_exception_translator<std::domain_error>"));
    }
}

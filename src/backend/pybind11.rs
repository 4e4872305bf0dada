//! pybind11 dialect
//!
//! Renders a [`BackendPlan`] as a single `PYBIND11_MODULE` translation
//! unit. Virtual slots become trampoline classes using
//! `PYBIND11_OVERRIDE` / `PYBIND11_OVERRIDE_PURE`.

use super::plan::{
    BackendPlan, Callable, CallableKind, ClassPlan, EnumPlan, MethodGroupPlan, ReturnShape,
    TrampolineSlot,
};
use super::writer::{
    self, SourceWriter, cpp_leaf, exposed_param_list, function_pointer, include, string_literal,
};
use super::{Backend, Dialect};
use crate::config::ReturnPolicy;
use crate::decl::OperatorKind;
use crate::model::Model;
use crate::overload::{self, Binding};
use crate::{Error, Result};
use tracing::debug;

pub struct Pybind11Dialect;

impl Dialect for Pybind11Dialect {
    fn backend(&self) -> Backend {
        Backend::Pybind11
    }

    fn emit(&self, model: &Model, plan: &BackendPlan) -> Result<String> {
        for class in &plan.classes {
            if model.class(class.node).is_none() {
                return Err(Error::emission(
                    Backend::Pybind11,
                    &model.node(class.node).path,
                    "only class nodes can be bound as classes",
                ));
            }
        }

        let mut w = SourceWriter::new();
        preamble(&mut w, plan);
        for class in plan.classes.iter().filter(|c| c.has_trampoline()) {
            trampoline(&mut w, class);
        }

        w.open(format!("PYBIND11_MODULE({}, m) {{", plan.module));
        for module in &plan.modules {
            w.line(format!(
                "py::module_ {} = {}.def_submodule({});",
                module.var,
                module.parent.var,
                string_literal(&module.name)
            ));
        }
        if !plan.classes.is_empty() {
            w.blank();
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
        if !plan.functions.is_empty() {
            w.blank();
        }
        for group in &plan.functions {
            for callable in &group.overloads {
                w.line(format!(
                    "{}.def({});",
                    group.parent.var,
                    def_args(&group.name, callable, None)
                ));
            }
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
        translators(&mut w, plan);
        w.close("}");

        debug!("Rendered pybind11 module {}", plan.module);
        Ok(w.finish())
    }
}

fn preamble(w: &mut SourceWriter, plan: &BackendPlan) {
    w.line(format!(
        "// Generated by chimera for module {} (pybind11 {}). Do not edit.",
        plan.module, plan.version
    ));
    w.line("#include <pybind11/pybind11.h>");
    w.line("#include <pybind11/stl.h>");
    w.line("#include <exception>");
    w.line("#include <memory>");
    for header in &plan.headers {
        w.line(include(header));
    }
    w.blank();
    w.line("namespace py = pybind11;");
    w.blank();
}

fn trampoline_name(class: &ClassPlan) -> String {
    format!("Py_{}", class.mangled)
}

/// Macro arguments may not contain bare commas
fn macro_type(spelling: &str) -> String {
    if spelling.contains(',') {
        format!("PYBIND11_TYPE({})", spelling)
    } else {
        spelling.to_string()
    }
}

fn trampoline(w: &mut SourceWriter, class: &ClassPlan) {
    w.open(format!(
        "class {} : public {} {{",
        trampoline_name(class),
        class.cpp_name
    ));
    w.dedent();
    w.line("public:");
    w.indent();
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
    let ret = entry.return_type.spelling();
    w.open(format!(
        "{} {}({}){} override {{",
        ret,
        entry.name,
        writer::param_list(&entry.params),
        if entry.is_const { " const" } else { "" }
    ));
    let args: Vec<String> = entry
        .params
        .iter()
        .enumerate()
        .map(|(i, p)| writer::param_name(p, i))
        .collect();
    w.line(format!(
        "{}({}, {}, {}, {});",
        if entry.is_pure {
            "PYBIND11_OVERRIDE_PURE"
        } else {
            "PYBIND11_OVERRIDE"
        },
        macro_type(&ret),
        macro_type(&class.cpp_name),
        entry.name,
        args.join(", ")
    ));
    w.close("}");
}

fn declare_class(w: &mut SourceWriter, class: &ClassPlan) {
    let mut params = vec![class.cpp_name.clone()];
    params.extend(class.bases.iter().cloned());
    if class.has_trampoline() {
        params.push(trampoline_name(class));
    }
    if let Some(holder) = class.holder {
        params.push(format!("{}<{}>", holder.spelling(), class.cpp_name));
    }
    let mut args = vec![class.parent.var.clone(), string_literal(&class.name)];
    if let Some(doc) = &class.doc {
        args.push(string_literal(doc));
    }
    w.line(format!(
        "py::class_<{}> {}({});",
        params.join(", "),
        class.var,
        args.join(", ")
    ));
}

fn enumeration(w: &mut SourceWriter, e: &EnumPlan) {
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
    w.line(format!(
        "py::enum_<{}>({}, {})",
        e.cpp_name,
        e.parent.var,
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
        let def = match (field.is_static, field.readonly) {
            (false, false) => "def_readwrite",
            (false, true) => "def_readonly",
            (true, false) => "def_readwrite_static",
            (true, true) => "def_readonly_static",
        };
        w.line(format!(
            "{}.{}({}, &{});",
            class.var,
            def,
            string_literal(&field.name),
            field.cpp_name
        ));
    }
}

fn constructor(w: &mut SourceWriter, class: &ClassPlan, ctor: &Callable) {
    let init = if ctor.has_suppressed() {
        let mut factory = ctor.clone();
        if class.is_abstract {
            factory.owner = Some(trampoline_name(class));
        }
        format!("py::init({})", writer::forwarding_lambda(&factory, ""))
    } else {
        format!("py::init<{}>()", writer::param_types(&ctor.params))
    };
    let mut args = vec![init];
    args.extend(arg_specs(ctor));
    w.line(format!("{}.def({});", class.var, args.join(", ")));
}

fn method_group(w: &mut SourceWriter, class: &ClassPlan, group: &MethodGroupPlan) {
    for callable in &group.overloads {
        let line = match group.binding {
            Binding::Instance => format!(
                "{}.def({});",
                class.var,
                def_args(&group.name, callable, None)
            ),
            Binding::Static => format!(
                "{}.def_static({});",
                class.var,
                def_args(&group.name, callable, None)
            ),
            Binding::StaticThunk => format!(
                "{}.def({});",
                class.var,
                def_args(&group.name, callable, Some(writer::thunk_lambda(callable, "")))
            ),
            Binding::Operator(kind) => operator(&class.var, &group.name, kind, callable),
        };
        w.line(line);
    }
}

/// `"name", <callable>, py::arg(...)..., policy, doc`
fn def_args(name: &str, callable: &Callable, target: Option<String>) -> String {
    let target = target.unwrap_or_else(|| {
        if callable.has_suppressed() {
            writer::forwarding_lambda(callable, "")
        } else {
            function_pointer(callable)
        }
    });
    let mut args = vec![string_literal(name), target];
    args.extend(arg_specs(callable));
    if let Some(policy) = return_policy(callable) {
        args.push(policy.to_string());
    }
    if let Some(doc) = &callable.doc {
        args.push(string_literal(doc));
    }
    args.join(", ")
}

/// `py::arg("i") = 1` for every exposed parameter
fn arg_specs(callable: &Callable) -> Vec<String> {
    callable
        .params
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.suppressed)
        .map(|(i, p)| {
            let name = string_literal(&writer::param_name(p, i));
            match &p.default {
                Some(default) => format!("py::arg({}) = {}", name, default),
                None => format!("py::arg({})", name),
            }
        })
        .collect()
}

fn return_policy(callable: &Callable) -> Option<&'static str> {
    if let Some(policy) = callable.policy {
        return Some(match policy {
            ReturnPolicy::Copy => "py::return_value_policy::copy",
            ReturnPolicy::Reference => "py::return_value_policy::reference",
            ReturnPolicy::ReferenceInternal => "py::return_value_policy::reference_internal",
            ReturnPolicy::TakeOwnership => "py::return_value_policy::take_ownership",
        });
    }
    match (callable.kind, callable.returns) {
        (_, ReturnShape::Value) => None,
        (CallableKind::Method, _) => Some("py::return_value_policy::reference_internal"),
        (CallableKind::StaticMethod | CallableKind::Function, _) => {
            Some("py::return_value_policy::reference")
        }
        (CallableKind::Constructor, _) => None,
    }
}

fn operator(var: &str, name: &str, kind: OperatorKind, callable: &Callable) -> String {
    let owner = callable.owner.as_deref().unwrap_or_default();
    let receiver = if callable.is_const && !kind.is_compound_assignment() {
        format!("const {} &self", owner)
    } else {
        format!("{} &self", owner)
    };
    let params = writer::join_params(&receiver, &exposed_param_list(&callable.params));
    let other = callable
        .params
        .first()
        .map(|p| writer::param_name(p, 0))
        .unwrap_or_default();
    let token = kind.token();

    if kind == OperatorKind::Assign {
        return format!(
            "{}.def({}, []({}) {{ self = {}; }});",
            var,
            string_literal(name),
            params,
            other
        );
    }
    if kind.is_compound_assignment() {
        return format!(
            "{}.def({}, []({}) -> {} & {{ self {} {}; return self; }}, py::is_operator(), py::return_value_policy::reference_internal);",
            var,
            string_literal(name),
            params,
            owner,
            token,
            other
        );
    }
    let expression = if overload::exposed_params(&callable.params).next().is_none() {
        format!("{}self", token)
    } else {
        format!("self {} {}", token, other)
    };
    format!(
        "{}.def({}, []({}) {{ return {}; }}, py::is_operator());",
        var,
        string_literal(name),
        params,
        expression
    )
}

fn translators(w: &mut SourceWriter, plan: &BackendPlan) {
    if plan.translations.is_empty() {
        return;
    }
    w.blank();
    w.open("py::register_exception_translator([](std::exception_ptr p) {");
    w.open("try {");
    w.line("if (p) std::rethrow_exception(p);");
    for record in &plan.translations {
        w.close(format!(
            "}} catch (const {} &e) {{",
            record.category.cpp_type()
        ));
        w.indent();
        w.line(format!(
            "PyErr_SetString({}, e.what());",
            record.host.py_object()
        ));
    }
    w.close("}");
    w.close("});");
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
        let plan = Planner::new(&model, &graph, &config, Backend::Pybind11)
            .plan()
            .unwrap();
        Pybind11Dialect.emit(&model, &plan).unwrap()
    }

    fn class_source() -> String {
        render(fixtures::class_unit(), fixtures::class_config())
    }

    #[test]
    fn test_module_and_submodule() {
        let source = class_source();
        assert!(source.contains("PYBIND11_MODULE(chimera_test, m) {"));
        assert!(source.contains(
            "py::module_ m_nested_namespace = m.def_submodule(\"nested_namespace\");"
        ));
        assert!(source.contains("#include \"class.h\""));
    }

    #[test]
    fn test_trampoline_for_pure_virtuals() {
        let source = class_source();
        assert!(source.contains(
            "class Py_chimera_test_nested_namespace_Animal : public ::chimera_test::nested_namespace::Animal {"
        ));
        assert!(source.contains("using ::chimera_test::nested_namespace::Animal::Animal;"));
        assert!(source.contains(
            "PYBIND11_OVERRIDE_PURE(std::string, ::chimera_test::nested_namespace::Animal, pure_virtual_type, );"
        ));
        assert!(source.contains(
            "py::class_<::chimera_test::nested_namespace::Dog, ::chimera_test::nested_namespace::Animal, Py_chimera_test_nested_namespace_Dog> cls_chimera_test_nested_namespace_Dog(m_nested_namespace, \"Dog\");"
        ));
    }

    #[test]
    fn test_default_arguments_and_static_rename() {
        let source = class_source();
        assert!(source.contains(
            "cls_chimera_test_DefaultArguments.def(\"add\", &::chimera_test::DefaultArguments::add, py::arg(\"i\") = 1, py::arg(\"j\") = 2);"
        ));
        assert!(source.contains("cls_chimera_test_Integer.def_static(\"add_static\", "));
        assert!(source.contains(
            "cls_chimera_test_StaticFields.def_readwrite_static(\"counter\", &::chimera_test::StaticFields::counter);"
        ));
    }

    #[test]
    fn test_operators_and_nested_class() {
        let source = class_source();
        assert!(source.contains(
            "cls_chimera_test_Vector2.def(\"__iadd__\", [](::chimera_test::Vector2 &self, const ::chimera_test::Vector2 & other) -> ::chimera_test::Vector2 & { self += other; return self; }, py::is_operator(), py::return_value_policy::reference_internal);"
        ));
        assert!(source.contains("cls_chimera_test_Vector2.def(\"__neg__\", [](const ::chimera_test::Vector2 &self) { return -self; }, py::is_operator());"));
        assert!(source.contains("cls_chimera_test_MainClass_NestedClass(cls_chimera_test_MainClass, \"NestedClass\")"));
    }

    #[test]
    fn test_enum_export() {
        let source = render(fixtures::enum_unit(), fixtures::enum_config());
        assert!(source.contains("py::enum_<::chimera_test::Pet::Kind>(cls_chimera_test_Pet, \"Kind\")"));
        assert!(source.contains(".value(\"Cat\", ::chimera_test::Pet::Kind::Cat)"));
        assert!(source.contains(
            "m_test1.attr(\"TRUE\") = static_cast<long long>(::chimera_test::test1::TRUE);"
        ));
    }

    #[test]
    fn test_suppressed_parameters_are_not_arguments() {
        let config = fixtures::class_config()
            .with_rule("chimera_test::DefaultArguments::add", RuleAction::SuppressParam(1))
            .unwrap()
            .with_rule("chimera_test::Vector2::Vector2", RuleAction::SuppressParam(1))
            .unwrap();
        let unit = fixtures::without_default_constructor(fixtures::class_unit(), "Vector2");
        let source = render(unit, config);
        assert!(source.contains(
            "cls_chimera_test_DefaultArguments.def(\"add\", [](const ::chimera_test::DefaultArguments &self, int i) { return self.add(i, 2); }, py::arg(\"i\") = 1);"
        ));
        assert!(!source.contains("py::arg(\"j\")"));
        assert!(source.contains(
            "cls_chimera_test_Vector2.def(py::init([](double x) { return new ::chimera_test::Vector2(x, {}); }), py::arg(\"x\"));"
        ));
        assert!(!source.contains("py::arg(\"y\")"));
    }

    #[test]
    fn test_configured_return_policies() {
        let source = class_source();
        assert!(source.contains(
            "cls_chimera_test_Widget.def(\"label\", &::chimera_test::Widget::label, py::return_value_policy::reference_internal);"
        ));

        let config = fixtures::class_config()
            .with_rule("chimera_test::Widget::*", RuleAction::ReturnPolicy(ReturnPolicy::Copy))
            .unwrap()
            .with_rule(
                "chimera_test::find_widget",
                RuleAction::ReturnPolicy(ReturnPolicy::TakeOwnership),
            )
            .unwrap();
        let source = render(fixtures::class_unit(), config);
        assert!(source.contains(
            "cls_chimera_test_Widget.def(\"label\", &::chimera_test::Widget::label, py::return_value_policy::copy);"
        ));
        assert!(source.contains(
            "cls_chimera_test_Widget.def(\"peer\", &::chimera_test::Widget::peer, py::return_value_policy::copy);"
        ));
        assert!(source.contains(
            "m.def(\"find_widget\", &::chimera_test::find_widget, py::arg(\"id\"), py::return_value_policy::take_ownership);"
        ));
    }

    #[test]
    fn test_exception_translator() {
        let source = class_source();
        assert!(source.contains("py::register_exception_translator([](std::exception_ptr p) {"));
        assert!(source.contains("} catch (const std::out_of_range &e) {"));
        assert!(source.contains("PyErr_SetString(PyExc_IndexError, e.what());"));
    }
}

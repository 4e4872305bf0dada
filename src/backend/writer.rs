//! Indented C++ source writer and the spelling helpers both dialects share

use super::plan::{Callable, CallableKind};
use crate::model::Param;

const INDENT: &str = "    ";

/// Line-oriented writer tracking the current indentation
#[derive(Debug, Default)]
pub struct SourceWriter {
    output: String,
    indent: usize,
}

impl SourceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.output.push_str(INDENT);
            }
            self.output.push_str(text);
        }
        self.output.push('\n');
    }

    pub fn blank(&mut self) {
        self.output.push('\n');
    }

    /// Write `text` and indent what follows
    pub fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.indent += 1;
    }

    /// Dedent and write `text`
    pub fn close(&mut self, text: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn finish(self) -> String {
        self.output
    }
}

/// C++ string literal
pub fn string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `#include` line; angle-bracketed headers are kept as given
pub fn include(header: &str) -> String {
    if header.starts_with('<') {
        format!("#include {}", header)
    } else {
        format!("#include \"{}\"", header)
    }
}

/// Parameter name, or `argN` for unnamed parameters
pub fn param_name(param: &Param, index: usize) -> String {
    if param.name.is_empty() {
        format!("arg{}", index)
    } else {
        param.name.clone()
    }
}

/// `int a, const std::string &b` over the exposed parameters
pub fn exposed_param_list(params: &[Param]) -> String {
    params
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.suppressed)
        .map(|(i, p)| format!("{} {}", p.ty.spelling(), param_name(p, i)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Full parameter list, for overriding declarations
pub fn param_list(params: &[Param]) -> String {
    params
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{} {}", p.ty.spelling(), param_name(p, i)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Arguments forwarded to the native call; suppressed ones get their fill value
pub fn forwarded_args(params: &[Param]) -> String {
    params
        .iter()
        .enumerate()
        .map(|(i, p)| {
            if p.suppressed {
                p.fill_value()
            } else {
                param_name(p, i)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Comma-separated parameter types
pub fn param_types(params: &[Param]) -> String {
    params
        .iter()
        .map(|p| p.ty.spelling())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `&::ns::C::f`, cast to its exact type when the name is overloaded
pub fn function_pointer(callable: &Callable) -> String {
    let address = format!("&{}", callable.cpp_name);
    if !callable.overloaded {
        return address;
    }
    let ret = callable.return_type.spelling();
    let params = param_types(&callable.params);
    let pointer_type = match (callable.kind, &callable.owner) {
        (CallableKind::Method, Some(owner)) => format!(
            "{} ({}::*)({}){}",
            ret,
            owner,
            params,
            if callable.is_const { " const" } else { "" }
        ),
        _ => format!("{} (*)({})", ret, params),
    };
    format!("static_cast<{}>({})", pointer_type, address)
}

/// Lambda signature and body forwarding to the native callable
///
/// Instance members take the receiver as their first parameter.
pub fn forwarding_lambda(callable: &Callable, prefix: &str) -> String {
    let args = forwarded_args(&callable.params);
    let exposed = exposed_param_list(&callable.params);
    let owner = callable.owner.as_deref().unwrap_or_default();
    let (params, call) = match callable.kind {
        CallableKind::Method => {
            let receiver = if callable.is_const {
                format!("const {} &self", owner)
            } else {
                format!("{} &self", owner)
            };
            let method = callable.cpp_name.rsplit("::").next().unwrap_or_default();
            (
                join_params(&receiver, &exposed),
                format!("self.{}({})", method, args),
            )
        }
        CallableKind::Constructor => (exposed, format!("new {}({})", owner, args)),
        CallableKind::StaticMethod | CallableKind::Function => {
            (exposed, format!("{}({})", callable.cpp_name, args))
        }
    };
    let body = if callable.return_type.is_void() && callable.kind != CallableKind::Constructor {
        format!("{}; ", call)
    } else {
        format!("return {}; ", call)
    };
    format!("{}[]({}) {{ {}}}", prefix, params, body)
}

/// Function-pointer-convertible lambda for a static bound through instances
///
/// The receiver is accepted and ignored.
pub fn thunk_lambda(callable: &Callable, prefix: &str) -> String {
    let owner = callable.owner.as_deref().unwrap_or_default();
    let params = join_params(
        &format!("const {} &", owner),
        &exposed_param_list(&callable.params),
    );
    let call = format!("{}({})", callable.cpp_name, forwarded_args(&callable.params));
    let body = if callable.return_type.is_void() {
        format!("{}; ", call)
    } else {
        format!("return {}; ", call)
    };
    format!("{}[]({}) {{ {}}}", prefix, params, body)
}

/// Unqualified class name without template arguments, e.g. `Vector` for `::ns::Vector<double>`
pub fn cpp_leaf(cpp_name: &str) -> &str {
    let base = cpp_name.split('<').next().unwrap_or(cpp_name);
    base.rsplit("::").next().unwrap_or(base)
}

pub fn join_params(first: &str, rest: &str) -> String {
    if rest.is_empty() {
        first.to_string()
    } else {
        format!("{}, {}", first, rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::TypeRef;
    use crate::backend::plan::ReturnShape;

    fn param(name: &str, ty: TypeRef, default: Option<&str>, suppressed: bool) -> Param {
        Param {
            name: name.to_string(),
            ty,
            default: default.map(str::to_string),
            suppressed,
        }
    }

    fn method(params: Vec<Param>, overloaded: bool) -> Callable {
        Callable {
            kind: CallableKind::Method,
            cpp_name: "::ns::Integer::add".to_string(),
            owner: Some("::ns::Integer".to_string()),
            params,
            return_type: TypeRef::builtin("int"),
            is_const: true,
            operator: None,
            overloaded,
            returns: ReturnShape::Value,
            policy: None,
            virtual_slot: None,
            doc: None,
        }
    }

    #[test]
    fn test_writer_indentation() {
        let mut w = SourceWriter::new();
        w.open("struct A {");
        w.line("int x;");
        w.blank();
        w.close("};");
        assert_eq!(w.finish(), "struct A {\n    int x;\n\n};\n");
    }

    #[test]
    fn test_string_literal_escapes() {
        assert_eq!(string_literal("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
    }

    #[test]
    fn test_overloaded_member_pointer_is_cast() {
        let callable = method(vec![param("i", TypeRef::builtin("int"), None, false)], true);
        assert_eq!(
            function_pointer(&callable),
            "static_cast<int (::ns::Integer::*)(int) const>(&::ns::Integer::add)"
        );
        let callable = method(Vec::new(), false);
        assert_eq!(function_pointer(&callable), "&::ns::Integer::add");
    }

    #[test]
    fn test_forwarding_lambda_fills_suppressed_params() {
        let callable = method(
            vec![
                param("i", TypeRef::builtin("int"), None, false),
                param("j", TypeRef::builtin("int"), Some("2"), true),
                param("k", TypeRef::builtin("int"), None, true),
            ],
            false,
        );
        assert_eq!(
            forwarding_lambda(&callable, ""),
            "[](const ::ns::Integer &self, int i) { return self.add(i, 2, {}); }"
        );
    }
}

//! Translation units mirroring the reference C++ example headers

use crate::config::Configuration;
use crate::decl::*;
use crate::exceptions::ExceptionCategory;
use crate::path::DeclPath;

fn path(s: &str) -> DeclPath {
    DeclPath::parse(s).unwrap()
}

fn config(module: &str) -> Configuration {
    Configuration::new(module, vec![path("chimera_test")])
}

fn unit(name: &str, header: &str, decls: Vec<Decl>) -> TranslationUnitDecl {
    TranslationUnitDecl {
        name: name.to_string(),
        headers: vec![header.to_string()],
        decls: vec![namespace("chimera_test", decls)],
    }
}

fn namespace(name: &str, decls: Vec<Decl>) -> Decl {
    Decl::Namespace(NamespaceDecl {
        name: name.to_string(),
        decls,
    })
}

fn class(name: &str) -> ClassDecl {
    ClassDecl {
        name: name.to_string(),
        is_copyable: true,
        constructors: vec![ConstructorDecl::default()],
        ..Default::default()
    }
}

fn derived(name: &str, bases: &[&str]) -> ClassDecl {
    let mut decl = class(name);
    decl.bases = bases
        .iter()
        .map(|b| BaseDecl {
            path: path(b),
            access: Access::Public,
        })
        .collect();
    decl
}

fn param(name: &str, ty: TypeRef) -> ParamDecl {
    ParamDecl {
        name: name.to_string(),
        ty,
        default: None,
    }
}

fn defaulted(name: &str, ty: TypeRef, default: &str) -> ParamDecl {
    ParamDecl {
        default: Some(default.to_string()),
        ..param(name, ty)
    }
}

fn method(name: &str, params: Vec<ParamDecl>, return_type: TypeRef) -> MethodDecl {
    MethodDecl {
        name: name.to_string(),
        params,
        return_type,
        virtuality: Virtuality::None,
        is_static: false,
        is_const: false,
        access: Access::Public,
        operator: None,
        is_deleted: false,
        is_conversion: false,
        is_template: false,
        throws: Vec::new(),
        doc: None,
    }
}

fn const_method(name: &str, params: Vec<ParamDecl>, return_type: TypeRef) -> MethodDecl {
    MethodDecl {
        is_const: true,
        ..method(name, params, return_type)
    }
}

fn virtual_method(name: &str, virtuality: Virtuality) -> MethodDecl {
    MethodDecl {
        virtuality,
        ..const_method(name, Vec::new(), string())
    }
}

fn operator(name: &str, kind: OperatorKind, params: Vec<ParamDecl>, return_type: TypeRef) -> MethodDecl {
    MethodDecl {
        operator: Some(kind),
        ..method(name, params, return_type)
    }
}

fn function(name: &str, params: Vec<ParamDecl>, return_type: TypeRef) -> FunctionDecl {
    FunctionDecl {
        name: name.to_string(),
        params,
        return_type,
        operator: None,
        throws: Vec::new(),
        doc: None,
    }
}

fn field(name: &str, ty: TypeRef) -> FieldDecl {
    FieldDecl {
        name: name.to_string(),
        ty,
        is_static: false,
        is_const: false,
        access: Access::Public,
    }
}

fn int() -> TypeRef {
    TypeRef::builtin("int")
}

fn double() -> TypeRef {
    TypeRef::builtin("double")
}

fn string() -> TypeRef {
    TypeRef::external("std::string")
}

fn vector2() -> TypeRef {
    TypeRef::named("chimera_test::Vector2")
}

/// Class hierarchy, overloads, operators, fields and free functions
pub(crate) fn class_unit() -> TranslationUnitDecl {
    let mut animal = class("Animal");
    animal.methods = vec![
        virtual_method("type", Virtuality::Virtual),
        virtual_method("pure_virtual_type", Virtuality::PureVirtual),
    ];

    let overrides = || {
        vec![
            virtual_method("type", Virtuality::Override),
            virtual_method("pure_virtual_type", Virtuality::Override),
        ]
    };
    let mut dog = derived("Dog", &["chimera_test::nested_namespace::Animal"]);
    dog.methods = overrides();
    let mut husky = derived("Husky", &["chimera_test::nested_namespace::Dog"]);
    husky.methods = overrides();
    let strong = class("Strong");
    let mut strong_husky = derived(
        "StrongHusky",
        &[
            "chimera_test::nested_namespace::Husky",
            "chimera_test::nested_namespace::Strong",
        ],
    );
    strong_husky.methods = overrides();

    let mut hidden = class("Hidden");
    hidden.access = Access::Private;
    let mut non_public = class("NonPublicParamInConstructor");
    non_public.nested = vec![Decl::Class(hidden)];
    non_public.constructors = vec![
        ConstructorDecl {
            params: vec![param(
                "hidden",
                TypeRef::named("chimera_test::nested_namespace::NonPublicParamInConstructor::Hidden"),
            )],
            ..Default::default()
        },
        ConstructorDecl {
            params: vec![param("value", int())],
            is_deleted: true,
            ..Default::default()
        },
        ConstructorDecl {
            params: vec![param("name", TypeRef::const_ref(string()))],
            ..Default::default()
        },
    ];

    let nested_namespace = namespace(
        "nested_namespace",
        vec![
            Decl::Class(animal),
            Decl::Class(dog),
            Decl::Class(husky),
            Decl::Class(strong),
            Decl::Class(strong_husky),
            Decl::Class(non_public),
            namespace("detail", vec![Decl::Class(class("ClassInDetail"))]),
        ],
    );

    let mut main_class = class("MainClass");
    main_class.nested = vec![Decl::Class(class("NestedClass"))];

    let mut default_arguments = class("DefaultArguments");
    default_arguments.methods = vec![const_method(
        "add",
        vec![defaulted("i", int(), "1"), defaulted("j", int(), "2")],
        int(),
    )];

    let mut static_fields = class("StaticFields");
    static_fields.fields = vec![FieldDecl {
        is_static: true,
        ..field("counter", int())
    }];

    let mut integer = class("Integer");
    integer.methods = vec![
        const_method("add", vec![param("x", int())], int()),
        MethodDecl {
            is_static: true,
            ..method("add", vec![param("a", int()), param("b", int())], int())
        },
    ];

    let mut vector = class("Vector2");
    vector.constructors.push(ConstructorDecl {
        params: vec![param("x", double()), param("y", double())],
        ..Default::default()
    });
    vector.fields = vec![field("x", double()), field("y", double())];
    vector.methods = vec![
        MethodDecl {
            is_const: true,
            ..operator(
                "operator+",
                OperatorKind::Add,
                vec![param("other", TypeRef::const_ref(vector2()))],
                vector2(),
            )
        },
        MethodDecl {
            is_const: true,
            ..operator(
                "operator+",
                OperatorKind::Add,
                vec![param("scale", double())],
                vector2(),
            )
        },
        operator(
            "operator+=",
            OperatorKind::AddAssign,
            vec![param("other", TypeRef::const_ref(vector2()))],
            TypeRef::Reference {
                referent: Box::new(vector2()),
                is_const: false,
            },
        ),
        MethodDecl {
            is_const: true,
            ..operator("operator-", OperatorKind::Neg, Vec::new(), vector2())
        },
        MethodDecl {
            is_const: true,
            ..operator(
                "operator==",
                OperatorKind::Eq,
                vec![param("other", TypeRef::const_ref(vector2()))],
                TypeRef::builtin("bool"),
            )
        },
        operator(
            "operator=",
            OperatorKind::Assign,
            vec![param("other", TypeRef::const_ref(vector2()))],
            TypeRef::Reference {
                referent: Box::new(vector2()),
                is_const: false,
            },
        ),
        operator(
            "operator=",
            OperatorKind::Assign,
            vec![param(
                "other",
                TypeRef::RvalueReference {
                    referent: Box::new(vector2()),
                },
            )],
            TypeRef::Reference {
                referent: Box::new(vector2()),
                is_const: false,
            },
        ),
    ];

    let widget_ptr = || TypeRef::pointer(TypeRef::named("chimera_test::Widget"));
    let mut widget = class("Widget");
    widget.methods = vec![
        const_method("label", Vec::new(), TypeRef::const_ref(string())),
        method("peer", Vec::new(), widget_ptr()),
    ];
    let find_widget = function("find_widget", vec![param("id", int())], widget_ptr());

    let make_strong = function(
        "make_strong",
        Vec::new(),
        TypeRef::named("chimera_test::nested_namespace::Strong"),
    );
    let make_widget = function(
        "make_widget",
        Vec::new(),
        TypeRef::SmartPointer {
            holder: SmartPointerKind::Shared,
            pointee: Box::new(TypeRef::named("chimera_test::Widget")),
        },
    );
    let fill_buffer = function(
        "fill_buffer",
        vec![param("data", TypeRef::pointer(double())), param("n", int())],
        TypeRef::void(),
    );
    let throw_domain_error = FunctionDecl {
        throws: vec![ExceptionCategory::DomainError],
        ..function("throw_domain_error", Vec::new(), TypeRef::void())
    };
    let throw_out_of_range = FunctionDecl {
        throws: vec![ExceptionCategory::OutOfRange],
        ..function("throw_out_of_range", vec![param("index", int())], TypeRef::void())
    };
    let scale = FunctionDecl {
        operator: Some(OperatorKind::Mul),
        ..function(
            "operator*",
            vec![
                param("v", TypeRef::const_ref(vector2())),
                param("factor", double()),
            ],
            vector2(),
        )
    };

    unit(
        "class",
        "class.h",
        vec![
            nested_namespace,
            Decl::Class(main_class),
            Decl::Class(default_arguments),
            Decl::Class(static_fields),
            Decl::Class(integer),
            Decl::Class(vector),
            Decl::Class(widget),
            Decl::Function(make_strong),
            Decl::Function(make_widget),
            Decl::Function(find_widget),
            Decl::Function(fill_buffer),
            Decl::Function(throw_domain_error),
            Decl::Function(throw_out_of_range),
            Decl::Function(scale),
        ],
    )
}

pub(crate) fn class_config() -> Configuration {
    config("chimera_test")
}

/// Drop the implicit default constructor of a top-level class in `unit`
pub(crate) fn without_default_constructor(mut unit: TranslationUnitDecl, class: &str) -> TranslationUnitDecl {
    if let Some(Decl::Namespace(ns)) = unit.decls.first_mut() {
        for decl in &mut ns.decls {
            if let Decl::Class(decl) = decl
                && decl.name == class
            {
                decl.constructors.retain(|c| !c.params.is_empty());
            }
        }
    }
    unit
}

/// A class reached through an alias chain, plus an alias to a builtin
pub(crate) fn typedef_unit() -> TranslationUnitDecl {
    let mut position = class("Position");
    position.fields = vec![field("x", int()), field("y", int())];
    let alias = |name: &str, target: TypeRef| {
        Decl::Alias(AliasDecl {
            name: name.to_string(),
            target,
            access: Access::Public,
            is_template: false,
        })
    };
    unit(
        "typedef",
        "typedef.h",
        vec![
            Decl::Class(position),
            alias("PositionBase", TypeRef::named("chimera_test::Position")),
            alias("PositionAlias", TypeRef::named("chimera_test::PositionBase")),
            alias("Distance", double()),
        ],
    )
}

pub(crate) fn typedef_config() -> Configuration {
    config("chimera_test")
}

/// `Vector<T>` instantiated for `double` (bound) and `int` (unnamed)
pub(crate) fn template_unit() -> TranslationUnitDecl {
    let mut pattern = class("Vector");
    pattern.methods = vec![const_method(
        "get",
        vec![param("index", int())],
        TypeRef::Param {
            name: "T".to_string(),
        },
    )];
    let template = TemplateDecl {
        name: "Vector".to_string(),
        params: vec!["T".to_string()],
        pattern: TemplatePattern::Class(pattern),
        instantiations: vec![
            InstantiationDecl {
                args: vec![double()],
                binding_name: Some("VectorDouble".to_string()),
            },
            InstantiationDecl {
                args: vec![int()],
                binding_name: None,
            },
        ],
    };
    let identity = TemplateDecl {
        name: "identity".to_string(),
        params: vec!["T".to_string()],
        pattern: TemplatePattern::Function(function(
            "identity",
            vec![param("value", TypeRef::Param { name: "T".to_string() })],
            TypeRef::Param {
                name: "T".to_string(),
            },
        )),
        instantiations: vec![
            InstantiationDecl {
                args: vec![double()],
                binding_name: Some("identity_double".to_string()),
            },
            InstantiationDecl {
                args: vec![int()],
                binding_name: None,
            },
        ],
    };
    unit(
        "template",
        "template.h",
        vec![Decl::Template(template), Decl::Template(identity)],
    )
}

pub(crate) fn template_config() -> Configuration {
    config("chimera_test")
}

/// Class-nested, scoped and anonymous enums
pub(crate) fn enum_unit() -> TranslationUnitDecl {
    let values = |labels: &[&str]| {
        labels
            .iter()
            .enumerate()
            .map(|(i, label)| EnumValueDecl {
                label: label.to_string(),
                value: i as i64,
            })
            .collect::<Vec<_>>()
    };
    let mut pet = class("Pet");
    pet.nested = vec![Decl::Enum(EnumDecl {
        name: "Kind".to_string(),
        access: Access::Public,
        scoped: false,
        values: values(&["Dog", "Cat"]),
    })];
    let color = EnumDecl {
        name: "Color".to_string(),
        access: Access::Public,
        scoped: true,
        values: values(&["Red", "Green"]),
    };
    let anonymous = EnumDecl {
        name: String::new(),
        access: Access::Public,
        scoped: false,
        values: values(&["TRUE", "FALSE"]),
    };
    unit(
        "enum",
        "enum.h",
        vec![
            Decl::Class(pet),
            Decl::Enum(color),
            namespace("test1", vec![Decl::Enum(anonymous)]),
        ],
    )
}

pub(crate) fn enum_config() -> Configuration {
    config("chimera_test")
}

//! Inference tests over whole programs.
//!
//! Tests organized by category:
//! - Call resolution and dispatch
//! - Instantiation cache and subclass observers
//! - Diagnostics for unresolved calls
//! - NoReturn and method_missing
//! - Blocks and `super`
//! - Foreign libs

use crate::ast::{BlockArg, Call, ClassDef, Def, Expr, ExprKind, FunDecl, LibDef, Param, Program, StructDecl, TypeExpr};
use crate::config::Config;
use crate::types::{DefOrigin, TypeId};

use super::*;

fn check(exprs: Vec<Expr>) -> InferenceContext {
    match check_program(&Program::new(exprs), &Config::default()) {
        Ok((ctx, _)) => ctx,
        Err(err) => panic!("Expected inference to succeed, got: {}", err),
    }
}

fn check_err(exprs: Vec<Expr>) -> Box<TypeError> {
    match check_program(&Program::new(exprs), &Config::default()) {
        Ok(_) => panic!("Expected an inference error, but inference succeeded"),
        Err(err) => err,
    }
}

fn var(ctx: &InferenceContext, name: &str) -> String {
    match ctx.var_type(name) {
        Some(ty) => ctx.universe().display(ty),
        None => panic!("variable '{}' is untyped", name),
    }
}

fn class(name: &str, parent: Option<&str>, body: Vec<Expr>) -> Expr {
    Expr::class(ClassDef::new(name, parent, body))
}

fn method(name: &str, params: &[&str], body: Expr) -> Expr {
    let params = params.iter().map(|p| Param::new(*p)).collect();
    Expr::def(Def::new(name, params, Some(body)))
}

fn new(class: &str) -> Expr {
    Expr::call(Expr::path(class), "new", vec![])
}

fn chr(c: char) -> Expr {
    Expr::new(ExprKind::Char(c))
}

fn named(name: &str) -> TypeExpr {
    TypeExpr::named(name)
}

fn ty(ctx: &InferenceContext, name: &str) -> TypeId {
    let program = ctx.universe().program();
    match ctx.universe().lookup_type(program, &[name.to_string()], false) {
        Some(ty) => ty,
        None => panic!("no type named {}", name),
    }
}

fn only_call(ctx: &InferenceContext, name: &str) -> CallId {
    let calls = ctx.root_calls_named(name);
    assert_eq!(calls.len(), 1, "expected one top-level call to '{}'", name);
    calls[0]
}

/// The integer a typed definition's body evaluates to, for bodies that are a literal.
fn returned_literal(ctx: &InferenceContext, target: TypedDefId) -> Option<i64> {
    let def = ctx.universe().def_ast(ctx.typed_def(target).def);
    match def.body.as_ref().map(|body| &body.kind) {
        Some(ExprKind::Int(value)) => Some(*value),
        _ => None,
    }
}

/// `class Foo; def coco; 1; end; end` and `class Bar < Foo` with an optional override.
fn foo_bar(override_in_bar: bool) -> Vec<Expr> {
    let bar_body = if override_in_bar {
        vec![method("coco", &[], Expr::int(2))]
    } else {
        vec![]
    };
    vec![
        class("Foo", None, vec![method("coco", &[], Expr::int(1))]),
        class("Bar", Some("Foo"), bar_body),
    ]
}

// ============================================================
// Call Resolution
// ============================================================

#[test]
fn test_exact_receiver_resolves_single_target() {
    let mut exprs = foo_bar(true);
    exprs.push(Expr::assign("x", Expr::call(new("Bar"), "coco", vec![])));
    let ctx = check(exprs);

    let call = only_call(&ctx, "coco");
    assert_eq!(ctx.call(call).targets().len(), 1);
    assert_eq!(returned_literal(&ctx, ctx.call(call).targets()[0]), Some(2));
    assert_eq!(var(&ctx, "x"), "Int32");
}

#[test]
fn test_hierarchy_receiver_resolves_per_class() {
    let mut exprs = foo_bar(true);
    exprs.extend([
        Expr::assign("a", new("Foo")),
        Expr::assign("a", new("Bar")),
        Expr::call(Expr::var("a"), "coco", vec![]),
    ]);
    let ctx = check(exprs);
    assert_eq!(var(&ctx, "a"), "Foo+");

    let call = only_call(&ctx, "coco");
    let described: Vec<String> = ctx
        .call(call)
        .targets()
        .iter()
        .map(|t| ctx.describe_typed_def(*t))
        .collect();
    assert_eq!(described, vec!["Foo#coco()", "Bar#coco()"]);
}

#[test]
fn test_dispatch_table_over_hierarchy() {
    let mut exprs = foo_bar(true);
    exprs.extend([
        Expr::assign("a", new("Foo")),
        Expr::assign("a", new("Bar")),
        Expr::call(Expr::var("a"), "coco", vec![]),
    ]);
    let ctx = check(exprs);
    let call = only_call(&ctx, "coco");

    let table = DispatchResolver::new(&ctx).table(call);
    assert_eq!(table.len(), 2);
    let rows: Vec<(String, Option<i64>)> = table
        .iter()
        .map(|entry| {
            let receiver = entry.receiver.map(|r| ctx.universe().display(r)).unwrap_or_default();
            (receiver, entry.target.and_then(|t| returned_literal(&ctx, t)))
        })
        .collect();
    assert_eq!(rows, vec![("Foo".to_string(), Some(1)), ("Bar".to_string(), Some(2))]);
}

#[test]
fn test_return_type_is_union_of_targets() {
    let ctx = check(vec![
        class("Foo", None, vec![method("coco", &[], Expr::int(1))]),
        class("Baz", None, vec![method("coco", &[], chr('c'))]),
        Expr::assign("a", new("Foo")),
        Expr::assign("a", new("Baz")),
        Expr::assign("x", Expr::call(Expr::var("a"), "coco", vec![])),
    ]);
    assert_eq!(var(&ctx, "a"), "Foo | Baz");
    assert_eq!(var(&ctx, "x"), "Int32 | Char");

    let call = only_call(&ctx, "coco");
    let mut returned: Vec<TypeId> = ctx
        .call(call)
        .targets()
        .iter()
        .filter_map(|t| ctx.type_of(ctx.typed_def(*t).node))
        .collect();
    returned.sort();
    let mut members = ctx.universe().concrete_types(ctx.var_type("x").unwrap());
    members.sort();
    assert_eq!(returned, members);
}

#[test]
fn test_class_method_on_metaclass() {
    let ctx = check(vec![
        class(
            "Foo",
            None,
            vec![Expr::def(Def::new("build", vec![], Some(Expr::string("foo"))).on_self())],
        ),
        Expr::assign("x", Expr::call(Expr::path("Foo"), "build", vec![])),
    ]);
    assert_eq!(var(&ctx, "x"), "String");
}

#[test]
fn test_generic_constructor_binds_type_var() {
    let ctx = check(vec![
        Expr::class(
            ClassDef::new(
                "Box",
                None,
                vec![Expr::def(Def::new(
                    "initialize",
                    vec![Param::typed("value", named("T"))],
                    Some(Expr::var("value")),
                ))],
            )
            .generic(&["T"]),
        ),
        Expr::assign("b", Expr::call(Expr::path("Box"), "new", vec![Expr::int(1)])),
    ]);
    assert_eq!(var(&ctx, "b"), "Box(Int32)");
}

#[test]
fn test_default_parameter_fills_missing_argument() {
    let ctx = check(vec![
        Expr::def(Def::new(
            "pick",
            vec![Param::new("a"), Param::new("b").with_default(Expr::string("b"))],
            Some(Expr::var("b")),
        )),
        Expr::assign("x", Expr::fcall("pick", vec![Expr::int(1)])),
    ]);
    assert_eq!(var(&ctx, "x"), "String");
}

// ============================================================
// Instantiation Cache and Observers
// ============================================================

#[test]
fn test_same_signature_reuses_typed_def() {
    let ctx = check(vec![
        class("Foo", None, vec![method("coco", &[], Expr::int(1))]),
        Expr::call(new("Foo"), "coco", vec![]),
        Expr::call(new("Foo"), "coco", vec![]),
    ]);
    let calls = ctx.root_calls_named("coco");
    assert_eq!(calls.len(), 2);
    assert_eq!(ctx.call(calls[0]).targets(), ctx.call(calls[1]).targets());
    assert!(ctx.cache().hits() > 0);
}

#[test]
fn test_argument_types_key_instantiations() {
    let ctx = check(vec![
        method("id", &["x"], Expr::var("x")),
        Expr::assign("a", Expr::fcall("id", vec![Expr::int(1)])),
        Expr::assign("b", Expr::fcall("id", vec![Expr::string("s")])),
    ]);
    assert_eq!(var(&ctx, "a"), "Int32");
    assert_eq!(var(&ctx, "b"), "String");
    let calls = ctx.root_calls_named("id");
    assert_ne!(ctx.call(calls[0]).targets(), ctx.call(calls[1]).targets());
}

#[test]
fn test_new_subclass_rebinds_hierarchy_call() {
    let mut exprs = foo_bar(false);
    exprs.extend([
        Expr::assign("a", new("Foo")),
        Expr::assign("a", new("Bar")),
        Expr::assign("x", Expr::call(Expr::var("a"), "coco", vec![])),
        class("Baz", Some("Foo"), vec![method("coco", &[], chr('c'))]),
    ]);
    let ctx = check(exprs);

    assert_eq!(var(&ctx, "x"), "Int32 | Char");
    let call = only_call(&ctx, "coco");
    assert_eq!(ctx.call(call).targets().len(), 3);
    assert!(ctx.observers().observers_of(ty(&ctx, "Foo")).contains(&call));
}

#[test]
fn test_reopened_class_does_not_notify() {
    let mut exprs = foo_bar(false);
    exprs.extend([
        Expr::assign("a", new("Foo")),
        Expr::assign("a", new("Bar")),
        Expr::assign("x", Expr::call(Expr::var("a"), "coco", vec![])),
        class("Bar", Some("Foo"), vec![method("other", &[], chr('c'))]),
    ]);
    let ctx = check(exprs);
    assert_eq!(var(&ctx, "x"), "Int32");
}

// ============================================================
// Diagnostics
// ============================================================

#[test]
fn test_arity_error_lists_accepted_counts() {
    let err = check_err(vec![
        method("coco", &["x"], Expr::int(1)),
        Expr::def(Def::new(
            "coco",
            vec![Param::new("x"), Param::new("y"), Param::new("z").with_default(Expr::int(1))],
            Some(Expr::int(2)),
        )),
        Expr::from_call(Call::new(None, "coco", vec![]).with_parens()),
    ]);
    assert_eq!(
        err.kind.to_string(),
        "wrong number of arguments for 'coco' (0 for 1, 2..3)"
    );
}

#[test]
fn test_undefined_method_suggests_close_name() {
    let err = check_err(vec![
        class("Foo", None, vec![method("coco", &[], Expr::int(1))]),
        Expr::call(new("Foo"), "cocoa", vec![]),
    ]);
    assert_eq!(err.kind.to_string(), "undefined method 'cocoa' for Foo");
    assert_eq!(err.help.as_deref(), Some("did you mean 'coco'?"));
}

#[test]
fn test_abstract_class_without_subclasses_has_no_method() {
    let err = check_err(vec![
        Expr::class(ClassDef::new("Shape", None, vec![]).abstract_class()),
        Expr::assign("x", Expr::call(new("Shape"), "area", vec![])),
    ]);
    assert_eq!(
        err.kind,
        TypeErrorKind::UndefinedMethod {
            name: "area".into(),
            owner: Some("Shape".into()),
        }
    );
}

#[test]
fn test_suggestions_can_be_disabled() {
    let mut config = Config::default();
    config.inference.suggestions = false;
    let program = Program::new(vec![
        class("Foo", None, vec![method("coco", &[], Expr::int(1))]),
        Expr::call(new("Foo"), "cocoa", vec![]),
    ]);
    let err = check_program(&program, &config).err().unwrap();
    assert_eq!(err.help, None);
}

#[test]
fn test_undefined_bare_name() {
    let err = check_err(vec![Expr::var("nope")]);
    assert_eq!(err.kind, TypeErrorKind::UndefinedVariableOrMethod { name: "nope".into() });

    let err = check_err(vec![Expr::from_call(Call::new(None, "nope", vec![]).with_parens())]);
    assert_eq!(
        err.kind,
        TypeErrorKind::UndefinedMethod {
            name: "nope".into(),
            owner: None
        }
    );
}

#[test]
fn test_no_overload_lists_uncovered_types() {
    let err = check_err(vec![
        class(
            "Foo",
            None,
            vec![Expr::def(Def::new(
                "coco",
                vec![Param::typed("x", named("Int32"))],
                Some(Expr::var("x")),
            ))],
        ),
        Expr::assign("a", Expr::int(1)),
        Expr::assign("a", chr('c')),
        Expr::call(new("Foo"), "coco", vec![Expr::var("a")]),
    ]);
    insta::assert_snapshot!(err.to_string(), @r"
no overload matches 'Foo#coco' with types Int32 | Char
Overloads are:
 - Foo#coco(x : Int32)
Couldn't find overloads for these types:
 - Foo#coco(x : Char)
");
}

#[test]
fn test_errors_carry_instantiation_frames() {
    let err = check_err(vec![
        method("outer", &["x"], Expr::fcall("inner", vec![Expr::var("x")])),
        method("inner", &["y"], Expr::call(Expr::var("y"), "nope", vec![])),
        Expr::fcall("outer", vec![Expr::int(1)]),
    ]);
    insta::assert_snapshot!(err.to_string(), @r"
undefined method 'nope' for Int32
while instantiating 'inner(Int32)'
while instantiating 'outer(Int32)'
");
    assert_eq!(err.code(), "E0603");
}

#[test]
fn test_block_presence_errors() {
    let err = check_err(vec![
        method("each", &[], Expr::yield_(vec![Expr::int(1)])),
        Expr::fcall("each", vec![]),
    ]);
    assert_eq!(
        err.kind,
        TypeErrorKind::BlockRequiredOrUnexpected {
            name: "each".into(),
            block_given: false
        }
    );

    let err = check_err(vec![
        method("plain", &[], Expr::int(1)),
        Expr::from_call(Call::new(None, "plain", vec![]).with_block(vec![], Expr::int(2))),
    ]);
    assert_eq!(
        err.kind,
        TypeErrorKind::BlockRequiredOrUnexpected {
            name: "plain".into(),
            block_given: true
        }
    );
}

#[test]
fn test_runaway_instantiation_hits_limit() {
    let mut config = Config::default();
    config.inference.max_instantiation_depth = 8;
    // Each level wraps its argument in one more array.
    let program = Program::new(vec![
        method(
            "deeper",
            &["x"],
            Expr::fcall("deeper", vec![Expr::new(ExprKind::Array(vec![Expr::var("x")]))]),
        ),
        Expr::fcall("deeper", vec![Expr::int(1)]),
    ]);
    let err = check_program(&program, &config).err().unwrap();
    assert!(matches!(err.kind, TypeErrorKind::InferenceLimitExceeded { .. }));
}

#[test]
fn test_long_assignment_chain_propagates() {
    let mut exprs = vec![Expr::assign("a0", Expr::int(1))];
    for i in 1..1100 {
        exprs.push(Expr::assign(format!("a{}", i), Expr::var(format!("a{}", i - 1))));
    }
    exprs.push(Expr::assign("a0", chr('c')));
    let ctx = check(exprs);
    assert_eq!(var(&ctx, "a1099"), "Int32 | Char");
}

#[test]
fn test_nested_propagation_hits_limit() {
    let mut config = Config::default();
    config.inference.max_propagation_depth = 1;
    // Widening `a` re-instantiates `id`, whose new return type propagates to `y`.
    let program = Program::new(vec![
        method("id", &["x"], Expr::var("x")),
        Expr::assign("a", Expr::int(1)),
        Expr::assign("y", Expr::fcall("id", vec![Expr::var("a")])),
        Expr::assign("a", chr('c')),
    ]);
    let err = check_program(&program, &config).err().unwrap();
    assert_eq!(
        err.kind,
        TypeErrorKind::InferenceLimitExceeded {
            what: "type propagation".into(),
            limit: 1,
        }
    );
}

// ============================================================
// NoReturn and method_missing
// ============================================================

fn raise_def() -> Expr {
    method("fail", &[], Expr::primitive(named("NoReturn")))
}

#[test]
fn test_no_return_receiver_defers_call() {
    let ctx = check(vec![
        raise_def(),
        Expr::assign("x", Expr::fcall("fail", vec![])),
        Expr::assign("y", Expr::call(Expr::var("x"), "anything", vec![])),
    ]);
    assert_eq!(var(&ctx, "x"), "NoReturn");
    assert_eq!(ctx.var_type("y"), None);

    let call = only_call(&ctx, "anything");
    assert!(ctx.call(call).is_dead());
}

#[test]
fn test_no_return_argument_makes_call_no_return() {
    let ctx = check(vec![
        raise_def(),
        method("id", &["x"], Expr::var("x")),
        Expr::assign("y", Expr::fcall("id", vec![Expr::fcall("fail", vec![])])),
    ]);
    assert_eq!(var(&ctx, "y"), "NoReturn");
    assert!(ctx.call(only_call(&ctx, "id")).targets().is_empty());
}

#[test]
fn test_method_missing_synthesizes_forwarder() {
    let ctx = check(vec![
        class("Foo", None, vec![method("method_missing", &["name", "args"], Expr::var("args"))]),
        Expr::assign("x", Expr::call(new("Foo"), "bar", vec![Expr::int(1), Expr::int(2)])),
        Expr::call(new("Foo"), "bar", vec![Expr::int(3), Expr::int(4)]),
    ]);
    assert_eq!(var(&ctx, "x"), "Array(Int32)");

    let foo = ty(&ctx, "Foo");
    let synthesized = ctx.universe().lookup_defs(foo, "bar");
    assert_eq!(synthesized.len(), 1);
    assert_eq!(ctx.universe().def(synthesized[0]).origin, DefOrigin::MethodMissing);

    // The second call finds the forwarder by plain lookup and shares its instantiation.
    let calls = ctx.root_calls_named("bar");
    assert_eq!(ctx.call(calls[0]).targets(), ctx.call(calls[1]).targets());
    let target = ctx.call(calls[0]).targets()[0];
    assert_eq!(ctx.typed_def(target).kind, MatchKind::MethodMissing);
}

// ============================================================
// Blocks and super
// ============================================================

#[test]
fn test_untyped_block_receives_yields() {
    let ctx = check(vec![
        method(
            "twice",
            &[],
            Expr::seq(vec![Expr::yield_(vec![Expr::int(1)]), Expr::yield_(vec![Expr::int(2)])]),
        ),
        Expr::assign(
            "x",
            Expr::from_call(
                Call::new(None, "twice", vec![])
                    .with_block(vec!["i"], Expr::call(Expr::var("i"), "+", vec![Expr::int(1)])),
            ),
        ),
    ]);
    assert_eq!(var(&ctx, "x"), "Int32");
}

#[test]
fn test_typed_block_binds_free_output() {
    let block_arg = BlockArg {
        name: "block".into(),
        inputs: Some(vec![named("Int32")]),
        output: Some(named("U")),
    };
    let ctx = check(vec![
        Expr::def(
            Def::new("map_one", vec![], Some(Expr::yield_(vec![Expr::int(1)]))).with_block_arg(block_arg),
        ),
        Expr::assign(
            "x",
            Expr::from_call(Call::new(None, "map_one", vec![]).with_block(vec!["i"], chr('c'))),
        ),
    ]);
    assert_eq!(var(&ctx, "x"), "Char");

    let target = ctx.call(only_call(&ctx, "map_one")).targets()[0];
    let bound = ctx.typed_def(target).free_vars.get("U").copied();
    assert_eq!(bound.map(|u| ctx.universe().display(u)), Some("Char".to_string()));
}

#[test]
fn test_block_output_mismatch() {
    let block_arg = BlockArg {
        name: "block".into(),
        inputs: None,
        output: Some(named("Int32")),
    };
    let err = check_err(vec![
        Expr::def(Def::new("run", vec![], Some(Expr::yield_(vec![]))).with_block_arg(block_arg)),
        Expr::from_call(Call::new(None, "run", vec![]).with_block(vec![], chr('c'))),
    ]);
    assert_eq!(
        err.kind,
        TypeErrorKind::BlockReturnMismatch {
            expected: "Int32".into(),
            found: "Char".into()
        }
    );
}

#[test]
fn test_block_output_checked_once_recursive_body_is_typed() {
    let block_arg = BlockArg {
        name: "block".into(),
        inputs: None,
        output: Some(named("Int32")),
    };
    // The block calls `later` while `later` is still being instantiated.
    let err = check_err(vec![
        Expr::def(Def::new("run", vec![], Some(Expr::yield_(vec![]))).with_block_arg(block_arg)),
        method(
            "later",
            &[],
            Expr::seq(vec![
                Expr::from_call(Call::new(None, "run", vec![]).with_block(vec![], Expr::fcall("later", vec![]))),
                chr('c'),
            ]),
        ),
        Expr::assign("x", Expr::fcall("later", vec![])),
    ]);
    assert_eq!(
        err.kind,
        TypeErrorKind::BlockReturnMismatch {
            expected: "Int32".into(),
            found: "Char".into()
        }
    );
}

#[test]
fn test_function_passed_as_block() {
    let fun = Expr::new(ExprKind::FunLiteral {
        params: vec![Param::typed("x", named("Int32"))],
        body: Box::new(Expr::call(Expr::var("x"), "+", vec![Expr::int(1)])),
    });
    let ctx = check(vec![
        method("apply", &[], Expr::yield_(vec![Expr::int(3)])),
        Expr::assign("f", fun),
        Expr::assign(
            "y",
            Expr::from_call(Call::new(None, "apply", vec![]).with_block_arg(Expr::var("f"))),
        ),
    ]);
    assert_eq!(var(&ctx, "f"), "Int32 -> Int32");
    assert_eq!(var(&ctx, "y"), "Int32");
}

#[test]
fn test_block_arg_must_be_function() {
    let err = check_err(vec![
        method("apply", &[], Expr::yield_(vec![Expr::int(3)])),
        Expr::from_call(Call::new(None, "apply", vec![]).with_block_arg(Expr::int(1))),
    ]);
    assert_eq!(err.kind, TypeErrorKind::ExpectedFunctionType { found: "Int32".into() });
}

#[test]
fn test_bare_super_forwards_parameters() {
    let ctx = check(vec![
        class("Foo", None, vec![method("coco", &["x"], Expr::var("x"))]),
        class("Bar", Some("Foo"), vec![method("coco", &["x"], Expr::fcall("super", vec![]))]),
        Expr::assign("y", Expr::call(new("Bar"), "coco", vec![Expr::string("s")])),
    ]);
    assert_eq!(var(&ctx, "y"), "String");

    let super_call = ctx
        .calls()
        .find(|(_, call)| call.name == "super")
        .map(|(id, _)| id)
        .unwrap();
    let target = ctx.call(super_call).targets()[0];
    assert_eq!(ctx.typed_def(target).self_type, ty(&ctx, "Bar"));
    assert_eq!(ctx.typed_def(target).owner, ty(&ctx, "Foo"));
}

// ============================================================
// Foreign Libs
// ============================================================

fn pointer(to: &str) -> TypeExpr {
    TypeExpr::generic("Pointer", vec![named(to)])
}

fn fun(name: &str, params: Vec<(&str, TypeExpr)>, ret: Option<TypeExpr>) -> FunDecl {
    FunDecl {
        name: name.into(),
        params: params.into_iter().map(|(n, t)| (n.to_string(), t)).collect(),
        ret,
        varargs: false,
    }
}

fn libc() -> Expr {
    let mut printf = fun("printf", vec![("format", pointer("Char"))], Some(named("Int32")));
    printf.varargs = true;
    Expr::lib(LibDef {
        name: "LibC".into(),
        funs: vec![
            fun("puts", vec![("s", pointer("Char"))], Some(named("Int32"))),
            fun("frexp", vec![("x", named("Int32")), ("exp", pointer("Int32"))], Some(named("Int32"))),
            fun("abs", vec![("x", named("Int32"))], Some(named("Int32"))),
            fun(
                "atexit",
                vec![(
                    "f",
                    TypeExpr::Fun {
                        inputs: vec![],
                        output: Some(Box::new(named("Void"))),
                    },
                )],
                Some(named("Int32")),
            ),
            printf,
        ],
        structs: vec![StructDecl {
            name: "Point".into(),
            fields: vec![("x".into(), named("Int32"))],
        }],
    })
}

fn lib_call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::call(Expr::path("LibC"), name, args)
}

fn conversion_kinds(ctx: &InferenceContext, call: CallId) -> Vec<(usize, ConversionKind)> {
    ctx.call(call)
        .conversions
        .iter()
        .map(|c| (c.index, c.kind))
        .collect()
}

#[test]
fn test_string_converts_to_char_pointer() {
    let ctx = check(vec![libc(), Expr::assign("r", lib_call("puts", vec![Expr::string("hi")]))]);
    assert_eq!(var(&ctx, "r"), "Int32");

    let call = only_call(&ctx, "puts");
    assert_eq!(conversion_kinds(&ctx, call), vec![(0, ConversionKind::StringToPointer)]);
    assert_eq!(ctx.display_node(ctx.call(call).args[0].node), "Pointer(Char)");
    let target = ctx.call(call).targets()[0];
    assert_eq!(ctx.typed_def(target).kind, MatchKind::Foreign);
}

#[test]
fn test_nil_converts_to_null_pointer() {
    let ctx = check(vec![libc(), lib_call("puts", vec![Expr::nil()])]);
    let call = only_call(&ctx, "puts");
    assert_eq!(conversion_kinds(&ctx, call), vec![(0, ConversionKind::NilToPointer)]);
}

#[test]
fn test_function_converts_to_void_callback() {
    let callback = Expr::new(ExprKind::FunLiteral {
        params: vec![],
        body: Box::new(Expr::int(1)),
    });
    let ctx = check(vec![libc(), lib_call("atexit", vec![callback])]);
    let call = only_call(&ctx, "atexit");
    assert_eq!(conversion_kinds(&ctx, call), vec![(0, ConversionKind::FunToVoid)]);
}

#[test]
fn test_varargs_convert_extra_strings() {
    let ctx = check(vec![
        libc(),
        lib_call("printf", vec![Expr::string("%d %s"), Expr::int(1), Expr::string("x")]),
    ]);
    let call = only_call(&ctx, "printf");
    assert_eq!(
        conversion_kinds(&ctx, call),
        vec![(0, ConversionKind::StringToPointer), (2, ConversionKind::StringToPointer)]
    );
}

#[test]
fn test_foreign_argument_mismatch() {
    let err = check_err(vec![libc(), lib_call("puts", vec![Expr::int(1)])]);
    assert_eq!(
        err.kind.to_string(),
        "argument #1 to LibC.puts must be Pointer(Char), not Int32"
    );
}

#[test]
fn test_foreign_arity_and_missing_function() {
    let err = check_err(vec![libc(), lib_call("abs", vec![])]);
    assert_eq!(err.kind.to_string(), "wrong number of arguments for 'LibC#abs' (0 for 1)");

    let err = check_err(vec![libc(), lib_call("nope", vec![])]);
    assert_eq!(err.kind.to_string(), "undefined method 'nope' for LibC");
}

#[test]
fn test_out_argument_binds_pointee() {
    let ctx = check(vec![
        libc(),
        lib_call("frexp", vec![Expr::int(1), Expr::new(ExprKind::Out("e".into()))]),
    ]);
    assert_eq!(var(&ctx, "e"), "Int32");
}

#[test]
fn test_out_argument_errors() {
    let err = check_err(vec![
        libc(),
        lib_call("abs", vec![Expr::new(ExprKind::Out("e".into()))]),
    ]);
    assert_eq!(
        err.kind,
        TypeErrorKind::OutArgumentNotPointer {
            index: 1,
            fun: "LibC.abs".into()
        }
    );

    let err = check_err(vec![
        method("id", &["x"], Expr::var("x")),
        Expr::fcall("id", vec![Expr::new(ExprKind::Out("e".into()))]),
    ]);
    assert_eq!(err.kind, TypeErrorKind::OutOutsideForeignCall);
}

#[test]
fn test_struct_fields() {
    let point = || Expr::new(ExprKind::Path(TypeExpr::path(&["LibC", "Point"])));
    let ctx = check(vec![
        libc(),
        Expr::assign("p", Expr::call(point(), "new", vec![])),
        Expr::call(Expr::var("p"), "x=", vec![Expr::int(1)]),
        Expr::assign("x", Expr::call(Expr::var("p"), "x", vec![])),
    ]);
    assert_eq!(var(&ctx, "p"), "LibC::Point");
    assert_eq!(var(&ctx, "x"), "Int32");

    let err = check_err(vec![
        libc(),
        Expr::call(Expr::call(point(), "new", vec![]), "x=", vec![Expr::string("s")]),
    ]);
    assert_eq!(
        err.kind.to_string(),
        "field 'x' of struct LibC::Point has type Int32, not String"
    );

    let err = check_err(vec![
        libc(),
        Expr::call(Expr::call(point(), "new", vec![]), "y", vec![]),
    ]);
    assert_eq!(err.kind.to_string(), "struct LibC::Point has no field 'y'");
}

//! End-to-end dispatch over class hierarchies and unions.
//!
//! Each program is built as a normalized AST, run through inference, and the
//! resolved call is asked which definition runs for a given runtime type.

use garnetc::ast::{Call, ClassDef, Def, Expr, ExprKind, Param, Program, TypeExpr};
use garnetc::config::Config;
use garnetc::typeck::{check_program, CallId, DispatchResolver, InferenceContext, TypeErrorKind, TypedDefId};
use garnetc::TypeId;

use proptest::prelude::*;

/// Test helper to run inference, panicking with the rendered error.
fn infer(exprs: Vec<Expr>) -> InferenceContext {
    match check_program(&Program::new(exprs), &Config::default()) {
        Ok((ctx, _)) => ctx,
        Err(err) => panic!("Inference failed:\n{}", err),
    }
}

fn class(name: &str, parent: Option<&str>, body: Vec<Expr>) -> Expr {
    Expr::class(ClassDef::new(name, parent, body))
}

fn coco(value: i64) -> Expr {
    Expr::def(Def::new("coco", vec![], Some(Expr::int(value))))
}

fn new(class: &str) -> Expr {
    Expr::call(Expr::path(class), "new", vec![])
}

fn type_named(ctx: &InferenceContext, name: &str) -> TypeId {
    let universe = ctx.universe();
    universe
        .lookup_type(universe.program(), &[name.to_string()], false)
        .unwrap_or_else(|| panic!("no type named {}", name))
}

fn coco_call(ctx: &InferenceContext) -> CallId {
    let calls = ctx.root_calls_named("coco");
    assert_eq!(calls.len(), 1);
    calls[0]
}

/// The literal returned by the definition that runs for `receiver`.
fn runs(ctx: &InferenceContext, receiver: &str, args: &[&str]) -> i64 {
    let call = coco_call(ctx);
    let receiver = (!receiver.is_empty()).then(|| type_named(ctx, receiver));
    let args: Vec<TypeId> = args.iter().map(|a| type_named(ctx, a)).collect();
    let target = DispatchResolver::new(ctx)
        .dispatch(call, receiver, &args)
        .expect("no target for runtime types");
    literal(ctx, target)
}

fn literal(ctx: &InferenceContext, target: TypedDefId) -> i64 {
    let def = ctx.universe().def_ast(ctx.typed_def(target).def);
    match def.body.as_ref().map(|body| &body.kind) {
        Some(ExprKind::Int(value)) => *value,
        other => panic!("body is not an integer literal: {:?}", other),
    }
}

// ============================================================
// Hierarchy receivers
// ============================================================

#[test]
fn inherited_method_runs_for_subclass() {
    let ctx = infer(vec![
        class("Foo", None, vec![coco(1)]),
        class("Bar", Some("Foo"), vec![]),
        Expr::assign("a", new("Foo")),
        Expr::assign("a", new("Bar")),
        Expr::call(Expr::var("a"), "coco", vec![]),
    ]);
    assert_eq!(ctx.display_node(ctx.call(coco_call(&ctx)).node), "Int32");
    assert_eq!(runs(&ctx, "Bar", &[]), 1);
    assert_eq!(runs(&ctx, "Foo", &[]), 1);
}

#[test]
fn override_runs_for_subclass() {
    let ctx = infer(vec![
        class("Foo", None, vec![coco(1)]),
        class("Bar", Some("Foo"), vec![coco(2)]),
        Expr::assign("a", new("Foo")),
        Expr::assign("a", new("Bar")),
        Expr::call(Expr::var("a"), "coco", vec![]),
    ]);
    assert_eq!(runs(&ctx, "Bar", &[]), 2);
    assert_eq!(runs(&ctx, "Foo", &[]), 1);
}

#[test]
fn assignment_order_does_not_change_static_type() {
    let ctx = infer(vec![
        class("Foo", None, vec![coco(1)]),
        class("Bar", Some("Foo"), vec![coco(2)]),
        Expr::assign("a", new("Bar")),
        Expr::assign("a", new("Foo")),
        Expr::call(Expr::var("a"), "coco", vec![]),
    ]);
    let a = ctx.var_type("a").unwrap();
    assert_eq!(ctx.universe().display(a), "Foo+");
    assert_eq!(runs(&ctx, "Foo", &[]), 1);
}

#[test]
fn hierarchy_argument_selects_general_overload() {
    let ctx = infer(vec![
        class("Foo", None, vec![]),
        class("Bar", Some("Foo"), vec![]),
        Expr::def(Def::new(
            "coco",
            vec![Param::typed("x", TypeExpr::named("Bar"))],
            Some(Expr::int(1)),
        )),
        Expr::def(Def::new("coco", vec![Param::new("x")], Some(Expr::int(2)))),
        Expr::assign("a", new("Bar")),
        Expr::assign("a", new("Foo")),
        Expr::fcall("coco", vec![Expr::var("a")]),
    ]);
    assert_eq!(ctx.call(coco_call(&ctx)).targets().len(), 2);
    assert_eq!(runs(&ctx, "", &["Foo"]), 2);
    assert_eq!(runs(&ctx, "", &["Bar"]), 1);
}

#[test]
fn union_with_unrelated_class_dispatches_per_member() {
    let ctx = infer(vec![
        class("Foo", None, vec![coco(1)]),
        class("Bar", Some("Foo"), vec![]),
        class("Baz", None, vec![coco(3)]),
        Expr::assign("a", new("Foo")),
        Expr::assign("a", new("Bar")),
        Expr::assign("a", new("Baz")),
        Expr::call(Expr::var("a"), "coco", vec![]),
    ]);
    let a = ctx.var_type("a").unwrap();
    assert!(ctx.universe().is_union(a));
    assert_eq!(ctx.universe().concrete_types(a).len(), 3);
    assert_eq!(runs(&ctx, "Baz", &[]), 3);
    assert_eq!(runs(&ctx, "Bar", &[]), 1);
}

#[test]
fn generated_new_takes_no_arguments() {
    let ctx = infer(vec![class("Foo", None, vec![]), Expr::assign("x", new("Foo"))]);
    let x = ctx.var_type("x").unwrap();
    assert_eq!(ctx.universe().display(x), "Foo");

    let program = Program::new(vec![
        class("Foo", None, vec![]),
        Expr::from_call(Call::new(Some(Expr::path("Foo")), "new", vec![Expr::int(1)])),
    ]);
    let err = check_program(&program, &Config::default()).err().unwrap();
    assert_eq!(
        err.kind,
        TypeErrorKind::ArityMismatch {
            name: "Foo#new".into(),
            given: 1,
            expected: vec!["0".into()],
        }
    );
    assert_eq!(err.kind.to_string(), "wrong number of arguments for 'Foo#new' (1 for 0)");
}

// ============================================================
// Random hierarchies
// ============================================================

/// Literal of one of four distinct types.
fn literal_expr(kind: usize) -> Expr {
    match kind % 4 {
        0 => Expr::int(1),
        1 => Expr::new(ExprKind::Char('c')),
        2 => Expr::string("s"),
        _ => Expr::symbol("s"),
    }
}

/// Classes `C0..Cn`, each either a root or a subclass of the one before,
/// each defining `coco` returning a literal of the chosen kind.
fn random_program(classes: &[(bool, usize)], assigned: &[usize]) -> Vec<Expr> {
    let mut exprs = Vec::new();
    for (i, (inherits, kind)) in classes.iter().enumerate() {
        let name = format!("C{}", i);
        let parent = (i > 0 && *inherits).then(|| format!("C{}", i - 1));
        let body = vec![Expr::def(Def::new("coco", vec![], Some(literal_expr(*kind))))];
        exprs.push(class(&name, parent.as_deref(), body));
    }
    for index in assigned {
        exprs.push(Expr::assign("a", new(&format!("C{}", index % classes.len()))));
    }
    exprs.push(Expr::assign("x", Expr::call(Expr::var("a"), "coco", vec![])));
    exprs
}

proptest! {
    #[test]
    fn call_type_is_union_of_target_returns(
        classes in prop::collection::vec((any::<bool>(), 0usize..4), 1..5),
        assigned in prop::collection::vec(0usize..8, 1..6),
    ) {
        let ctx = infer(random_program(&classes, &assigned));
        let universe = ctx.universe();
        let call = ctx.call(coco_call(&ctx));

        let mut returned: Vec<TypeId> = Vec::new();
        for target in call.targets() {
            let ty = ctx.type_of(ctx.typed_def(*target).node).expect("typed target");
            for concrete in universe.concrete_types(ty) {
                if !returned.contains(&concrete) {
                    returned.push(concrete);
                }
            }
        }
        returned.sort();
        let mut call_types = universe.concrete_types(ctx.type_of(call.node).expect("typed call"));
        call_types.sort();
        prop_assert_eq!(returned, call_types);
    }

    #[test]
    fn every_runtime_receiver_has_a_target(
        classes in prop::collection::vec((any::<bool>(), 0usize..4), 1..5),
        assigned in prop::collection::vec(0usize..8, 1..6),
    ) {
        let ctx = infer(random_program(&classes, &assigned));
        let id = coco_call(&ctx);
        let table = DispatchResolver::new(&ctx).table(id);
        prop_assert!(!table.is_empty());
        for entry in table {
            prop_assert!(entry.target.is_some());
            if let (Some(target), Some(runtime)) = (entry.target, entry.receiver) {
                // The chosen body was instantiated for the runtime class itself.
                prop_assert_eq!(ctx.typed_def(target).self_type, runtime);
            }
        }
    }
}

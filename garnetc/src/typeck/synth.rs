//! Synthesized definitions: constructors and `method_missing` forwarders.
//!
//! Both are ordinary definitions registered on the owner, so later lookups
//! find them directly and the instantiation cache treats them like any other
//! body.

use std::collections::BTreeMap;

use crate::ast::{Def, Expr, ExprKind, Param, TypeExpr};
use crate::types::{DefId, DefOrigin, TypeId};

use super::call::CallId;
use super::context::InferenceContext;
use super::error::{TypeError, TypeErrorKind, TypeResult};
use super::matcher::{Match, MatchKind, MatchSet, Matcher};

impl InferenceContext {
    /// Build `new` on the metaclass `meta` from the `initialize` overloads
    /// matching `arg_types`.
    ///
    /// Without any `initialize`, a zero-argument allocator is produced. With
    /// `initialize` overloads none of which match, the error is the one
    /// resolving `initialize` itself would report.
    pub(crate) fn define_new(&mut self, call: CallId, meta: TypeId, arg_types: &[TypeId]) -> TypeResult<MatchSet> {
        let class = self.universe.instance_type(meta);
        let has_block = self.call(call).block.is_some();
        let span = self.call(call).span;

        let initializers = Matcher::new(&mut self.universe).lookup_matches(class, "initialize", arg_types, has_block);
        if initializers.is_empty() {
            if !self.universe.lookup_defs(class, "initialize").is_empty() {
                return Err(self.matches_not_found(call, class, "initialize", Some(&initializers)));
            }
            if !arg_types.is_empty() {
                return TypeError::new(
                    TypeErrorKind::ArityMismatch {
                        name: format!("{}#new", self.universe.display(class)),
                        given: arg_types.len(),
                        expected: vec!["0".to_string()],
                    },
                    span,
                )
                .into_err();
            }
            let alloc = Def::new("new", vec![], Some(Expr::new(ExprKind::Allocate(None))));
            let def = self.universe.register_definition(meta, alloc, DefOrigin::Constructor);
            tracing::debug!(class = %self.universe.display(class), "synthesized allocator");
            let m = Match {
                def,
                owner: meta,
                arg_types: Vec::new(),
                free_vars: BTreeMap::new(),
                kind: MatchKind::Constructor,
            };
            return Ok(MatchSet::complete(vec![m], meta));
        }

        let mut matches = Vec::with_capacity(initializers.matches.len());
        for init in initializers.matches {
            let init_def = self.universe.def_ast(init.def);
            let params = (0..arg_types.len())
                .map(|i| {
                    let name = format!("arg{}", i);
                    match init_def.params.get(i).and_then(|p| p.restriction.clone()) {
                        Some(restriction) => Param::typed(name, restriction),
                        None => Param::new(name),
                    }
                })
                .collect();
            let forwarded = (0..arg_types.len()).map(|i| Expr::var(format!("arg{}", i))).collect();
            let alloc = self.generic_allocation(class, &init.free_vars);
            let body = Expr::seq(vec![
                Expr::assign("x", Expr::new(ExprKind::Allocate(alloc))),
                Expr::call(Expr::var("x"), "initialize", forwarded),
                Expr::var("x"),
            ]);
            let def = self
                .universe
                .register_definition(meta, Def::new("new", params, Some(body)), DefOrigin::Constructor);
            matches.push(Match {
                def,
                owner: meta,
                arg_types: init.arg_types,
                free_vars: init.free_vars,
                kind: MatchKind::Constructor,
            });
        }
        tracing::debug!(
            class = %self.universe.display(class),
            constructors = matches.len(),
            "synthesized constructors"
        );
        Ok(MatchSet::complete(matches, meta))
    }

    /// `Box(T)` when every type parameter of `class` is bound by `free_vars`.
    fn generic_allocation(&self, class: TypeId, free_vars: &BTreeMap<String, TypeId>) -> Option<TypeExpr> {
        let type_vars = self.universe.type_vars(class);
        if type_vars.is_empty() || free_vars.is_empty() {
            return None;
        }
        let args = type_vars
            .iter()
            .map(|var| free_vars.contains_key(var).then(|| TypeExpr::named(var.clone())))
            .collect::<Option<Vec<_>>>()?;
        Some(TypeExpr::Generic {
            name: Box::new(TypeExpr::Resolved(class)),
            args,
        })
    }

    /// Register `name(arg0, ..) = method_missing(:name, [arg0, ..])` on `owner`.
    pub(crate) fn define_method_missing(&mut self, call: CallId, owner: TypeId, name: &str) -> DefId {
        let count = self.call(call).args.len();
        let params = (0..count).map(|i| Param::new(format!("arg{}", i))).collect();
        let vars: Vec<Expr> = (0..count).map(|i| Expr::var(format!("arg{}", i))).collect();
        let forwarded = if vars.is_empty() {
            Expr::nil()
        } else {
            Expr::new(ExprKind::Array(vars))
        };
        let body = Expr::fcall("method_missing", vec![Expr::symbol(name), forwarded]);
        tracing::debug!(owner = %self.universe.display(owner), name, "synthesized method_missing forwarder");
        self.universe
            .register_definition(owner, Def::new(name, params, Some(body)), DefOrigin::MethodMissing)
    }
}

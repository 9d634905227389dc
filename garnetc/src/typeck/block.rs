//! Blocks and `yield`.
//!
//! A definition declaring a typed block argument (`&block : A, B -> C`)
//! fixes the block parameter types itself: they are resolved once per match
//! and the block's parameters bind to them. The declared output, when
//! present, must accept the block body's type, and the body is frozen
//! afterwards so later widening surfaces as an error instead of silently
//! changing an instantiation that was cached under the old type. A body
//! still untyped at that point (it depends on a definition being
//! instantiated) is checked when its first type arrives.
//!
//! Without a typed block argument the block parameters simply follow the
//! values yielded to them.

use std::collections::BTreeMap;

use crate::ast::{Expr, TypeExpr};
use crate::span::Span;
use crate::types::TypeId;

use super::binding::NodeId;
use super::call::CallId;
use super::context::{InferenceContext, ScopeId};
use super::error::{TypeError, TypeErrorKind, TypeResult};
use super::lookup::TypeLookup;
use super::matcher::{Match, Matcher};

/// Output type a typed block argument declares, kept with the body it constrains.
#[derive(Debug, Clone)]
pub(crate) struct DeclaredOutput {
    pub output: TypeExpr,
    pub owner: TypeId,
    pub free_vars: BTreeMap<String, TypeId>,
}

impl InferenceContext {
    /// Bind the block of `call` against the typed block argument of `m`.
    ///
    /// Returns the yield variables the instantiated body yields into, or
    /// `None` when the definition has no typed block argument. Free variables
    /// bound by the block output are recorded in `m`.
    pub(crate) fn match_block_arg(&mut self, call: CallId, m: &mut Match) -> TypeResult<Option<Vec<NodeId>>> {
        let def = self.universe.def_ast(m.def);
        let (Some(block_arg), Some(_)) = (&def.block_arg, self.universe.def(m.def).yields) else {
            return Ok(None);
        };
        let Some(block) = self.call(call).block.clone() else {
            return Ok(None);
        };
        let span = self.call(call).span;

        let mut yield_vars = Vec::new();
        for input in block_arg.inputs.iter().flatten() {
            let ty = TypeLookup::new(&mut self.universe, m.owner, &m.free_vars, span).lookup(input)?;
            let ty = if self.universe.is_abstract(ty) {
                self.universe.hierarchy(ty)
            } else {
                ty
            };
            yield_vars.push(self.typed_node(ty, span));
        }

        for (i, arg) in block.args.iter().enumerate() {
            let source = yield_vars.get(i).copied().unwrap_or(self.nil_node);
            self.call_mut(call).block_bindings.push((*arg, source));
            self.bind_to(*arg, &[source])?;
        }

        let Some(body) = self.visit_block(call)? else {
            return Ok(Some(yield_vars));
        };
        if let Some(output) = &block_arg.output {
            let declared = DeclaredOutput {
                output: output.clone(),
                owner: m.owner,
                free_vars: m.free_vars.clone(),
            };
            match self.graph.ty(body) {
                Some(found) => m.free_vars = self.check_block_output(body, found, &declared)?,
                // Still in flight: checked when the body gets its first type.
                None => {
                    self.declared_outputs.insert(body, declared);
                }
            }
            self.graph.get_mut(body).frozen = true;
        }
        Ok(Some(yield_vars))
    }

    /// Reject a block body type the declared output does not accept.
    ///
    /// Returns the free variables with those the output binds added.
    pub(crate) fn check_block_output(
        &mut self,
        body: NodeId,
        found: TypeId,
        declared: &DeclaredOutput,
    ) -> TypeResult<BTreeMap<String, TypeId>> {
        let mut free_vars = declared.free_vars.clone();
        let accepted =
            Matcher::new(&mut self.universe).restrict(found, &declared.output, declared.owner, &mut free_vars);
        if accepted == Some(found) {
            return Ok(free_vars);
        }
        let expected = match &declared.output {
            TypeExpr::SelfType => self.universe.display(declared.owner),
            other => self.universe.display_type_expr(other),
        };
        TypeError::new(
            TypeErrorKind::BlockReturnMismatch {
                expected,
                found: self.universe.display(found),
            },
            self.graph.get(body).span,
        )
        .into_err()
    }

    /// Visit the block body of `call` once, returning its node.
    pub(crate) fn visit_block(&mut self, call: CallId) -> TypeResult<Option<NodeId>> {
        let span = self.call(call).span;
        let Some(block) = self.call_mut(call).block.as_mut() else {
            return Ok(None);
        };
        if block.visited {
            return Ok(block.body_node);
        }
        block.visited = true;
        let (scope, body) = (block.scope, block.body.clone());

        let node = match body {
            Some(body) => self.visit_expr(scope, &body)?,
            None => {
                let nil = self.universe.nil();
                self.typed_node(nil, span)
            }
        };
        if let Some(block) = self.call_mut(call).block.as_mut() {
            block.body_node = Some(node);
        }
        Ok(Some(node))
    }

    /// `yield a, b`: feed the enclosing call's block and take its body's type.
    pub(crate) fn visit_yield(&mut self, scope: ScopeId, args: &[Expr], span: Span) -> TypeResult<NodeId> {
        let values = args
            .iter()
            .map(|arg| self.visit_expr(scope, arg))
            .collect::<TypeResult<Vec<_>>>()?;

        let entry = self.scope(scope);
        let (call, typed) = (entry.call, entry.yield_vars.is_some());
        let Some(call) = call.filter(|call| self.call(*call).block.is_some()) else {
            let nil = self.universe.nil();
            return Ok(self.typed_node(nil, span));
        };

        if !typed {
            let block_args = self
                .call(call)
                .block
                .as_ref()
                .map(|block| block.args.clone())
                .unwrap_or_default();
            for (i, arg) in block_args.into_iter().enumerate() {
                let source = values.get(i).copied().unwrap_or(self.nil_node);
                self.bind_to(arg, &[source])?;
            }
        }

        let node = self.new_node(span);
        if let Some(body) = self.visit_block(call)? {
            self.bind_to(node, &[body])?;
        }
        Ok(node)
    }
}

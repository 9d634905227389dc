//! The inference context.
//!
//! [`InferenceContext`] owns every piece of state of one inference run: the
//! type universe, the binding graph, call sites, scopes, typed definitions,
//! the instantiation cache and the subclass observers. The other `typeck`
//! modules add `impl InferenceContext` blocks for their part of the work.
//!
//! Propagation is synchronous. Changing a node's type re-enters its
//! observers before `set_type` returns: dependent nodes recompute, call sites
//! recalculate their targets. Dependent nodes are walked depth-first with an
//! explicit stack, so only call recalculation nests one propagation inside
//! another.

use std::collections::BTreeMap;
use std::fmt;

use crate::ast;
use crate::config::{Config, InferenceConfig};
use crate::span::Span;
use crate::types::{DefId, TypeId, Universe};

use super::binding::{BindingGraph, Derive, NodeId, Observer};
use super::block::DeclaredOutput;
use super::cache::{InstantiationCache, TypedDef, TypedDefId};
use super::call::{CallId, CallSite};
use super::error::{TypeError, TypeErrorKind, TypeResult};
use super::observer::SubclassObservers;

/// Index of a [`Scope`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl fmt::Debug for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeId({})", self.0)
    }
}

/// A lexical scope: the top level, a class body, a typed definition body or a block.
#[derive(Debug, Clone)]
pub struct Scope {
    /// Enclosing scope for blocks and function literals; `None` for the rest.
    pub parent: Option<ScopeId>,
    pub vars: BTreeMap<String, NodeId>,
    pub self_type: TypeId,
    /// Where nested `def`s register.
    pub def_owner: TypeId,
    pub typed_def: Option<TypedDefId>,
    /// The call being instantiated; its block receives this body's yields.
    pub call: Option<CallId>,
    pub free_vars: BTreeMap<String, TypeId>,
    /// Pinned block parameter types from a typed block argument.
    pub yield_vars: Option<Vec<NodeId>>,
    /// The definition this body belongs to.
    pub def: Option<DefId>,
}

impl Scope {
    fn new(self_type: TypeId, def_owner: TypeId) -> Self {
        Self {
            parent: None,
            vars: BTreeMap::new(),
            self_type,
            def_owner,
            typed_def: None,
            call: None,
            free_vars: BTreeMap::new(),
            yield_vars: None,
            def: None,
        }
    }
}

/// State of one inference run.
pub struct InferenceContext {
    pub(crate) universe: Universe,
    pub(crate) graph: BindingGraph,
    pub(crate) calls: Vec<CallSite>,
    pub(crate) scopes: Vec<Scope>,
    pub(crate) typed_defs: Vec<TypedDef>,
    pub(crate) cache: InstantiationCache,
    pub(crate) observers: SubclassObservers,
    pub(crate) config: InferenceConfig,
    /// Shared `nil` source for block parameters nothing is yielded to.
    pub(crate) nil_node: NodeId,
    /// Frozen block bodies still untyped when their output was checked.
    pub(crate) declared_outputs: BTreeMap<NodeId, DeclaredOutput>,
    instantiation_depth: usize,
    propagation_depth: usize,
}

impl InferenceContext {
    /// The root scope of the program.
    pub const ROOT: ScopeId = ScopeId(0);

    pub fn new(config: &Config) -> Self {
        let universe = Universe::new();
        let program = universe.program();
        let nil = universe.nil();
        let mut graph = BindingGraph::new();
        let nil_node = graph.add_typed(nil, Span::dummy());
        Self {
            universe,
            graph,
            calls: Vec::new(),
            scopes: vec![Scope::new(program, program)],
            typed_defs: Vec::new(),
            cache: InstantiationCache::new(),
            observers: SubclassObservers::new(),
            config: config.inference.clone(),
            nil_node,
            declared_outputs: BTreeMap::new(),
            instantiation_depth: 0,
            propagation_depth: 0,
        }
    }

    /// Visit every top-level expression of `program`, returning their nodes.
    pub fn check(&mut self, program: &ast::Program) -> TypeResult<Vec<NodeId>> {
        let mut nodes = Vec::with_capacity(program.exprs.len());
        for expr in &program.exprs {
            nodes.push(self.visit_expr(Self::ROOT, expr)?);
        }
        tracing::debug!(
            nodes = self.graph.len(),
            calls = self.calls.len(),
            typed_defs = self.typed_defs.len(),
            cache_hits = self.cache.hits(),
            cache_misses = self.cache.misses(),
            "inference finished"
        );
        Ok(nodes)
    }

    // ====================================================================
    // Queries
    // ====================================================================

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn graph(&self) -> &BindingGraph {
        &self.graph
    }

    pub fn type_of(&self, node: NodeId) -> Option<TypeId> {
        self.graph.ty(node)
    }

    /// Display the type of a node, or `?` while it is untyped.
    pub fn display_node(&self, node: NodeId) -> String {
        self.graph
            .ty(node)
            .map_or_else(|| "?".to_string(), |ty| self.universe.display(ty))
    }

    /// Type of a top-level variable.
    pub fn var_type(&self, name: &str) -> Option<TypeId> {
        let node = self.scope(Self::ROOT).vars.get(name)?;
        self.graph.ty(*node)
    }

    pub fn call(&self, id: CallId) -> &CallSite {
        &self.calls[id.0 as usize]
    }

    pub(crate) fn call_mut(&mut self, id: CallId) -> &mut CallSite {
        &mut self.calls[id.0 as usize]
    }

    /// Every call site, in creation order.
    pub fn calls(&self) -> impl Iterator<Item = (CallId, &CallSite)> {
        self.calls
            .iter()
            .enumerate()
            .map(|(i, call)| (CallId(i as u32), call))
    }

    /// Calls named `name` written at the top level of the program.
    pub fn root_calls_named(&self, name: &str) -> Vec<CallId> {
        self.calls()
            .filter(|(_, call)| call.name == name && call.scope == Self::ROOT)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn typed_def(&self, id: TypedDefId) -> &TypedDef {
        &self.typed_defs[id.0 as usize]
    }

    pub fn typed_defs(&self) -> &[TypedDef] {
        &self.typed_defs
    }

    pub fn cache(&self) -> &InstantiationCache {
        &self.cache
    }

    pub fn observers(&self) -> &SubclassObservers {
        &self.observers
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub(crate) fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    pub(crate) fn push_scope(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(scope);
        id
    }

    /// A top-level or class-body scope.
    pub(crate) fn new_scope(&mut self, self_type: TypeId, def_owner: TypeId) -> ScopeId {
        self.push_scope(Scope::new(self_type, def_owner))
    }

    /// A scope nested in `parent` that sees its variables.
    pub(crate) fn child_scope(&mut self, parent: ScopeId) -> ScopeId {
        let mut scope = self.scope(parent).clone();
        scope.parent = Some(parent);
        scope.vars.clear();
        self.push_scope(scope)
    }

    /// Find a variable in `scope` or the scopes it is nested in.
    pub(crate) fn lookup_var(&self, scope: ScopeId, name: &str) -> Option<NodeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let entry = self.scope(id);
            if let Some(node) = entry.vars.get(name) {
                return Some(*node);
            }
            current = entry.parent;
        }
        None
    }

    /// The definition-body scope `scope` belongs to, skipping blocks.
    pub(crate) fn method_scope(&self, scope: ScopeId) -> ScopeId {
        let mut current = scope;
        while let Some(parent) = self.scope(current).parent {
            current = parent;
        }
        current
    }

    // ====================================================================
    // Propagation
    // ====================================================================

    pub(crate) fn new_node(&mut self, span: Span) -> NodeId {
        self.graph.add(Derive::Union, span)
    }

    pub(crate) fn typed_node(&mut self, ty: TypeId, span: Span) -> NodeId {
        self.graph.add_typed(ty, span)
    }

    /// Make `node` depend on `deps` and recompute its type.
    pub(crate) fn bind_to(&mut self, node: NodeId, deps: &[NodeId]) -> TypeResult<()> {
        for dep in deps {
            self.graph.add_edge(node, *dep);
        }
        self.update(node)
    }

    pub(crate) fn unbind_from(&mut self, node: NodeId, deps: &[NodeId]) {
        for dep in deps {
            self.graph.remove_edge(node, *dep);
        }
    }

    /// Recompute `node` from its dependencies.
    pub(crate) fn update(&mut self, node: NodeId) -> TypeResult<()> {
        let Some(ty) = self.graph.derive_type(node, &mut self.universe) else {
            return Ok(());
        };
        if self.graph.ty(node) == Some(ty) {
            return Ok(());
        }
        self.set_type(node, ty)
    }

    /// Assign a type and notify the observers of `node`.
    pub(crate) fn set_type(&mut self, node: NodeId, ty: TypeId) -> TypeResult<()> {
        self.assign_type(node, ty)?;
        self.notify(node)
    }

    fn assign_type(&mut self, node: NodeId, ty: TypeId) -> TypeResult<()> {
        let entry = self.graph.get(node);
        let (frozen, current, span) = (entry.frozen, entry.ty, entry.span);
        if frozen {
            match current {
                Some(current) if current != ty => {
                    return TypeError::new(
                        TypeErrorKind::BlockReturnMismatch {
                            expected: self.universe.display(current),
                            found: self.universe.display(ty),
                        },
                        span,
                    )
                    .into_err();
                }
                Some(_) => {}
                None => {
                    if let Some(declared) = self.declared_outputs.remove(&node) {
                        self.check_block_output(node, ty, &declared)?;
                    }
                }
            }
        }
        self.graph.get_mut(node).ty = Some(ty);
        Ok(())
    }

    fn notify(&mut self, node: NodeId) -> TypeResult<()> {
        if self.graph.get(node).observers.is_empty() {
            return Ok(());
        }
        self.propagation_depth += 1;
        let result = if self.propagation_depth > self.config.max_propagation_depth {
            TypeError::new(
                TypeErrorKind::InferenceLimitExceeded {
                    what: "type propagation".to_string(),
                    limit: self.config.max_propagation_depth,
                },
                self.graph.get(node).span,
            )
            .into_err()
        } else {
            self.propagate_from(node)
        };
        self.propagation_depth -= 1;
        result
    }

    /// Re-enter everything downstream of `node`, in depth-first order.
    fn propagate_from(&mut self, node: NodeId) -> TypeResult<()> {
        let mut pending: Vec<Observer> = self.graph.get(node).observers.iter().rev().copied().collect();
        while let Some(observer) = pending.pop() {
            match observer {
                Observer::Node(dependent) => {
                    let Some(ty) = self.graph.derive_type(dependent, &mut self.universe) else {
                        continue;
                    };
                    if self.graph.ty(dependent) == Some(ty) {
                        continue;
                    }
                    self.assign_type(dependent, ty)?;
                    pending.extend(self.graph.get(dependent).observers.iter().rev().copied());
                }
                Observer::Call(call) => self.recalculate(call)?,
            }
        }
        Ok(())
    }

    /// Run `f` one instantiation level deeper.
    pub(crate) fn nested_instantiation<T>(
        &mut self,
        span: Span,
        f: impl FnOnce(&mut Self) -> TypeResult<T>,
    ) -> TypeResult<T> {
        if self.instantiation_depth >= self.config.max_instantiation_depth {
            return TypeError::new(
                TypeErrorKind::InferenceLimitExceeded {
                    what: "method instantiation".to_string(),
                    limit: self.config.max_instantiation_depth,
                },
                span,
            )
            .into_err();
        }
        self.instantiation_depth += 1;
        let result = f(self);
        self.instantiation_depth -= 1;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_propagates_through_chain() {
        let mut ctx = InferenceContext::new(&Config::default());
        let b = *ctx.universe.builtins();
        let literal = ctx.typed_node(b.int32, Span::dummy());
        let var = ctx.new_node(Span::dummy());
        let read = ctx.new_node(Span::dummy());
        ctx.bind_to(read, &[var]).unwrap();
        assert_eq!(ctx.type_of(read), None);
        ctx.bind_to(var, &[literal]).unwrap();
        assert_eq!(ctx.type_of(read), Some(b.int32));

        let text = ctx.typed_node(b.string, Span::dummy());
        ctx.bind_to(var, &[text]).unwrap();
        let widened = ctx.type_of(read).unwrap();
        assert!(ctx.universe.includes_type(widened, b.string));
        assert!(ctx.universe.includes_type(widened, b.int32));
    }

    #[test]
    fn test_frozen_node_rejects_change() {
        let mut ctx = InferenceContext::new(&Config::default());
        let b = *ctx.universe.builtins();
        let body = ctx.new_node(Span::dummy());
        let one = ctx.typed_node(b.int32, Span::dummy());
        ctx.bind_to(body, &[one]).unwrap();
        ctx.graph.get_mut(body).frozen = true;

        let nil = ctx.typed_node(b.nil, Span::dummy());
        let err = ctx.bind_to(body, &[nil]).unwrap_err();
        assert_eq!(
            err.kind,
            TypeErrorKind::BlockReturnMismatch {
                expected: "Int32".into(),
                found: "Nil | Int32".into(),
            }
        );
    }

    #[test]
    fn test_cycles_terminate() {
        let mut ctx = InferenceContext::new(&Config::default());
        let b = *ctx.universe.builtins();
        let a = ctx.new_node(Span::dummy());
        let c = ctx.new_node(Span::dummy());
        ctx.bind_to(a, &[c]).unwrap();
        ctx.bind_to(c, &[a]).unwrap();
        let one = ctx.typed_node(b.int32, Span::dummy());
        ctx.bind_to(a, &[one]).unwrap();
        assert_eq!(ctx.type_of(a), Some(b.int32));
        assert_eq!(ctx.type_of(c), Some(b.int32));
    }

    #[test]
    fn test_long_chain_stays_within_propagation_limit() {
        let mut config = Config::default();
        config.inference.max_propagation_depth = 2;
        let mut ctx = InferenceContext::new(&config);
        let b = *ctx.universe.builtins();
        let mut chain = vec![ctx.new_node(Span::dummy())];
        for _ in 0..2000 {
            let next = ctx.new_node(Span::dummy());
            let prev = *chain.last().unwrap();
            ctx.bind_to(next, &[prev]).unwrap();
            chain.push(next);
        }
        let one = ctx.typed_node(b.int32, Span::dummy());
        ctx.bind_to(chain[0], &[one]).unwrap();
        assert_eq!(ctx.type_of(*chain.last().unwrap()), Some(b.int32));

        let text = ctx.typed_node(b.string, Span::dummy());
        ctx.bind_to(chain[0], &[text]).unwrap();
        let tail = ctx.type_of(*chain.last().unwrap()).unwrap();
        assert!(ctx.universe.includes_type(tail, b.string));
    }

    #[test]
    fn test_untyped_frozen_node_checks_declared_output() {
        let mut ctx = InferenceContext::new(&Config::default());
        let b = *ctx.universe.builtins();
        let program = ctx.universe.program();
        let body = ctx.new_node(Span::dummy());
        ctx.graph.get_mut(body).frozen = true;
        ctx.declared_outputs.insert(
            body,
            DeclaredOutput {
                output: crate::ast::TypeExpr::named("Int32"),
                owner: program,
                free_vars: BTreeMap::new(),
            },
        );

        let c = ctx.typed_node(b.char, Span::dummy());
        let err = ctx.bind_to(body, &[c]).unwrap_err();
        assert_eq!(
            err.kind,
            TypeErrorKind::BlockReturnMismatch {
                expected: "Int32".into(),
                found: "Char".into(),
            }
        );
        assert_eq!(ctx.type_of(body), None);
    }
}

//! Call sites and their recalculation.
//!
//! A call site is re-entered whenever one of its inputs (receiver, arguments,
//! `&fn` block argument) changes type, or when a class is added below a
//! hierarchy it resolved through. Each recalculation:
//!
//! 1. hands lib receivers to the foreign adapter,
//! 2. turns into `NoReturn` when an argument is `NoReturn`,
//! 3. waits until every input is typed,
//! 4. stops if the ordered input types equal the last ones seen,
//! 5. drops the previous resolution (targets, parameter and block bindings,
//!    observer registrations),
//! 6. resolves owner by owner and binds to the typed definitions found.
//!
//! If resolving re-enters the same call and that inner recalculation
//! finishes first, its result stands and the outer one is discarded.

use std::fmt;
use std::rc::Rc;

use crate::ast::Expr;
use crate::span::Span;
use crate::types::{TypeId, TypeKind};

use super::binding::NodeId;
use super::cache::TypedDefId;
use super::context::{InferenceContext, ScopeId};
use super::error::{TypeError, TypeErrorKind, TypeResult};
use super::ffi::ArgConversion;
use super::matcher::{Match, MatchKind, MatchSet, Matcher};

/// Index of a [`CallSite`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(pub u32);

impl fmt::Debug for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallId({})", self.0)
    }
}

/// One argument of a call.
#[derive(Debug, Clone)]
pub struct CallArg {
    pub node: NodeId,
    /// Variable name of an `out` argument.
    pub out: Option<String>,
    pub span: Span,
}

/// The block of a call, literal or rewritten from `&fn`.
#[derive(Debug, Clone)]
pub struct BlockInfo {
    /// One node per block parameter.
    pub args: Vec<NodeId>,
    pub arg_names: Vec<String>,
    pub body: Option<Rc<Expr>>,
    /// Set once the body has been visited.
    pub body_node: Option<NodeId>,
    pub scope: ScopeId,
    pub visited: bool,
}

/// A call expression in the binding graph.
#[derive(Debug, Clone)]
pub struct CallSite {
    pub node: NodeId,
    pub name: String,
    pub obj: Option<NodeId>,
    pub args: Vec<CallArg>,
    pub block: Option<BlockInfo>,
    pub block_arg: Option<NodeId>,
    pub has_parens: bool,
    /// Scope the call was written in.
    pub scope: ScopeId,
    pub span: Span,
    pub(crate) targets: Option<Vec<TypedDefId>>,
    pub(crate) signature: Option<Vec<TypeId>>,
    /// Edges `parameter -> argument` made for the current targets.
    pub(crate) param_bindings: Vec<(NodeId, NodeId)>,
    /// Edges `block parameter -> yield variable` made for the current targets.
    pub(crate) block_bindings: Vec<(NodeId, NodeId)>,
    pub conversions: Vec<ArgConversion>,
    /// The receiver is `NoReturn`; resolution waits for more information.
    pub deferred: bool,
}

impl CallSite {
    pub(crate) fn new(node: NodeId, name: impl Into<String>, scope: ScopeId, span: Span) -> Self {
        Self {
            node,
            name: name.into(),
            obj: None,
            args: Vec::new(),
            block: None,
            block_arg: None,
            has_parens: false,
            scope,
            span,
            targets: None,
            signature: None,
            param_bindings: Vec::new(),
            block_bindings: Vec::new(),
            conversions: Vec::new(),
            deferred: false,
        }
    }

    /// Typed definitions the call currently resolves to.
    pub fn targets(&self) -> &[TypedDefId] {
        self.targets.as_deref().unwrap_or(&[])
    }

    /// Input types of the last completed recalculation.
    pub fn signature(&self) -> Option<&[TypeId]> {
        self.signature.as_deref()
    }

    /// A call whose receiver never returns; codegen treats it as unreachable.
    pub fn is_dead(&self) -> bool {
        self.deferred && self.targets().is_empty()
    }

    pub(crate) fn clear_signature(&mut self) {
        self.signature = None;
    }
}

impl InferenceContext {
    /// Re-resolve `id` against the current types of its inputs.
    pub(crate) fn recalculate(&mut self, id: CallId) -> TypeResult<()> {
        let obj = self.call(id).obj;
        let obj_ty = obj.and_then(|node| self.graph.ty(node));
        if obj_ty.is_some_and(|ty| self.universe.is_foreign(ty)) {
            return self.recalculate_foreign(id);
        }
        if obj.is_none() || obj_ty.is_some() {
            self.check_not_foreign_out_args(id)?;
        }

        let no_return = self.universe.no_return();
        if self
            .call(id)
            .args
            .iter()
            .any(|arg| self.graph.ty(arg.node) == Some(no_return))
        {
            let node = self.call(id).node;
            return self.set_type(node, no_return);
        }

        let Some(signature) = self.input_signature(id) else {
            return Ok(());
        };
        if self.call(id).signature.as_ref() == Some(&signature) {
            return Ok(());
        }
        self.call_mut(id).signature = Some(signature);

        self.reset_resolution(id);
        if self.call(id).block_arg.is_some() {
            self.replace_block_arg_with_block(id)?;
        }
        self.observe_argument_hierarchies(id);

        let (name, scope) = {
            let site = self.call(id);
            (site.name.clone(), site.scope)
        };
        tracing::trace!(call = ?id, name = %name, "recalculate");

        let targets = match obj_ty {
            Some(obj_ty) => {
                let members = match self.universe.kind(obj_ty) {
                    TypeKind::Union(members) => members.clone(),
                    _ => vec![obj_ty],
                };
                let mut targets = Vec::new();
                for member in members {
                    targets.extend(self.lookup_matches_in(id, member, None, &name)?);
                }
                targets
            }
            None if name == "super" => self.lookup_matches_in_super(id)?,
            None => {
                let self_type = self.scope(scope).self_type;
                self.lookup_matches_in(id, self_type, None, &name)?
            }
        };

        // A recalculation triggered while resolving already bound this call.
        if self.call(id).targets.is_some() {
            return Ok(());
        }

        let nodes: Vec<NodeId> = targets.iter().map(|t| self.typed_def(*t).node).collect();
        self.call_mut(id).targets = Some(targets);
        let node = self.call(id).node;
        self.bind_to(node, &nodes)
    }

    /// Ordered types of receiver, arguments and block argument, once all are known.
    pub(crate) fn input_signature(&self, id: CallId) -> Option<Vec<TypeId>> {
        let site = self.call(id);
        let mut signature = Vec::with_capacity(site.args.len() + 2);
        for arg in &site.args {
            signature.push(self.graph.ty(arg.node)?);
        }
        if let Some(obj) = site.obj {
            signature.push(self.graph.ty(obj)?);
        }
        if let Some(block_arg) = site.block_arg {
            signature.push(self.graph.ty(block_arg)?);
        }
        Some(signature)
    }

    pub(crate) fn arg_types(&self, id: CallId) -> Vec<TypeId> {
        self.call(id)
            .args
            .iter()
            .filter_map(|arg| self.graph.ty(arg.node))
            .collect()
    }

    /// Undo everything the previous resolution of `id` bound.
    fn reset_resolution(&mut self, id: CallId) {
        let site = self.call_mut(id);
        let targets = site.targets.take().unwrap_or_default();
        let params = std::mem::take(&mut site.param_bindings);
        let block_args = std::mem::take(&mut site.block_bindings);
        site.deferred = false;
        let node = site.node;
        let body = site.block.as_ref().and_then(|block| block.body_node);

        let target_nodes: Vec<NodeId> = targets.iter().map(|t| self.typed_def(*t).node).collect();
        self.unbind_from(node, &target_nodes);
        for (param, arg) in params {
            self.graph.remove_edge(param, arg);
        }
        for (arg, var) in block_args {
            self.graph.remove_edge(arg, var);
        }
        if let Some(body) = body {
            self.graph.get_mut(body).frozen = false;
            self.declared_outputs.remove(&body);
        }
        self.observers.remove_call(id);
    }

    /// Resolve `name` on one owner and instantiate every match.
    pub(crate) fn lookup_matches_in(
        &mut self,
        id: CallId,
        owner: TypeId,
        self_type: Option<TypeId>,
        name: &str,
    ) -> TypeResult<Vec<TypedDefId>> {
        if matches!(
            self.universe.kind(owner),
            TypeKind::Hierarchy(_) | TypeKind::HierarchyMetaclass(_)
        ) {
            return self.lookup_in_hierarchy(id, owner, self_type, name);
        }

        let arg_types = self.arg_types(id);
        let has_block = self.call(id).block.is_some();
        let has_obj = self.call(id).obj.is_some();
        let program = self.universe.program();

        let mut set = Matcher::new(&mut self.universe).lookup_matches(owner, name, &arg_types, has_block);
        if set.is_empty() {
            if name == "new" && self.is_constructible_metaclass(owner) {
                let synthesized = self.define_new(id, owner, &arg_types)?;
                if !synthesized.is_empty() {
                    set = synthesized;
                }
            } else if owner != program {
                let program_set = Matcher::new(&mut self.universe).lookup_matches(program, name, &arg_types, has_block);
                if program_set.is_empty()
                    && self
                        .universe
                        .lookup_first_def(owner, "method_missing", has_block)
                        .is_some()
                {
                    let def = self.define_method_missing(id, owner, name);
                    let forward = Match {
                        def,
                        owner,
                        arg_types: arg_types.clone(),
                        free_vars: Default::default(),
                        kind: MatchKind::MethodMissing,
                    };
                    set = MatchSet::complete(vec![forward], owner);
                } else if !has_obj && !program_set.is_empty() {
                    set = program_set;
                }
            }
        }

        if set.is_empty() && self.universe.is_abstract(owner) {
            let hierarchy = self.universe.hierarchy(owner);
            let targets = self.lookup_in_hierarchy(id, hierarchy, self_type, name)?;
            if targets.is_empty() {
                return Err(self.matches_not_found(id, owner, name, Some(&set)));
            }
            return Ok(targets);
        }

        if set.is_empty() {
            if self.universe.is_no_return(owner) {
                tracing::debug!(call = ?id, name, "receiver is NoReturn, deferring");
                self.call_mut(id).deferred = true;
                return Ok(Vec::new());
            }
            return Err(self.matches_not_found(id, set.owner, name, Some(&set)));
        }

        let mut targets = Vec::with_capacity(set.matches.len());
        for m in set.matches {
            targets.push(self.instantiate(id, m, self_type)?);
        }
        Ok(targets)
    }

    /// Resolve on every concrete class of a hierarchy, observing its base.
    fn lookup_in_hierarchy(
        &mut self,
        id: CallId,
        owner: TypeId,
        self_type: Option<TypeId>,
        name: &str,
    ) -> TypeResult<Vec<TypedDefId>> {
        let (base, metaclass) = match self.universe.kind(owner) {
            TypeKind::Hierarchy(base) => (*base, false),
            TypeKind::HierarchyMetaclass(base) => (*base, true),
            _ => return self.lookup_matches_in(id, owner, self_type, name),
        };
        self.observers.add(id, base);

        let hierarchy = self.universe.hierarchy(base);
        let mut targets = Vec::new();
        for class in self.universe.concrete_types(hierarchy) {
            let concrete = if metaclass {
                self.universe.metaclass(class)
            } else {
                class
            };
            targets.extend(self.lookup_matches_in(id, concrete, self_type, name)?);
        }
        Ok(targets)
    }

    /// `super`: resolve the enclosing definition's name on its owner's parent.
    fn lookup_matches_in_super(&mut self, id: CallId) -> TypeResult<Vec<TypedDefId>> {
        let scope = self.method_scope(self.call(id).scope);
        let span = self.call(id).span;
        let Some(def) = self.scope(scope).def else {
            return TypeError::new(
                TypeErrorKind::UndefinedMethod {
                    name: "super".to_string(),
                    owner: None,
                },
                span,
            )
            .into_err();
        };
        let info = self.universe.def(def);
        let (def_owner, def_name) = (info.owner, info.name().to_string());
        let self_type = self.scope(scope).self_type;

        match self.super_owner(def_owner) {
            Some(parent) => self.lookup_matches_in(id, parent, Some(self_type), &def_name),
            None => TypeError::new(
                TypeErrorKind::UndefinedMethod {
                    name: def_name,
                    owner: Some(self.universe.display(def_owner)),
                },
                span,
            )
            .into_err(),
        }
    }

    fn super_owner(&mut self, owner: TypeId) -> Option<TypeId> {
        match self.universe.kind(owner).clone() {
            TypeKind::Metaclass(inner) => {
                let parent = self.universe.parent(inner)?;
                Some(self.universe.metaclass(parent))
            }
            TypeKind::Hierarchy(base) => self.universe.parent(base),
            _ => self.universe.parent(owner),
        }
    }

    fn is_constructible_metaclass(&self, owner: TypeId) -> bool {
        match self.universe.kind(owner) {
            TypeKind::Metaclass(instance) => {
                self.universe.is_class(*instance) && !self.universe.is_pointer(*instance)
            }
            _ => false,
        }
    }

    /// Rewrite `&fn` into a block `{ |#arg0, ..| fn.call(#arg0, ..) }`.
    fn replace_block_arg_with_block(&mut self, id: CallId) -> TypeResult<()> {
        let site = self.call(id);
        let (Some(block_arg), caller, span) = (site.block_arg, site.scope, site.span) else {
            return Ok(());
        };
        let Some(ty) = self.graph.ty(block_arg) else {
            return Ok(());
        };
        let TypeKind::Fun { args, .. } = self.universe.kind(ty).clone() else {
            return TypeError::new(
                TypeErrorKind::ExpectedFunctionType {
                    found: self.universe.display(ty),
                },
                span,
            )
            .into_err();
        };

        let scope = self.child_scope(caller);
        self.scope_mut(scope).vars.insert("#fn".to_string(), block_arg);
        let names: Vec<String> = (0..args.len()).map(|i| format!("#arg{}", i)).collect();
        let mut arg_nodes = Vec::with_capacity(names.len());
        for name in &names {
            let node = self.new_node(span);
            self.scope_mut(scope).vars.insert(name.clone(), node);
            arg_nodes.push(node);
        }
        let body = Expr::call(
            Expr::var("#fn").at(span),
            "call",
            names.iter().map(|n| Expr::var(n.clone()).at(span)).collect(),
        )
        .at(span);

        self.call_mut(id).block = Some(BlockInfo {
            args: arg_nodes,
            arg_names: names,
            body: Some(Rc::new(body)),
            body_node: None,
            scope,
            visited: false,
        });
        Ok(())
    }

    /// Observe the bases of hierarchy-typed arguments.
    fn observe_argument_hierarchies(&mut self, id: CallId) {
        if !self.config.observe_argument_hierarchies {
            return;
        }
        for ty in self.arg_types(id) {
            let members = match self.universe.kind(ty) {
                TypeKind::Union(members) => members.clone(),
                _ => vec![ty],
            };
            for member in members {
                if let TypeKind::Hierarchy(base) = self.universe.kind(member) {
                    let base = *base;
                    self.observers.add(id, base);
                }
            }
        }
    }
}

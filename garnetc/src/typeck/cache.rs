//! Typed definitions and the instantiation cache.
//!
//! A typed definition is one method body specialized for one owner and one
//! tuple of argument types. The cache guarantees at most one body per
//! `(definition, owner, argument types, block type)`. An entry is inserted
//! before its body is visited, so a recursive call reaching the same key
//! reuses the in-flight definition instead of instantiating forever.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::ast;
use crate::types::{DefId, TypeId};

use super::binding::NodeId;
use super::call::CallId;
use super::context::{InferenceContext, Scope, ScopeId};
use super::error::{TypeError, TypeResult};
use super::matcher::{Match, MatchKind};

/// Index of a [`TypedDef`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypedDefId(pub u32);

impl fmt::Debug for TypedDefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypedDefId({})", self.0)
    }
}

/// A definition specialized for one instantiation.
#[derive(Debug, Clone)]
pub struct TypedDef {
    pub def: DefId,
    /// The owner the definition matched on.
    pub owner: TypeId,
    /// Type of `self` in the body; differs from `owner` for `super` calls.
    pub self_type: TypeId,
    /// Argument types after restriction.
    pub arg_types: Vec<TypeId>,
    /// Parameter nodes, pinned to `arg_types`.
    pub params: Vec<NodeId>,
    /// Return value.
    pub node: NodeId,
    pub body: Option<NodeId>,
    pub kind: MatchKind,
    pub scope: Option<ScopeId>,
    pub free_vars: BTreeMap<String, TypeId>,
}

/// Key of one instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub def: DefId,
    pub owner: TypeId,
    /// Restricted argument types, prefixed by the self type for `super` calls.
    pub arg_types: Vec<TypeId>,
    /// Type of the block body, for definitions with a typed block argument.
    pub block_type: Option<TypeId>,
}

/// Memo of typed definitions.
#[derive(Debug, Default)]
pub struct InstantiationCache {
    entries: HashMap<InstanceKey, TypedDefId>,
    hits: usize,
    misses: usize,
}

impl InstantiationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, key: &InstanceKey) -> Option<TypedDefId> {
        let found = self.entries.get(key).copied();
        match found {
            Some(_) => self.hits += 1,
            None => self.misses += 1,
        }
        found
    }

    pub fn insert(&mut self, key: InstanceKey, id: TypedDefId) {
        self.entries.insert(key, id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

impl InferenceContext {
    /// Fetch or create the typed definition backing `m` for `call`.
    pub(crate) fn instantiate(&mut self, call: CallId, mut m: Match, self_type: Option<TypeId>) -> TypeResult<TypedDefId> {
        let yield_vars = self.match_block_arg(call, &mut m)?;
        let def = self.universe.def_ast(m.def);

        let block_node = self.call(call).block.as_ref().map(|block| block.body_node);
        // Bodies yielding to an untyped block depend on that block; never share them.
        let use_cache = block_node.is_none() || def.block_arg.is_some();
        let block_type = match (&def.block_arg, block_node) {
            (Some(_), Some(body)) => body.and_then(|node| self.graph.ty(node)),
            _ => None,
        };

        let mut key_args = Vec::with_capacity(m.arg_types.len() + 1);
        key_args.extend(self_type);
        key_args.extend(m.arg_types.iter().copied());
        let key = InstanceKey {
            def: m.def,
            owner: m.owner,
            arg_types: key_args,
            block_type,
        };

        if use_cache {
            if let Some(existing) = self.cache.get(&key) {
                tracing::trace!(def = %def.name, typed = ?existing, "instantiation cache hit");
                let frame = self.instantiation_frame(call);
                return self
                    .bind_params(call, existing)
                    .map(|()| existing)
                    .map_err(|err| with_frame(err, frame));
            }
        }

        let frame = self.instantiation_frame(call);
        let id = self.create_typed_def(call, &m, self_type.unwrap_or(m.owner), yield_vars, &def)?;
        if use_cache {
            self.cache.insert(key, id);
        }
        tracing::debug!(
            def = %def.name,
            owner = %self.universe.display(m.owner),
            args = %self.universe.display_list(&m.arg_types),
            "instantiate"
        );
        self.visit_typed_body(id, &def).map_err(|err| with_frame(err, frame))?;
        Ok(id)
    }

    fn create_typed_def(
        &mut self,
        call: CallId,
        m: &Match,
        self_type: TypeId,
        yield_vars: Option<Vec<NodeId>>,
        def: &ast::Def,
    ) -> TypeResult<TypedDefId> {
        let id = TypedDefId(self.typed_defs.len() as u32);
        let scope = self.push_scope(Scope {
            parent: None,
            vars: BTreeMap::new(),
            self_type,
            def_owner: m.owner,
            typed_def: Some(id),
            call: Some(call),
            free_vars: m.free_vars.clone(),
            yield_vars,
            def: Some(m.def),
        });
        let node = self.new_node(def.span);
        self.typed_defs.push(TypedDef {
            def: m.def,
            owner: m.owner,
            self_type,
            arg_types: m.arg_types.clone(),
            params: Vec::new(),
            node,
            body: None,
            kind: m.kind,
            scope: Some(scope),
            free_vars: m.free_vars.clone(),
        });

        let arg_nodes: Vec<NodeId> = self.call(call).args.iter().map(|arg| arg.node).collect();
        let mut params = Vec::with_capacity(arg_nodes.len());
        for (param, (arg, ty)) in def.params.iter().zip(arg_nodes.iter().zip(&m.arg_types)) {
            let pinned = self.typed_node(*ty, def.span);
            self.graph.add_edge(pinned, *arg);
            self.call_mut(call).param_bindings.push((pinned, *arg));
            let var = self.new_node(def.span);
            self.bind_to(var, &[pinned])?;
            self.scope_mut(scope).vars.insert(param.name.clone(), var);
            params.push(pinned);
        }
        self.typed_defs[id.0 as usize].params = params;

        for param in def.params.iter().skip(arg_nodes.len()) {
            let value = match &param.default {
                Some(default) => self.visit_expr(scope, default)?,
                None => self.nil_node,
            };
            let var = self.new_node(def.span);
            self.bind_to(var, &[value])?;
            self.scope_mut(scope).vars.insert(param.name.clone(), var);
        }
        Ok(id)
    }

    fn visit_typed_body(&mut self, id: TypedDefId, def: &Rc<ast::Def>) -> TypeResult<()> {
        let typed = self.typed_def(id);
        let (node, scope) = (typed.node, typed.scope);
        let body = match (&def.body, scope) {
            (Some(body), Some(scope)) => {
                let span = def.span;
                self.nested_instantiation(span, |ctx| ctx.visit_expr(scope, body))?
            }
            _ => self.nil_node,
        };
        self.typed_defs[id.0 as usize].body = Some(body);
        self.bind_to(node, &[body])
    }

    /// Bind a cached definition's parameters to the arguments of `call`.
    fn bind_params(&mut self, call: CallId, id: TypedDefId) -> TypeResult<()> {
        let params = self.typed_def(id).params.clone();
        let args: Vec<NodeId> = self.call(call).args.iter().map(|arg| arg.node).collect();
        for (param, arg) in params.into_iter().zip(args) {
            self.call_mut(call).param_bindings.push((param, arg));
            self.bind_to(param, &[arg])?;
        }
        Ok(())
    }

    /// `while instantiating 'Owner#name(types)'` for errors leaving a body of `call`.
    fn instantiation_frame(&self, call: CallId) -> String {
        let site = self.call(call);
        let args: Vec<String> = site.args.iter().map(|arg| self.display_node(arg.node)).collect();
        match site.obj {
            Some(obj) => format!(
                "while instantiating '{}#{}({})'",
                self.display_node(obj),
                site.name,
                args.join(", ")
            ),
            None => format!("while instantiating '{}({})'", site.name, args.join(", ")),
        }
    }

    /// `Owner#name(types)` of a typed definition, or `name(types)` on the program.
    pub fn describe_typed_def(&self, id: TypedDefId) -> String {
        let typed = self.typed_def(id);
        let name = self.universe.def(typed.def).name().to_string();
        let args = self.universe.display_list(&typed.arg_types);
        if typed.owner == self.universe.program() {
            format!("{}({})", name, args)
        } else {
            format!("{}#{}({})", self.universe.display(typed.owner), name, args)
        }
    }
}

fn with_frame(mut err: Box<TypeError>, frame: String) -> Box<TypeError> {
    err.push_context(frame);
    err
}

//! Walk of normalized expressions into the binding graph.
//!
//! Every expression gets a node. Literals are typed on creation, variables
//! are nodes that union everything assigned to them, and each call becomes a
//! [`CallSite`] observing its inputs. Declarations (`def`, `class`, `lib`)
//! mutate the universe and evaluate to `nil`.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::ast::{self, Expr, ExprKind, TypeExpr};
use crate::span::Span;
use crate::types::{DefOrigin, TypeId};

use super::binding::{Derive, NodeId, Observer};
use super::call::{BlockInfo, CallArg, CallId, CallSite};
use super::context::{InferenceContext, ScopeId};
use super::error::{TypeError, TypeErrorKind, TypeResult};
use super::lookup::TypeLookup;

impl InferenceContext {
    pub(crate) fn visit_expr(&mut self, scope: ScopeId, expr: &Expr) -> TypeResult<NodeId> {
        let span = expr.span;
        let b = *self.universe.builtins();
        match &expr.kind {
            ExprKind::Nil => Ok(self.typed_node(b.nil, span)),
            ExprKind::Bool(_) => Ok(self.typed_node(b.bool, span)),
            ExprKind::Int(_) => Ok(self.typed_node(b.int32, span)),
            ExprKind::Char(_) => Ok(self.typed_node(b.char, span)),
            ExprKind::Str(_) => Ok(self.typed_node(b.string, span)),
            ExprKind::Symbol(_) => Ok(self.typed_node(b.symbol, span)),
            ExprKind::Array(items) => {
                let mut elements = Vec::with_capacity(items.len());
                for item in items {
                    elements.push(self.visit_expr(scope, item)?);
                }
                let node = self.graph.add(Derive::ArrayOf, span);
                self.bind_to(node, &elements)?;
                Ok(node)
            }
            ExprKind::Var(name) => match self.lookup_var(scope, name) {
                Some(var) => {
                    let node = self.new_node(span);
                    self.bind_to(node, &[var])?;
                    Ok(node)
                }
                None => self.visit_call(scope, &ast::Call::new(None, name.clone(), vec![]), span),
            },
            ExprKind::SelfRef => {
                let self_type = self.scope(scope).self_type;
                Ok(self.typed_node(self_type, span))
            }
            ExprKind::Assign { target, value } => {
                let value = self.visit_expr(scope, value)?;
                let var = self.declare_var(scope, target, span);
                self.bind_to(var, &[value])?;
                Ok(value)
            }
            ExprKind::Out(_) => TypeError::new(TypeErrorKind::OutOutsideForeignCall, span).into_err(),
            ExprKind::Path(path) => {
                let ty = self.resolve_type(scope, path, span)?;
                let meta = self.universe.metaclass(ty);
                Ok(self.typed_node(meta, span))
            }
            ExprKind::Call(call) => self.visit_call(scope, call, span),
            ExprKind::Yield(args) => self.visit_yield(scope, args, span),
            ExprKind::Seq(exprs) => {
                let mut last = None;
                for expr in exprs {
                    last = Some(self.visit_expr(scope, expr)?);
                }
                Ok(match last {
                    Some(node) => node,
                    None => self.typed_node(b.nil, span),
                })
            }
            ExprKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.visit_expr(scope, cond)?;
                let then = self.visit_expr(scope, then)?;
                let otherwise = self.visit_expr(scope, otherwise)?;
                let node = self.new_node(span);
                self.bind_to(node, &[then, otherwise])?;
                Ok(node)
            }
            ExprKind::Def(def) => {
                let owner = self.scope(scope).def_owner;
                let owner = if def.receiver_self {
                    self.universe.metaclass(owner)
                } else {
                    owner
                };
                self.universe
                    .register_definition(owner, (**def).clone(), DefOrigin::User);
                Ok(self.typed_node(b.nil, span))
            }
            ExprKind::ClassDef(class) => {
                self.visit_class_def(scope, class, span)?;
                Ok(self.typed_node(b.nil, span))
            }
            ExprKind::LibDef(lib) => {
                self.visit_lib_def(lib, span)?;
                Ok(self.typed_node(b.nil, span))
            }
            ExprKind::Primitive(ty) => {
                let ty = self.resolve_type(scope, ty, span)?;
                Ok(self.typed_node(ty, span))
            }
            ExprKind::Allocate(None) => {
                let ty = self.universe.instance_type(self.scope(scope).self_type);
                Ok(self.typed_node(ty, span))
            }
            ExprKind::Allocate(Some(ty)) => {
                let ty = self.resolve_type(scope, ty, span)?;
                Ok(self.typed_node(ty, span))
            }
            ExprKind::FunLiteral { params, body } => {
                let inner = self.child_scope(scope);
                let mut param_types = Vec::with_capacity(params.len());
                for param in params {
                    let ty = match &param.restriction {
                        Some(restriction) => self.resolve_type(scope, restriction, span)?,
                        None => b.nil,
                    };
                    let node = self.typed_node(ty, span);
                    self.scope_mut(inner).vars.insert(param.name.clone(), node);
                    param_types.push(ty);
                }
                let body = self.visit_expr(inner, body)?;
                let node = self.graph.add(Derive::FunOf(param_types), span);
                self.bind_to(node, &[body])?;
                Ok(node)
            }
            ExprKind::ClassOf(inner) => {
                let inner = self.visit_expr(scope, inner)?;
                let node = self.graph.add(Derive::MetaclassOf, span);
                self.bind_to(node, &[inner])?;
                Ok(node)
            }
        }
    }

    /// The variable `name` visible from `scope`, declared in `scope` if missing.
    fn declare_var(&mut self, scope: ScopeId, name: &str, span: Span) -> NodeId {
        if let Some(var) = self.lookup_var(scope, name) {
            return var;
        }
        let var = self.new_node(span);
        self.scope_mut(scope).vars.insert(name.to_string(), var);
        var
    }

    /// Resolve a type expression as seen from the body of `scope`.
    fn resolve_type(&mut self, scope: ScopeId, ty: &TypeExpr, span: Span) -> TypeResult<TypeId> {
        let entry = self.scope(scope);
        let (self_type, free_vars) = (entry.self_type, entry.free_vars.clone());
        TypeLookup::new(&mut self.universe, self_type, &free_vars, span).lookup(ty)
    }

    fn visit_class_def(&mut self, scope: ScopeId, class: &ast::ClassDef, span: Span) -> TypeResult<()> {
        let parent = match &class.superclass {
            Some(superclass) => Some(self.resolve_type(scope, superclass, span)?),
            None => None,
        };
        let (ty, created) =
            self.universe
                .declare_class(&class.name, parent, class.is_abstract, class.type_vars.clone());
        let meta = self.universe.metaclass(ty);
        let body = self.new_scope(meta, ty);
        for expr in &class.body {
            self.visit_expr(body, expr)?;
        }
        if created {
            self.on_new_subclass(ty)?;
        }
        Ok(())
    }

    fn visit_lib_def(&mut self, lib: &ast::LibDef, span: Span) -> TypeResult<()> {
        let lib_ty = self.universe.declare_lib(&lib.name);
        let no_free_vars = BTreeMap::new();
        for decl in &lib.structs {
            let mut fields = Vec::with_capacity(decl.fields.len());
            for (name, ty) in &decl.fields {
                let ty = TypeLookup::new(&mut self.universe, lib_ty, &no_free_vars, span).lookup(ty)?;
                fields.push((name.clone(), ty));
            }
            self.universe.declare_c_struct(lib_ty, &decl.name, fields);
        }
        for fun in &lib.funs {
            let mut params = Vec::with_capacity(fun.params.len());
            for (name, ty) in &fun.params {
                let ty = TypeLookup::new(&mut self.universe, lib_ty, &no_free_vars, span).lookup(ty)?;
                params.push((name.clone(), ty));
            }
            let ret = match &fun.ret {
                Some(ret) => TypeLookup::new(&mut self.universe, lib_ty, &no_free_vars, span).lookup(ret)?,
                None => self.universe.builtins().void,
            };
            self.universe
                .add_external(lib_ty, &fun.name, params, ret, fun.varargs);
        }
        Ok(())
    }

    fn visit_call(&mut self, scope: ScopeId, call: &ast::Call, span: Span) -> TypeResult<NodeId> {
        let obj = match &call.obj {
            Some(obj) => Some(self.visit_expr(scope, obj)?),
            None => None,
        };

        let bare_super = call.name == "super" && call.obj.is_none() && call.args.is_empty() && !call.has_parens;
        let args = if bare_super {
            self.forwarded_super_args(scope, span)?
        } else {
            let mut args = Vec::with_capacity(call.args.len());
            for arg in &call.args {
                let node = match &arg.kind {
                    ExprKind::Out(name) => self.declare_var(scope, name, arg.span),
                    _ => self.visit_expr(scope, arg)?,
                };
                let out = match &arg.kind {
                    ExprKind::Out(name) => Some(name.clone()),
                    _ => None,
                };
                args.push(CallArg {
                    node,
                    out,
                    span: arg.span,
                });
            }
            args
        };

        let block = match &call.block {
            Some(block) => {
                let inner = self.child_scope(scope);
                let mut arg_nodes = Vec::with_capacity(block.args.len());
                for name in &block.args {
                    let node = self.new_node(span);
                    self.scope_mut(inner).vars.insert(name.clone(), node);
                    arg_nodes.push(node);
                }
                Some(BlockInfo {
                    args: arg_nodes,
                    arg_names: block.args.clone(),
                    body: block.body.as_ref().map(|body| Rc::new((**body).clone())),
                    body_node: None,
                    scope: inner,
                    visited: false,
                })
            }
            None => None,
        };
        let block_arg = match &call.block_arg {
            Some(value) => Some(self.visit_expr(scope, value)?),
            None => None,
        };

        let node = self.new_node(span);
        let id = CallId(self.calls.len() as u32);
        let mut site = CallSite::new(node, call.name.clone(), scope, span);
        site.obj = obj;
        site.args = args;
        site.block = block;
        site.block_arg = block_arg;
        site.has_parens = call.has_parens;
        let inputs: Vec<NodeId> = obj
            .into_iter()
            .chain(site.args.iter().map(|arg| arg.node))
            .chain(block_arg)
            .collect();
        self.calls.push(site);
        for input in inputs {
            self.graph.add_observer(input, Observer::Call(id));
        }

        self.recalculate(id)?;
        Ok(node)
    }

    /// Arguments of a bare `super`: the enclosing definition's parameters.
    fn forwarded_super_args(&mut self, scope: ScopeId, span: Span) -> TypeResult<Vec<CallArg>> {
        let method = self.method_scope(scope);
        let Some(def) = self.scope(method).def else {
            return Ok(Vec::new());
        };
        let names: Vec<String> = self
            .universe
            .def(def)
            .def
            .params
            .iter()
            .map(|param| param.name.clone())
            .collect();
        let mut args = Vec::with_capacity(names.len());
        for name in names {
            let Some(var) = self.scope(method).vars.get(&name).copied() else {
                continue;
            };
            let node = self.new_node(span);
            self.bind_to(node, &[var])?;
            args.push(CallArg { node, out: None, span });
        }
        Ok(args)
    }
}

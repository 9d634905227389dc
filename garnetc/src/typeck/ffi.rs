//! Calls into foreign libs.
//!
//! A call whose receiver is a lib resolves to exactly one external function.
//! Argument types must equal the declared parameter types, except for three
//! implicit conversions that mirror what the C side expects:
//!
//! - `nil` passed where a pointer is expected becomes a null pointer of that type,
//! - a `String` passed as `Pointer(Char)` is replaced by a call to `cstr`,
//! - a function passed where a `Void`-returning function with the same
//!   parameters is expected is cast to drop its return value.
//!
//! String arguments in the variadic tail are converted as well. `out x`
//! arguments declare `x` as the pointee of a pointer parameter.

use std::collections::BTreeMap;

use crate::types::{External, TypeId, TypeKind};

use super::binding::{NodeId, Observer};
use super::cache::{InstanceKey, TypedDef, TypedDefId};
use super::call::{CallId, CallSite};
use super::context::InferenceContext;
use super::error::{TypeError, TypeErrorKind, TypeResult};
use super::matcher::MatchKind;

/// An implicit conversion inserted around a foreign call argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    /// `String` to `Pointer(Char)` through `cstr`.
    StringToPointer,
    /// `nil` to a null pointer.
    NilToPointer,
    /// A function cast to return `Void`.
    FunToVoid,
}

/// A conversion applied to one argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgConversion {
    pub index: usize,
    pub kind: ConversionKind,
    /// The argument node before conversion.
    pub original: NodeId,
}

impl InferenceContext {
    pub(crate) fn recalculate_foreign(&mut self, id: CallId) -> TypeResult<()> {
        let site = self.call(id);
        let (name, span, given) = (site.name.clone(), site.span, site.args.len());
        let Some(lib) = site.obj.and_then(|obj| self.graph.ty(obj)) else {
            return Ok(());
        };
        let TypeKind::Lib(info) = self.universe.kind(lib) else {
            return Ok(());
        };
        let lib_name = info.name.clone();
        let Some(external) = info.externals.iter().find(|ext| ext.name == name).cloned() else {
            return TypeError::new(
                TypeErrorKind::UndefinedMethod {
                    name,
                    owner: Some(lib_name),
                },
                span,
            )
            .into_err();
        };
        let fun = format!("{}.{}", lib_name, external.name);

        let declared = external.params.len();
        if given != declared && !(external.varargs && given > declared) {
            return TypeError::new(
                TypeErrorKind::ArityMismatch {
                    name: self.full_name(lib, &name),
                    given,
                    expected: vec![declared.to_string()],
                },
                span,
            )
            .into_err();
        }

        self.bind_out_args(id, &external, &fun)?;

        let Some(signature) = self.input_signature(id) else {
            return Ok(());
        };
        if self.call(id).signature.as_ref() == Some(&signature) {
            return Ok(());
        }

        self.convert_foreign_args(id, &external, &fun)?;
        let signature = self.input_signature(id);
        self.call_mut(id).signature = signature;

        let target = self.foreign_typed_def(lib, &external);
        let node = self.call(id).node;
        let old: Vec<NodeId> = self
            .call(id)
            .targets()
            .iter()
            .map(|t| self.typed_def(*t).node)
            .collect();
        self.unbind_from(node, &old);
        self.call_mut(id).targets = Some(vec![target]);
        let ret = self.typed_def(target).node;
        self.bind_to(node, &[ret])
    }

    /// Reject `out` arguments on calls that are not foreign.
    pub(crate) fn check_not_foreign_out_args(&self, id: CallId) -> TypeResult<()> {
        match self.call(id).args.iter().find(|arg| arg.out.is_some()) {
            Some(arg) => TypeError::new(TypeErrorKind::OutOutsideForeignCall, arg.span).into_err(),
            None => Ok(()),
        }
    }

    fn bind_out_args(&mut self, id: CallId, external: &External, fun: &str) -> TypeResult<()> {
        let args = self.call(id).args.clone();
        for (i, ((_, param), arg)) in external.params.iter().zip(&args).enumerate() {
            if arg.out.is_none() {
                continue;
            }
            let Some(pointee) = self.universe.pointee(*param) else {
                return TypeError::new(
                    TypeErrorKind::OutArgumentNotPointer {
                        index: i + 1,
                        fun: fun.to_string(),
                    },
                    arg.span,
                )
                .into_err();
            };
            if self.graph.ty(arg.node) != Some(pointee) {
                let source = self.typed_node(pointee, arg.span);
                self.bind_to(arg.node, &[source])?;
            }
        }
        Ok(())
    }

    fn convert_foreign_args(&mut self, id: CallId, external: &External, fun: &str) -> TypeResult<()> {
        let b = *self.universe.builtins();
        let args = self.call(id).args.clone();
        let mut pending: Vec<(usize, ConversionKind, TypeId)> = Vec::new();

        for (i, ((_, expected), arg)) in external.params.iter().zip(&args).enumerate() {
            let Some(mut actual) = self.graph.ty(arg.node) else {
                continue;
            };
            if arg.out.is_some() {
                actual = self.universe.pointer_of(actual);
            }
            if actual == *expected {
                continue;
            }
            let kind = if actual == b.nil && self.universe.is_pointer(*expected) {
                ConversionKind::NilToPointer
            } else if self.is_string(actual) && self.universe.pointee(*expected) == Some(b.char) {
                ConversionKind::StringToPointer
            } else if self.is_void_cast(actual, *expected) {
                ConversionKind::FunToVoid
            } else {
                return TypeError::new(
                    TypeErrorKind::ForeignArgumentTypeMismatch {
                        index: i + 1,
                        fun: fun.to_string(),
                        expected: self.universe.display(*expected),
                        found: self.universe.display(actual),
                    },
                    arg.span,
                )
                .into_err();
            };
            pending.push((i, kind, *expected));
        }

        if external.varargs {
            let char_pointer = self.universe.pointer_of(b.char);
            for (i, arg) in args.iter().enumerate().skip(external.params.len()) {
                if self.graph.ty(arg.node) == Some(b.string) {
                    pending.push((i, ConversionKind::StringToPointer, char_pointer));
                }
            }
        }

        for (index, kind, expected) in pending {
            self.apply_conversion(id, index, kind, expected)?;
        }
        Ok(())
    }

    fn is_string(&self, ty: TypeId) -> bool {
        let string = self.universe.builtins().string;
        ty == string || matches!(self.universe.kind(ty), TypeKind::Hierarchy(base) if *base == string)
    }

    fn is_void_cast(&self, actual: TypeId, expected: TypeId) -> bool {
        let void = self.universe.builtins().void;
        match (self.universe.kind(actual), self.universe.kind(expected)) {
            (TypeKind::Fun { args: actual_args, .. }, TypeKind::Fun { args, ret }) => *ret == void && args == actual_args,
            _ => false,
        }
    }

    /// Replace argument `index` of `id` by its converted form.
    fn apply_conversion(&mut self, id: CallId, index: usize, kind: ConversionKind, expected: TypeId) -> TypeResult<()> {
        let arg = self.call(id).args[index].clone();
        let replacement = match kind {
            ConversionKind::StringToPointer => {
                let node = self.new_node(arg.span);
                let mut cstr = CallSite::new(node, "cstr", self.call(id).scope, arg.span);
                cstr.obj = Some(arg.node);
                let cstr_id = CallId(self.calls.len() as u32);
                self.calls.push(cstr);
                self.graph.add_observer(arg.node, Observer::Call(cstr_id));
                self.recalculate(cstr_id)?;
                node
            }
            ConversionKind::NilToPointer | ConversionKind::FunToVoid => self.typed_node(expected, arg.span),
        };
        tracing::debug!(call = ?id, index, ?kind, "foreign argument conversion");

        self.graph.remove_observer(arg.node, Observer::Call(id));
        self.graph.add_observer(replacement, Observer::Call(id));
        let site = self.call_mut(id);
        site.args[index].node = replacement;
        site.conversions.push(ArgConversion {
            index,
            kind,
            original: arg.node,
        });
        Ok(())
    }

    /// The typed definition backing every call to `external`.
    fn foreign_typed_def(&mut self, lib: TypeId, external: &External) -> TypedDefId {
        let arg_types: Vec<TypeId> = external.params.iter().map(|(_, ty)| *ty).collect();
        let key = InstanceKey {
            def: external.def,
            owner: lib,
            arg_types: arg_types.clone(),
            block_type: None,
        };
        if let Some(existing) = self.cache.get(&key) {
            return existing;
        }
        let span = self.universe.def(external.def).def.span;
        let node = self.typed_node(external.ret, span);
        let params = arg_types.iter().map(|ty| self.typed_node(*ty, span)).collect();
        let id = TypedDefId(self.typed_defs.len() as u32);
        self.typed_defs.push(TypedDef {
            def: external.def,
            owner: lib,
            self_type: lib,
            arg_types,
            params,
            node,
            body: None,
            kind: MatchKind::Foreign,
            scope: None,
            free_vars: BTreeMap::new(),
        });
        self.cache.insert(key, id);
        id
    }
}

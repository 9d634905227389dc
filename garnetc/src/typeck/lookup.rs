//! Resolution of type expressions to types.
//!
//! Restrictions are matched structurally by the [`Matcher`](super::matcher::Matcher);
//! everything else that names a type (block signatures, primitive bodies,
//! allocations, constants used as values, lib declarations) goes through
//! [`TypeLookup`], which must produce a concrete type or fail.

use std::collections::BTreeMap;

use crate::ast::TypeExpr;
use crate::span::Span;
use crate::types::{TypeId, TypeKind, Universe};

use super::error::{TypeError, TypeErrorKind, TypeResult};

/// Resolves type expressions as seen from inside `owner`.
pub struct TypeLookup<'a> {
    universe: &'a mut Universe,
    owner: TypeId,
    free_vars: &'a BTreeMap<String, TypeId>,
    span: Span,
}

impl<'a> TypeLookup<'a> {
    pub fn new(universe: &'a mut Universe, owner: TypeId, free_vars: &'a BTreeMap<String, TypeId>, span: Span) -> Self {
        Self {
            universe,
            owner,
            free_vars,
            span,
        }
    }

    pub fn lookup(&mut self, expr: &TypeExpr) -> TypeResult<TypeId> {
        match expr {
            TypeExpr::Path { names, global } => self.lookup_path(expr, names, *global),
            TypeExpr::SelfType => Ok(self.owner),
            TypeExpr::Resolved(ty) => Ok(*ty),
            TypeExpr::Generic { name, args } => {
                let generic = self.lookup(name)?;
                let expected = match self.universe.kind(generic) {
                    TypeKind::Class(info) if !info.type_vars.is_empty() => info.type_vars.len(),
                    _ => {
                        return TypeError::new(
                            TypeErrorKind::NotAGenericClass {
                                name: self.universe.display(generic),
                            },
                            self.span,
                        )
                        .into_err();
                    }
                };
                if expected != args.len() {
                    return TypeError::new(
                        TypeErrorKind::GenericArityMismatch {
                            name: self.universe.display(generic),
                            given: args.len(),
                            expected,
                        },
                        self.span,
                    )
                    .into_err();
                }
                let args = args
                    .iter()
                    .map(|arg| self.lookup(arg))
                    .collect::<TypeResult<Vec<_>>>()?;
                Ok(self.universe.generic_instance(generic, args))
            }
            TypeExpr::Fun { inputs, output } => {
                let inputs = inputs
                    .iter()
                    .map(|input| self.lookup(input))
                    .collect::<TypeResult<Vec<_>>>()?;
                let ret = match output {
                    Some(output) => self.lookup(output)?,
                    None => self.universe.builtins().void,
                };
                Ok(self.universe.fun_of(inputs, ret))
            }
        }
    }

    fn lookup_path(&mut self, expr: &TypeExpr, names: &[String], global: bool) -> TypeResult<TypeId> {
        if let (false, [name]) = (global, names) {
            if let Some(ty) = self.free_vars.get(name) {
                return Ok(*ty);
            }
            if let Some(ty) = self.universe.type_var_binding(self.owner, name) {
                return Ok(ty);
            }
        }
        let scope = self.universe.lookup_scope(self.owner);
        self.universe
            .lookup_type(scope, names, global)
            .ok_or_else(|| {
                Box::new(TypeError::new(
                    TypeErrorKind::UninitializedConstant {
                        name: expr.to_string(),
                    },
                    self.span,
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_vars_take_precedence() {
        let mut universe = Universe::new();
        let b = *universe.builtins();
        let program = universe.program();
        let mut free_vars = BTreeMap::new();
        free_vars.insert("T".to_string(), b.int32);
        let mut lookup = TypeLookup::new(&mut universe, program, &free_vars, Span::dummy());
        let ty = lookup
            .lookup(&TypeExpr::generic("Array", vec![TypeExpr::named("T")]))
            .unwrap();
        assert_eq!(universe.display(ty), "Array(Int32)");
    }

    #[test]
    fn test_owner_type_var_binding() {
        let mut universe = Universe::new();
        let b = *universe.builtins();
        let ptr = universe.pointer_of(b.char);
        let free_vars = BTreeMap::new();
        let mut lookup = TypeLookup::new(&mut universe, ptr, &free_vars, Span::dummy());
        assert_eq!(lookup.lookup(&TypeExpr::named("T")).unwrap(), b.char);
    }

    #[test]
    fn test_lookup_errors() {
        let mut universe = Universe::new();
        let program = universe.program();
        let free_vars = BTreeMap::new();
        let mut lookup = TypeLookup::new(&mut universe, program, &free_vars, Span::dummy());

        let err = lookup.lookup(&TypeExpr::named("Missing")).unwrap_err();
        assert_eq!(err.to_string(), "uninitialized constant Missing");

        let err = lookup
            .lookup(&TypeExpr::generic("Int32", vec![TypeExpr::named("Char")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Int32 is not a generic class");

        let err = lookup
            .lookup(&TypeExpr::generic("Pointer", vec![TypeExpr::named("Char"), TypeExpr::named("Char")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "wrong number of type vars for Pointer (2 for 1)");
    }

    #[test]
    fn test_fun_defaults_to_void() {
        let mut universe = Universe::new();
        let b = *universe.builtins();
        let program = universe.program();
        let free_vars = BTreeMap::new();
        let mut lookup = TypeLookup::new(&mut universe, program, &free_vars, Span::dummy());
        let fun = lookup
            .lookup(&TypeExpr::Fun {
                inputs: vec![TypeExpr::named("Int32")],
                output: None,
            })
            .unwrap();
        assert_eq!(universe.kind(fun), &TypeKind::Fun { args: vec![b.int32], ret: b.void });
    }
}

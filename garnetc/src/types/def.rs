//! Method definitions registered in the type universe.
//!
//! Every definition, hand-written or synthesized, lives in one [`DefTable`]
//! and is addressed by a [`DefId`]. Owners keep their definitions grouped by
//! name in declaration order, which is the order overload matching walks them.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast;

use super::TypeId;

/// A globally unique identifier for a method definition.
///
/// Ids are never reused. Replacing a definition (class reopening) allocates a
/// fresh id, so typed instances of the old body stay addressable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId {
    pub index: u32,
}

impl DefId {
    pub const fn new(index: u32) -> Self {
        Self { index }
    }

    pub const fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Debug for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DefId({})", self.index)
    }
}

impl fmt::Display for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "def{}", self.index)
    }
}

/// Where a definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefOrigin {
    /// Written in the program.
    User,
    /// Synthesized `new` forwarding to `initialize`.
    Constructor,
    /// Synthesized forwarder to `method_missing`.
    MethodMissing,
    /// Built into the universe (prelude, struct accessors, `call` on functions).
    Primitive,
    /// A function declared in a foreign lib.
    External,
}

/// A registered definition.
#[derive(Debug, Clone)]
pub struct DefInfo {
    pub id: DefId,
    pub def: Rc<ast::Def>,
    pub owner: TypeId,
    pub origin: DefOrigin,
    /// Largest yield arity of the body; `Some` means a block is required.
    pub yields: Option<usize>,
}

impl DefInfo {
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Whether a call with `arity` arguments and the given block presence fits.
    pub fn accepts(&self, arity: usize, has_block: bool) -> bool {
        self.def.accepts_arity(arity) && self.yields.is_some() == has_block
    }

    /// Two definitions with the same name, restrictions and block shape
    /// replace each other on the same owner.
    fn same_signature(&self, other: &ast::Def) -> bool {
        self.def.name == other.name
            && self.def.params.len() == other.params.len()
            && self
                .def
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.restriction == b.restriction)
            && self.def.block_arg.is_some() == other.block_arg.is_some()
            && self.yields.is_some() == other.yields().is_some()
    }
}

/// All definitions of the universe, grouped per owner and name.
#[derive(Debug, Default)]
pub struct DefTable {
    defs: Vec<DefInfo>,
    by_owner: HashMap<TypeId, HashMap<String, Vec<DefId>>>,
}

impl DefTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: DefId) -> &DefInfo {
        &self.defs[id.index as usize]
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Register `def` on `owner`, replacing an existing definition with the
    /// same signature. Returns the new id.
    pub fn register(&mut self, owner: TypeId, def: ast::Def, origin: DefOrigin) -> DefId {
        let id = DefId::new(self.defs.len() as u32);
        let yields = def.yields();
        let name = def.name.clone();

        let family = self
            .by_owner
            .entry(owner)
            .or_default()
            .entry(name)
            .or_default();
        let replaced = family
            .iter()
            .position(|existing| self.defs[existing.index as usize].same_signature(&def));

        self.defs.push(DefInfo {
            id,
            def: Rc::new(def),
            owner,
            origin,
            yields,
        });

        match replaced {
            Some(pos) => family[pos] = id,
            None => family.push(id),
        }
        id
    }

    /// Definitions named `name` declared directly on `owner`, in declaration order.
    pub fn own(&self, owner: TypeId, name: &str) -> &[DefId] {
        self.by_owner
            .get(&owner)
            .and_then(|names| names.get(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every definition declared directly on `owner`.
    pub fn all_own(&self, owner: TypeId) -> impl Iterator<Item = &DefInfo> + '_ {
        self.by_owner
            .get(&owner)
            .into_iter()
            .flat_map(|names| names.values())
            .flatten()
            .map(move |id| self.get(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Param, TypeExpr};

    #[test]
    fn test_register_keeps_declaration_order() {
        let mut table = DefTable::new();
        let owner = TypeId::new(7);
        let a = table.register(
            owner,
            ast::Def::new("coco", vec![Param::typed("x", TypeExpr::named("Bar"))], None),
            DefOrigin::User,
        );
        let b = table.register(owner, ast::Def::new("coco", vec![Param::new("x")], None), DefOrigin::User);
        assert_eq!(table.own(owner, "coco"), &[a, b]);
        assert!(table.own(owner, "other").is_empty());
    }

    #[test]
    fn test_register_replaces_same_signature() {
        let mut table = DefTable::new();
        let owner = TypeId::new(1);
        let first = table.register(
            owner,
            ast::Def::new("coco", vec![], Some(Expr::int(1))),
            DefOrigin::User,
        );
        let second = table.register(
            owner,
            ast::Def::new("coco", vec![], Some(Expr::int(2))),
            DefOrigin::User,
        );
        assert_ne!(first, second);
        assert_eq!(table.own(owner, "coco"), &[second]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_block_shape_distinguishes_definitions() {
        let mut table = DefTable::new();
        let owner = TypeId::new(1);
        table.register(owner, ast::Def::new("each", vec![], Some(Expr::nil())), DefOrigin::User);
        table.register(
            owner,
            ast::Def::new("each", vec![], Some(Expr::yield_(vec![Expr::int(1)]))),
            DefOrigin::User,
        );
        assert_eq!(table.own(owner, "each").len(), 2);
        let yielding = table.get(table.own(owner, "each")[1]);
        assert!(yielding.accepts(0, true));
        assert!(!yielding.accepts(0, false));
    }
}

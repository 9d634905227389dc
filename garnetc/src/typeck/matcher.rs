//! Overload matching.
//!
//! Given an owner, a name and the argument types of a call, the matcher
//! walks the owner's definitions nearest first and keeps those whose
//! restrictions accept the arguments. Restrictions are matched structurally:
//!
//! - no restriction accepts anything,
//! - a class accepts itself, its subclasses and hierarchies below it, and
//!   narrows a wider hierarchy (`Foo+` restricted by `Bar` becomes `Bar+`),
//! - unions are matched member by member,
//! - generic instances must agree exactly on their type arguments,
//! - an unknown single-segment name is a free type variable that binds on
//!   first use and must agree afterwards.
//!
//! Every match covers a set of concrete argument tuples. Matching stops when
//! the [`Cover`] is complete; a candidate that covers nothing new is skipped,
//! which is how an override shadows the definition it replaces.

use std::collections::{BTreeMap, HashSet};

use crate::ast::TypeExpr;
use crate::types::{DefId, TypeId, TypeKind, Universe};

/// How a match came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// A definition found by lookup.
    Direct,
    /// A synthesized `new`.
    Constructor,
    /// A synthesized forwarder to `method_missing`.
    MethodMissing,
    /// An external function of a lib.
    Foreign,
}

/// One applicable definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub def: DefId,
    pub owner: TypeId,
    /// Argument types after restriction.
    pub arg_types: Vec<TypeId>,
    pub free_vars: BTreeMap<String, TypeId>,
    pub kind: MatchKind,
}

/// Concrete argument tuples a match set handles.
#[derive(Debug, Clone)]
pub struct Cover {
    all: Vec<Vec<TypeId>>,
    covered: HashSet<Vec<TypeId>>,
}

impl Cover {
    /// An empty cover over every concrete tuple of `arg_types`.
    pub fn new(universe: &Universe, arg_types: &[TypeId]) -> Self {
        Self {
            all: tuples(universe, arg_types),
            covered: HashSet::new(),
        }
    }

    /// Mark `arg_types`' tuples as covered. Returns whether anything new was covered.
    pub fn add(&mut self, universe: &Universe, arg_types: &[TypeId]) -> bool {
        let mut added = false;
        for tuple in tuples(universe, arg_types) {
            if self.all.contains(&tuple) && self.covered.insert(tuple) {
                added = true;
            }
        }
        added
    }

    pub fn is_complete(&self) -> bool {
        self.all.iter().all(|tuple| self.covered.contains(tuple))
    }

    /// Tuples no match handles, in cartesian order.
    pub fn missing(&self) -> Vec<Vec<TypeId>> {
        self.all
            .iter()
            .filter(|tuple| !self.covered.contains(*tuple))
            .cloned()
            .collect()
    }
}

/// Cartesian product of the concrete types of each argument.
fn tuples(universe: &Universe, arg_types: &[TypeId]) -> Vec<Vec<TypeId>> {
    let mut product: Vec<Vec<TypeId>> = vec![Vec::new()];
    for ty in arg_types {
        let mut choices = universe.concrete_types(*ty);
        if choices.is_empty() {
            choices.push(*ty);
        }
        product = product
            .into_iter()
            .flat_map(|prefix| {
                choices.iter().map(move |choice| {
                    let mut next = prefix.clone();
                    next.push(*choice);
                    next
                })
            })
            .collect();
    }
    product
}

/// The result of matching one owner.
#[derive(Debug, Clone)]
pub struct MatchSet {
    pub matches: Vec<Match>,
    /// `None` for synthesized sets, which are complete by construction.
    pub cover: Option<Cover>,
    pub owner: TypeId,
}

impl MatchSet {
    pub fn complete(matches: Vec<Match>, owner: TypeId) -> Self {
        Self {
            matches,
            cover: None,
            owner,
        }
    }

    /// Empty when nothing matched or when some argument tuple is left uncovered.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty() || self.cover.as_ref().is_some_and(|c| !c.is_complete())
    }
}

/// Structural overload matcher over a universe.
pub struct Matcher<'a> {
    universe: &'a mut Universe,
}

impl<'a> Matcher<'a> {
    pub fn new(universe: &'a mut Universe) -> Self {
        Self { universe }
    }

    /// Match `name` on `owner` against the argument types.
    ///
    /// First applicable set wins: candidates are taken in lookup order and
    /// never ranked further.
    pub fn lookup_matches(&mut self, owner: TypeId, name: &str, arg_types: &[TypeId], has_block: bool) -> MatchSet {
        let candidates = self
            .universe
            .lookup_definitions(owner, name, arg_types.len(), has_block);
        let mut cover = Cover::new(self.universe, arg_types);
        let mut matches = Vec::new();

        for def in candidates {
            if cover.is_complete() {
                break;
            }
            let Some(found) = self.match_def(def, owner, arg_types) else {
                continue;
            };
            if cover.add(self.universe, &found.arg_types) {
                matches.push(found);
            }
        }

        tracing::trace!(
            owner = %self.universe.display(owner),
            name,
            matches = matches.len(),
            complete = cover.is_complete(),
            "lookup matches"
        );
        MatchSet {
            matches,
            cover: Some(cover),
            owner,
        }
    }

    /// Match one definition; `None` when a restriction rejects its argument.
    pub fn match_def(&mut self, def: DefId, owner: TypeId, arg_types: &[TypeId]) -> Option<Match> {
        let ast = self.universe.def_ast(def);
        let mut free_vars = BTreeMap::new();
        let mut restricted = Vec::with_capacity(arg_types.len());
        for (param, arg) in ast.params.iter().zip(arg_types) {
            let ty = match &param.restriction {
                None => *arg,
                Some(restriction) => self.restrict(*arg, restriction, owner, &mut free_vars)?,
            };
            restricted.push(ty);
        }
        Some(Match {
            def,
            owner,
            arg_types: restricted,
            free_vars,
            kind: MatchKind::Direct,
        })
    }

    /// The part of `arg` accepted by `restriction`, if any.
    pub fn restrict(
        &mut self,
        arg: TypeId,
        restriction: &TypeExpr,
        owner: TypeId,
        free_vars: &mut BTreeMap<String, TypeId>,
    ) -> Option<TypeId> {
        // An unbound free variable takes the whole argument, union or not.
        if let TypeExpr::Path { names, global: false } = restriction {
            if names.len() == 1 && !free_vars.contains_key(&names[0]) && self.is_free_name(owner, &names[0]) {
                free_vars.insert(names[0].clone(), arg);
                return Some(arg);
            }
        }

        if let TypeKind::Union(members) = self.universe.kind(arg).clone() {
            let accepted: Vec<_> = members
                .into_iter()
                .filter_map(|member| self.restrict(member, restriction, owner, free_vars))
                .collect();
            return if accepted.is_empty() {
                None
            } else {
                Some(self.universe.union_of(&accepted))
            };
        }

        match restriction {
            TypeExpr::Path { names, global } => {
                if names.len() == 1 && !global {
                    let name = &names[0];
                    if let Some(bound) = free_vars.get(name).copied() {
                        return self.restrict_to_type(arg, bound);
                    }
                    if self.is_owner_type_var(owner, name) {
                        return match self.universe.type_var_binding(owner, name) {
                            Some(bound) => self.restrict_to_type(arg, bound),
                            None => {
                                free_vars.insert(name.clone(), arg);
                                Some(arg)
                            }
                        };
                    }
                }
                let namespace = self.namespace(owner);
                match self.universe.lookup_type(namespace, names, *global) {
                    Some(target) => self.restrict_to_type(arg, target),
                    None if names.len() == 1 && !global => {
                        free_vars.insert(names[0].clone(), arg);
                        Some(arg)
                    }
                    None => None,
                }
            }
            TypeExpr::SelfType => {
                let target = self.universe.instance_type(owner);
                self.restrict_to_type(arg, target)
            }
            TypeExpr::Resolved(target) => self.restrict_to_type(arg, *target),
            TypeExpr::Generic { .. } | TypeExpr::Fun { .. } => {
                self.match_type_arg(arg, restriction, owner, free_vars).then_some(arg)
            }
        }
    }

    /// Narrow `arg` to the values that are also values of `target`.
    pub fn restrict_to_type(&mut self, arg: TypeId, target: TypeId) -> Option<TypeId> {
        if arg == target {
            return Some(arg);
        }
        let target_class = match self.universe.kind(target) {
            TypeKind::Class(_) | TypeKind::GenericInstance { .. } => Some(target),
            TypeKind::Hierarchy(base) => Some(*base),
            _ => None,
        };
        match self.universe.kind(arg).clone() {
            TypeKind::Union(members) => {
                let accepted: Vec<_> = members
                    .into_iter()
                    .filter_map(|member| self.restrict_to_type(member, target))
                    .collect();
                if accepted.is_empty() {
                    None
                } else {
                    Some(self.universe.union_of(&accepted))
                }
            }
            TypeKind::Hierarchy(base) => {
                let target_class = target_class?;
                if self.universe.is_subclass_of(base, target_class) {
                    Some(arg)
                } else if self.universe.is_subclass_of(target_class, base) {
                    Some(self.universe.hierarchy(target_class))
                } else {
                    None
                }
            }
            TypeKind::Metaclass(class) | TypeKind::HierarchyMetaclass(class) => {
                let target_class = match self.universe.kind(target) {
                    TypeKind::Metaclass(t) | TypeKind::HierarchyMetaclass(t) => *t,
                    _ => return None,
                };
                self.universe
                    .is_subclass_of(class, target_class)
                    .then_some(arg)
            }
            TypeKind::NoReturn => Some(arg),
            _ => {
                let target_class = target_class?;
                self.universe.is_subclass_of(arg, target_class).then_some(arg)
            }
        }
    }

    /// Exact match of a type argument, binding free variables on the way.
    fn match_type_arg(
        &mut self,
        actual: TypeId,
        expected: &TypeExpr,
        owner: TypeId,
        free_vars: &mut BTreeMap<String, TypeId>,
    ) -> bool {
        match expected {
            TypeExpr::Path { names, global } => {
                if names.len() == 1 && !global {
                    let name = &names[0];
                    if let Some(bound) = free_vars.get(name) {
                        return *bound == actual;
                    }
                    if self.is_owner_type_var(owner, name) {
                        return match self.universe.type_var_binding(owner, name) {
                            Some(bound) => bound == actual,
                            None => {
                                free_vars.insert(name.clone(), actual);
                                true
                            }
                        };
                    }
                }
                let namespace = self.namespace(owner);
                match self.universe.lookup_type(namespace, names, *global) {
                    Some(ty) => ty == actual,
                    None if names.len() == 1 && !global => {
                        free_vars.insert(names[0].clone(), actual);
                        true
                    }
                    None => false,
                }
            }
            TypeExpr::SelfType => self.universe.instance_type(owner) == actual,
            TypeExpr::Resolved(ty) => *ty == actual,
            TypeExpr::Generic { name, args } => {
                let namespace = self.namespace(owner);
                let generic = match name.as_ref() {
                    TypeExpr::Path { names, global } => self.universe.lookup_type(namespace, names, *global),
                    TypeExpr::Resolved(ty) => Some(*ty),
                    _ => None,
                };
                let Some(generic) = generic else {
                    return false;
                };
                let TypeKind::GenericInstance {
                    generic: actual_generic,
                    args: actual_args,
                } = self.universe.kind(actual).clone()
                else {
                    return false;
                };
                actual_generic == generic
                    && actual_args.len() == args.len()
                    && actual_args
                        .iter()
                        .zip(args)
                        .all(|(a, e)| self.match_type_arg(*a, e, owner, free_vars))
            }
            TypeExpr::Fun { inputs, output } => {
                let TypeKind::Fun {
                    args: actual_args,
                    ret,
                } = self.universe.kind(actual).clone()
                else {
                    return false;
                };
                actual_args.len() == inputs.len()
                    && actual_args
                        .iter()
                        .zip(inputs)
                        .all(|(a, e)| self.match_type_arg(*a, e, owner, free_vars))
                    && output
                        .as_ref()
                        .map_or(true, |o| self.match_type_arg(ret, o, owner, free_vars))
            }
        }
    }

    /// Whether `name` is a type variable with nothing bound to it yet.
    fn is_free_name(&self, owner: TypeId, name: &str) -> bool {
        if self.is_owner_type_var(owner, name) {
            return self.universe.type_var_binding(owner, name).is_none();
        }
        let namespace = self.namespace(owner);
        self.universe
            .lookup_type(namespace, &[name.to_string()], false)
            .is_none()
    }

    fn is_owner_type_var(&self, owner: TypeId, name: &str) -> bool {
        let instance = self.universe.instance_type(owner);
        self.universe.type_vars(instance).iter().any(|v| v == name)
    }

    fn namespace(&self, owner: TypeId) -> TypeId {
        self.universe.lookup_scope(owner)
    }
}

//! The type universe consumed by inference.
//!
//! Types are interned: every structurally distinct type gets exactly one
//! [`TypeId`], so type equality is id equality. Nominal types (classes, libs,
//! foreign structs) get a fresh id per declaration; structural types
//! (metaclasses, hierarchies, generic instances, unions, function types) are
//! looked up by their [`TypeKind`] before a new id is allocated.

pub mod def;
pub mod universe;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use def::{DefId, DefInfo, DefOrigin, DefTable};
pub use universe::Universe;

/// A handle to a type in the [`Universe`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId {
    pub index: u32,
}

impl TypeId {
    pub const fn new(index: u32) -> Self {
        Self { index }
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.index)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type{}", self.index)
    }
}

/// The shape of a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// The top-level program scope.
    Program,
    /// A nominal class.
    Class(ClassInfo),
    /// The class of a class (`Foo:Class`).
    Metaclass(TypeId),
    /// A class and all of its current and future subclasses (`Foo+`).
    Hierarchy(TypeId),
    /// The metaclass of a hierarchy (`Foo+:Class`).
    HierarchyMetaclass(TypeId),
    /// A generic class applied to type arguments (`Array(Int32)`).
    GenericInstance { generic: TypeId, args: Vec<TypeId> },
    /// One of several alternatives, normalized by [`Universe::union_of`].
    Union(Vec<TypeId>),
    /// A function type `A, B -> R`.
    Fun { args: Vec<TypeId>, ret: TypeId },
    /// A foreign library.
    Lib(LibInfo),
    /// A C-layout struct declared inside a lib.
    CStruct(CStructInfo),
    /// The type of expressions that never return.
    NoReturn,
}

/// A nominal class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassInfo {
    pub name: String,
    pub parent: Option<TypeId>,
    pub is_abstract: bool,
    pub subclasses: Vec<TypeId>,
    /// Type parameters of a generic class, empty otherwise.
    pub type_vars: Vec<String>,
}

/// A foreign library and its external functions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LibInfo {
    pub name: String,
    pub externals: Vec<External>,
}

/// An external function declared in a lib.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct External {
    pub name: String,
    pub params: Vec<(String, TypeId)>,
    pub ret: TypeId,
    pub varargs: bool,
    /// Definition backing calls to this function.
    pub def: DefId,
}

/// A C-layout struct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CStructInfo {
    pub name: String,
    pub lib: TypeId,
    pub fields: Vec<(String, TypeId)>,
}

impl CStructInfo {
    pub fn field(&self, name: &str) -> Option<TypeId> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, ty)| *ty)
    }
}

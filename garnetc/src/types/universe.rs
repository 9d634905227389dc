//! Storage and queries for every type and definition of a compilation run.
//!
//! The universe owns:
//!
//! - the type table, with structural types interned by [`TypeKind`],
//! - the constant namespace (`Foo`, `LibC`, `LibC::Point`),
//! - the [`DefTable`] holding hand-written and synthesized definitions.
//!
//! Definition lookup walks an owner's chain (the owner itself, then its
//! ancestors) and yields candidates in declaration order. Overload matching
//! relies on that order to let overrides shadow the definitions they replace.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{self, Expr, Param, TypeExpr};
use crate::typeck::suggestion::suggest_similar;

use super::def::{DefId, DefInfo, DefOrigin, DefTable};
use super::{CStructInfo, ClassInfo, External, LibInfo, TypeId, TypeKind};

/// Types every program can name without declaring them.
#[derive(Debug, Clone, Copy)]
pub struct Builtins {
    pub program: TypeId,
    pub object: TypeId,
    pub reference: TypeId,
    pub value: TypeId,
    pub nil: TypeId,
    pub bool: TypeId,
    pub int32: TypeId,
    pub char: TypeId,
    pub string: TypeId,
    pub symbol: TypeId,
    pub void: TypeId,
    pub array: TypeId,
    pub pointer: TypeId,
    pub no_return: TypeId,
}

/// The type universe.
#[derive(Debug)]
pub struct Universe {
    types: Vec<TypeKind>,
    interned: HashMap<TypeKind, TypeId>,
    constants: HashMap<String, TypeId>,
    defs: DefTable,
    builtins: Builtins,
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

impl Universe {
    /// Create a universe holding the builtin classes and their primitives.
    pub fn new() -> Self {
        let placeholder = TypeId::new(0);
        let mut universe = Universe {
            types: Vec::new(),
            interned: HashMap::new(),
            constants: HashMap::new(),
            defs: DefTable::new(),
            builtins: Builtins {
                program: placeholder,
                object: placeholder,
                reference: placeholder,
                value: placeholder,
                nil: placeholder,
                bool: placeholder,
                int32: placeholder,
                char: placeholder,
                string: placeholder,
                symbol: placeholder,
                void: placeholder,
                array: placeholder,
                pointer: placeholder,
                no_return: placeholder,
            },
        };

        let program = universe.intern(TypeKind::Program);
        let no_return = universe.intern(TypeKind::NoReturn);
        universe.constants.insert("NoReturn".to_string(), no_return);
        let object = universe.new_class("Object", None, false, Vec::new());
        let reference = universe.new_class("Reference", Some(object), false, Vec::new());
        let value = universe.new_class("Value", Some(object), false, Vec::new());
        let nil = universe.new_class("Nil", Some(value), false, Vec::new());
        let bool = universe.new_class("Bool", Some(value), false, Vec::new());
        let int32 = universe.new_class("Int32", Some(value), false, Vec::new());
        let char = universe.new_class("Char", Some(value), false, Vec::new());
        let symbol = universe.new_class("Symbol", Some(value), false, Vec::new());
        let void = universe.new_class("Void", Some(value), false, Vec::new());
        let string = universe.new_class("String", Some(reference), false, Vec::new());
        let array = universe.new_class("Array", Some(reference), false, vec!["T".into()]);
        let pointer = universe.new_class("Pointer", Some(value), false, vec!["T".into()]);

        universe.builtins = Builtins {
            program,
            object,
            reference,
            value,
            nil,
            bool,
            int32,
            char,
            string,
            symbol,
            void,
            array,
            pointer,
            no_return,
        };
        universe.define_prelude();
        universe
    }

    fn define_prelude(&mut self) {
        let b = self.builtins;
        let int = || TypeExpr::named("Int32");
        let t = || TypeExpr::named("T");

        for op in ["+", "-", "*"] {
            self.primitive(b.int32, op, vec![Param::typed("other", int())], int());
        }
        for op in ["<", "<=", ">", ">=", "=="] {
            self.primitive(b.int32, op, vec![Param::typed("other", int())], TypeExpr::named("Bool"));
        }
        self.primitive(b.object, "==", vec![Param::new("other")], TypeExpr::named("Bool"));
        self.primitive(b.object, "to_s", vec![], TypeExpr::named("String"));
        self.primitive(
            b.string,
            "cstr",
            vec![],
            TypeExpr::generic("Pointer", vec![TypeExpr::named("Char")]),
        );
        self.primitive(b.string, "length", vec![], int());
        self.primitive(
            b.string,
            "+",
            vec![Param::typed("other", TypeExpr::named("String"))],
            TypeExpr::named("String"),
        );
        self.primitive(b.pointer, "value", vec![], t());
        self.primitive(b.pointer, "value=", vec![Param::typed("value", t())], t());
        self.primitive(b.array, "size", vec![], int());
        self.primitive(b.array, "[]", vec![Param::typed("index", int())], t());
        self.primitive(
            b.array,
            "push",
            vec![Param::typed("value", t())],
            TypeExpr::generic("Array", vec![t()]),
        );
    }

    fn primitive(&mut self, owner: TypeId, name: &str, params: Vec<Param>, ret: TypeExpr) -> DefId {
        let def = ast::Def::new(name, params, Some(Expr::primitive(ret)));
        self.defs.register(owner, def, DefOrigin::Primitive)
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    pub fn program(&self) -> TypeId {
        self.builtins.program
    }

    pub fn nil(&self) -> TypeId {
        self.builtins.nil
    }

    pub fn no_return(&self) -> TypeId {
        self.builtins.no_return
    }

    pub fn kind(&self, ty: TypeId) -> &TypeKind {
        &self.types[ty.index as usize]
    }

    fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(id) = self.interned.get(&kind) {
            return *id;
        }
        let id = self.push(kind.clone());
        self.interned.insert(kind, id);
        id
    }

    fn push(&mut self, kind: TypeKind) -> TypeId {
        let id = TypeId::new(self.types.len() as u32);
        self.types.push(kind);
        id
    }

    fn new_class(
        &mut self,
        name: &str,
        parent: Option<TypeId>,
        is_abstract: bool,
        type_vars: Vec<String>,
    ) -> TypeId {
        let id = self.push(TypeKind::Class(ClassInfo {
            name: name.to_string(),
            parent,
            is_abstract,
            subclasses: Vec::new(),
            type_vars,
        }));
        if let Some(parent) = parent {
            if let TypeKind::Class(info) = &mut self.types[parent.index as usize] {
                info.subclasses.push(id);
            }
        }
        self.constants.insert(name.to_string(), id);
        id
    }

    // ====================================================================
    // Declarations
    // ====================================================================

    /// Declare a class, or reopen it when it already exists.
    ///
    /// Returns the class and whether it was newly created. A new class
    /// without an explicit parent inherits from `Reference`.
    pub fn declare_class(
        &mut self,
        name: &str,
        parent: Option<TypeId>,
        is_abstract: bool,
        type_vars: Vec<String>,
    ) -> (TypeId, bool) {
        if let Some(existing) = self.constants.get(name).copied() {
            if self.is_class(existing) {
                return (existing, false);
            }
        }
        let parent = parent.unwrap_or(self.builtins.reference);
        (self.new_class(name, Some(parent), is_abstract, type_vars), true)
    }

    /// Declare a foreign library, or return the existing one.
    pub fn declare_lib(&mut self, name: &str) -> TypeId {
        if let Some(existing) = self.constants.get(name).copied() {
            if self.is_foreign(existing) {
                return existing;
            }
        }
        let id = self.push(TypeKind::Lib(LibInfo {
            name: name.to_string(),
            externals: Vec::new(),
        }));
        self.constants.insert(name.to_string(), id);
        id
    }

    /// Add an external function to a lib.
    pub fn add_external(
        &mut self,
        lib: TypeId,
        name: &str,
        params: Vec<(String, TypeId)>,
        ret: TypeId,
        varargs: bool,
    ) -> DefId {
        let def_params = params
            .iter()
            .map(|(param, ty)| Param::typed(param.clone(), TypeExpr::Resolved(*ty)))
            .collect();
        let def = ast::Def::new(name, def_params, Some(Expr::primitive(TypeExpr::Resolved(ret))));
        let id = self.defs.register(lib, def, DefOrigin::External);
        if let TypeKind::Lib(info) = &mut self.types[lib.index as usize] {
            info.externals.retain(|ext| ext.name != name);
            info.externals.push(External {
                name: name.to_string(),
                params,
                ret,
                varargs,
                def: id,
            });
        }
        id
    }

    /// Declare a C-layout struct inside `lib` with field accessors and an allocator.
    pub fn declare_c_struct(&mut self, lib: TypeId, name: &str, fields: Vec<(String, TypeId)>) -> TypeId {
        let full_name = format!("{}::{}", self.display(lib), name);
        let id = self.push(TypeKind::CStruct(CStructInfo {
            name: full_name.clone(),
            lib,
            fields: fields.clone(),
        }));
        self.constants.insert(full_name, id);

        for (field, ty) in fields {
            self.primitive(id, &field, vec![], TypeExpr::Resolved(ty));
            self.primitive(
                id,
                &format!("{}=", field),
                vec![Param::typed("value", TypeExpr::Resolved(ty))],
                TypeExpr::Resolved(ty),
            );
        }
        let meta = self.metaclass(id);
        let alloc = ast::Def::new("new", vec![], Some(Expr::new(ast::ExprKind::Allocate(None))));
        self.defs.register(meta, alloc, DefOrigin::Primitive);
        id
    }

    /// Register a definition on `owner`, replacing one with the same signature.
    pub fn register_definition(&mut self, owner: TypeId, def: ast::Def, origin: DefOrigin) -> DefId {
        tracing::trace!(owner = %self.display(owner), name = %def.name, ?origin, "register definition");
        self.defs.register(owner, def, origin)
    }

    pub fn def(&self, id: DefId) -> &DefInfo {
        self.defs.get(id)
    }

    pub fn def_ast(&self, id: DefId) -> Rc<ast::Def> {
        Rc::clone(&self.defs.get(id).def)
    }

    // ====================================================================
    // Type constructors
    // ====================================================================

    pub fn metaclass(&mut self, ty: TypeId) -> TypeId {
        match self.kind(ty).clone() {
            TypeKind::Hierarchy(base) => self.intern(TypeKind::HierarchyMetaclass(base)),
            TypeKind::Union(members) => {
                let metas: Vec<_> = members.into_iter().map(|m| self.metaclass(m)).collect();
                self.union_of(&metas)
            }
            TypeKind::Lib(_) | TypeKind::NoReturn | TypeKind::Program => ty,
            _ => self.intern(TypeKind::Metaclass(ty)),
        }
    }

    pub fn hierarchy(&mut self, class: TypeId) -> TypeId {
        self.intern(TypeKind::Hierarchy(class))
    }

    pub fn generic_instance(&mut self, generic: TypeId, args: Vec<TypeId>) -> TypeId {
        self.intern(TypeKind::GenericInstance { generic, args })
    }

    pub fn pointer_of(&mut self, ty: TypeId) -> TypeId {
        let pointer = self.builtins.pointer;
        self.generic_instance(pointer, vec![ty])
    }

    pub fn array_of(&mut self, ty: TypeId) -> TypeId {
        let array = self.builtins.array;
        self.generic_instance(array, vec![ty])
    }

    /// The function type `args -> ret`, with its `call` primitive.
    pub fn fun_of(&mut self, args: Vec<TypeId>, ret: TypeId) -> TypeId {
        let kind = TypeKind::Fun {
            args: args.clone(),
            ret,
        };
        if let Some(id) = self.interned.get(&kind) {
            return *id;
        }
        let id = self.intern(kind);
        let params = args
            .iter()
            .enumerate()
            .map(|(i, ty)| Param::typed(format!("arg{}", i), TypeExpr::Resolved(*ty)))
            .collect();
        self.primitive(id, "call", params, TypeExpr::Resolved(ret));
        id
    }

    /// Normalized union of `types`.
    ///
    /// Members are flattened and deduplicated, `NoReturn` disappears next to
    /// anything else, and classes sharing a user-defined ancestor collapse
    /// into the hierarchy of their lowest common ancestor.
    pub fn union_of(&mut self, types: &[TypeId]) -> TypeId {
        let mut members: Vec<TypeId> = Vec::new();
        for ty in types {
            match self.kind(*ty) {
                TypeKind::Union(inner) => {
                    for member in inner.clone() {
                        if !members.contains(&member) {
                            members.push(member);
                        }
                    }
                }
                _ => {
                    if !members.contains(ty) {
                        members.push(*ty);
                    }
                }
            }
        }

        if members.len() > 1 {
            let no_return = self.builtins.no_return;
            members.retain(|m| *m != no_return);
        }

        'merge: loop {
            for i in 0..members.len() {
                for j in (i + 1)..members.len() {
                    if let Some(base) = self.common_base(members[i], members[j]) {
                        members[i] = self.hierarchy(base);
                        members.remove(j);
                        members.dedup();
                        continue 'merge;
                    }
                }
            }
            break;
        }

        match members.len() {
            0 => self.builtins.no_return,
            1 => members[0],
            _ => {
                members.sort();
                self.intern(TypeKind::Union(members))
            }
        }
    }

    fn hierarchy_class(&self, ty: TypeId) -> Option<TypeId> {
        match self.kind(ty) {
            TypeKind::Class(info) if info.type_vars.is_empty() => Some(ty),
            TypeKind::Hierarchy(base) => Some(*base),
            _ => None,
        }
    }

    fn common_base(&self, a: TypeId, b: TypeId) -> Option<TypeId> {
        let ca = self.hierarchy_class(a)?;
        let cb = self.hierarchy_class(b)?;
        let lca = self
            .ancestors_and_self(ca)
            .into_iter()
            .find(|candidate| self.is_subclass_of(cb, *candidate))?;
        if self.is_root(lca) {
            None
        } else {
            Some(lca)
        }
    }

    fn is_root(&self, ty: TypeId) -> bool {
        let b = &self.builtins;
        ty == b.object || ty == b.reference || ty == b.value
    }

    // ====================================================================
    // Relationships
    // ====================================================================

    /// The type itself followed by its ancestors.
    pub fn ancestors_and_self(&self, ty: TypeId) -> Vec<TypeId> {
        let mut chain = vec![ty];
        let mut current = match self.kind(ty) {
            TypeKind::Class(info) => info.parent,
            TypeKind::GenericInstance { generic, .. } => Some(*generic),
            _ => None,
        };
        while let Some(next) = current {
            chain.push(next);
            current = self.parent(next);
        }
        chain
    }

    pub fn parent(&self, ty: TypeId) -> Option<TypeId> {
        match self.kind(ty) {
            TypeKind::Class(info) => info.parent,
            TypeKind::GenericInstance { generic, .. } => self.parent(*generic),
            _ => None,
        }
    }

    /// Whether `ty` is `ancestor` or inherits from it.
    pub fn is_subclass_of(&self, ty: TypeId, ancestor: TypeId) -> bool {
        self.ancestors_and_self(ty).contains(&ancestor)
    }

    /// Concrete runtime types a value of `ty` can have.
    pub fn concrete_types(&self, ty: TypeId) -> Vec<TypeId> {
        let mut out = Vec::new();
        self.collect_concrete(ty, &mut out);
        out
    }

    fn collect_concrete(&self, ty: TypeId, out: &mut Vec<TypeId>) {
        match self.kind(ty) {
            TypeKind::Union(members) => {
                for member in members {
                    self.collect_concrete(*member, out);
                }
            }
            TypeKind::Hierarchy(base) => self.collect_descendants(*base, out),
            TypeKind::HierarchyMetaclass(base) => {
                let mut classes = Vec::new();
                self.collect_descendants(*base, &mut classes);
                for class in classes {
                    if let Some(meta) = self.interned.get(&TypeKind::Metaclass(class)) {
                        if !out.contains(meta) {
                            out.push(*meta);
                        }
                    }
                }
            }
            _ => {
                if !out.contains(&ty) {
                    out.push(ty);
                }
            }
        }
    }

    fn collect_descendants(&self, class: TypeId, out: &mut Vec<TypeId>) {
        if let TypeKind::Class(info) = self.kind(class) {
            if !info.is_abstract && !out.contains(&class) {
                out.push(class);
            }
            for sub in &info.subclasses {
                self.collect_descendants(*sub, out);
            }
        }
    }

    /// Whether a value of `other` is among the values of `ty`.
    pub fn includes_type(&self, ty: TypeId, other: TypeId) -> bool {
        ty == other || self.concrete_types(ty).contains(&other)
    }

    /// The instance type of a metaclass, or the type itself.
    pub fn instance_type(&self, ty: TypeId) -> TypeId {
        match self.kind(ty) {
            TypeKind::Metaclass(inner) => *inner,
            TypeKind::HierarchyMetaclass(base) => self
                .interned
                .get(&TypeKind::Hierarchy(*base))
                .copied()
                .unwrap_or(*base),
            _ => ty,
        }
    }

    /// Look up a constant by path, relative to `scope` unless `global`.
    pub fn lookup_type(&self, scope: TypeId, names: &[String], global: bool) -> Option<TypeId> {
        let path = names.join("::");
        if !global {
            let prefix = match self.kind(scope) {
                TypeKind::Lib(info) => Some(info.name.clone()),
                TypeKind::Class(info) => Some(info.name.clone()),
                _ => None,
            };
            if let Some(prefix) = prefix {
                if let Some(ty) = self.constants.get(&format!("{}::{}", prefix, path)) {
                    return Some(*ty);
                }
            }
        }
        self.constants.get(&path).copied()
    }

    /// Scope in which restriction names of `owner`'s definitions resolve.
    pub fn lookup_scope(&self, owner: TypeId) -> TypeId {
        let instance = self.instance_type(owner);
        match self.kind(instance) {
            TypeKind::Hierarchy(base) => *base,
            TypeKind::GenericInstance { generic, .. } => *generic,
            TypeKind::CStruct(info) => info.lib,
            _ => instance,
        }
    }

    /// Type parameters of the generic class behind `ty`, if any.
    pub fn type_vars(&self, ty: TypeId) -> &[String] {
        match self.kind(ty) {
            TypeKind::Class(info) => &info.type_vars,
            TypeKind::GenericInstance { generic, .. } => self.type_vars(*generic),
            TypeKind::Metaclass(inner) => self.type_vars(*inner),
            _ => &[],
        }
    }

    /// The argument bound to type parameter `name` in a generic instance.
    pub fn type_var_binding(&self, ty: TypeId, name: &str) -> Option<TypeId> {
        let ty = self.instance_type(ty);
        if let TypeKind::GenericInstance { generic, args } = self.kind(ty) {
            let index = self.type_vars(*generic).iter().position(|v| v == name)?;
            return args.get(index).copied();
        }
        None
    }

    // ====================================================================
    // Definition lookup
    // ====================================================================

    /// Owners searched for definitions of `owner`, nearest first.
    fn lookup_chain(&self, owner: TypeId) -> Vec<TypeId> {
        match self.kind(owner) {
            TypeKind::Class(_) | TypeKind::GenericInstance { .. } => self.ancestors_and_self(owner),
            TypeKind::Hierarchy(base) => self.ancestors_and_self(*base),
            TypeKind::Metaclass(inner) => self
                .ancestors_and_self(*inner)
                .into_iter()
                .filter_map(|t| self.interned.get(&TypeKind::Metaclass(t)).copied())
                .collect(),
            TypeKind::HierarchyMetaclass(base) => self
                .ancestors_and_self(*base)
                .into_iter()
                .filter_map(|t| self.interned.get(&TypeKind::Metaclass(t)).copied())
                .collect(),
            TypeKind::Union(_) | TypeKind::NoReturn => Vec::new(),
            _ => vec![owner],
        }
    }

    /// Every definition named `name` visible on `owner`, nearest first.
    ///
    /// Synthesized constructors are not inherited by subclass metaclasses.
    pub fn lookup_defs(&self, owner: TypeId, name: &str) -> Vec<DefId> {
        let is_meta = self.is_metaclass(owner);
        let mut found = Vec::new();
        for (depth, link) in self.lookup_chain(owner).into_iter().enumerate() {
            for id in self.defs.own(link, name) {
                if is_meta && depth > 0 && self.defs.get(*id).origin == DefOrigin::Constructor {
                    continue;
                }
                found.push(*id);
            }
        }
        found
    }

    /// Definitions of `name` whose arity and block requirement fit the call.
    pub fn lookup_definitions(&self, owner: TypeId, name: &str, arity: usize, has_block: bool) -> Vec<DefId> {
        self.lookup_defs(owner, name)
            .into_iter()
            .filter(|id| self.defs.get(*id).accepts(arity, has_block))
            .collect()
    }

    /// First definition of `name` with the given block requirement.
    pub fn lookup_first_def(&self, owner: TypeId, name: &str, has_block: bool) -> Option<DefId> {
        self.lookup_defs(owner, name)
            .into_iter()
            .find(|id| self.defs.get(*id).yields.is_some() == has_block)
    }

    /// Closest definition name callable with this arity and block presence.
    pub fn lookup_similar_name(&self, owner: TypeId, name: &str, arity: usize, has_block: bool) -> Option<String> {
        let mut names: Vec<String> = Vec::new();
        for link in self.lookup_chain(owner) {
            for info in self.defs.all_own(link) {
                if info.accepts(arity, has_block) && !names.iter().any(|n| n == info.name()) {
                    names.push(info.name().to_string());
                }
            }
        }
        suggest_similar(name, names.iter().map(String::as_str))
            .into_iter()
            .next()
    }

    // ====================================================================
    // Predicates
    // ====================================================================

    pub fn is_class(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Class(_) | TypeKind::GenericInstance { .. })
    }

    pub fn is_hierarchy(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Hierarchy(_) | TypeKind::HierarchyMetaclass(_))
    }

    pub fn is_union(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Union(_))
    }

    pub fn is_abstract(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Class(info) if info.is_abstract)
    }

    pub fn is_pointer(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::GenericInstance { generic, .. } if *generic == self.builtins.pointer)
    }

    pub fn is_foreign(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Lib(_))
    }

    pub fn is_c_struct(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::CStruct(_))
    }

    pub fn is_metaclass(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Metaclass(_) | TypeKind::HierarchyMetaclass(_))
    }

    pub fn is_fun(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Fun { .. })
    }

    pub fn is_no_return(&self, ty: TypeId) -> bool {
        ty == self.builtins.no_return
    }

    /// The pointee of a pointer type.
    pub fn pointee(&self, ty: TypeId) -> Option<TypeId> {
        match self.kind(ty) {
            TypeKind::GenericInstance { generic, args } if *generic == self.builtins.pointer => args.first().copied(),
            _ => None,
        }
    }

    // ====================================================================
    // Display
    // ====================================================================

    /// Human-readable name of a type, as diagnostics print it.
    pub fn display(&self, ty: TypeId) -> String {
        match self.kind(ty) {
            TypeKind::Program => "<Program>".to_string(),
            TypeKind::Class(info) => info.name.clone(),
            TypeKind::Metaclass(inner) => format!("{}:Class", self.display(*inner)),
            TypeKind::Hierarchy(base) => format!("{}+", self.display(*base)),
            TypeKind::HierarchyMetaclass(base) => format!("{}+:Class", self.display(*base)),
            TypeKind::GenericInstance { generic, args } => {
                let args: Vec<_> = args.iter().map(|a| self.display(*a)).collect();
                format!("{}({})", self.display(*generic), args.join(", "))
            }
            TypeKind::Union(members) => {
                let members: Vec<_> = members.iter().map(|m| self.display(*m)).collect();
                members.join(" | ")
            }
            TypeKind::Fun { args, ret } => {
                let args: Vec<_> = args.iter().map(|a| self.display(*a)).collect();
                if args.is_empty() {
                    format!("-> {}", self.display(*ret))
                } else {
                    format!("{} -> {}", args.join(", "), self.display(*ret))
                }
            }
            TypeKind::Lib(info) => info.name.clone(),
            TypeKind::CStruct(info) => info.name.clone(),
            TypeKind::NoReturn => "NoReturn".to_string(),
        }
    }

    /// Display a list of types separated by commas.
    pub fn display_list(&self, types: &[TypeId]) -> String {
        types
            .iter()
            .map(|t| self.display(*t))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Display a type expression, printing resolved types by name.
    pub fn display_type_expr(&self, expr: &TypeExpr) -> String {
        match expr {
            TypeExpr::Resolved(ty) => self.display(*ty),
            TypeExpr::Generic { name, args } => {
                let args: Vec<_> = args.iter().map(|a| self.display_type_expr(a)).collect();
                format!("{}({})", self.display_type_expr(name), args.join(", "))
            }
            TypeExpr::Fun { inputs, output } => {
                let inputs: Vec<_> = inputs.iter().map(|a| self.display_type_expr(a)).collect();
                match output {
                    Some(output) => format!("{} -> {}", inputs.join(", "), self.display_type_expr(output)),
                    None => format!("{} ->", inputs.join(", ")),
                }
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hierarchy_universe() -> (Universe, TypeId, TypeId, TypeId) {
        let mut universe = Universe::new();
        let (foo, _) = universe.declare_class("Foo", None, false, Vec::new());
        let (bar, _) = universe.declare_class("Bar", Some(foo), false, Vec::new());
        let (baz, _) = universe.declare_class("Baz", None, false, Vec::new());
        (universe, foo, bar, baz)
    }

    #[test]
    fn test_union_collapses_to_hierarchy() {
        let (mut universe, foo, bar, baz) = hierarchy_universe();
        let u = universe.union_of(&[foo, bar]);
        assert_eq!(universe.display(u), "Foo+");
        let with_baz = universe.union_of(&[u, baz]);
        assert!(universe.is_union(with_baz));
        assert_eq!(universe.concrete_types(with_baz).len(), 3);
    }

    #[test]
    fn test_union_keeps_unrelated_value_types() {
        let mut universe = Universe::new();
        let b = *universe.builtins();
        let u = universe.union_of(&[b.int32, b.nil]);
        assert!(universe.is_union(u));
        assert_eq!(universe.union_of(&[b.nil, b.int32]), u);
        assert_eq!(universe.union_of(&[u, b.no_return]), u);
        assert_eq!(universe.union_of(&[b.no_return]), b.no_return);
    }

    #[test]
    fn test_reopen_class() {
        let (mut universe, foo, _, _) = hierarchy_universe();
        let (again, created) = universe.declare_class("Foo", None, false, Vec::new());
        assert_eq!(again, foo);
        assert!(!created);
    }

    #[test]
    fn test_abstract_class_not_concrete() {
        let mut universe = Universe::new();
        let (shape, _) = universe.declare_class("Shape", None, true, Vec::new());
        let (circle, _) = universe.declare_class("Circle", Some(shape), false, Vec::new());
        let h = universe.hierarchy(shape);
        assert_eq!(universe.concrete_types(h), vec![circle]);
    }

    #[test]
    fn test_lookup_defs_walks_ancestors() {
        let (mut universe, foo, bar, _) = hierarchy_universe();
        let coco = universe.register_definition(
            foo,
            ast::Def::new("coco", vec![], Some(Expr::int(1))),
            DefOrigin::User,
        );
        assert_eq!(universe.lookup_definitions(bar, "coco", 0, false), vec![coco]);
        assert!(universe.lookup_definitions(bar, "coco", 1, false).is_empty());
        assert!(universe.lookup_definitions(bar, "coco", 0, true).is_empty());
        assert_eq!(universe.lookup_similar_name(bar, "cocoa", 0, false).as_deref(), Some("coco"));
    }

    #[test]
    fn test_constructors_not_inherited_by_metaclasses() {
        let (mut universe, foo, bar, _) = hierarchy_universe();
        let foo_meta = universe.metaclass(foo);
        let bar_meta = universe.metaclass(bar);
        universe.register_definition(
            foo_meta,
            ast::Def::new("new", vec![], Some(Expr::new(ast::ExprKind::Allocate(None)))),
            DefOrigin::Constructor,
        );
        assert_eq!(universe.lookup_defs(foo_meta, "new").len(), 1);
        assert!(universe.lookup_defs(bar_meta, "new").is_empty());
    }

    #[test]
    fn test_display_forms() {
        let (mut universe, foo, _, _) = hierarchy_universe();
        let b = *universe.builtins();
        let h = universe.hierarchy(foo);
        let meta = universe.metaclass(h);
        let ptr = universe.pointer_of(b.char);
        let fun = universe.fun_of(vec![b.int32], b.void);
        assert_eq!(universe.display(meta), "Foo+:Class");
        assert_eq!(universe.display(ptr), "Pointer(Char)");
        assert_eq!(universe.display(fun), "Int32 -> Void");
        assert_eq!(universe.lookup_definitions(fun, "call", 1, false).len(), 1);
    }

    proptest! {
        #[test]
        fn prop_union_is_order_independent(picks in proptest::collection::vec(0usize..6, 1..8)) {
            let (mut universe, foo, bar, baz) = hierarchy_universe();
            let b = *universe.builtins();
            let pool = [foo, bar, baz, b.int32, b.nil, b.string];
            let types: Vec<_> = picks.iter().map(|i| pool[*i]).collect();
            let mut reversed = types.clone();
            reversed.reverse();
            let forward = universe.union_of(&types);
            let backward = universe.union_of(&reversed);
            prop_assert_eq!(forward, backward);
            prop_assert_eq!(universe.union_of(&[forward, forward]), forward);
            for ty in &types {
                prop_assert!(universe.includes_type(forward, *ty));
            }
        }
    }
}

//! Normalized abstract syntax tree consumed by inference.
//!
//! The parser and the normalization pass live outside this crate. What they
//! hand over is the tree defined here: method bodies are already desugared
//! into a small expression language (calls, assignments, literals, `yield`,
//! conditionals and declarations), and every node carries the [`Span`] of the
//! source it came from.
//!
//! # Structure
//!
//! - [`Program`] - Root node holding the top-level expressions
//! - [`Expr`] - An expression with its span
//! - [`Call`] - A call with optional receiver, arguments and block
//! - [`Def`] - A method definition with restrictions and an optional typed block argument
//! - [`TypeExpr`] - Type expressions used in restrictions and block signatures
//!
//! # Design Notes
//!
//! - All nodes derive `Serialize`/`Deserialize` so a front end can pass a
//!   program as JSON (the `garnetc` binary reads that format).
//! - Nodes are plain owned data. Inference never mutates the tree; typing
//!   information lives in the binding graph instead.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::span::Span;
use crate::types::TypeId;

/// A program is a compilation unit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    /// Top-level expressions, in source order.
    pub exprs: Vec<Expr>,
    /// Original source text, when the front end forwards it.
    #[serde(default)]
    pub source: Option<String>,
}

impl Program {
    pub fn new(exprs: Vec<Expr>) -> Self {
        Self {
            exprs,
            source: None,
        }
    }
}

/// An expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    #[serde(default)]
    pub span: Span,
}

/// Expression kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// `nil`
    Nil,
    /// `true` / `false`
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Character literal
    Char(char),
    /// String literal
    Str(String),
    /// Symbol literal `:name`
    Symbol(String),
    /// Array literal `[a, b]`
    Array(Vec<Expr>),
    /// Local variable read
    Var(String),
    /// `self`
    SelfRef,
    /// Local variable assignment
    Assign { target: String, value: Box<Expr> },
    /// `out x` argument of a foreign call
    Out(String),
    /// Constant reference (a type used as a value)
    Path(TypeExpr),
    /// Method call
    Call(Box<Call>),
    /// `yield a, b`
    Yield(Vec<Expr>),
    /// Expression sequence; evaluates to the last expression
    Seq(Vec<Expr>),
    /// `if cond then else`
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Method definition
    Def(Box<Def>),
    /// Class definition or reopening
    ClassDef(Box<ClassDef>),
    /// Foreign library declaration
    LibDef(Box<LibDef>),
    /// Primitive body producing a value of the given type
    Primitive(TypeExpr),
    /// Instance allocation; without a type, allocates `self`'s instance type
    Allocate(Option<TypeExpr>),
    /// Function literal `->(x : Int32) { body }`
    FunLiteral { params: Vec<Param>, body: Box<Expr> },
    /// `expr.class`
    ClassOf(Box<Expr>),
}

/// A method call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub obj: Option<Expr>,
    pub name: String,
    pub args: Vec<Expr>,
    pub block: Option<Block>,
    /// `&fn` argument passed in place of a literal block
    pub block_arg: Option<Expr>,
    /// Whether the call was written with parentheses
    #[serde(default)]
    pub has_parens: bool,
}

/// A literal block `{ |a, b| body }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub args: Vec<String>,
    pub body: Option<Box<Expr>>,
}

/// A method definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Def {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Option<Expr>,
    pub block_arg: Option<BlockArg>,
    /// `def self.name`: defined on the metaclass
    #[serde(default)]
    pub receiver_self: bool,
    #[serde(default)]
    pub span: Span,
}

/// A method parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
    pub restriction: Option<TypeExpr>,
}

/// A declared block argument `&block : A, B -> C`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockArg {
    pub name: String,
    pub inputs: Option<Vec<TypeExpr>>,
    pub output: Option<TypeExpr>,
}

/// A class definition (or reopening).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    pub superclass: Option<TypeExpr>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub type_vars: Vec<String>,
    pub body: Vec<Expr>,
}

/// A foreign library declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibDef {
    pub name: String,
    pub funs: Vec<FunDecl>,
    #[serde(default)]
    pub structs: Vec<StructDecl>,
}

/// An external function declared inside a lib.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunDecl {
    pub name: String,
    pub params: Vec<(String, TypeExpr)>,
    pub ret: Option<TypeExpr>,
    #[serde(default)]
    pub varargs: bool,
}

/// A C-layout struct declared inside a lib.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<(String, TypeExpr)>,
}

/// A type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeExpr {
    /// `Foo`, `Lib::Point`, `::Foo`
    Path { names: Vec<String>, global: bool },
    /// `Array(T)`
    Generic {
        name: Box<TypeExpr>,
        args: Vec<TypeExpr>,
    },
    /// `A, B -> C`
    Fun {
        inputs: Vec<TypeExpr>,
        output: Option<Box<TypeExpr>>,
    },
    /// `self`
    SelfType,
    /// An already-resolved type (produced by synthesized code)
    Resolved(TypeId),
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            span: Span::dummy(),
        }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn nil() -> Self {
        Self::new(ExprKind::Nil)
    }

    pub fn int(value: i64) -> Self {
        Self::new(ExprKind::Int(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ExprKind::Str(value.into()))
    }

    pub fn symbol(value: impl Into<String>) -> Self {
        Self::new(ExprKind::Symbol(value.into()))
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Var(name.into()))
    }

    pub fn assign(target: impl Into<String>, value: Expr) -> Self {
        Self::new(ExprKind::Assign {
            target: target.into(),
            value: Box::new(value),
        })
    }

    /// A constant reference by simple name.
    pub fn path(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Path(TypeExpr::named(name)))
    }

    pub fn seq(exprs: Vec<Expr>) -> Self {
        Self::new(ExprKind::Seq(exprs))
    }

    pub fn primitive(ty: TypeExpr) -> Self {
        Self::new(ExprKind::Primitive(ty))
    }

    pub fn yield_(args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Yield(args))
    }

    pub fn if_(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        Self::new(ExprKind::If {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    /// A receiver call `obj.name(args)`.
    pub fn call(obj: Expr, name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::from_call(Call::new(Some(obj), name, args))
    }

    /// A receiver-less call `name(args)`.
    pub fn fcall(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::from_call(Call::new(None, name, args))
    }

    pub fn from_call(call: Call) -> Self {
        Self::new(ExprKind::Call(Box::new(call)))
    }

    pub fn def(def: Def) -> Self {
        Self::new(ExprKind::Def(Box::new(def)))
    }

    pub fn class(class: ClassDef) -> Self {
        Self::new(ExprKind::ClassDef(Box::new(class)))
    }

    pub fn lib(lib: LibDef) -> Self {
        Self::new(ExprKind::LibDef(Box::new(lib)))
    }

    /// Whether this expression, or anything nested in it, yields.
    ///
    /// Returns the largest number of values yielded at once.
    pub fn max_yield_arity(&self) -> Option<usize> {
        let mut max = None;
        self.visit_yields(&mut |n| max = Some(max.map_or(n, |m: usize| m.max(n))));
        max
    }

    fn visit_yields(&self, f: &mut impl FnMut(usize)) {
        match &self.kind {
            ExprKind::Yield(args) => {
                f(args.len());
                args.iter().for_each(|a| a.visit_yields(f));
            }
            ExprKind::Array(items) | ExprKind::Seq(items) => {
                items.iter().for_each(|e| e.visit_yields(f));
            }
            ExprKind::Assign { value, .. } => value.visit_yields(f),
            ExprKind::Call(call) => {
                if let Some(obj) = &call.obj {
                    obj.visit_yields(f);
                }
                call.args.iter().for_each(|a| a.visit_yields(f));
                if let Some(body) = call.block.as_ref().and_then(|b| b.body.as_ref()) {
                    body.visit_yields(f);
                }
            }
            ExprKind::If {
                cond,
                then,
                otherwise,
            } => {
                cond.visit_yields(f);
                then.visit_yields(f);
                otherwise.visit_yields(f);
            }
            ExprKind::ClassOf(inner) => inner.visit_yields(f),
            // Nested definitions and function literals have their own yield scope.
            _ => {}
        }
    }
}

impl Call {
    pub fn new(obj: Option<Expr>, name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            obj,
            name: name.into(),
            args,
            block: None,
            block_arg: None,
            has_parens: false,
        }
    }

    pub fn with_block(mut self, args: Vec<&str>, body: Expr) -> Self {
        self.block = Some(Block {
            args: args.into_iter().map(str::to_string).collect(),
            body: Some(Box::new(body)),
        });
        self
    }

    pub fn with_block_arg(mut self, value: Expr) -> Self {
        self.block_arg = Some(value);
        self
    }

    pub fn with_parens(mut self) -> Self {
        self.has_parens = true;
        self
    }
}

impl Def {
    pub fn new(name: impl Into<String>, params: Vec<Param>, body: Option<Expr>) -> Self {
        Self {
            name: name.into(),
            params,
            body,
            block_arg: None,
            receiver_self: false,
            span: Span::dummy(),
        }
    }

    pub fn with_block_arg(mut self, block_arg: BlockArg) -> Self {
        self.block_arg = Some(block_arg);
        self
    }

    pub fn on_self(mut self) -> Self {
        self.receiver_self = true;
        self
    }

    /// Number of arguments a call must supply at minimum.
    pub fn required_params(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }

    /// Whether a call with `count` arguments fits this definition.
    pub fn accepts_arity(&self, count: usize) -> bool {
        self.required_params() <= count && count <= self.params.len()
    }

    /// Largest yield arity of the body, `Some(0)` for a declared block that is never yielded.
    pub fn yields(&self) -> Option<usize> {
        let from_body = self.body.as_ref().and_then(Expr::max_yield_arity);
        match (&self.block_arg, from_body) {
            (Some(_), None) => Some(0),
            (_, yields) => yields,
        }
    }
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            restriction: None,
        }
    }

    pub fn typed(name: impl Into<String>, restriction: TypeExpr) -> Self {
        Self {
            name: name.into(),
            default: None,
            restriction: Some(restriction),
        }
    }

    pub fn with_default(mut self, default: Expr) -> Self {
        self.default = Some(default);
        self
    }
}

impl ClassDef {
    pub fn new(name: impl Into<String>, superclass: Option<&str>, body: Vec<Expr>) -> Self {
        Self {
            name: name.into(),
            superclass: superclass.map(TypeExpr::named),
            is_abstract: false,
            type_vars: Vec::new(),
            body,
        }
    }

    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn generic(mut self, type_vars: &[&str]) -> Self {
        self.type_vars = type_vars.iter().map(|s| s.to_string()).collect();
        self
    }
}

impl TypeExpr {
    /// A single-segment path.
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Path {
            names: vec![name.into()],
            global: false,
        }
    }

    /// A multi-segment path such as `LibC::Point`.
    pub fn path(names: &[&str]) -> Self {
        TypeExpr::Path {
            names: names.iter().map(|s| s.to_string()).collect(),
            global: false,
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeExpr>) -> Self {
        TypeExpr::Generic {
            name: Box::new(TypeExpr::named(name)),
            args,
        }
    }

    /// The single name of a one-segment, non-global path.
    pub fn single_name(&self) -> Option<&str> {
        match self {
            TypeExpr::Path { names, global: false } if names.len() == 1 => Some(&names[0]),
            _ => None,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Path { names, global } => {
                if *global {
                    write!(f, "::")?;
                }
                write!(f, "{}", names.join("::"))
            }
            TypeExpr::Generic { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            TypeExpr::Fun { inputs, output } => {
                for (i, input) in inputs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", input)?;
                }
                match output {
                    Some(output) => write!(f, " -> {}", output),
                    None => write!(f, " ->"),
                }
            }
            TypeExpr::SelfType => write!(f, "self"),
            TypeExpr::Resolved(id) => write!(f, "{}", id),
        }
    }
}

impl fmt::Display for BlockArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "&{}", self.name)?;
        if self.inputs.is_none() && self.output.is_none() {
            return Ok(());
        }
        write!(f, " : ")?;
        if let Some(inputs) = &self.inputs {
            for (i, input) in inputs.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", input)?;
            }
            write!(f, " ")?;
        }
        write!(f, "->")?;
        if let Some(output) = &self.output {
            write!(f, " {}", output)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yields_counts_nested_blocks() {
        let body = Expr::seq(vec![
            Expr::yield_(vec![Expr::int(1)]),
            Expr::from_call(
                Call::new(None, "each", vec![])
                    .with_block(vec!["x"], Expr::yield_(vec![Expr::var("x"), Expr::int(2)])),
            ),
        ]);
        let def = Def::new("twice", vec![], Some(body));
        assert_eq!(def.yields(), Some(2));
    }

    #[test]
    fn test_declared_block_without_yield() {
        let def = Def::new("noop", vec![], Some(Expr::nil())).with_block_arg(BlockArg {
            name: "block".into(),
            inputs: None,
            output: None,
        });
        assert_eq!(def.yields(), Some(0));
        assert_eq!(Def::new("plain", vec![], None).yields(), None);
    }

    #[test]
    fn test_arity_with_defaults() {
        let def = Def::new(
            "f",
            vec![Param::new("a"), Param::new("b").with_default(Expr::int(1))],
            None,
        );
        assert!(!def.accepts_arity(0));
        assert!(def.accepts_arity(1));
        assert!(def.accepts_arity(2));
        assert!(!def.accepts_arity(3));
    }

    #[test]
    fn test_type_expr_display() {
        let ty = TypeExpr::generic("Array", vec![TypeExpr::named("T")]);
        assert_eq!(ty.to_string(), "Array(T)");
        assert_eq!(TypeExpr::path(&["LibC", "Point"]).to_string(), "LibC::Point");
        let block = BlockArg {
            name: "block".into(),
            inputs: Some(vec![TypeExpr::named("T")]),
            output: Some(TypeExpr::named("U")),
        };
        assert_eq!(block.to_string(), "&block : T -> U");
    }

    #[test]
    fn test_program_round_trips_through_json() {
        let program = Program::new(vec![Expr::assign("a", Expr::call(Expr::path("Foo"), "new", vec![]))]);
        let json = serde_json::to_string(&program).expect("serialize");
        let back: Program = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(program, back);
    }
}

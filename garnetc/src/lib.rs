//! # Garnet Inference Library
//!
//! Call resolution and type inference core of the Garnet compiler.
//!
//! Garnet is an ahead-of-time compiled language with Ruby-like syntax. Method
//! parameters need no type annotations: every method is instantiated for the
//! argument types it is actually called with, and dynamic dispatch over unions
//! and class hierarchies is resolved at compile time into a set of targets.
//!
//! ## Pipeline Position
//!
//! ```text
//! Source -> Parser -> Normalizer -> [ Inference ] -> Codegen
//! ```
//!
//! This crate consumes normalized programs ([`ast::Program`]) and produces an
//! [`typeck::InferenceContext`] in which every call site knows its targets and
//! every expression its type.
//!
//! ## Quick Start
//!
//! ```rust
//! use garnetc::ast::{ClassDef, Def, Expr, Program};
//! use garnetc::config::Config;
//! use garnetc::typeck::check_program;
//!
//! let program = Program::new(vec![
//!     Expr::class(ClassDef::new(
//!         "Foo",
//!         None,
//!         vec![Expr::def(Def::new("coco", vec![], Some(Expr::int(1))))],
//!     )),
//!     Expr::assign("x", Expr::call(Expr::call(Expr::path("Foo"), "new", vec![]), "coco", vec![])),
//! ]);
//!
//! let (ctx, _) = check_program(&program, &Config::default()).expect("inference");
//! let x = ctx.var_type("x").expect("typed");
//! assert_eq!(ctx.universe().display(x), "Int32");
//! ```
//!
//! ## Module Overview
//!
//! - [`ast`] - Normalized syntax tree consumed by inference
//! - [`types`] - Type universe: classes, hierarchies, unions and definitions
//! - [`typeck`] - Binding graph, overload matching and call resolution
//! - [`config`] - `garnet.toml` configuration
//! - [`diagnostics`] - Error reporting
//! - [`span`] - Source locations

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod span;
pub mod typeck;
pub mod types;

pub use config::Config;
pub use typeck::{check_program, InferenceContext, TypeError, TypeErrorKind};
pub use types::{TypeId, Universe};

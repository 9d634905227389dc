//! Call resolution and type inference for Garnet.
//!
//! Inference is a fixpoint over a graph of binding nodes. Key components:
//!
//! - [`InferenceContext`] - Owner of every piece of inference state
//! - [`BindingGraph`] - Nodes, dependency edges and type derivation
//! - [`Matcher`] - Structural overload matching with argument covers
//! - [`InstantiationCache`] - One typed body per definition and argument types
//! - [`SubclassObservers`] - Calls re-entered when a hierarchy grows
//! - [`DispatchResolver`] - Runtime target selection over resolved calls
//!
//! # Inference Process
//!
//! 1. **Visit** - Walk normalized expressions, creating nodes and call sites
//! 2. **Resolve** - Each call site matches its receiver's definitions once its
//!    inputs are typed, instantiating the matched bodies on demand
//! 3. **Propagate** - Type changes flow to dependent nodes and re-enter the
//!    call sites observing them until nothing changes
//!
//! # Dynamic Dispatch
//!
//! Union receivers are resolved member by member and hierarchy receivers
//! (`Foo+`) class by class, so a call can end up with several targets. Calls
//! that crossed a hierarchy observe its base and resolve again when a
//! subclass is declared.

pub mod binding;
pub mod block;
pub mod cache;
pub mod call;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod ffi;
pub mod lookup;
pub mod matcher;
pub mod observer;
pub mod report;
pub mod suggestion;
pub mod synth;
pub mod visitor;

#[cfg(test)]
mod tests;

pub use binding::{BindingGraph, BindingNode, Derive, NodeId};
pub use cache::{InstantiationCache, TypedDef, TypedDefId};
pub use call::{CallId, CallSite};
pub use context::{InferenceContext, ScopeId};
pub use dispatch::{DispatchEntry, DispatchResolver};
pub use error::{TypeError, TypeErrorKind, TypeResult};
pub use ffi::{ArgConversion, ConversionKind};
pub use lookup::TypeLookup;
pub use matcher::{Match, MatchKind, MatchSet, Matcher};
pub use observer::SubclassObservers;

use crate::ast;
use crate::config::Config;

/// Run inference over a normalized program.
///
/// Returns the context holding every typed node, call site and typed
/// definition, together with the node of each top-level expression.
pub fn check_program(program: &ast::Program, config: &Config) -> TypeResult<(InferenceContext, Vec<NodeId>)> {
    let mut ctx = InferenceContext::new(config);
    let nodes = ctx.check(program)?;
    Ok((ctx, nodes))
}

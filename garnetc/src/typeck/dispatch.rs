//! Runtime dispatch over resolved call sites.
//!
//! Inference leaves a call with one or more typed definitions. When the
//! receiver or an argument is a union or a hierarchy, which one runs is only
//! known at runtime. This module answers that question for concrete runtime
//! types, and enumerates the whole table for a call.
//!
//! # Selection
//!
//! Targets are scanned in resolution order. The first whose self type
//! includes the runtime receiver and whose argument types include the runtime
//! arguments wins.

use crate::types::TypeId;

use super::cache::TypedDefId;
use super::call::CallId;
use super::context::InferenceContext;

/// One row of a dispatch table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEntry {
    /// Concrete receiver type, `None` for calls without receiver.
    pub receiver: Option<TypeId>,
    /// Concrete argument types.
    pub args: Vec<TypeId>,
    /// The definition that runs, `None` if no target accepts these types.
    pub target: Option<TypedDefId>,
}

/// Dispatch queries over an inference result.
pub struct DispatchResolver<'a> {
    ctx: &'a InferenceContext,
}

impl<'a> DispatchResolver<'a> {
    pub fn new(ctx: &'a InferenceContext) -> Self {
        Self { ctx }
    }

    /// The target of `call` that runs for the given runtime types.
    pub fn dispatch(&self, call: CallId, receiver: Option<TypeId>, args: &[TypeId]) -> Option<TypedDefId> {
        let universe = self.ctx.universe();
        self.ctx.call(call).targets().iter().copied().find(|target| {
            let typed = self.ctx.typed_def(*target);
            let receiver_ok = receiver.map_or(true, |r| universe.includes_type(typed.self_type, r));
            receiver_ok
                && typed.arg_types.len() == args.len()
                && typed
                    .arg_types
                    .iter()
                    .zip(args)
                    .all(|(declared, actual)| universe.includes_type(*declared, *actual))
        })
    }

    /// Every combination of concrete receiver and argument types of `call`
    /// with the target it dispatches to.
    pub fn table(&self, call: CallId) -> Vec<DispatchEntry> {
        let universe = self.ctx.universe();
        let site = self.ctx.call(call);

        let receivers: Vec<Option<TypeId>> = match site.obj.and_then(|obj| self.ctx.type_of(obj)) {
            Some(ty) => universe.concrete_types(ty).into_iter().map(Some).collect(),
            None => vec![None],
        };
        let mut tuples: Vec<Vec<TypeId>> = vec![Vec::new()];
        for arg in &site.args {
            let Some(ty) = self.ctx.type_of(arg.node) else {
                return Vec::new();
            };
            let choices = universe.concrete_types(ty);
            tuples = tuples
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

        let mut entries = Vec::with_capacity(receivers.len() * tuples.len());
        for receiver in &receivers {
            for args in &tuples {
                entries.push(DispatchEntry {
                    receiver: *receiver,
                    args: args.clone(),
                    target: self.dispatch(call, *receiver, args),
                });
            }
        }
        entries
    }
}

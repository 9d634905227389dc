//! Subclass observers.
//!
//! A call site that resolved through a hierarchy (`Foo+` as receiver or
//! argument) depends on the set of classes below `Foo`, not only on the types
//! of its inputs. It registers against the hierarchy's base; declaring a new
//! subclass re-enters every call registered against one of its ancestors.
//!
//! Registrations are rebuilt on each recalculation: the old ones are removed
//! before resolution adds the current ones.

use std::collections::HashMap;

use crate::types::TypeId;

use super::call::CallId;
use super::context::InferenceContext;
use super::error::TypeResult;

/// Registry of call sites observing class hierarchies, scoped to one inference run.
#[derive(Debug, Default)]
pub struct SubclassObservers {
    by_base: HashMap<TypeId, Vec<CallId>>,
    registrations: HashMap<CallId, Vec<TypeId>>,
}

impl SubclassObservers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `call` against `base`. Returns false if it already was.
    pub fn add(&mut self, call: CallId, base: TypeId) -> bool {
        let bases = self.registrations.entry(call).or_default();
        if bases.contains(&base) {
            return false;
        }
        bases.push(base);
        self.by_base.entry(base).or_default().push(call);
        true
    }

    /// Drop every registration of `call`.
    pub fn remove_call(&mut self, call: CallId) {
        let Some(bases) = self.registrations.remove(&call) else {
            return;
        };
        for base in bases {
            if let Some(calls) = self.by_base.get_mut(&base) {
                calls.retain(|c| *c != call);
            }
        }
    }

    /// Calls observing `base`, in registration order.
    pub fn observers_of(&self, base: TypeId) -> &[CallId] {
        self.by_base.get(&base).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Bases `call` currently observes.
    pub fn bases_of(&self, call: CallId) -> &[TypeId] {
        self.registrations.get(&call).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl InferenceContext {
    /// Re-enter every call observing an ancestor of the newly declared `class`.
    pub(crate) fn on_new_subclass(&mut self, class: TypeId) -> TypeResult<()> {
        let mut pending: Vec<CallId> = Vec::new();
        for ancestor in self.universe.ancestors_and_self(class).into_iter().skip(1) {
            for call in self.observers.observers_of(ancestor) {
                if !pending.contains(call) {
                    pending.push(*call);
                }
            }
        }
        if pending.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            class = %self.universe.display(class),
            observers = pending.len(),
            "new subclass"
        );
        for call in pending {
            self.call_mut(call).clear_signature();
            self.recalculate(call)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent_per_base() {
        let mut observers = SubclassObservers::new();
        let base = TypeId::new(7);
        assert!(observers.add(CallId(1), base));
        assert!(!observers.add(CallId(1), base));
        assert!(observers.add(CallId(2), base));
        assert_eq!(observers.observers_of(base), &[CallId(1), CallId(2)]);
    }

    #[test]
    fn test_remove_call_clears_every_base() {
        let mut observers = SubclassObservers::new();
        let (foo, bar) = (TypeId::new(7), TypeId::new(8));
        observers.add(CallId(1), foo);
        observers.add(CallId(1), bar);
        observers.add(CallId(2), bar);
        observers.remove_call(CallId(1));
        assert!(observers.observers_of(foo).is_empty());
        assert_eq!(observers.observers_of(bar), &[CallId(2)]);
        assert!(observers.bases_of(CallId(1)).is_empty());
    }
}

//! Association of display targets with the action currently populating them.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use crate::domain::entities::TargetId;

/// Result of [`BindingRegistry::bind_or_reuse`].
#[derive(Debug)]
pub enum Binding<A> {
    /// An equivalent action already populates the target.
    Reused(Arc<A>),
    /// The candidate is now bound; `previous` was displaced.
    Bound {
        /// Action that was bound before, if still alive.
        previous: Option<Arc<A>>,
    },
}

/// Registry of non-owning `TargetId -> action` bindings.
///
/// Entries are hints: they never keep an action alive and callers re-validate
/// them with [`BindingRegistry::is_bound`] before touching the target.
#[derive(Debug)]
pub struct BindingRegistry<A> {
    bindings: Mutex<HashMap<TargetId, Weak<A>>>,
}

impl<A> Default for BindingRegistry<A> {
    fn default() -> Self {
        Self {
            bindings: Mutex::new(HashMap::new()),
        }
    }
}

impl<A> BindingRegistry<A> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live action bound to the target.
    #[must_use]
    pub fn current(&self, target: TargetId) -> Option<Arc<A>> {
        self.bindings.lock().get(&target).and_then(Weak::upgrade)
    }

    /// Reuses the bound action if `reuse` accepts it, otherwise binds `candidate`.
    ///
    /// The whole read-modify-write happens under one lock, so two concurrent
    /// requests for a target cannot both bind.
    pub fn bind_or_reuse(
        &self,
        target: TargetId,
        candidate: &Arc<A>,
        reuse: impl FnOnce(&A) -> bool,
    ) -> Binding<A> {
        let mut bindings = self.bindings.lock();
        bindings.retain(|_, action| action.strong_count() > 0);

        let previous = bindings.get(&target).and_then(Weak::upgrade);
        if let Some(existing) = previous.as_ref()
            && reuse(existing)
        {
            trace!(target = %target, "Reusing bound action");
            return Binding::Reused(Arc::clone(existing));
        }

        bindings.insert(target, Arc::downgrade(candidate));
        trace!(target = %target, displaced = previous.is_some(), "Bound action");
        Binding::Bound { previous }
    }

    /// Removes the binding, returning the action if it is still alive.
    pub fn unbind(&self, target: TargetId) -> Option<Arc<A>> {
        self.bindings.lock().remove(&target).and_then(|w| w.upgrade())
    }

    /// Removes the binding only if it still points at `action`.
    pub fn unbind_if(&self, target: TargetId, action: &A) -> bool {
        let mut bindings = self.bindings.lock();
        let matches = bindings
            .get(&target)
            .is_some_and(|bound| std::ptr::eq(bound.as_ptr(), action));
        if matches {
            bindings.remove(&target);
        }
        matches
    }

    /// Returns true if the target is bound to exactly this action.
    #[must_use]
    pub fn is_bound(&self, target: TargetId, action: &A) -> bool {
        self.bindings
            .lock()
            .get(&target)
            .is_some_and(|bound| std::ptr::eq(bound.as_ptr(), action))
    }

    /// Returns the number of entries, including dead ones not yet pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.lock().len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Job(&'static str);

    #[test]
    fn test_first_bind_has_no_previous() {
        let registry = BindingRegistry::new();
        let target = TargetId::new();
        let job = Arc::new(Job("a"));

        let binding = registry.bind_or_reuse(target, &job, |_| true);
        assert!(matches!(binding, Binding::Bound { previous: None }));
        assert!(registry.is_bound(target, &job));
    }

    #[test]
    fn test_reuse_when_predicate_accepts() {
        let registry = BindingRegistry::new();
        let target = TargetId::new();
        let first = Arc::new(Job("same"));
        let second = Arc::new(Job("same"));

        registry.bind_or_reuse(target, &first, |_| false);
        match registry.bind_or_reuse(target, &second, |bound| bound.0 == second.0) {
            Binding::Reused(existing) => assert!(Arc::ptr_eq(&existing, &first)),
            Binding::Bound { .. } => panic!("expected reuse"),
        }
        assert!(registry.is_bound(target, &first));
        assert!(!registry.is_bound(target, &second));
    }

    #[test]
    fn test_rebind_returns_previous() {
        let registry = BindingRegistry::new();
        let target = TargetId::new();
        let old = Arc::new(Job("old"));
        let new = Arc::new(Job("new"));

        registry.bind_or_reuse(target, &old, |_| false);
        match registry.bind_or_reuse(target, &new, |bound| bound.0 == "new") {
            Binding::Bound { previous } => assert!(Arc::ptr_eq(&previous.unwrap(), &old)),
            Binding::Reused(_) => panic!("expected rebind"),
        }
        assert!(registry.is_bound(target, &new));
    }

    #[test]
    fn test_registry_does_not_keep_actions_alive() {
        let registry = BindingRegistry::new();
        let target = TargetId::new();
        let job = Arc::new(Job("a"));
        registry.bind_or_reuse(target, &job, |_| false);
        drop(job);

        assert!(registry.current(target).is_none());

        let other_target = TargetId::new();
        let other = Arc::new(Job("b"));
        registry.bind_or_reuse(other_target, &other, |_| false);
        assert_eq!(registry.len(), 1);
        assert!(registry.current(other_target).is_some());
    }

    #[test]
    fn test_unbind_if_only_removes_matching_action() {
        let registry = BindingRegistry::new();
        let target = TargetId::new();
        let bound = Arc::new(Job("bound"));
        let stranger = Job("stranger");

        registry.bind_or_reuse(target, &bound, |_| false);
        assert!(!registry.unbind_if(target, &stranger));
        assert!(registry.unbind_if(target, &bound));
        assert!(registry.current(target).is_none());
    }
}

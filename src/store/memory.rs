//! # In-memory store with detachable reducers.
//!
//! [`MemoryStore`] keeps one state slice per attached reducer name. Dispatching an
//! action runs every attached reducer over its own slice.
//!
//! ## Detach/attach cycle
//! ```text
//! attach("todos", r) ─► slice = memo.take("todos") or r.initial
//! dispatch(action)   ─► slice = r.reduce(slice, action)   (for every attached r)
//! detach("todos")    ─► memo["todos"] = slice, reducer removed
//! attach("todos", r) ─► previous slice restored
//! ```
//!
//! Attaching a name that is already attached is a no-op (the first reducer stays).

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::Store;
use crate::units::Output;

/// Pure state transition for one slice.
pub struct Reducer<S, A> {
    initial: S,
    reduce: Arc<dyn Fn(&S, &A) -> S + Send + Sync>,
}

impl<S: Clone, A> Reducer<S, A> {
    /// Creates a reducer from its initial state and transition function.
    pub fn new<F>(initial: S, reduce: F) -> Self
    where
        F: Fn(&S, &A) -> S + Send + Sync + 'static,
    {
        Self {
            initial,
            reduce: Arc::new(reduce),
        }
    }

    /// Initial slice state.
    pub fn initial(&self) -> &S {
        &self.initial
    }

    /// Applies the reducer.
    pub fn apply(&self, state: &S, action: &A) -> S {
        (self.reduce)(state, action)
    }
}

impl<S: Clone, A> Clone for Reducer<S, A> {
    fn clone(&self) -> Self {
        Self {
            initial: self.initial.clone(),
            reduce: Arc::clone(&self.reduce),
        }
    }
}

impl<S: fmt::Debug, A> fmt::Debug for Reducer<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reducer")
            .field("initial", &self.initial)
            .finish_non_exhaustive()
    }
}

struct Slices<S, A> {
    reducers: BTreeMap<String, Reducer<S, A>>,
    states: BTreeMap<String, S>,
    detached: HashMap<String, S>,
    dispatched: u64,
}

/// Thread-safe in-memory [`Store`].
pub struct MemoryStore<S, A> {
    slices: RwLock<Slices<S, A>>,
}

impl<S: Output, A: Output> MemoryStore<S, A> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            slices: RwLock::new(Slices {
                reducers: BTreeMap::new(),
                states: BTreeMap::new(),
                detached: HashMap::new(),
                dispatched: 0,
            }),
        }
    }

    /// Current state of an attached slice.
    pub fn state(&self, name: &str) -> Option<S> {
        self.slices.read().states.get(name).cloned()
    }

    /// Every attached slice, by name.
    pub fn snapshot(&self) -> BTreeMap<String, S> {
        self.slices.read().states.clone()
    }

    /// Names of attached reducers, sorted.
    pub fn attached(&self) -> Vec<String> {
        self.slices.read().reducers.keys().cloned().collect()
    }

    /// Whether a reducer is attached under `name`.
    pub fn is_attached(&self, name: &str) -> bool {
        self.slices.read().reducers.contains_key(name)
    }

    /// Number of actions dispatched so far.
    pub fn dispatched(&self) -> u64 {
        self.slices.read().dispatched
    }
}

impl<S: Output, A: Output> Default for MemoryStore<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Output, A: Output> Store for MemoryStore<S, A> {
    type State = S;
    type Action = A;

    fn attach_reducer(&self, name: &str, reducer: Reducer<S, A>) {
        let mut slices = self.slices.write();
        if slices.reducers.contains_key(name) {
            return;
        }
        let state = slices
            .detached
            .remove(name)
            .unwrap_or_else(|| reducer.initial().clone());
        slices.states.insert(name.to_string(), state);
        slices.reducers.insert(name.to_string(), reducer);
        tracing::trace!(target: "progkit::store", reducer = name, "attached");
    }

    fn detach_reducer(&self, name: &str) {
        let mut slices = self.slices.write();
        slices.reducers.remove(name);
        if let Some(state) = slices.states.remove(name) {
            slices.detached.insert(name.to_string(), state);
        }
        tracing::trace!(target: "progkit::store", reducer = name, "detached");
    }

    fn dispatch(&self, action: A) {
        let mut guard = self.slices.write();
        let slices = &mut *guard;
        for (name, reducer) in &slices.reducers {
            if let Some(state) = slices.states.get_mut(name) {
                *state = reducer.apply(state, &action);
            }
        }
        slices.dispatched += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> Reducer<i64, i64> {
        Reducer::new(0, |s, a| s + a)
    }

    #[test]
    fn dispatch_reaches_attached_reducers_only() {
        let store = MemoryStore::new();
        store.attach_reducer("a", counter());
        store.dispatch(2);
        store.attach_reducer("b", counter());
        store.dispatch(3);

        assert_eq!(store.state("a"), Some(5));
        assert_eq!(store.state("b"), Some(3));
        assert_eq!(store.dispatched(), 2);
        assert_eq!(store.attached(), vec!["a", "b"]);
    }

    #[test]
    fn detached_state_is_restored() {
        let store = MemoryStore::new();
        store.attach_reducer("a", counter());
        store.dispatch(4);
        store.detach_reducer("a");

        assert_eq!(store.state("a"), None);
        store.dispatch(100);

        store.attach_reducer("a", counter());
        assert_eq!(store.state("a"), Some(4));
    }

    #[test]
    fn reattach_is_noop() {
        let store = MemoryStore::new();
        store.attach_reducer("a", counter());
        store.dispatch(1);
        store.attach_reducer("a", Reducer::new(50, |_, _| -1));
        store.dispatch(1);

        assert_eq!(store.state("a"), Some(2));
    }
}

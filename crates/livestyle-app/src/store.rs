//! Reducer-driven state container with identity-based subscriptions
//!
//! A [`Store`] owns one root state behind an `Arc`. [`Store::dispatch`] runs
//! the reducer once, swaps the root, then synchronously notifies every
//! subscriber. Subscribers may dispatch follow-up actions through their
//! [`Context`]; those are processed in FIFO order once the current
//! notification round finishes, each with its own reducer run and round.
//!
//! Change detection is by reference ([`Identity`]), never by deep equality.
//! Reducers are therefore required to return a new `Arc` exactly when content
//! differs, and to hand back the input `Arc` untouched otherwise.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tracing::trace;

/// Reference identity used for change detection
pub trait Identity {
    fn same(&self, other: &Self) -> bool;
}

impl<T: ?Sized> Identity for Arc<T> {
    fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T: Identity> Identity for Option<T> {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<A: Identity, B: Identity> Identity for (A, B) {
    fn same(&self, other: &Self) -> bool {
        self.0.same(&other.0) && self.1.same(&other.1)
    }
}

impl<A: Identity, B: Identity, C: Identity> Identity for (A, B, C) {
    fn same(&self, other: &Self) -> bool {
        self.0.same(&other.0) && self.1.same(&other.1) && self.2.same(&other.2)
    }
}

/// Pure `(state, action) → state` function
pub type Reducer<S, A> = fn(&Arc<S>, &A) -> Arc<S>;

/// What a subscriber sees during a notification round
pub struct Context<'a, S, A> {
    state: &'a S,
    follow_ups: &'a mut Vec<A>,
}

impl<S, A> Context<'_, S, A> {
    /// The freshly committed state
    pub fn state(&self) -> &S {
        self.state
    }

    /// Queue an action to run after the current notification round
    pub fn dispatch(&mut self, action: A) {
        self.follow_ups.push(action);
    }
}

/// Handle for [`Store::unsubscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<S, A> = Box<dyn FnMut(&mut Context<'_, S, A>) + Send>;

/// Single mutable state container
pub struct Store<S, A> {
    state: Arc<S>,
    reducer: Reducer<S, A>,
    listeners: Vec<(SubscriptionId, Listener<S, A>)>,
    next_id: u64,
}

impl<S, A> std::fmt::Debug for Store<S, A>
where
    S: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.state)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<S: 'static, A: 'static> Store<S, A> {
    pub fn new(initial: S, reducer: Reducer<S, A>) -> Self {
        Self {
            state: Arc::new(initial),
            reducer,
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    /// Current root state
    pub fn state(&self) -> &Arc<S> {
        &self.state
    }

    /// Run the reducer, commit, notify; then drain follow-up actions
    pub fn dispatch(&mut self, action: A) {
        let mut queue = VecDeque::from([action]);

        while let Some(action) = queue.pop_front() {
            let next = (self.reducer)(&self.state, &action);
            if Arc::ptr_eq(&next, &self.state) {
                trace!("Dispatch left state untouched");
                continue;
            }
            self.state = next;

            let mut follow_ups = Vec::new();
            for (_, listener) in self.listeners.iter_mut() {
                let mut cx = Context {
                    state: &*self.state,
                    follow_ups: &mut follow_ups,
                };
                listener(&mut cx);
            }
            queue.extend(follow_ups);
        }
    }

    /// Watch a selected value.
    ///
    /// `on_change(new, previous, cx)` fires after a dispatch only when the
    /// selector's result is not [`Identity::same`] as the one seen at the
    /// previous notification (or at subscription time).
    pub fn subscribe<V, Sel, F>(&mut self, selector: Sel, mut on_change: F) -> SubscriptionId
    where
        V: Identity + Send + 'static,
        Sel: Fn(&S) -> V + Send + 'static,
        F: FnMut(&V, &V, &mut Context<'_, S, A>) + Send + 'static,
    {
        let mut previous = selector(&self.state);
        self.add_listener(Box::new(move |cx| {
            let next = selector(cx.state());
            if next.same(&previous) {
                return;
            }
            let prev = std::mem::replace(&mut previous, next);
            on_change(&previous, &prev, cx);
        }))
    }

    /// Watch one field of every entry in a keyed collection.
    ///
    /// After a dispatch, every entry whose `Arc` changed (including new
    /// entries) is inspected; `on_change(key, new, previous, cx)` fires when
    /// `inner(entry)` is not [`Identity::same`] as the previous entry's.
    /// Removed entries are not reported.
    pub fn subscribe_deep_key<K, E, V, Root, Inner, F>(
        &mut self,
        root: Root,
        inner: Inner,
        mut on_change: F,
    ) -> SubscriptionId
    where
        K: Ord + Send + Sync + 'static,
        E: Send + Sync + 'static,
        V: Identity + 'static,
        Root: Fn(&S) -> Arc<BTreeMap<K, Arc<E>>> + Send + 'static,
        Inner: Fn(&Arc<E>) -> V + Send + 'static,
        F: FnMut(&K, &V, Option<&V>, &mut Context<'_, S, A>) + Send + 'static,
    {
        let mut previous = root(&self.state);
        self.add_listener(Box::new(move |cx| {
            let next = root(cx.state());
            if next.same(&previous) {
                return;
            }

            for (key, entry) in next.iter() {
                let prev_entry = previous.get(key);
                if prev_entry.is_some_and(|p| Arc::ptr_eq(p, entry)) {
                    continue;
                }

                let new_inner = inner(entry);
                let prev_inner = prev_entry.map(&inner);
                if prev_inner.as_ref().is_some_and(|p| p.same(&new_inner)) {
                    continue;
                }
                on_change(key, &new_inner, prev_inner.as_ref(), cx);
            }

            previous = next;
        }))
    }

    /// Watch every changed entry of a keyed collection, unconditionally
    pub fn subscribe_deep_key_entries<K, E, Root, F>(
        &mut self,
        root: Root,
        on_change: F,
    ) -> SubscriptionId
    where
        K: Ord + Send + Sync + 'static,
        E: Send + Sync + 'static,
        Root: Fn(&S) -> Arc<BTreeMap<K, Arc<E>>> + Send + 'static,
        F: FnMut(&K, &Arc<E>, Option<&Arc<E>>, &mut Context<'_, S, A>) + Send + 'static,
    {
        self.subscribe_deep_key(root, Arc::clone, on_change)
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    fn add_listener(&mut self, listener: Listener<S, A>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default, Clone)]
    struct Counter {
        a: Arc<u32>,
        b: Arc<u32>,
        items: Arc<BTreeMap<&'static str, Arc<Item>>>,
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Item {
        label: Arc<String>,
        hits: Arc<u32>,
    }

    enum Op {
        IncA,
        SetB(u32),
        Noop,
        SetLabel(&'static str, &'static str),
        Hit(&'static str),
    }

    fn reduce(state: &Arc<Counter>, op: &Op) -> Arc<Counter> {
        let mut next = (**state).clone();
        match op {
            Op::IncA => next.a = Arc::new(*state.a + 1),
            Op::SetB(v) if *v != *state.b => next.b = Arc::new(*v),
            Op::SetLabel(key, label) => {
                let mut items = (*state.items).clone();
                let mut item = items.get(key).map(|i| (**i).clone()).unwrap_or_default();
                if *item.label == *label {
                    return state.clone();
                }
                item.label = Arc::new(label.to_string());
                items.insert(key, Arc::new(item));
                next.items = Arc::new(items);
            }
            Op::Hit(key) => {
                let mut items = (*state.items).clone();
                let mut item = items.get(key).map(|i| (**i).clone()).unwrap_or_default();
                item.hits = Arc::new(*item.hits + 1);
                items.insert(key, Arc::new(item));
                next.items = Arc::new(items);
            }
            _ => return state.clone(),
        }
        Arc::new(next)
    }

    fn store() -> Store<Counter, Op> {
        Store::new(Counter::default(), reduce)
    }

    #[test]
    fn test_dispatch_replaces_state() {
        let mut store = store();
        store.dispatch(Op::IncA);
        store.dispatch(Op::IncA);
        assert_eq!(*store.state().a, 2);
    }

    #[test]
    fn test_noop_dispatch_preserves_identity() {
        let mut store = store();
        let before = store.state().clone();
        store.dispatch(Op::Noop);
        store.dispatch(Op::SetB(0));
        assert!(Arc::ptr_eq(&before, store.state()));
    }

    #[test]
    fn test_selector_fires_only_on_identity_change() {
        let mut store = store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(
            |s: &Counter| s.b.clone(),
            move |new, prev, _| sink.lock().unwrap().push((**new, **prev)),
        );

        store.dispatch(Op::IncA);
        store.dispatch(Op::SetB(5));
        store.dispatch(Op::SetB(5));
        store.dispatch(Op::SetB(6));

        assert_eq!(*seen.lock().unwrap(), vec![(5, 0), (6, 5)]);
    }

    #[test]
    fn test_follow_up_dispatch_runs_after_round() {
        let mut store = store();
        store.subscribe(
            |s: &Counter| s.a.clone(),
            |new, _, cx| {
                if **new == 1 {
                    cx.dispatch(Op::SetB(10));
                }
            },
        );

        store.dispatch(Op::IncA);
        assert_eq!(*store.state().b, 10);
    }

    #[test]
    fn test_deep_key_inner_field() {
        let mut store = store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe_deep_key(
            |s: &Counter| s.items.clone(),
            |item: &Arc<Item>| item.label.clone(),
            move |key, new, prev, _| {
                sink.lock()
                    .unwrap()
                    .push((*key, (**new).clone(), prev.map(|p| (**p).clone())));
            },
        );

        store.dispatch(Op::SetLabel("x", "one"));
        // hits change the entry but not the watched field
        store.dispatch(Op::Hit("x"));
        store.dispatch(Op::SetLabel("x", "two"));
        store.dispatch(Op::SetLabel("y", "other"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], ("x", "one".to_string(), None));
        assert_eq!(seen[1], ("x", "two".to_string(), Some("one".to_string())));
        assert_eq!(seen[2], ("y", "other".to_string(), None));
    }

    #[test]
    fn test_deep_key_entries_unconditional() {
        let mut store = store();
        let count = Arc::new(Mutex::new(0));
        let sink = count.clone();
        store.subscribe_deep_key_entries(
            |s: &Counter| s.items.clone(),
            move |_, _, _, _| *sink.lock().unwrap() += 1,
        );

        store.dispatch(Op::Hit("x"));
        store.dispatch(Op::Hit("x"));
        store.dispatch(Op::IncA);

        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let mut store = store();
        let count = Arc::new(Mutex::new(0));
        let sink = count.clone();
        let id = store.subscribe(
            |s: &Counter| s.a.clone(),
            move |_, _, _| *sink.lock().unwrap() += 1,
        );

        store.dispatch(Op::IncA);
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.dispatch(Op::IncA);

        assert_eq!(*count.lock().unwrap(), 1);
        assert!(store.listeners.is_empty());
    }
}

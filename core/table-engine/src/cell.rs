//! FILENAME: core/table-engine/src/cell.rs
//! PURPOSE: Observable state cells, the building block of the table engine.
//! CONTEXT: Every piece of table state (a filter pattern, the page, the
//! cached rows) lives in an Observable. Setting a cell notifies its listeners
//! synchronously; derived cells built with `map`/`combine` recompute from
//! their sources and only propagate when the result actually changed, so a
//! change travels filter -> column -> column set -> frame without redundant
//! downstream work.
//!
//! Listeners are called outside of any internal lock, so a listener may set
//! other cells (or read this one) freely.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;

/// Handle returned by `subscribe`, used to unsubscribe.
pub type ListenerId = u64;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Lock a mutex, recovering the data if a panicking listener poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Inner<T> {
    value: Mutex<T>,
    listeners: Mutex<Vec<(ListenerId, Listener<T>)>>,
    next_id: AtomicU64,
}

/// Shared, observable value. Clones share the same state.
pub struct Observable<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Observable {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Observable").field(&*lock(&self.inner.value)).finish()
    }
}

impl<T> Observable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(value: T) -> Self {
        Observable {
            inner: Arc::new(Inner {
                value: Mutex::new(value),
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Current value (cloned).
    pub fn get(&self) -> T {
        lock(&self.inner.value).clone()
    }

    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&lock(&self.inner.value))
    }

    /// Replace the value and notify every listener, even if it is unchanged.
    pub fn set(&self, value: T) {
        *lock(&self.inner.value) = value.clone();
        self.notify(&value);
    }

    /// Replace the value only if it differs structurally. Returns whether it did.
    pub fn set_if_changed(&self, value: T) -> bool {
        {
            let mut current = lock(&self.inner.value);
            if *current == value {
                return false;
            }
            *current = value.clone();
        }
        self.notify(&value);
        true
    }

    /// Edit a copy of the value in place, then `set_if_changed` it.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let mut next = self.get();
        f(&mut next);
        self.set_if_changed(next)
    }

    /// Register a listener and immediately replay the current value to it.
    pub fn subscribe(&self, f: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        let current = self.get();
        let id = self.add_listener(Arc::new(f));
        self.replay(id, &current);
        id
    }

    /// Register a listener that only sees future changes.
    pub fn subscribe_changes(&self, f: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        self.add_listener(Arc::new(f))
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.inner.listeners);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    /// Derived cell holding `f(value)`, updated only when the result changes.
    pub fn map<U, F>(&self, f: F) -> Observable<U>
    where
        U: Clone + PartialEq + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let derived = Observable::new(self.with(&f));
        let source = Arc::downgrade(&self.inner);
        let target = Arc::downgrade(&derived.inner);
        self.subscribe_changes(move |_| {
            let (Some(source), Some(target)) = (source.upgrade(), target.upgrade()) else {
                return;
            };
            // Recompute from the source's current value, not the notified one:
            // a nested set may already have superseded it.
            let value = lock(&source.value).clone();
            Observable { inner: target }.set_if_changed(f(&value));
        });
        derived
    }

    /// Derived cell computed from a list of same-typed sources.
    pub fn combine<S, F>(sources: &[Observable<S>], f: F) -> Observable<T>
    where
        S: Clone + PartialEq + Send + Sync + 'static,
        F: Fn(&[S]) -> T + Send + Sync + 'static,
    {
        let initial: Vec<S> = sources.iter().map(Observable::get).collect();
        let derived = Observable::new(f(&initial));

        let f = Arc::new(f);
        let weak_sources: Arc<Vec<Weak<Inner<S>>>> =
            Arc::new(sources.iter().map(|s| Arc::downgrade(&s.inner)).collect());

        for source in sources {
            let f = Arc::clone(&f);
            let weak_sources = Arc::clone(&weak_sources);
            let target = Arc::downgrade(&derived.inner);
            source.subscribe_changes(move |_| {
                let Some(target) = target.upgrade() else {
                    return;
                };
                let mut values = Vec::with_capacity(weak_sources.len());
                for weak in weak_sources.iter() {
                    match weak.upgrade() {
                        Some(inner) => values.push(lock(&inner.value).clone()),
                        None => return,
                    }
                }
                Observable { inner: target }.set_if_changed(f(&values));
            });
        }
        derived
    }

    /// Bridge to async consumers: a watch receiver that always holds the
    /// latest value of this cell.
    pub fn watch(&self) -> watch::Receiver<T> {
        let (tx, rx) = watch::channel(self.get());
        self.subscribe_changes(move |value| {
            if !tx.is_closed() {
                tx.send_replace(value.clone());
            }
        });
        rx
    }

    fn add_listener(&self, listener: Listener<T>) -> ListenerId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.listeners).push((id, listener));
        id
    }

    fn replay(&self, id: ListenerId, value: &T) {
        let listener = lock(&self.inner.listeners)
            .iter()
            .find(|(lid, _)| *lid == id)
            .map(|(_, l)| Arc::clone(l));
        if let Some(listener) = listener {
            listener(value);
        }
    }

    fn notify(&self, value: &T) {
        let listeners: Vec<Listener<T>> = lock(&self.inner.listeners)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(value);
        }
    }
}

impl<T> Default for Observable<T>
where
    T: Clone + PartialEq + Send + Sync + Default + 'static,
{
    fn default() -> Self {
        Observable::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_subscribe_replays_current_value() {
        let cell = Observable::new(7);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        cell.subscribe(move |v| sink.lock().unwrap().push(*v));
        cell.set(8);
        assert_eq!(*seen.lock().unwrap(), vec![7, 8]);
    }

    #[test]
    fn test_set_always_notifies_but_set_if_changed_does_not() {
        let cell = Observable::new("a".to_string());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        cell.subscribe_changes(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        cell.set("a".to_string());
        assert!(!cell.set_if_changed("a".to_string()));
        assert!(cell.set_if_changed("b".to_string()));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_map_deduplicates() {
        let cell = Observable::new(1);
        let parity = cell.map(|v| v % 2 == 0);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        parity.subscribe_changes(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        cell.set(3);
        cell.set(5);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        cell.set(6);
        assert!(parity.get());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_combine_tracks_all_sources() {
        let a = Observable::new(1);
        let b = Observable::new(2);
        let sum = Observable::combine(&[a.clone(), b.clone()], |values: &[i32]| {
            values.iter().sum::<i32>()
        });
        assert_eq!(sum.get(), 3);
        a.set(10);
        assert_eq!(sum.get(), 12);
        b.set(0);
        assert_eq!(sum.get(), 10);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let cell = Observable::new(0);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = cell.subscribe_changes(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        cell.set(1);
        assert!(cell.unsubscribe(id));
        cell.set(2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(cell.listener_count(), 0);
    }

    #[test]
    fn test_listener_may_set_other_cells() {
        let source = Observable::new(0);
        let mirror = Observable::new(0);
        let target = mirror.clone();
        source.subscribe_changes(move |v| target.set(*v * 10));
        source.set(4);
        assert_eq!(mirror.get(), 40);
    }

    #[tokio::test]
    async fn test_watch_sees_latest() {
        let cell = Observable::new(1);
        let mut rx = cell.watch();
        cell.set(2);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 2);
    }
}

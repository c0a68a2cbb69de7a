//! Listener registration and fan-out.
//!
//! Every bindable owns a [`ListenerRegistry`]: a set of [`Listener`]s that are
//! invoked with the current value whenever the bindable reports a change.
//!
//! # Identity
//!
//! Rust closures carry no identity of their own, so a callback is wrapped in a
//! [`Listener`] handle when it is created. The handle gets a process-unique
//! [`ListenerId`]; clones share it. Registering the same handle twice is
//! rejected, registering two handles built from the same closure is not.
//!
//! # Thread Safety
//!
//! The registry may be mutated from any thread, including from inside a
//! listener while a fan-out is in progress. Fan-out works on a snapshot taken
//! under a read lock, so the lock is never held while user code runs.
//!
//! # Example
//!
//! ```
//! use bindery_core::{Listener, ListenerRegistry};
//!
//! let registry = ListenerRegistry::<i32>::new();
//! let listener = Listener::new(|value: &i32| println!("now {value}"));
//!
//! assert!(registry.try_add(&listener));
//! assert!(!registry.try_add(&listener)); // already registered
//!
//! registry.notify_all(&7);
//!
//! assert!(registry.try_remove(&listener));
//! assert!(!registry.try_remove(&listener));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::logging::targets;

/// Counter for listener identities.
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// The identity of a [`Listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// A callback with a stable identity.
///
/// Cloning a `Listener` is cheap and yields a handle to the same callback with
/// the same [`ListenerId`].
pub struct Listener<T> {
    id: ListenerId,
    callback: Arc<dyn Fn(&T) + Send + Sync>,
}

impl<T> Listener<T> {
    /// Wrap a closure, assigning it a fresh identity.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self {
            id: ListenerId::next(),
            callback: Arc::new(callback),
        }
    }

    /// The identity of this listener.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Invoke the callback directly.
    pub fn call(&self, value: &T) {
        (self.callback)(value)
    }
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T> PartialEq for Listener<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Listener<T> {}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}

/// Outcome of a single fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    /// Number of listeners that were invoked.
    pub invoked: usize,
    /// Number of listeners that panicked. Their panics were contained.
    pub panicked: usize,
}

impl FanOut {
    /// Whether every invoked listener returned normally.
    pub fn is_clean(&self) -> bool {
        self.panicked == 0
    }
}

/// Run one callback, containing any panic it raises.
///
/// Returns `false` if the callback panicked.
pub(crate) fn invoke_isolated(target: &'static str, callback: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(()) => true,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            tracing::error!(target: targets::LISTENER, origin = target, %message, "listener panicked during notification");
            false
        }
    }
}

/// A thread-safe set of listeners keyed by identity.
pub struct ListenerRegistry<T> {
    entries: RwLock<BTreeMap<ListenerId, Entry<T>>>,
}

struct Entry<T> {
    listener: Listener<T>,
    /// `false` while the listener is registered but not yet receiving fan-outs.
    live: bool,
}

impl<T> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ListenerRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    fn insert(&self, listener: &Listener<T>, live: bool) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(&listener.id) {
            return false;
        }
        entries.insert(
            listener.id,
            Entry {
                listener: listener.clone(),
                live,
            },
        );
        true
    }

    /// Register a listener.
    ///
    /// Returns `false` if this listener is already registered.
    pub fn try_add(&self, listener: &Listener<T>) -> bool {
        self.insert(listener, true)
    }

    /// Register a listener that is skipped by fan-outs until [`activate`](Self::activate).
    ///
    /// The membership check and insert happen under one write lock, so of
    /// several racing callers exactly one gets `true`.
    pub(crate) fn reserve(&self, listener: &Listener<T>) -> bool {
        self.insert(listener, false)
    }

    /// Start delivering fan-outs to a reserved listener.
    ///
    /// Does nothing if the listener was removed in the meantime.
    pub(crate) fn activate(&self, id: ListenerId) {
        if let Some(entry) = self.entries.write().get_mut(&id) {
            entry.live = true;
        }
    }

    /// Unregister a listener.
    ///
    /// Returns `false` if the listener was not registered.
    pub fn try_remove(&self, listener: &Listener<T>) -> bool {
        self.remove_id(listener.id)
    }

    /// Unregister a listener by id.
    pub fn remove_id(&self, id: ListenerId) -> bool {
        self.entries.write().remove(&id).is_some()
    }

    /// Check whether a listener is registered.
    pub fn contains(&self, listener: &Listener<T>) -> bool {
        self.entries.read().contains_key(&listener.id)
    }

    /// Remove every listener. No listener is notified.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no listeners are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn snapshot(&self) -> Vec<Listener<T>> {
        self.entries
            .read()
            .values()
            .filter(|entry| entry.live)
            .map(|entry| entry.listener.clone())
            .collect()
    }

    /// Invoke every registered listener with `value`.
    ///
    /// Listeners run on the calling thread, in ascending id order, which callers
    /// must not depend on. A listener that panics is logged and skipped; the
    /// remaining listeners still run.
    #[tracing::instrument(skip_all, target = "bindery_core::listener", level = "trace")]
    pub fn notify_all(&self, value: &T) -> FanOut {
        let listeners = self.snapshot();
        tracing::trace!(target: targets::LISTENER, listener_count = listeners.len(), "notifying listeners");

        let mut outcome = FanOut::default();
        for listener in &listeners {
            outcome.invoked += 1;
            if !invoke_isolated(targets::LISTENER, || listener.call(value)) {
                outcome.panicked += 1;
            }
        }
        outcome
    }
}

impl<T> fmt::Debug for ListenerRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(ListenerRegistry<String>: Send, Sync);
static_assertions::assert_impl_all!(Listener<String>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (Arc<Mutex<Vec<i32>>>, Listener<i32>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let listener = Listener::new(move |&value: &i32| {
            received_clone.lock().push(value);
        });
        (received, listener)
    }

    #[test]
    fn test_target_matches_module_path() {
        // `notify_all` spells the target out for `#[instrument]`.
        assert_eq!(targets::LISTENER, module_path!().trim_end_matches("::tests"));
    }

    #[test]
    fn test_add_is_set_semantics() {
        let registry = ListenerRegistry::<i32>::new();
        let (received, listener) = recorder();

        assert!(registry.try_add(&listener));
        assert!(!registry.try_add(&listener));
        assert!(!registry.try_add(&listener.clone()));
        assert_eq!(registry.len(), 1);

        registry.notify_all(&5);
        assert_eq!(*received.lock(), vec![5]);
    }

    #[test]
    fn test_distinct_listeners_from_same_closure() {
        let registry = ListenerRegistry::<i32>::new();
        let count = Arc::new(AtomicUsize::new(0));

        let make = || {
            let count = count.clone();
            move |_: &i32| {
                count.fetch_add(1, Ordering::SeqCst);
            }
        };
        let a = Listener::new(make());
        let b = Listener::new(make());
        assert_ne!(a, b);

        assert!(registry.try_add(&a));
        assert!(registry.try_add(&b));
        registry.notify_all(&0);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_remove_and_contains() {
        let registry = ListenerRegistry::<i32>::new();
        let (received, listener) = recorder();

        assert!(!registry.contains(&listener));
        assert!(!registry.try_remove(&listener));

        registry.try_add(&listener);
        assert!(registry.contains(&listener));
        registry.notify_all(&1);

        assert!(registry.try_remove(&listener));
        assert!(!registry.contains(&listener));
        registry.notify_all(&2);

        assert_eq!(*received.lock(), vec![1]);
    }

    #[test]
    fn test_clear_does_not_notify() {
        let registry = ListenerRegistry::<i32>::new();
        let (received, listener) = recorder();
        registry.try_add(&listener);

        registry.clear();
        assert!(registry.is_empty());
        assert!(received.lock().is_empty());

        registry.notify_all(&3);
        assert!(received.lock().is_empty());
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let registry = ListenerRegistry::<i32>::new();
        let (received_before, before) = recorder();
        let faulty = Listener::new(|_: &i32| panic!("listener failure"));
        let (received_after, after) = recorder();

        registry.try_add(&before);
        registry.try_add(&faulty);
        registry.try_add(&after);

        let outcome = registry.notify_all(&9);
        assert_eq!(outcome.invoked, 3);
        assert_eq!(outcome.panicked, 1);
        assert!(!outcome.is_clean());
        assert_eq!(*received_before.lock(), vec![9]);
        assert_eq!(*received_after.lock(), vec![9]);

        // The faulty listener stays registered and keeps being isolated.
        let outcome = registry.notify_all(&10);
        assert_eq!(outcome.panicked, 1);
        assert_eq!(*received_after.lock(), vec![9, 10]);
    }

    #[test]
    fn test_listener_can_remove_itself_during_fan_out() {
        let registry = Arc::new(ListenerRegistry::<i32>::new());
        let count = Arc::new(AtomicUsize::new(0));

        let slot: Arc<Mutex<Option<Listener<i32>>>> = Arc::new(Mutex::new(None));
        let listener = {
            let registry = registry.clone();
            let count = count.clone();
            let slot = slot.clone();
            Listener::new(move |_: &i32| {
                count.fetch_add(1, Ordering::SeqCst);
                if let Some(me) = slot.lock().as_ref() {
                    registry.try_remove(me);
                }
            })
        };
        *slot.lock() = Some(listener.clone());
        registry.try_add(&listener);

        registry.notify_all(&1);
        registry.notify_all(&2);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reserved_listener_skipped_until_activated() {
        let registry = ListenerRegistry::<i32>::new();
        let (received, listener) = recorder();

        assert!(registry.reserve(&listener));
        assert!(!registry.reserve(&listener));
        assert!(!registry.try_add(&listener));
        assert!(registry.contains(&listener));

        assert_eq!(registry.notify_all(&1).invoked, 0);
        registry.activate(listener.id());
        registry.notify_all(&2);
        assert_eq!(*received.lock(), vec![2]);

        // Activating after removal does not resurrect the listener.
        registry.try_remove(&listener);
        registry.activate(listener.id());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_registration_during_fan_out() {
        let registry = Arc::new(ListenerRegistry::<usize>::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let writers: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                let hits = hits.clone();
                std::thread::spawn(move || {
                    let mut mine = Vec::new();
                    for _ in 0..50 {
                        let hits = hits.clone();
                        let listener = Listener::new(move |_: &usize| {
                            hits.fetch_add(1, Ordering::SeqCst);
                        });
                        assert!(registry.try_add(&listener));
                        mine.push(listener);
                    }
                    for listener in &mine[..25] {
                        assert!(registry.try_remove(listener));
                    }
                })
            })
            .collect();

        let notifier = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    registry.notify_all(&i);
                }
            })
        };

        for handle in writers {
            handle.join().unwrap();
        }
        notifier.join().unwrap();

        assert_eq!(registry.len(), 4 * 25);

        let before = hits.load(Ordering::SeqCst);
        let outcome = registry.notify_all(&0);
        assert_eq!(outcome.invoked, 100);
        assert_eq!(hits.load(Ordering::SeqCst) - before, 100);
    }
}

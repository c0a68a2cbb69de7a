//! The bindable contract and fine-grained change events.
//!
//! Every bindable type implements [`Bindable<T>`]: a value that can be read and
//! replaced, plus a [`ListenerRegistry`] notified when the value changes.
//! Collections additionally report each operation as a [`ChangeEvent`] (list,
//! queue, stack) or an [`EntryChangeEvent`] (dictionary).

use std::fmt;

use crate::listener::{Listener, ListenerRegistry};

/// The operation a fine-grained change event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChangeKind {
    /// An item or entry was added.
    Added,
    /// An item or entry was removed.
    Removed,
    /// An item or entry was replaced. Stack pops are also reported this way.
    Modified,
    /// An item was read through `peek`. Nothing changed.
    Peek,
    /// The container was emptied.
    Cleared,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
            Self::Peek => "peek",
            Self::Cleared => "cleared",
        };
        f.write_str(name)
    }
}

/// A change to a single item of a sequence-shaped collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent<T> {
    /// What happened.
    pub kind: ChangeKind,
    /// The item involved. `Default::default()` for [`ChangeKind::Cleared`].
    pub item: T,
}

impl<T> ChangeEvent<T> {
    /// Create a new change event.
    pub fn new(kind: ChangeKind, item: T) -> Self {
        Self { kind, item }
    }
}

/// A change to a single entry of a dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryChangeEvent<K, V> {
    /// What happened.
    pub kind: ChangeKind,
    /// The key involved. `Default::default()` for [`ChangeKind::Cleared`].
    pub key: K,
    /// The value involved. For removals this is the value that was removed.
    pub value: V,
}

impl<K, V> EntryChangeEvent<K, V> {
    /// Create a new entry change event.
    pub fn new(kind: ChangeKind, key: K, value: V) -> Self {
        Self { kind, key, value }
    }
}

/// A value with listener-based change notification.
///
/// Implementors provide the value accessors and their registry; the listener
/// management methods are shared.
pub trait Bindable<T> {
    /// A copy of the current value.
    fn value(&self) -> T;

    /// Replace the value and notify listeners as the implementor defines.
    fn set_value(&self, value: T);

    /// The registry of value listeners.
    fn listeners(&self) -> &ListenerRegistry<T>;

    /// Register a listener. Returns `false` if it is already registered.
    fn try_add_listener(&self, listener: &Listener<T>) -> bool {
        self.listeners().try_add(listener)
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    fn try_remove_listener(&self, listener: &Listener<T>) -> bool {
        self.listeners().try_remove(listener)
    }

    /// Check whether a listener is registered.
    fn contains_listener(&self, listener: &Listener<T>) -> bool {
        self.listeners().contains(listener)
    }

    /// Remove every listener without notifying any of them.
    fn clear_listeners(&self) {
        self.listeners().clear();
    }

    /// Wrap `callback` in a new [`Listener`], register it and return the handle.
    fn add_listener<F>(&self, callback: F) -> Listener<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
        Self: Sized,
    {
        let listener = Listener::new(callback);
        self.listeners().try_add(&listener);
        listener
    }
}

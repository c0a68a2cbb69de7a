//! Observable key-value map.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::hash::Hash;

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::bindable::{Bindable, ChangeKind, EntryChangeEvent};
use crate::error::{BindError, Result};
use crate::listener::ListenerRegistry;
use crate::logging::targets;
use crate::signal::{ConnectionId, Signal};

/// A `HashMap` that reports every mutation.
///
/// `add` is strict and fails on an existing key; `set` is the indexer form and
/// inserts or replaces, reporting both cases as `Modified`.
pub struct BindDictionary<K, V> {
    entries: RwLock<HashMap<K, V>>,
    listeners: ListenerRegistry<HashMap<K, V>>,
    changed: Signal<EntryChangeEvent<K, V>>,
}

impl<K, V> Default for BindDictionary<K, V> {
    fn default() -> Self {
        Self::from_map(HashMap::new())
    }
}

impl<K, V> BindDictionary<K, V> {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dictionary holding `entries`.
    pub fn from_map(entries: HashMap<K, V>) -> Self {
        Self {
            entries: RwLock::new(entries),
            listeners: ListenerRegistry::new(),
            changed: Signal::new(),
        }
    }

    /// Connect a handler for fine-grained change events.
    pub fn subscribe<F>(&self, handler: F) -> ConnectionId
    where
        F: Fn(&EntryChangeEvent<K, V>) + Send + Sync + 'static,
    {
        self.changed.connect(handler)
    }

    /// Disconnect a change handler. Returns `false` if it was not connected.
    pub fn unsubscribe(&self, id: ConnectionId) -> bool {
        self.changed.disconnect(id)
    }

    /// The fine-grained change signal.
    pub fn changed(&self) -> &Signal<EntryChangeEvent<K, V>> {
        &self.changed
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Call `f` with the entries.
    pub fn with<R>(&self, f: impl FnOnce(&HashMap<K, V>) -> R) -> R {
        f(&self.entries.read())
    }

    fn emit(&self, kind: ChangeKind, key: K, value: V) {
        tracing::trace!(target: targets::COLLECTION, %kind, "dictionary changed");
        self.changed.emit(EntryChangeEvent::new(kind, key, value));
    }
}

impl<K, V> BindDictionary<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + PartialEq,
{
    /// A copy of the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    /// The value stored under `key`, or [`BindError::KeyNotFound`].
    pub fn value_of(&self, key: &K) -> Result<V> {
        self.get(key).ok_or(BindError::KeyNotFound)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.read().contains_key(key)
    }

    /// A copy of every key, in unspecified order.
    pub fn keys(&self) -> Vec<K> {
        self.entries.read().keys().cloned().collect()
    }

    /// A copy of every value, in unspecified order.
    pub fn values(&self) -> Vec<V> {
        self.entries.read().values().cloned().collect()
    }

    /// Insert a new entry. Emits `Added`.
    ///
    /// Fails with [`BindError::DuplicateKey`] if `key` is already present.
    pub fn add(&self, key: K, value: V) -> Result<()> {
        match self.entries.write().entry(key.clone()) {
            Entry::Occupied(_) => return Err(BindError::DuplicateKey),
            Entry::Vacant(slot) => {
                slot.insert(value.clone());
            }
        }
        self.emit(ChangeKind::Added, key, value);
        Ok(())
    }

    /// Insert or replace the value under `key`.
    ///
    /// Emits `Modified` when the key was absent or held a different value;
    /// otherwise does nothing. Returns whether the dictionary changed.
    pub fn set(&self, key: K, value: V) -> bool {
        {
            let mut entries = self.entries.write();
            if entries.get(&key) == Some(&value) {
                return false;
            }
            entries.insert(key.clone(), value.clone());
        }
        self.emit(ChangeKind::Modified, key, value);
        true
    }

    /// Remove the entry under `key`, returning its value. Emits `Removed` with
    /// the removed value when present.
    pub fn remove(&self, key: &K) -> Option<V> {
        let (key, value) = self.entries.write().remove_entry(key)?;
        self.emit(ChangeKind::Removed, key, value.clone());
        Some(value)
    }
}

impl<K, V> BindDictionary<K, V>
where
    K: Eq + Hash + Clone + Default,
    V: Clone + PartialEq + Default,
{
    /// Remove every entry. Emits `Cleared` with a default key and value.
    pub fn clear(&self) {
        self.entries.write().clear();
        self.emit(ChangeKind::Cleared, K::default(), V::default());
    }
}

impl<K: Clone, V: Clone> Bindable<HashMap<K, V>> for BindDictionary<K, V> {
    fn value(&self) -> HashMap<K, V> {
        self.entries.read().clone()
    }

    /// Replace every entry and notify the coarse listeners. No change events.
    fn set_value(&self, value: HashMap<K, V>) {
        let snapshot = {
            let mut entries = self.entries.write();
            *entries = value;
            (*RwLockWriteGuard::downgrade(entries)).clone()
        };
        self.listeners.notify_all(&snapshot);
    }

    fn listeners(&self) -> &ListenerRegistry<HashMap<K, V>> {
        &self.listeners
    }
}

impl<K, V> From<HashMap<K, V>> for BindDictionary<K, V> {
    fn from(entries: HashMap<K, V>) -> Self {
        Self::from_map(entries)
    }
}

impl<K: Eq + Hash, V> FromIterator<(K, V)> for BindDictionary<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for BindDictionary<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindDictionary")
            .field("entries", &*self.entries.read())
            .field("listeners", &self.listeners.len())
            .field("subscribers", &self.changed.connection_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(BindDictionary<String, i32>: Send, Sync);

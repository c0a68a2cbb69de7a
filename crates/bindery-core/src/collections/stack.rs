//! Observable LIFO stack.

use std::fmt;

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::bindable::{Bindable, ChangeEvent, ChangeKind};
use crate::error::{BindError, Result};
use crate::listener::ListenerRegistry;
use crate::logging::targets;
use crate::signal::{ConnectionId, Signal};

/// A last-in, first-out stack that reports every operation.
///
/// The coarse value is a `Vec` whose last element is the top of the stack.
///
/// Note that `pop` is reported as [`ChangeKind::Modified`], not `Removed`.
/// Subscribers that mirror the stack should treat a `Modified` event from a
/// `BindStack` as a removal of the top item.
pub struct BindStack<T> {
    items: RwLock<Vec<T>>,
    listeners: ListenerRegistry<Vec<T>>,
    changed: Signal<ChangeEvent<T>>,
}

impl<T> Default for BindStack<T> {
    fn default() -> Self {
        Self::from_vec(Vec::new())
    }
}

impl<T> BindStack<T> {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stack holding `items`, last element on top.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
            listeners: ListenerRegistry::new(),
            changed: Signal::new(),
        }
    }

    /// Connect a handler for fine-grained change events.
    pub fn subscribe<F>(&self, handler: F) -> ConnectionId
    where
        F: Fn(&ChangeEvent<T>) + Send + Sync + 'static,
    {
        self.changed.connect(handler)
    }

    /// Disconnect a change handler. Returns `false` if it was not connected.
    pub fn unsubscribe(&self, id: ConnectionId) -> bool {
        self.changed.disconnect(id)
    }

    /// The fine-grained change signal.
    pub fn changed(&self) -> &Signal<ChangeEvent<T>> {
        &self.changed
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Call `f` with the items, bottom first.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.items.read())
    }

    fn emit(&self, kind: ChangeKind, item: T) {
        tracing::trace!(target: targets::COLLECTION, %kind, "stack changed");
        self.changed.emit(ChangeEvent::new(kind, item));
    }
}

impl<T: Clone + PartialEq> BindStack<T> {
    /// Whether the stack contains `item`.
    pub fn contains(&self, item: &T) -> bool {
        self.items.read().contains(item)
    }

    /// A copy of the items, bottom first.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.read().clone()
    }

    /// Push an item on top. Emits `Added`.
    pub fn push(&self, item: T) {
        self.items.write().push(item.clone());
        self.emit(ChangeKind::Added, item);
    }

    /// Remove and return the top item. Emits `Modified`.
    ///
    /// Fails with [`BindError::Empty`] on an empty stack.
    pub fn pop(&self) -> Result<T> {
        let item = self.items.write().pop().ok_or(BindError::Empty)?;
        self.emit(ChangeKind::Modified, item.clone());
        Ok(item)
    }

    /// Return the top item without removing it. Emits `Peek`.
    ///
    /// Fails with [`BindError::Empty`] on an empty stack.
    pub fn peek(&self) -> Result<T> {
        let item = self.items.read().last().cloned().ok_or(BindError::Empty)?;
        self.emit(ChangeKind::Peek, item.clone());
        Ok(item)
    }
}

impl<T: Clone + PartialEq + Default> BindStack<T> {
    /// Remove every item. Emits `Cleared` with a default item.
    pub fn clear(&self) {
        self.items.write().clear();
        self.emit(ChangeKind::Cleared, T::default());
    }
}

impl<T: Clone> Bindable<Vec<T>> for BindStack<T> {
    fn value(&self) -> Vec<T> {
        self.items.read().clone()
    }

    /// Replace the stack contents (last element on top) and notify the coarse
    /// listeners. No change events.
    fn set_value(&self, value: Vec<T>) {
        let snapshot = {
            let mut items = self.items.write();
            *items = value;
            (*RwLockWriteGuard::downgrade(items)).clone()
        };
        self.listeners.notify_all(&snapshot);
    }

    fn listeners(&self) -> &ListenerRegistry<Vec<T>> {
        &self.listeners
    }
}

impl<T> From<Vec<T>> for BindStack<T> {
    fn from(items: Vec<T>) -> Self {
        Self::from_vec(items)
    }
}

impl<T> FromIterator<T> for BindStack<T> {
    /// Push the items in iteration order, so the last one ends up on top.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T: fmt::Debug> fmt::Debug for BindStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindStack")
            .field("items", &*self.items.read())
            .field("listeners", &self.listeners.len())
            .field("subscribers", &self.changed.connection_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(BindStack<String>: Send, Sync);

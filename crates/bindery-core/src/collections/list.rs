//! Observable sequence.

use std::fmt;

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::bindable::{Bindable, ChangeEvent, ChangeKind};
use crate::error::{BindError, Result};
use crate::listener::ListenerRegistry;
use crate::logging::targets;
use crate::signal::{ConnectionId, Signal};

/// A `Vec` that reports every mutation.
///
/// # Example
///
/// ```
/// use bindery_core::{BindList, ChangeKind};
/// use std::sync::Arc;
/// use parking_lot::Mutex;
///
/// let list = BindList::new();
/// let kinds = Arc::new(Mutex::new(Vec::new()));
///
/// let kinds_clone = kinds.clone();
/// list.subscribe(move |event| kinds_clone.lock().push(event.kind));
///
/// list.push("a");
/// list.set(0, "b").unwrap();
/// list.remove_at(0).unwrap();
///
/// assert_eq!(*kinds.lock(), vec![ChangeKind::Added, ChangeKind::Modified, ChangeKind::Removed]);
/// ```
pub struct BindList<T> {
    items: RwLock<Vec<T>>,
    listeners: ListenerRegistry<Vec<T>>,
    changed: Signal<ChangeEvent<T>>,
}

impl<T> Default for BindList<T> {
    fn default() -> Self {
        Self::from_vec(Vec::new())
    }
}

impl<T> BindList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a list holding `items`.
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

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Call `f` with the items.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.items.read())
    }

    fn emit(&self, kind: ChangeKind, item: T) {
        tracing::trace!(target: targets::COLLECTION, %kind, "list changed");
        self.changed.emit(ChangeEvent::new(kind, item));
    }
}

impl<T: Clone + PartialEq> BindList<T> {
    /// A copy of the item at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.items.read().get(index).cloned()
    }

    /// Whether the list contains `item`.
    pub fn contains(&self, item: &T) -> bool {
        self.items.read().contains(item)
    }

    /// Position of the first item equal to `item`.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.items.read().iter().position(|candidate| candidate == item)
    }

    /// A copy of the items.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.read().clone()
    }

    /// Append an item. Emits `Added`.
    pub fn push(&self, item: T) {
        self.items.write().push(item.clone());
        self.emit(ChangeKind::Added, item);
    }

    /// Insert an item at `index`, shifting later items. Emits `Added`.
    ///
    /// `index` may equal the length, which appends.
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        {
            let mut items = self.items.write();
            if index > items.len() {
                return Err(BindError::out_of_range(index, items.len()));
            }
            items.insert(index, item.clone());
        }
        self.emit(ChangeKind::Added, item);
        Ok(())
    }

    /// Replace the item at `index`. Emits `Modified` when the item differs.
    ///
    /// Returns whether the list changed.
    pub fn set(&self, index: usize, item: T) -> Result<bool> {
        {
            let mut items = self.items.write();
            let len = items.len();
            let slot = items
                .get_mut(index)
                .ok_or(BindError::out_of_range(index, len))?;
            if *slot == item {
                return Ok(false);
            }
            *slot = item.clone();
        }
        self.emit(ChangeKind::Modified, item);
        Ok(true)
    }

    /// Remove the first item equal to `item`. Emits `Removed` when found.
    pub fn remove(&self, item: &T) -> bool {
        let removed = {
            let mut items = self.items.write();
            items
                .iter()
                .position(|candidate| candidate == item)
                .map(|index| items.remove(index))
        };
        match removed {
            Some(removed) => {
                self.emit(ChangeKind::Removed, removed);
                true
            }
            None => false,
        }
    }

    /// Remove and return the item at `index`. Emits `Removed`.
    pub fn remove_at(&self, index: usize) -> Result<T> {
        let removed = {
            let mut items = self.items.write();
            if index >= items.len() {
                return Err(BindError::out_of_range(index, items.len()));
            }
            items.remove(index)
        };
        self.emit(ChangeKind::Removed, removed.clone());
        Ok(removed)
    }
}

impl<T: Clone + PartialEq + Default> BindList<T> {
    /// Remove every item. Emits `Cleared` with a default item.
    pub fn clear(&self) {
        self.items.write().clear();
        self.emit(ChangeKind::Cleared, T::default());
    }
}

impl<T: Clone> Bindable<Vec<T>> for BindList<T> {
    fn value(&self) -> Vec<T> {
        self.items.read().clone()
    }

    /// Replace every item and notify the coarse listeners. No change events.
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

impl<T> From<Vec<T>> for BindList<T> {
    fn from(items: Vec<T>) -> Self {
        Self::from_vec(items)
    }
}

impl<T> FromIterator<T> for BindList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T: fmt::Debug> fmt::Debug for BindList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindList")
            .field("items", &*self.items.read())
            .field("listeners", &self.listeners.len())
            .field("subscribers", &self.changed.connection_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(BindList<String>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recorded<T: Clone + Send + Sync + 'static>(list: &BindList<T>) -> Arc<Mutex<Vec<ChangeEvent<T>>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        list.subscribe(move |event| events_clone.lock().push(event.clone()));
        events
    }

    #[test]
    fn test_push_and_insert_emit_added() {
        let list = BindList::new();
        let events = recorded(&list);

        list.push(1);
        list.insert(0, 0).unwrap();
        list.insert(2, 2).unwrap();

        assert_eq!(list.to_vec(), vec![0, 1, 2]);
        assert_eq!(
            *events.lock(),
            vec![
                ChangeEvent::new(ChangeKind::Added, 1),
                ChangeEvent::new(ChangeKind::Added, 0),
                ChangeEvent::new(ChangeKind::Added, 2),
            ]
        );
    }

    #[test]
    fn test_insert_out_of_range() {
        let list = BindList::from_vec(vec![1]);
        let events = recorded(&list);

        assert_eq!(list.insert(3, 9), Err(BindError::IndexOutOfRange { index: 3, len: 1 }));
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_set_skips_equal_item() {
        let list = BindList::from_vec(vec!["a", "b"]);
        let events = recorded(&list);

        assert_eq!(list.set(1, "b"), Ok(false));
        assert_eq!(list.set(1, "c"), Ok(true));
        assert_eq!(list.set(5, "x"), Err(BindError::out_of_range(5, 2)));

        assert_eq!(list.get(1), Some("c"));
        assert_eq!(*events.lock(), vec![ChangeEvent::new(ChangeKind::Modified, "c")]);
    }

    #[test]
    fn test_remove_emits_only_when_found() {
        let list: BindList<i32> = vec![1, 2, 3].into();
        let events = recorded(&list);

        assert!(list.remove(&2));
        assert!(!list.remove(&7));
        assert_eq!(list.remove_at(0), Ok(1));
        assert_eq!(list.remove_at(4), Err(BindError::out_of_range(4, 1)));

        assert_eq!(
            *events.lock(),
            vec![
                ChangeEvent::new(ChangeKind::Removed, 2),
                ChangeEvent::new(ChangeKind::Removed, 1),
            ]
        );
        assert_eq!(list.to_vec(), vec![3]);
    }

    #[test]
    fn test_clear_emits_default_item() {
        let list = BindList::from_vec(vec![String::from("x")]);
        let events = recorded(&list);

        list.clear();
        assert!(list.is_empty());
        assert_eq!(*events.lock(), vec![ChangeEvent::new(ChangeKind::Cleared, String::new())]);
    }

    #[test]
    fn test_lookup_helpers() {
        let list: BindList<i32> = (1..=4).collect();
        assert_eq!(list.len(), 4);
        assert!(list.contains(&3));
        assert_eq!(list.index_of(&3), Some(2));
        assert_eq!(list.index_of(&9), None);
        assert_eq!(list.with(|items| items.iter().sum::<i32>()), 10);
    }

    #[test]
    fn test_set_value_notifies_coarse_listeners_only() {
        let list = BindList::new();
        let events = recorded(&list);
        let snapshots = Arc::new(Mutex::new(Vec::new()));

        let snapshots_clone = snapshots.clone();
        list.add_listener(move |items: &Vec<i32>| snapshots_clone.lock().push(items.clone()));

        list.set_value(vec![1, 2]);
        list.set_value(vec![1, 2]);

        assert_eq!(*snapshots.lock(), vec![vec![1, 2], vec![1, 2]]);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_set_value_snapshot_is_the_installed_value() {
        let list = Arc::new(BindList::new());
        let snapshots = Arc::new(Mutex::new(Vec::new()));

        let snapshots_clone = snapshots.clone();
        list.add_listener(move |items: &Vec<i32>| snapshots_clone.lock().push(items.clone()));

        let pusher = {
            let list = list.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    list.push(0);
                }
            })
        };
        for round in 1..=200 {
            list.set_value(vec![round; 3]);
        }
        pusher.join().unwrap();

        let snapshots = snapshots.lock();
        assert_eq!(snapshots.len(), 200);
        for (round, snapshot) in (1..=200).zip(snapshots.iter()) {
            assert_eq!(*snapshot, vec![round; 3]);
        }
    }

    #[test]
    fn test_handler_may_read_list() {
        let list = Arc::new(BindList::new());
        let lengths = Arc::new(Mutex::new(Vec::new()));

        let list_clone = list.clone();
        let lengths_clone = lengths.clone();
        list.subscribe(move |_| lengths_clone.lock().push(list_clone.len()));

        list.push('a');
        list.push('b');
        assert_eq!(*lengths.lock(), vec![1, 2]);
    }

    #[test]
    fn test_unsubscribe() {
        let list = BindList::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        let id = list.subscribe(move |event: &ChangeEvent<u8>| events_clone.lock().push(event.kind));

        list.push(1);
        assert!(list.unsubscribe(id));
        assert!(!list.unsubscribe(id));
        list.push(2);

        assert_eq!(*events.lock(), vec![ChangeKind::Added]);
    }
}

//! Observable FIFO queue.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::bindable::{Bindable, ChangeEvent, ChangeKind};
use crate::error::{BindError, Result};
use crate::listener::ListenerRegistry;
use crate::logging::targets;
use crate::signal::{ConnectionId, Signal};

/// A first-in, first-out queue that reports every operation.
///
/// `peek` does not change the queue but is still reported as `Peek`.
pub struct BindQueue<T> {
    items: RwLock<VecDeque<T>>,
    listeners: ListenerRegistry<VecDeque<T>>,
    changed: Signal<ChangeEvent<T>>,
}

impl<T> Default for BindQueue<T> {
    fn default() -> Self {
        Self::from_deque(VecDeque::new())
    }
}

impl<T> BindQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue holding `items`, front first.
    pub fn from_deque(items: VecDeque<T>) -> Self {
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

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Call `f` with the items, front first.
    pub fn with<R>(&self, f: impl FnOnce(&VecDeque<T>) -> R) -> R {
        f(&self.items.read())
    }

    fn emit(&self, kind: ChangeKind, item: T) {
        tracing::trace!(target: targets::COLLECTION, %kind, "queue changed");
        self.changed.emit(ChangeEvent::new(kind, item));
    }
}

impl<T: Clone + PartialEq> BindQueue<T> {
    /// Whether the queue contains `item`.
    pub fn contains(&self, item: &T) -> bool {
        self.items.read().contains(item)
    }

    /// A copy of the items, front first.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.read().iter().cloned().collect()
    }

    /// Add an item at the back. Emits `Added`.
    pub fn enqueue(&self, item: T) {
        self.items.write().push_back(item.clone());
        self.emit(ChangeKind::Added, item);
    }

    /// Remove and return the front item. Emits `Removed`.
    ///
    /// Fails with [`BindError::Empty`] on an empty queue.
    pub fn dequeue(&self) -> Result<T> {
        let item = self.items.write().pop_front().ok_or(BindError::Empty)?;
        self.emit(ChangeKind::Removed, item.clone());
        Ok(item)
    }

    /// Return the front item without removing it. Emits `Peek`.
    ///
    /// Fails with [`BindError::Empty`] on an empty queue.
    pub fn peek(&self) -> Result<T> {
        let item = self.items.read().front().cloned().ok_or(BindError::Empty)?;
        self.emit(ChangeKind::Peek, item.clone());
        Ok(item)
    }
}

impl<T: Clone + PartialEq + Default> BindQueue<T> {
    /// Remove every item. Emits `Cleared` with a default item.
    pub fn clear(&self) {
        self.items.write().clear();
        self.emit(ChangeKind::Cleared, T::default());
    }
}

impl<T: Clone> Bindable<VecDeque<T>> for BindQueue<T> {
    fn value(&self) -> VecDeque<T> {
        self.items.read().clone()
    }

    /// Replace the queue contents and notify the coarse listeners. No change events.
    fn set_value(&self, value: VecDeque<T>) {
        let snapshot = {
            let mut items = self.items.write();
            *items = value;
            (*RwLockWriteGuard::downgrade(items)).clone()
        };
        self.listeners.notify_all(&snapshot);
    }

    fn listeners(&self) -> &ListenerRegistry<VecDeque<T>> {
        &self.listeners
    }
}

impl<T> From<VecDeque<T>> for BindQueue<T> {
    fn from(items: VecDeque<T>) -> Self {
        Self::from_deque(items)
    }
}

impl<T> From<Vec<T>> for BindQueue<T> {
    /// The first element becomes the front of the queue.
    fn from(items: Vec<T>) -> Self {
        Self::from_deque(items.into())
    }
}

impl<T> FromIterator<T> for BindQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_deque(iter.into_iter().collect())
    }
}

impl<T: fmt::Debug> fmt::Debug for BindQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindQueue")
            .field("items", &*self.items.read())
            .field("listeners", &self.listeners.len())
            .field("subscribers", &self.changed.connection_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(BindQueue<String>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recorded<T: Clone + Send + Sync + 'static>(queue: &BindQueue<T>) -> Arc<Mutex<Vec<ChangeEvent<T>>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        queue.subscribe(move |event| events_clone.lock().push(event.clone()));
        events
    }

    #[test]
    fn test_enqueue_dequeue_events() {
        let queue = BindQueue::new();
        let events = recorded(&queue);

        queue.enqueue(String::from("a"));
        assert_eq!(queue.dequeue().as_deref(), Ok("a"));
        assert_eq!(queue.dequeue(), Err(BindError::Empty));

        assert_eq!(
            *events.lock(),
            vec![
                ChangeEvent::new(ChangeKind::Added, String::from("a")),
                ChangeEvent::new(ChangeKind::Removed, String::from("a")),
            ]
        );
    }

    #[test]
    fn test_fifo_order() {
        let queue: BindQueue<i32> = (1..=3).collect();
        queue.enqueue(4);
        assert_eq!(queue.to_vec(), vec![1, 2, 3, 4]);
        assert_eq!(queue.dequeue(), Ok(1));
        assert_eq!(queue.dequeue(), Ok(2));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_constructors_keep_front_first() {
        let from_deque = BindQueue::from_deque(VecDeque::from([1, 2]));
        let from_vec = BindQueue::from(vec![1, 2]);
        let collected: BindQueue<i32> = vec![1, 2].into_iter().collect();

        for queue in [from_deque, from_vec, collected] {
            let events = recorded(&queue);
            assert_eq!(queue.dequeue(), Ok(1));
            assert_eq!(queue.value(), VecDeque::from([2]));
            assert_eq!(*events.lock(), vec![ChangeEvent::new(ChangeKind::Removed, 1)]);
        }
    }

    #[test]
    fn test_peek_reports_without_removing() {
        let queue = BindQueue::new();
        queue.enqueue(9);
        let events = recorded(&queue);

        assert_eq!(queue.peek(), Ok(9));
        assert_eq!(queue.len(), 1);
        assert_eq!(*events.lock(), vec![ChangeEvent::new(ChangeKind::Peek, 9)]);

        queue.dequeue().unwrap();
        assert_eq!(queue.peek(), Err(BindError::Empty));
    }

    #[test]
    fn test_clear_emits_default_item() {
        let queue: BindQueue<u32> = [5, 6].into_iter().collect();
        let events = recorded(&queue);

        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(*events.lock(), vec![ChangeEvent::new(ChangeKind::Cleared, 0)]);
    }

    #[test]
    fn test_set_value_notifies_coarse_listeners() {
        let queue = BindQueue::new();
        let events = recorded(&queue);
        let fronts = Arc::new(Mutex::new(Vec::new()));

        let fronts_clone = fronts.clone();
        queue.add_listener(move |items: &VecDeque<char>| fronts_clone.lock().push(items.front().copied()));

        queue.set_value(VecDeque::from(['x', 'y']));
        assert_eq!(queue.peek(), Ok('x'));
        assert_eq!(*fronts.lock(), vec![Some('x')]);
        assert_eq!(*events.lock(), vec![ChangeEvent::new(ChangeKind::Peek, 'x')]);
    }
}

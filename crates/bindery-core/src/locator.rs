//! Typed service registry.
//!
//! A [`ServiceLocator`] maps a type to one shared instance of it. It is an
//! ordinary value: build one at start-up, register the services the
//! application needs, and pass it (or the services pulled from it) to the
//! constructors that depend on them.
//!
//! ```
//! use bindery_core::{BindModel, ServiceLocator};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Pager {
//!     page: BindModel<usize>,
//! }
//!
//! let locator = ServiceLocator::new();
//! let pager = locator.get_or_init::<Pager>();
//! assert!(Arc::ptr_eq(&pager, &locator.get::<Pager>().unwrap()));
//! ```

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::logging::targets;

type Service = Arc<dyn Any + Send + Sync>;

/// A thread-safe map from type to shared instance.
#[derive(Default)]
pub struct ServiceLocator {
    services: RwLock<HashMap<TypeId, Service>>,
}

impl ServiceLocator {
    /// Create an empty locator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service` as the instance of `T`.
    ///
    /// Returns `false`, leaving the existing instance in place, if `T` is
    /// already registered.
    pub fn register<T: Any + Send + Sync>(&self, service: Arc<T>) -> bool {
        match self.services.write().entry(TypeId::of::<T>()) {
            Entry::Occupied(_) => {
                tracing::debug!(target: targets::LOCATOR, service = type_name::<T>(), "service already registered");
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(service);
                tracing::debug!(target: targets::LOCATOR, service = type_name::<T>(), "service registered");
                true
            }
        }
    }

    /// The registered instance of `T`.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let service = self.services.read().get(&TypeId::of::<T>()).cloned()?;
        service.downcast::<T>().ok()
    }

    /// The registered instance of `T`, registering `T::default()` first if
    /// there is none.
    pub fn get_or_init<T: Any + Send + Sync + Default>(&self) -> Arc<T> {
        self.get_or_insert_with(T::default)
    }

    /// The registered instance of `T`, registering `init()` first if there is
    /// none.
    ///
    /// `init` runs without the registry lock held and may use the locator. If
    /// another thread registers `T` in the meantime, its instance wins and the
    /// one built here is dropped.
    pub fn get_or_insert_with<T, F>(&self, init: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.get::<T>() {
            return existing;
        }

        let created: Service = Arc::new(init());
        let stored = self
            .services
            .write()
            .entry(TypeId::of::<T>())
            .or_insert(created)
            .clone();
        tracing::trace!(target: targets::LOCATOR, service = type_name::<T>(), "service resolved");
        match stored.downcast::<T>() {
            Ok(service) => service,
            // Entries are keyed by their own TypeId.
            Err(_) => unreachable!("service registered under a foreign TypeId"),
        }
    }

    /// Remove the instance of `T`. Returns `false` if none was registered.
    ///
    /// Holders of the instance keep it alive; the locator only forgets it.
    pub fn release<T: Any + Send + Sync>(&self) -> bool {
        let released = self.services.write().remove(&TypeId::of::<T>()).is_some();
        if released {
            tracing::debug!(target: targets::LOCATOR, service = type_name::<T>(), "service released");
        }
        released
    }

    /// Whether an instance of `T` is registered.
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.services.read().contains_key(&TypeId::of::<T>())
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    /// Whether no services are registered.
    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }

    /// Remove every service.
    pub fn clear(&self) {
        self.services.write().clear();
    }
}

impl fmt::Debug for ServiceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceLocator")
            .field("len", &self.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(ServiceLocator: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default, PartialEq)]
    struct Settings {
        volume: u8,
    }

    struct Audio {
        settings: Arc<Settings>,
    }

    #[test]
    fn test_register_first_wins() {
        let locator = ServiceLocator::new();
        assert!(locator.register(Arc::new(Settings { volume: 3 })));
        assert!(!locator.register(Arc::new(Settings { volume: 9 })));

        assert_eq!(locator.get::<Settings>().map(|s| s.volume), Some(3));
        assert_eq!(locator.len(), 1);
    }

    #[test]
    fn test_get_missing() {
        let locator = ServiceLocator::new();
        assert!(locator.get::<Settings>().is_none());
        assert!(!locator.contains::<Settings>());
        assert!(locator.is_empty());
    }

    #[test]
    fn test_get_or_init_is_lazy_and_shared() {
        let locator = ServiceLocator::new();
        let first = locator.get_or_init::<Settings>();
        let second = locator.get_or_init::<Settings>();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, Settings::default());
    }

    #[test]
    fn test_init_may_resolve_dependencies() {
        let locator = ServiceLocator::new();
        locator.register(Arc::new(Settings { volume: 5 }));

        let audio = locator.get_or_insert_with(|| Audio {
            settings: locator.get_or_init::<Settings>(),
        });
        assert_eq!(audio.settings.volume, 5);
        assert_eq!(locator.len(), 2);
    }

    #[test]
    fn test_init_runs_once() {
        let locator = ServiceLocator::new();
        let builds = AtomicUsize::new(0);

        for _ in 0..3 {
            locator.get_or_insert_with(|| {
                builds.fetch_add(1, Ordering::SeqCst);
                Settings { volume: 1 }
            });
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_and_clear() {
        let locator = ServiceLocator::new();
        let settings = locator.get_or_init::<Settings>();

        assert!(locator.release::<Settings>());
        assert!(!locator.release::<Settings>());
        assert_eq!(settings.volume, 0);

        locator.get_or_init::<Settings>();
        locator.register(Arc::new(String::from("name")));
        assert_eq!(locator.len(), 2);
        locator.clear();
        assert!(locator.is_empty());
    }

    #[test]
    fn test_concurrent_get_or_init_shares_one_instance() {
        let locator = Arc::new(ServiceLocator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locator = locator.clone();
                std::thread::spawn(move || locator.get_or_init::<Settings>())
            })
            .collect();

        let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for instance in &instances[1..] {
            assert!(Arc::ptr_eq(&instances[0], instance));
        }
    }
}

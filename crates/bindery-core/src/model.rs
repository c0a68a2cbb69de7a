//! Observable scalar values.
//!
//! [`BindModel<T>`] holds one value and notifies its listeners whenever the
//! value is replaced by an unequal one. Notification is direct by default; a
//! [`Throttle`] or [`Debounce`] controller can be installed to coalesce rapid
//! changes.
//!
//! # Example
//!
//! ```
//! use bindery_core::{BindModel, Bindable};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicI32, Ordering};
//!
//! let page = BindModel::new(0);
//! let seen = Arc::new(AtomicI32::new(-1));
//!
//! let seen_clone = seen.clone();
//! page.add_listener(move |&value| seen_clone.store(value, Ordering::SeqCst));
//!
//! page.set_value(3);
//! assert_eq!(seen.load(Ordering::SeqCst), 3);
//!
//! // Equal values are not reported.
//! seen.store(-1, Ordering::SeqCst);
//! page.set_value(3);
//! assert_eq!(seen.load(Ordering::SeqCst), -1);
//! ```

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;

use crate::bindable::Bindable;
use crate::listener::{Listener, ListenerRegistry, invoke_isolated};
use crate::logging::{span_names, targets};
use crate::rate_limit::{
    ControllerState, Debounce, NotificationController, NotifyAction, RateLimit, RateLimitKind,
    Throttle,
};
use crate::runtime::resolve_handle;

/// An observable value with equality-gated change notification.
///
/// `BindModel` is a cheap handle: clones share the value, the listeners and the
/// installed rate limiter. The shared state is released when the last clone is
/// dropped, which also cancels any pending rate-limited notification.
///
/// Listeners run on the thread that changed the value, or on a runtime worker
/// when a rate limiter is installed.
pub struct BindModel<T> {
    inner: Arc<ModelInner<T>>,
}

struct ModelInner<T> {
    value: RwLock<T>,
    listeners: ListenerRegistry<T>,
    controller: Mutex<Option<Box<dyn NotificationController>>>,
    runtime: Option<Handle>,
}

impl<T> ModelInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Fan the current value out to every listener.
    fn notify_now(&self) {
        let value = self.value.read().clone();
        let _span = tracing::trace_span!(target: targets::MODEL, span_names::NOTIFY).entered();
        let outcome = self.listeners.notify_all(&value);
        if !outcome.is_clean() {
            tracing::debug!(
                target: targets::MODEL,
                invoked = outcome.invoked,
                panicked = outcome.panicked,
                "notification finished with failures"
            );
        }
    }

    /// Route a change through the installed controller, or notify directly.
    fn dispatch(&self) {
        {
            let controller = self.controller.lock();
            if let Some(controller) = controller.as_ref() {
                controller.on_value_changed();
                return;
            }
        }
        self.notify_now();
    }
}

impl<T> BindModel<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a model holding `value`.
    ///
    /// Rate-limit timers run on the ambient tokio runtime when one is current,
    /// otherwise on the global [`AsyncRuntime`](crate::AsyncRuntime).
    pub fn new(value: T) -> Self {
        Self::from_parts(value, None)
    }

    /// Create a model whose rate-limit timers run on `runtime`.
    pub fn with_runtime(value: T, runtime: Handle) -> Self {
        Self::from_parts(value, Some(runtime))
    }

    fn from_parts(value: T, runtime: Option<Handle>) -> Self {
        Self {
            inner: Arc::new(ModelInner {
                value: RwLock::new(value),
                listeners: ListenerRegistry::new(),
                controller: Mutex::new(None),
                runtime,
            }),
        }
    }

    /// Call `f` with a copy of the current value.
    ///
    /// No lock is held while `f` runs, so it may write back to the model.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.inner.value.read().clone();
        f(&value)
    }

    /// Register a listener and immediately call it with the current value.
    ///
    /// Returns `false`, without calling it, if the listener is already
    /// registered. The listener is reserved before the initial call and only
    /// receives change notifications once that call returns, so it sees the
    /// value at subscription time followed by every later change.
    pub fn add_listener_with_init(&self, listener: &Listener<T>) -> bool {
        if !self.inner.listeners.reserve(listener) {
            return false;
        }
        let value = self.inner.value.read().clone();
        invoke_isolated(targets::MODEL, || listener.call(&value));
        self.inner.listeners.activate(listener.id());
        true
    }

    /// Throttle notifications to at most one per `cool_down`.
    ///
    /// Replaces any installed rate limiter, cancelling its pending notification.
    pub fn open_throttle(&self, cool_down: Duration) {
        let controller = Throttle::new(cool_down, self.runtime_handle(), self.notify_action());
        self.install(Box::new(controller));
    }

    /// [`open_throttle`](Self::open_throttle) with a whole number of seconds.
    pub fn open_throttle_secs(&self, cool_down: u64) {
        self.open_throttle(Duration::from_secs(cool_down));
    }

    /// Debounce notifications until the value has been stable for `cool_down`.
    ///
    /// Replaces any installed rate limiter, cancelling its pending notification.
    pub fn open_debounce(&self, cool_down: Duration) {
        let controller = Debounce::new(cool_down, self.runtime_handle(), self.notify_action());
        self.install(Box::new(controller));
    }

    /// [`open_debounce`](Self::open_debounce) with a whole number of seconds.
    pub fn open_debounce_secs(&self, cool_down: u64) {
        self.open_debounce(Duration::from_secs(cool_down));
    }

    /// Install the rate limiter described by `limit`.
    pub fn apply_rate_limit(&self, limit: RateLimit) {
        match limit.kind {
            RateLimitKind::Throttle => self.open_throttle(limit.cool_down),
            RateLimitKind::Debounce => self.open_debounce(limit.cool_down),
        }
    }

    /// Remove the throttle and return to direct notification.
    ///
    /// Returns `false` if no throttle is installed.
    pub fn close_throttle(&self) -> bool {
        self.uninstall(Some(RateLimitKind::Throttle))
    }

    /// Remove the debounce and return to direct notification.
    ///
    /// Returns `false` if no debounce is installed.
    pub fn close_debounce(&self) -> bool {
        self.uninstall(Some(RateLimitKind::Debounce))
    }

    /// Remove whichever rate limiter is installed.
    ///
    /// Returns `false` if none is installed.
    pub fn close_rate_limit(&self) -> bool {
        self.uninstall(None)
    }

    /// Change the installed rate limiter's cool-down.
    ///
    /// A pending notification keeps its schedule. Returns `false` if no rate
    /// limiter is installed.
    pub fn change_interval(&self, cool_down: Duration) -> bool {
        match self.inner.controller.lock().as_ref() {
            Some(controller) => {
                controller.set_cool_down(cool_down);
                tracing::debug!(target: targets::MODEL, kind = %controller.kind(), ?cool_down, "rate limit interval changed");
                true
            }
            None => false,
        }
    }

    /// The installed rate limiter, if any.
    pub fn rate_limit(&self) -> Option<RateLimit> {
        self.inner
            .controller
            .lock()
            .as_ref()
            .map(|controller| RateLimit {
                kind: controller.kind(),
                cool_down: controller.cool_down(),
            })
    }

    /// Whether a rate-limited notification is scheduled.
    pub fn rate_limit_state(&self) -> ControllerState {
        self.inner
            .controller
            .lock()
            .as_ref()
            .map_or(ControllerState::Idle, |controller| controller.state())
    }

    fn runtime_handle(&self) -> Handle {
        resolve_handle(self.inner.runtime.as_ref())
    }

    /// The downstream action handed to controllers. Reads the value at fire time.
    fn notify_action(&self) -> NotifyAction {
        let model: Weak<ModelInner<T>> = Arc::downgrade(&self.inner);
        Arc::new(move || {
            if let Some(inner) = model.upgrade() {
                inner.notify_now();
            }
        })
    }

    fn install(&self, controller: Box<dyn NotificationController>) {
        let kind = controller.kind();
        let previous = self.inner.controller.lock().replace(controller);
        if let Some(previous) = previous {
            tracing::debug!(target: targets::MODEL, replaced = %previous.kind(), installed = %kind, "rate limiter replaced");
            previous.cancel();
        }
    }

    fn uninstall(&self, kind: Option<RateLimitKind>) -> bool {
        let removed = {
            let mut slot = self.inner.controller.lock();
            match slot.as_ref() {
                Some(controller) if kind.is_none_or(|kind| controller.kind() == kind) => slot.take(),
                _ => None,
            }
        };
        match removed {
            Some(controller) => {
                controller.cancel();
                true
            }
            None => false,
        }
    }
}

impl<T> Bindable<T> for BindModel<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn value(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Replace the value. Does nothing if `value` equals the current value.
    fn set_value(&self, value: T) {
        {
            let mut current = self.inner.value.write();
            if *current == value {
                tracing::trace!(target: targets::MODEL, "value unchanged, skipping notification");
                return;
            }
            *current = value;
        }
        self.inner.dispatch();
    }

    fn listeners(&self) -> &ListenerRegistry<T> {
        &self.inner.listeners
    }
}

impl<T> Clone for BindModel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for BindModel<T>
where
    T: Clone + PartialEq + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for BindModel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindModel")
            .field("value", &*self.inner.value.read())
            .field("listeners", &self.inner.listeners.len())
            .field(
                "rate_limit",
                &self.inner.controller.lock().as_ref().map(|c| c.kind()),
            )
            .finish()
    }
}

static_assertions::assert_impl_all!(BindModel<String>: Send, Sync, Clone);

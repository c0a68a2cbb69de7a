//! Notification rate control for scalar models.
//!
//! A [`BindModel`](crate::BindModel) normally notifies its listeners as soon as
//! its value changes. With a [`NotificationController`] installed, each change
//! is handed to the controller instead, which decides when the listeners run:
//!
//! - [`Throttle`]: at most one notification per cool-down window. Changes
//!   arriving while a window is pending are folded into it.
//! - [`Debounce`]: one notification once no change has arrived for a full
//!   cool-down.
//!
//! In both cases the listeners receive the model's value at fire time, not the
//! value that opened the window.
//!
//! Timers run as tokio tasks. Closing or dropping a controller cancels its
//! pending timer; a fire that already passed its cancellation check may still
//! complete.

mod debounce;
mod throttle;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use debounce::Debounce;
pub use throttle::Throttle;

/// The downstream notification a controller fires.
pub type NotifyAction = Arc<dyn Fn() + Send + Sync>;

/// Which controller is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitKind {
    /// At most one notification per window.
    Throttle,
    /// One notification after the value settles.
    Debounce,
}

impl fmt::Display for RateLimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Throttle => f.write_str("throttle"),
            Self::Debounce => f.write_str("debounce"),
        }
    }
}

/// Scheduling state of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    /// No notification is scheduled.
    #[default]
    Idle,
    /// A notification is scheduled: a throttle window is open, or a debounce
    /// is waiting for the value to settle.
    Pending,
}

/// Rate limiting settings for a model.
///
/// ```
/// use bindery_core::rate_limit::{RateLimit, RateLimitKind};
/// use std::time::Duration;
///
/// let limit = RateLimit::debounce(Duration::from_millis(250));
/// assert_eq!(limit.kind, RateLimitKind::Debounce);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// The controller to install.
    pub kind: RateLimitKind,
    /// The cool-down window.
    pub cool_down: Duration,
}

impl RateLimit {
    /// Throttle with the given window.
    pub fn throttle(cool_down: Duration) -> Self {
        Self {
            kind: RateLimitKind::Throttle,
            cool_down,
        }
    }

    /// Debounce with the given quiet period.
    pub fn debounce(cool_down: Duration) -> Self {
        Self {
            kind: RateLimitKind::Debounce,
            cool_down,
        }
    }
}

/// A strategy that decides when a model's listeners are notified.
pub trait NotificationController: Send + Sync {
    /// Which strategy this is.
    fn kind(&self) -> RateLimitKind;

    /// Report that the owner's value changed.
    ///
    /// Must not block; any waiting happens on the runtime.
    fn on_value_changed(&self);

    /// The current cool-down.
    fn cool_down(&self) -> Duration;

    /// Change the cool-down without disturbing a pending notification.
    fn set_cool_down(&self, cool_down: Duration);

    /// Current scheduling state.
    fn state(&self) -> ControllerState;

    /// Cancel any pending notification and stop accepting new ones.
    ///
    /// Idempotent.
    fn cancel(&self);
}

//! Fixed-window throttling.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;

use super::{ControllerState, NotificationController, NotifyAction, RateLimitKind};
use crate::logging::{span_names, targets};
use crate::runtime::AsyncCancellationToken;

/// Notifies at most once per cool-down window.
///
/// The first change after an idle period opens a window. Further changes
/// while the window is open neither extend nor restart it. When the window
/// elapses the downstream action runs once, reading whatever value the owner
/// holds at that moment, so the latest value is always delivered.
///
/// Changing the cool-down affects the next window; an open window keeps the
/// length it was opened with.
pub struct Throttle {
    shared: Arc<ThrottleShared>,
    runtime: Handle,
}

struct ThrottleShared {
    cool_down: Mutex<Duration>,
    state: Mutex<ControllerState>,
    token: AsyncCancellationToken,
    action: NotifyAction,
}

impl ThrottleShared {
    /// Close the window and run the action unless cancelled.
    fn fire(&self) {
        // Closed before notifying so a change made by a listener opens a new window.
        *self.state.lock() = ControllerState::Idle;
        if self.token.is_cancelled() {
            return;
        }
        let _span = tracing::trace_span!(target: targets::RATE_LIMIT, span_names::RATE_LIMIT_FIRE, kind = "throttle").entered();
        (self.action)();
    }
}

impl Throttle {
    /// Create a throttle that runs `action` on `runtime`.
    pub fn new(cool_down: Duration, runtime: Handle, action: NotifyAction) -> Self {
        tracing::debug!(target: targets::RATE_LIMIT, ?cool_down, "throttle opened");
        Self {
            shared: Arc::new(ThrottleShared {
                cool_down: Mutex::new(cool_down),
                state: Mutex::new(ControllerState::Idle),
                token: AsyncCancellationToken::new(),
                action,
            }),
            runtime,
        }
    }

    /// Whether [`cancel`](NotificationController::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.shared.token.is_cancelled()
    }
}

impl NotificationController for Throttle {
    fn kind(&self) -> RateLimitKind {
        RateLimitKind::Throttle
    }

    fn on_value_changed(&self) {
        if self.shared.token.is_cancelled() {
            return;
        }
        {
            let mut state = self.shared.state.lock();
            if *state == ControllerState::Pending {
                tracing::trace!(target: targets::RATE_LIMIT, "throttle window already open");
                return;
            }
            *state = ControllerState::Pending;
        }

        let window = *self.shared.cool_down.lock();
        let shared = Arc::clone(&self.shared);
        self.runtime.spawn(async move {
            tokio::select! {
                _ = shared.token.cancelled() => {
                    tracing::debug!(target: targets::RATE_LIMIT, "throttle window cancelled");
                }
                _ = tokio::time::sleep(window) => shared.fire(),
            }
        });
    }

    fn cool_down(&self) -> Duration {
        *self.shared.cool_down.lock()
    }

    fn set_cool_down(&self, cool_down: Duration) {
        *self.shared.cool_down.lock() = cool_down;
    }

    fn state(&self) -> ControllerState {
        *self.shared.state.lock()
    }

    fn cancel(&self) {
        if !self.shared.token.is_cancelled() {
            tracing::debug!(target: targets::RATE_LIMIT, "throttle closed");
        }
        self.shared.token.cancel();
        *self.shared.state.lock() = ControllerState::Idle;
    }
}

impl Drop for Throttle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Throttle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle")
            .field("cool_down", &self.cool_down())
            .field("state", &self.state())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
